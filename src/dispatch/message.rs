//! The `send_message` action: template rendering, phone normalization
//! and the outbound transport call.

use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::{debug, info};

use super::{ActionDispatcher, DispatchResult};
use crate::error::DispatchError;
use crate::event::NormalizedEvent;
use crate::pipeline::types::AutomationRule;

/// Transport API response body. Delivery success comes from this flag,
/// not from the HTTP status alone.
#[derive(Debug, Deserialize)]
struct TransportResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

impl ActionDispatcher {
    pub(super) async fn send_message(
        &self,
        event: &NormalizedEvent,
        rule: &AutomationRule,
        simulate: bool,
    ) -> DispatchResult {
        let Some(phone) = event.customer.as_ref().and_then(|c| c.phone.as_deref()) else {
            return DispatchResult::failed("customer phone missing; cannot send message");
        };

        let Some(template) = rule.action_config.get("template").and_then(|t| t.as_str()) else {
            return DispatchResult::failed("message template missing from action config");
        };

        let to = normalize_phone(phone, &self.default_country_code);
        let text = render_template(template, event);

        if simulate {
            return DispatchResult::ok(format!("[simulated] would send message to {to}"), 1);
        }

        match self.post_message(&to, &text).await {
            Ok(()) => {
                info!(to = %to, rule_id = %rule.id, "Message sent");
                DispatchResult::ok(format!("message sent to {to}"), 1)
            }
            Err(e) => DispatchResult::failed(format!("message to {to} failed: {e}")),
        }
    }

    async fn post_message(&self, to: &str, text: &str) -> Result<(), DispatchError> {
        let url = format!("{}/send", self.transport.endpoint);
        let response = self
            .http
            .post(&url)
            .bearer_auth(self.transport.api_token.expose_secret())
            .timeout(self.outbound_timeout)
            .json(&serde_json::json!({"to": to, "message": text}))
            .send()
            .await?;

        let status = response.status();
        let body: TransportResponse = response
            .json()
            .await
            .map_err(|e| DispatchError::Transport(format!("unreadable response: {e}")))?;

        if !status.is_success() || !body.success {
            let detail = body.error.unwrap_or_else(|| format!("status {status}"));
            return Err(DispatchError::Transport(detail));
        }

        debug!(to = %to, "Transport accepted message");
        Ok(())
    }
}

/// Render a message template against the event.
///
/// The placeholder set is closed and substitution is single-pass:
/// unknown tokens stay verbatim and substituted values are never
/// rescanned, so event data cannot smuggle further expansions in.
pub fn render_template(template: &str, event: &NormalizedEvent) -> String {
    let customer = event.customer.as_ref();
    let order = event.order.as_ref();

    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start..];
        match after.find("}}") {
            Some(end) => {
                let token = &after[2..end];
                match token {
                    "customer_name" => {
                        out.push_str(customer.and_then(|c| c.name.as_deref()).unwrap_or(""))
                    }
                    "customer_email" => {
                        out.push_str(customer.and_then(|c| c.email.as_deref()).unwrap_or(""))
                    }
                    "order_id" => out.push_str(order.map(|o| o.id.as_str()).unwrap_or("")),
                    "order_total" => {
                        if let Some(o) = order {
                            out.push_str(&format!("{:.2}", o.total));
                        }
                    }
                    _ => out.push_str(&after[..end + 2]),
                }
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(after);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Normalize a destination phone number into canonical international
/// form: strip everything but digits, then prefix the default country
/// code when the digit count says this is a local-format number (10 or
/// 11 digits: area code plus 8- or 9-digit subscriber).
pub fn normalize_phone(raw: &str, default_country_code: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if matches!(digits.len(), 10 | 11) {
        format!("{default_country_code}{digits}")
    } else {
        digits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use uuid::Uuid;

    use crate::event::{Customer, EventKind, Order, Provider};

    fn event_with(customer: Option<Customer>, order: Option<Order>) -> NormalizedEvent {
        NormalizedEvent {
            id: Uuid::new_v4(),
            provider: Provider::Shopify,
            event: EventKind::OrderPaid,
            tenant_instance_id: "t1".into(),
            integration_id: "i1".into(),
            external_id: "42".into(),
            customer,
            order,
            metadata: json!({}),
            received_at: Utc::now(),
        }
    }

    #[test]
    fn renders_all_placeholders() {
        let event = event_with(
            Some(Customer {
                name: Some("Ana Souza".into()),
                email: Some("ana@example.com".into()),
                phone: None,
                external_id: None,
            }),
            Some(Order {
                id: "42".into(),
                total: dec!(150),
                currency: "BRL".into(),
                status: "paid".into(),
                items: vec![],
            }),
        );
        let text = render_template(
            "Hi {{customer_name}} ({{customer_email}}): order {{order_id}} for R$ {{order_total}}",
            &event,
        );
        assert_eq!(text, "Hi Ana Souza (ana@example.com): order 42 for R$ 150.00");
    }

    #[test]
    fn missing_fields_render_empty() {
        let event = event_with(None, None);
        let text = render_template("Hi {{customer_name}}, total {{order_total}}.", &event);
        assert_eq!(text, "Hi , total .");
    }

    #[test]
    fn unknown_tokens_stay_verbatim() {
        let event = event_with(None, None);
        let text = render_template("{{coupon_code}} for {{customer_name}}", &event);
        assert_eq!(text, "{{coupon_code}} for ");
    }

    #[test]
    fn placeholder_values_are_not_reexpanded() {
        let event = event_with(
            Some(Customer {
                name: Some("{{order_total}}".into()),
                ..Default::default()
            }),
            None,
        );
        // The substituted value is literal output, never rescanned.
        let text = render_template("{{customer_name}}", &event);
        assert_eq!(text, "{{order_total}}");
    }

    #[test]
    fn normalizes_local_11_digit_number() {
        assert_eq!(normalize_phone("11999998888", "55"), "5511999998888");
    }

    #[test]
    fn normalizes_local_10_digit_number() {
        assert_eq!(normalize_phone("1133334444", "55"), "551133334444");
    }

    #[test]
    fn strips_formatting_characters() {
        assert_eq!(normalize_phone("+55 (11) 99999-8888", "55"), "5511999998888");
    }

    #[test]
    fn international_numbers_pass_through() {
        assert_eq!(normalize_phone("5511999998888", "55"), "5511999998888");
        assert_eq!(normalize_phone("442071234567", "55"), "442071234567");
    }
}
