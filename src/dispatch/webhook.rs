//! The `webhook_external` action: forward the full normalized event to
//! a tenant-configured URL.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::{info, warn};

use super::{ActionDispatcher, DispatchResult};
use crate::event::NormalizedEvent;
use crate::pipeline::types::AutomationRule;

impl ActionDispatcher {
    pub(super) async fn call_webhook(
        &self,
        event: &NormalizedEvent,
        rule: &AutomationRule,
        simulate: bool,
    ) -> DispatchResult {
        let Some(url) = rule.action_config.get("webhook_url").and_then(|v| v.as_str()) else {
            return DispatchResult::failed("webhook_url missing from action config");
        };

        if simulate {
            return DispatchResult::ok(format!("[simulated] would call webhook {url}"), 0);
        }

        let headers = custom_headers(&rule.action_config);

        let response = self
            .http
            .post(url)
            .headers(headers)
            .timeout(self.outbound_timeout)
            .json(event)
            .send()
            .await;

        match response {
            Ok(resp) => {
                let status = resp.status();
                if status.is_client_error() || status.is_server_error() {
                    DispatchResult::failed(format!("webhook {url} answered {status}"))
                } else {
                    info!(url = %url, status = %status, "Webhook delivered");
                    DispatchResult::ok(format!("webhook delivered to {url}"), 0)
                }
            }
            Err(e) => DispatchResult::failed(format!("webhook {url} failed: {e}")),
        }
    }
}

/// Tenant-supplied custom headers from `action_config.headers`.
/// Invalid names/values are skipped, not fatal.
fn custom_headers(action_config: &serde_json::Value) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let Some(map) = action_config.get("headers").and_then(|h| h.as_object()) else {
        return headers;
    };
    for (key, value) in map {
        let Some(value) = value.as_str() else { continue };
        match (
            HeaderName::from_bytes(key.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => warn!(header = %key, "Skipping invalid custom webhook header"),
        }
    }
    headers
}
