//! RD Station CRM webhook extraction.
//!
//! RD Station wraps the subject under `payload.lead` (newer webhooks) or
//! a top-level `leads` array (legacy format). Both shapes are accepted.

use serde_json::Value;

use super::{Extracted, id_string, opt_string};
use crate::event::{Customer, EventKind};

pub(crate) static MAPPINGS: &[(&str, EventKind)] = &[
    ("lead.created", EventKind::LeadCreated),
    ("lead.converted", EventKind::LeadConverted),
    ("opportunity.won", EventKind::OpportunityWon),
    ("opportunity.lost", EventKind::OpportunityLost),
];

pub(crate) fn map_event(raw_event: &str) -> Option<EventKind> {
    MAPPINGS
        .iter()
        .find(|(raw, _)| *raw == raw_event)
        .map(|(_, kind)| *kind)
}

pub(crate) fn extract(_kind: EventKind, payload: &Value) -> Extracted {
    let lead = lead_body(payload);

    Extracted {
        external_id: id_string(lead.get("uuid")).or_else(|| id_string(lead.get("id"))),
        customer: Some(Customer {
            phone: opt_string(lead.get("mobile_phone")).or_else(|| opt_string(lead.get("phone"))),
            name: opt_string(lead.get("name")),
            email: opt_string(lead.get("email")),
            external_id: id_string(lead.get("uuid")).or_else(|| id_string(lead.get("id"))),
        }),
        order: None,
    }
}

fn lead_body(payload: &Value) -> &Value {
    if let Some(lead) = payload.get("payload").and_then(|p| p.get("lead")) {
        return lead;
    }
    if let Some(first) = payload.get("leads").and_then(Value::as_array).and_then(|l| l.first()) {
        return first;
    }
    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn maps_lead_events() {
        assert_eq!(map_event("lead.created"), Some(EventKind::LeadCreated));
        assert_eq!(map_event("lead.converted"), Some(EventKind::LeadConverted));
        assert_eq!(map_event("lead.updated"), None);
    }

    #[test]
    fn extracts_nested_lead() {
        let payload = json!({
            "event_uuid": "e-1",
            "payload": {
                "lead": {
                    "uuid": "lead-550e",
                    "name": "Pedro Alves",
                    "email": "pedro@example.com",
                    "mobile_phone": "11955554444"
                }
            }
        });
        let extracted = extract(EventKind::LeadCreated, &payload);
        assert_eq!(extracted.external_id.as_deref(), Some("lead-550e"));
        let customer = extracted.customer.unwrap();
        assert_eq!(customer.name.as_deref(), Some("Pedro Alves"));
        assert_eq!(customer.phone.as_deref(), Some("11955554444"));
        assert_eq!(customer.external_id.as_deref(), Some("lead-550e"));
    }

    #[test]
    fn extracts_legacy_leads_array() {
        let payload = json!({
            "leads": [{"id": 77, "name": "Rita", "phone": "11933332222"}]
        });
        let customer = extract(EventKind::LeadConverted, &payload).customer.unwrap();
        assert_eq!(customer.name.as_deref(), Some("Rita"));
        assert_eq!(customer.phone.as_deref(), Some("11933332222"));
        assert_eq!(customer.external_id.as_deref(), Some("77"));
    }

    #[test]
    fn flat_payload_still_extracts() {
        let payload = json!({"uuid": "op-9", "name": "Opp", "email": "x@y.z"});
        let extracted = extract(EventKind::OpportunityWon, &payload);
        assert_eq!(extracted.external_id.as_deref(), Some("op-9"));
    }

    #[test]
    fn empty_payload_is_sparse() {
        let extracted = extract(EventKind::LeadCreated, &json!({}));
        assert!(extracted.external_id.is_none());
        assert!(extracted.customer.unwrap().is_empty());
    }
}
