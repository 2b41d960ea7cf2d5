//! HubSpot CRM webhook extraction.
//!
//! HubSpot subscription events identify the object through `objectId`
//! and carry attributes in a flat `properties` map whose values are
//! either plain scalars or `{ "value": ... }` wrappers depending on the
//! API version that produced them.

use serde_json::Value;

use super::{Extracted, id_string, join_name, opt_string};
use crate::event::{Customer, EventKind};

pub(crate) static MAPPINGS: &[(&str, EventKind)] = &[
    ("deal.creation", EventKind::LeadCreated),
    ("deal.won", EventKind::OpportunityWon),
    ("deal.lost", EventKind::OpportunityLost),
    ("contact.creation", EventKind::CustomerCreated),
];

pub(crate) fn map_event(raw_event: &str) -> Option<EventKind> {
    MAPPINGS
        .iter()
        .find(|(raw, _)| *raw == raw_event)
        .map(|(_, kind)| *kind)
}

pub(crate) fn extract(kind: EventKind, payload: &Value) -> Extracted {
    let external_id = id_string(payload.get("objectId")).or_else(|| id_string(payload.get("vid")));

    let customer = match kind {
        EventKind::CustomerCreated => Customer {
            phone: property(payload, "phone").or_else(|| property(payload, "mobilephone")),
            name: join_name(property(payload, "firstname"), property(payload, "lastname")),
            email: property(payload, "email"),
            external_id: external_id.clone(),
        },
        // Deal events only know the associated contact when HubSpot
        // inlines it; tolerate its absence.
        _ => Customer {
            phone: property(payload, "contact_phone"),
            name: property(payload, "contact_name").or_else(|| property(payload, "dealname")),
            email: property(payload, "contact_email"),
            external_id: property(payload, "contact_id"),
        },
    };

    Extracted {
        external_id,
        customer: Some(customer),
        order: None,
    }
}

/// Read `properties.<key>`, unwrapping the `{"value": ...}` form when
/// present.
fn property(payload: &Value, key: &str) -> Option<String> {
    let raw = payload.get("properties")?.get(key)?;
    match raw {
        Value::Object(_) => opt_string(raw.get("value")),
        _ => opt_string(Some(raw)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn maps_deal_events() {
        assert_eq!(map_event("deal.creation"), Some(EventKind::LeadCreated));
        assert_eq!(map_event("deal.won"), Some(EventKind::OpportunityWon));
        assert_eq!(map_event("deal.deletion"), None);
    }

    #[test]
    fn extracts_contact_with_plain_properties() {
        let payload = json!({
            "objectId": 3401,
            "properties": {
                "firstname": "Julia",
                "lastname": "Mendes",
                "email": "julia@example.com",
                "phone": "31977776655"
            }
        });
        let extracted = extract(EventKind::CustomerCreated, &payload);
        assert_eq!(extracted.external_id.as_deref(), Some("3401"));
        let customer = extracted.customer.unwrap();
        assert_eq!(customer.name.as_deref(), Some("Julia Mendes"));
        assert_eq!(customer.phone.as_deref(), Some("31977776655"));
    }

    #[test]
    fn extracts_contact_with_wrapped_properties() {
        let payload = json!({
            "vid": 3401,
            "properties": {
                "firstname": {"value": "Julia"},
                "email": {"value": "julia@example.com"}
            }
        });
        let customer = extract(EventKind::CustomerCreated, &payload).customer.unwrap();
        assert_eq!(customer.name.as_deref(), Some("Julia"));
        assert_eq!(customer.email.as_deref(), Some("julia@example.com"));
    }

    #[test]
    fn deal_event_tolerates_missing_contact() {
        let payload = json!({
            "objectId": 9001,
            "properties": {"dealname": "Enterprise plan", "amount": "12000"}
        });
        let extracted = extract(EventKind::OpportunityWon, &payload);
        assert_eq!(extracted.external_id.as_deref(), Some("9001"));
        let customer = extracted.customer.unwrap();
        assert_eq!(customer.name.as_deref(), Some("Enterprise plan"));
        assert!(customer.phone.is_none());
    }

    #[test]
    fn empty_payload_is_sparse_not_fatal() {
        let extracted = extract(EventKind::LeadCreated, &json!({}));
        assert!(extracted.external_id.is_none());
        assert!(extracted.customer.unwrap().is_empty());
    }
}
