//! Event normalizer — provider payloads in, canonical events out.
//!
//! `normalize` is a pure function: no I/O, no clock beyond the caller's
//! timestamp, and it never fails. A raw event name with no entry in the
//! provider's mapping table yields `None` (the webhook is acknowledged
//! but nothing is processed). Malformed or partial payloads produce
//! sparse fields, never errors.

mod hubspot;
mod rdstation;
mod shopify;
mod woocommerce;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use uuid::Uuid;

use crate::event::{Customer, EventKind, NormalizedEvent, Provider};

/// Fields a provider extractor pulls out of its raw payload.
#[derive(Debug, Default)]
pub(crate) struct Extracted {
    pub external_id: Option<String>,
    pub customer: Option<Customer>,
    pub order: Option<crate::event::Order>,
}

/// Map a raw provider event name + payload into a canonical event.
///
/// Returns `None` when the raw name is not in the provider's mapping
/// table — the caller must treat this as "unrecognized, acknowledge but
/// do not process".
pub fn normalize(
    provider: Provider,
    raw_event: &str,
    payload: &Value,
    tenant_instance_id: &str,
    integration_id: &str,
    received_at: DateTime<Utc>,
) -> Option<NormalizedEvent> {
    let kind = map_event(provider, raw_event)?;

    let extracted = match provider {
        Provider::Shopify => shopify::extract(kind, payload),
        Provider::Woocommerce => woocommerce::extract(kind, payload),
        Provider::Hubspot => hubspot::extract(kind, payload),
        Provider::RdStation => rdstation::extract(kind, payload),
    };

    let id = Uuid::new_v4();
    Some(NormalizedEvent {
        id,
        provider,
        event: kind,
        tenant_instance_id: tenant_instance_id.to_string(),
        integration_id: integration_id.to_string(),
        // Events with no provider-side id still need a stable handle for
        // traceability, so fall back to the generated event id.
        external_id: extracted.external_id.unwrap_or_else(|| id.to_string()),
        customer: extracted.customer.filter(|c| !c.is_empty()),
        order: extracted.order,
        metadata: payload.clone(),
        received_at,
    })
}

/// Look up the canonical kind for a raw provider event name.
pub fn map_event(provider: Provider, raw_event: &str) -> Option<EventKind> {
    match provider {
        Provider::Shopify => shopify::map_event(raw_event),
        Provider::Woocommerce => woocommerce::map_event(raw_event),
        Provider::Hubspot => hubspot::map_event(raw_event),
        Provider::RdStation => rdstation::map_event(raw_event),
    }
}

/// All (provider, raw name) pairs this normalizer recognizes.
///
/// Exposed so coverage tests can sweep the whole table.
pub fn mapping_table() -> Vec<(Provider, &'static str, EventKind)> {
    let mut table = Vec::new();
    for (raw, kind) in shopify::MAPPINGS {
        table.push((Provider::Shopify, *raw, *kind));
    }
    for (raw, kind) in woocommerce::MAPPINGS {
        table.push((Provider::Woocommerce, *raw, *kind));
    }
    for (raw, kind) in hubspot::MAPPINGS {
        table.push((Provider::Hubspot, *raw, *kind));
    }
    for (raw, kind) in rdstation::MAPPINGS {
        table.push((Provider::RdStation, *raw, *kind));
    }
    table
}

// ── Coercion helpers ────────────────────────────────────────────────
//
// Provider payloads carry numbers as strings, numbers, or garbage.
// Coercion is total: anything unparseable becomes zero.

/// Coerce a JSON value to a decimal. Strings and numbers parse; anything
/// else (or a parse failure) is zero.
pub(crate) fn coerce_decimal(value: Option<&Value>) -> Decimal {
    match value {
        Some(Value::String(s)) => s.trim().parse().unwrap_or(Decimal::ZERO),
        Some(Value::Number(n)) => n.to_string().parse().unwrap_or(Decimal::ZERO),
        _ => Decimal::ZERO,
    }
}

/// Coerce a JSON value to a quantity.
pub(crate) fn coerce_u32(value: Option<&Value>) -> u32 {
    match value {
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        Some(Value::Number(n)) => n.as_u64().map(|v| v.min(u64::from(u32::MAX)) as u32).unwrap_or(0),
        _ => 0,
    }
}

/// Extract a non-empty string field.
pub(crate) fn opt_string(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

/// Extract an identifier that may be a string or a number.
pub(crate) fn id_string(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

/// Join optional first/last name parts into a display name.
pub(crate) fn join_name(first: Option<String>, last: Option<String>) -> Option<String> {
    match (first, last) {
        (Some(f), Some(l)) => Some(format!("{f} {l}")),
        (Some(f), None) => Some(f),
        (None, Some(l)) => Some(l),
        (None, None) => None,
    }
}
