//! WooCommerce webhook extraction.
//!
//! WooCommerce topics use the `resource.action` form. Contact fields
//! live under `billing`; totals arrive as strings.

use serde_json::Value;

use super::{Extracted, coerce_decimal, coerce_u32, id_string, join_name, opt_string};
use crate::event::{Customer, EventKind, Order, OrderItem};

pub(crate) static MAPPINGS: &[(&str, EventKind)] = &[
    ("order.created", EventKind::OrderCreated),
    ("order.paid", EventKind::OrderPaid),
    ("order.completed", EventKind::OrderShipped),
    ("order.cancelled", EventKind::OrderCancelled),
    ("order.refunded", EventKind::OrderRefunded),
    ("customer.created", EventKind::CustomerCreated),
];

pub(crate) fn map_event(raw_event: &str) -> Option<EventKind> {
    MAPPINGS
        .iter()
        .find(|(raw, _)| *raw == raw_event)
        .map(|(_, kind)| *kind)
}

pub(crate) fn extract(kind: EventKind, payload: &Value) -> Extracted {
    match kind {
        EventKind::CustomerCreated => Extracted {
            external_id: id_string(payload.get("id")),
            customer: Some(extract_customer(payload, payload.get("billing"))),
            order: None,
        },
        _ => Extracted {
            external_id: id_string(payload.get("id")),
            customer: payload
                .get("billing")
                .map(|billing| extract_customer(payload, Some(billing))),
            order: Some(extract_order(payload)),
        },
    }
}

fn extract_customer(body: &Value, billing: Option<&Value>) -> Customer {
    let billing = billing.unwrap_or(&Value::Null);
    Customer {
        phone: opt_string(billing.get("phone")),
        name: join_name(
            opt_string(billing.get("first_name")).or_else(|| opt_string(body.get("first_name"))),
            opt_string(billing.get("last_name")).or_else(|| opt_string(body.get("last_name"))),
        ),
        email: opt_string(billing.get("email")).or_else(|| opt_string(body.get("email"))),
        external_id: id_string(body.get("customer_id")).or_else(|| id_string(body.get("id"))),
    }
}

fn extract_order(body: &Value) -> Order {
    let items = body
        .get("line_items")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|item| OrderItem {
                    name: opt_string(item.get("name")).unwrap_or_default(),
                    quantity: coerce_u32(item.get("quantity")),
                    price: coerce_decimal(item.get("price")),
                    sku: opt_string(item.get("sku")),
                })
                .collect()
        })
        .unwrap_or_default();

    Order {
        id: id_string(body.get("id")).unwrap_or_default(),
        total: coerce_decimal(body.get("total")),
        currency: opt_string(body.get("currency")).unwrap_or_default(),
        status: opt_string(body.get("status")).unwrap_or_default(),
        items,
    }
}
