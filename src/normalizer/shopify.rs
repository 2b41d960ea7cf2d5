//! Shopify webhook extraction.
//!
//! Shopify topics use the `resource/action` form. Order payloads carry
//! totals as strings (`"total_price": "150.00"`) and the customer both
//! nested under `customer` and sometimes as top-level contact fields.

use serde_json::Value;

use super::{Extracted, coerce_decimal, coerce_u32, id_string, join_name, opt_string};
use crate::event::{Customer, EventKind, Order, OrderItem};

pub(crate) static MAPPINGS: &[(&str, EventKind)] = &[
    ("orders/create", EventKind::OrderCreated),
    ("orders/paid", EventKind::OrderPaid),
    ("orders/fulfilled", EventKind::OrderShipped),
    ("orders/cancelled", EventKind::OrderCancelled),
    ("refunds/create", EventKind::OrderRefunded),
    ("customers/create", EventKind::CustomerCreated),
    ("checkouts/create", EventKind::CheckoutStarted),
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
            customer: Some(extract_customer(payload)),
            order: None,
        },
        // Orders, refunds and checkouts all carry an order-shaped body.
        _ => {
            let order_body = match kind {
                // Refund payloads nest the order under `order`; fall back
                // to the top level for partial payloads.
                EventKind::OrderRefunded => payload.get("order").unwrap_or(payload),
                _ => payload,
            };
            Extracted {
                external_id: id_string(order_body.get("id")),
                customer: order_body.get("customer").map(extract_customer).map(|mut c| {
                    // Checkout/order payloads may carry contact fields at
                    // the top level when the customer object is sparse.
                    if c.phone.is_none() {
                        c.phone = opt_string(order_body.get("phone"));
                    }
                    if c.email.is_none() {
                        c.email = opt_string(order_body.get("email"));
                    }
                    c
                }),
                order: Some(extract_order(order_body)),
            }
        }
    }
}

fn extract_customer(body: &Value) -> Customer {
    Customer {
        phone: opt_string(body.get("phone")),
        name: join_name(
            opt_string(body.get("first_name")),
            opt_string(body.get("last_name")),
        ),
        email: opt_string(body.get("email")),
        external_id: id_string(body.get("id")),
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
                    name: opt_string(item.get("title")).unwrap_or_default(),
                    quantity: coerce_u32(item.get("quantity")),
                    price: coerce_decimal(item.get("price")),
                    sku: opt_string(item.get("sku")),
                })
                .collect()
        })
        .unwrap_or_default();

    Order {
        id: id_string(body.get("id")).unwrap_or_default(),
        total: coerce_decimal(body.get("total_price")),
        currency: opt_string(body.get("currency")).unwrap_or_default(),
        status: opt_string(body.get("financial_status")).unwrap_or_default(),
        items,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn paid_order_payload() -> Value {
        json!({
            "id": 450789469,
            "total_price": "150.00",
            "currency": "BRL",
            "financial_status": "paid",
            "email": "ana@example.com",
            "customer": {
                "id": 207119551,
                "first_name": "Ana",
                "last_name": "Souza",
                "email": "ana@example.com",
                "phone": "11999998888"
            },
            "line_items": [
                {"title": "Blue Shirt", "quantity": 2, "price": "75.00", "sku": "SHIRT-B"}
            ]
        })
    }

    #[test]
    fn maps_orders_paid() {
        assert_eq!(map_event("orders/paid"), Some(EventKind::OrderPaid));
        assert_eq!(map_event("orders/whatever"), None);
    }

    #[test]
    fn extracts_paid_order() {
        let extracted = extract(EventKind::OrderPaid, &paid_order_payload());
        assert_eq!(extracted.external_id.as_deref(), Some("450789469"));

        let order = extracted.order.unwrap();
        assert_eq!(order.total, dec!(150.00));
        assert_eq!(order.currency, "BRL");
        assert_eq!(order.status, "paid");
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items[0].name, "Blue Shirt");
        assert_eq!(order.items[0].quantity, 2);
        assert_eq!(order.items[0].price, dec!(75.00));
        assert_eq!(order.items[0].sku.as_deref(), Some("SHIRT-B"));

        let customer = extracted.customer.unwrap();
        assert_eq!(customer.phone.as_deref(), Some("11999998888"));
        assert_eq!(customer.name.as_deref(), Some("Ana Souza"));
        assert_eq!(customer.external_id.as_deref(), Some("207119551"));
    }

    #[test]
    fn falls_back_to_top_level_contact_fields() {
        let payload = json!({
            "id": 1,
            "total_price": "10.00",
            "email": "top@example.com",
            "phone": "11988887777",
            "customer": {"id": 2, "first_name": "Bia"}
        });
        let customer = extract(EventKind::OrderCreated, &payload).customer.unwrap();
        assert_eq!(customer.phone.as_deref(), Some("11988887777"));
        assert_eq!(customer.email.as_deref(), Some("top@example.com"));
    }

    #[test]
    fn refund_reads_nested_order() {
        let payload = json!({
            "id": 889,
            "order": {
                "id": 450789469,
                "total_price": "150.00",
                "currency": "BRL",
                "financial_status": "refunded"
            }
        });
        let extracted = extract(EventKind::OrderRefunded, &payload);
        assert_eq!(extracted.external_id.as_deref(), Some("450789469"));
        assert_eq!(extracted.order.unwrap().status, "refunded");
    }

    #[test]
    fn customer_created_extracts_top_level() {
        let payload = json!({
            "id": 207119551,
            "first_name": "Ana",
            "last_name": "Souza",
            "email": "ana@example.com",
            "phone": "+55 11 99999-8888"
        });
        let extracted = extract(EventKind::CustomerCreated, &payload);
        assert_eq!(extracted.external_id.as_deref(), Some("207119551"));
        let customer = extracted.customer.unwrap();
        assert_eq!(customer.phone.as_deref(), Some("+55 11 99999-8888"));
        assert!(extracted.order.is_none());
    }

    #[test]
    fn malformed_line_items_do_not_panic() {
        let payload = json!({
            "id": 1,
            "total_price": 99,
            "line_items": [{"title": null, "quantity": "x", "price": {}}]
        });
        let order = extract(EventKind::OrderCreated, &payload).order.unwrap();
        assert_eq!(order.total, dec!(99));
        assert_eq!(order.items[0].quantity, 0);
        assert_eq!(order.items[0].price, Decimal::ZERO);
    }
}
