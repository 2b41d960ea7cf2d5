//! Canonical event model.
//!
//! Every provider webhook is converted into one `NormalizedEvent` shape
//! before any rule sees it. The canonical vocabulary (`EventKind`) is
//! closed: if a raw provider event name has no mapping, normalization
//! yields nothing and the webhook is acknowledged without processing.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Supported source integrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Shopify,
    Woocommerce,
    Hubspot,
    RdStation,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Shopify => "shopify",
            Provider::Woocommerce => "woocommerce",
            Provider::Hubspot => "hubspot",
            Provider::RdStation => "rd_station",
        }
    }
}

impl std::str::FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "shopify" => Ok(Provider::Shopify),
            "woocommerce" => Ok(Provider::Woocommerce),
            "hubspot" => Ok(Provider::Hubspot),
            "rd_station" => Ok(Provider::RdStation),
            other => Err(format!("unknown provider: {other}")),
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical event vocabulary.
///
/// Commerce events come from shop platforms, lead/opportunity events from
/// CRM providers. Rules bind to exactly one of these kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    OrderCreated,
    OrderPaid,
    OrderShipped,
    OrderCancelled,
    OrderRefunded,
    CustomerCreated,
    CheckoutStarted,
    LeadCreated,
    LeadConverted,
    OpportunityWon,
    OpportunityLost,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::OrderCreated => "order_created",
            EventKind::OrderPaid => "order_paid",
            EventKind::OrderShipped => "order_shipped",
            EventKind::OrderCancelled => "order_cancelled",
            EventKind::OrderRefunded => "order_refunded",
            EventKind::CustomerCreated => "customer_created",
            EventKind::CheckoutStarted => "checkout_started",
            EventKind::LeadCreated => "lead_created",
            EventKind::LeadConverted => "lead_converted",
            EventKind::OpportunityWon => "opportunity_won",
            EventKind::OpportunityLost => "opportunity_lost",
        }
    }
}

impl std::str::FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "order_created" => Ok(EventKind::OrderCreated),
            "order_paid" => Ok(EventKind::OrderPaid),
            "order_shipped" => Ok(EventKind::OrderShipped),
            "order_cancelled" => Ok(EventKind::OrderCancelled),
            "order_refunded" => Ok(EventKind::OrderRefunded),
            "customer_created" => Ok(EventKind::CustomerCreated),
            "checkout_started" => Ok(EventKind::CheckoutStarted),
            "lead_created" => Ok(EventKind::LeadCreated),
            "lead_converted" => Ok(EventKind::LeadConverted),
            "opportunity_won" => Ok(EventKind::OpportunityWon),
            "opportunity_lost" => Ok(EventKind::OpportunityLost),
            other => Err(format!("unknown event kind: {other}")),
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Customer sub-record. Providers disclose different subsets, so every
/// field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub phone: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub external_id: Option<String>,
}

impl Customer {
    /// True when no field was extracted at all.
    pub fn is_empty(&self) -> bool {
        self.phone.is_none()
            && self.name.is_none()
            && self.email.is_none()
            && self.external_id.is_none()
    }
}

/// A single line item on an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub name: String,
    pub quantity: u32,
    pub price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
}

/// Order sub-record for commerce events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub total: Decimal,
    pub currency: String,
    pub status: String,
    pub items: Vec<OrderItem>,
}

/// Canonical, provider-agnostic representation of one occurrence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedEvent {
    /// Generated at normalization time.
    pub id: Uuid,
    pub provider: Provider,
    pub event: EventKind,
    /// Tenant routing key.
    pub tenant_instance_id: String,
    pub integration_id: String,
    /// The provider's own identifier for the underlying object.
    pub external_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer: Option<Customer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<Order>,
    /// Original raw payload, retained verbatim for filters that need
    /// fields not promoted to first-class attributes.
    pub metadata: serde_json::Value,
    pub received_at: DateTime<Utc>,
}

impl NormalizedEvent {
    /// Key identifying the customer for cooldown purposes.
    ///
    /// Prefers the provider's customer id, falls back to the phone number.
    pub fn customer_key(&self) -> Option<String> {
        let customer = self.customer.as_ref()?;
        customer
            .external_id
            .clone()
            .or_else(|| customer.phone.clone())
    }
}
