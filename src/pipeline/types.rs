//! Shared types for the event pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event::{EventKind, NormalizedEvent};
use crate::pipeline::filter::FilterClause;

// ── Inbound request ─────────────────────────────────────────────────

/// Body of an inbound webhook notification.
///
/// `provider` and `event` are raw strings here: validation happens in
/// the processor so that every caller gets the same errors.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestRequest {
    pub provider: String,
    /// Tenant routing key.
    pub instance_id: String,
    #[serde(default)]
    pub integration_id: Option<String>,
    /// Raw provider event name (e.g. `orders/paid`).
    pub event: String,
    /// Provider-specific raw payload.
    #[serde(default)]
    pub payload: serde_json::Value,
    /// Dry-run mode: evaluate rules without performing side effects.
    #[serde(default)]
    pub simulate: bool,
}

// ── Automation rules ────────────────────────────────────────────────

/// The side effect a rule triggers when it matches.
///
/// Stored as a free string in tenant configuration; unrecognized values
/// deserialize to `Unknown` and fail deterministically at dispatch time
/// instead of poisoning rule loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActionType {
    SendMessage,
    TriggerCampaign,
    StartFlow,
    CallLuna,
    WebhookExternal,
    Unknown(String),
}

impl ActionType {
    pub fn as_str(&self) -> &str {
        match self {
            ActionType::SendMessage => "send_message",
            ActionType::TriggerCampaign => "trigger_campaign",
            ActionType::StartFlow => "start_flow",
            ActionType::CallLuna => "call_luna",
            ActionType::WebhookExternal => "webhook_external",
            ActionType::Unknown(s) => s,
        }
    }
}

impl From<String> for ActionType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "send_message" => ActionType::SendMessage,
            "trigger_campaign" => ActionType::TriggerCampaign,
            "start_flow" => ActionType::StartFlow,
            "call_luna" => ActionType::CallLuna,
            "webhook_external" => ActionType::WebhookExternal,
            _ => ActionType::Unknown(s),
        }
    }
}

impl From<ActionType> for String {
    fn from(a: ActionType) -> Self {
        a.as_str().to_string()
    }
}

/// Tenant-owned automation rule: event kind + filters → action.
///
/// Read-only to this core except for the execution counters, which are
/// bumped after a real (non-simulated) successful execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationRule {
    pub id: String,
    pub tenant_instance_id: String,
    pub event_type: EventKind,
    pub is_active: bool,
    #[serde(default)]
    pub filters: Vec<FilterClause>,
    pub action_type: ActionType,
    #[serde(default)]
    pub action_config: serde_json::Value,
    pub max_executions_per_hour: u32,
    pub cooldown_minutes: i64,
    #[serde(default)]
    pub execution_count: u64,
    #[serde(default)]
    pub last_executed_at: Option<DateTime<Utc>>,
}

// ── Execution log ───────────────────────────────────────────────────

/// Terminal outcome of one rule execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionOutcome {
    Success,
    Failed,
    Simulated,
}

impl ActionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionOutcome::Success => "success",
            ActionOutcome::Failed => "failed",
            ActionOutcome::Simulated => "simulated",
        }
    }
}

impl std::str::FromStr for ActionOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(ActionOutcome::Success),
            "failed" => Ok(ActionOutcome::Failed),
            "simulated" => Ok(ActionOutcome::Simulated),
            other => Err(format!("unknown outcome: {other}")),
        }
    }
}

/// Append-only record of one rule evaluation that reached dispatch.
///
/// Doubles as the data source for the rate-limit and cooldown guards:
/// guards read history strictly older than the execution being recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionLogEntry {
    pub id: Uuid,
    pub rule_id: String,
    pub tenant_instance_id: String,
    pub event_id: Uuid,
    pub event_type: EventKind,
    /// Full normalized event at execution time, for audit.
    pub event_snapshot: serde_json::Value,
    pub customer_key: Option<String>,
    pub action_type: ActionType,
    pub outcome: ActionOutcome,
    pub error_message: Option<String>,
    pub credits_consumed: u32,
    pub duration_ms: u64,
    pub created_at: DateTime<Utc>,
}

// ── Response summary ────────────────────────────────────────────────

/// Per-rule result included in the response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleOutcome {
    pub rule_id: String,
    pub success: bool,
    pub message: String,
}

/// Structured summary of one processed webhook.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessSummary {
    /// None when the raw event name had no canonical mapping.
    pub event_id: Option<Uuid>,
    pub normalized_event: Option<NormalizedEvent>,
    pub rules_matched: usize,
    pub results: Vec<RuleOutcome>,
    pub simulated: bool,
    /// Partial failures that did not abort processing (e.g. the event
    /// record could not be written).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl ProcessSummary {
    /// Summary for an unrecognized provider sub-event: acknowledged,
    /// nothing persisted, nothing processed.
    pub fn unrecognized(simulated: bool) -> Self {
        Self {
            event_id: None,
            normalized_event: None,
            rules_matched: 0,
            results: Vec::new(),
            simulated,
            warnings: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_type_round_trips_known_values() {
        for raw in [
            "send_message",
            "trigger_campaign",
            "start_flow",
            "call_luna",
            "webhook_external",
        ] {
            let action = ActionType::from(raw.to_string());
            assert!(!matches!(action, ActionType::Unknown(_)), "{raw}");
            assert_eq!(action.as_str(), raw);
        }
    }

    #[test]
    fn unrecognized_action_type_is_preserved() {
        let action = ActionType::from("send_pigeon".to_string());
        assert_eq!(action, ActionType::Unknown("send_pigeon".into()));
        assert_eq!(action.as_str(), "send_pigeon");
    }

    #[test]
    fn action_type_serde_uses_wire_string() {
        let json = serde_json::to_value(ActionType::SendMessage).unwrap();
        assert_eq!(json, serde_json::json!("send_message"));
        let back: ActionType = serde_json::from_value(serde_json::json!("trigger_campaign")).unwrap();
        assert_eq!(back, ActionType::TriggerCampaign);
    }

    #[test]
    fn ingest_request_defaults() {
        let req: IngestRequest = serde_json::from_value(serde_json::json!({
            "provider": "shopify",
            "instance_id": "t1",
            "event": "orders/paid"
        }))
        .unwrap();
        assert!(!req.simulate);
        assert!(req.integration_id.is_none());
        assert!(req.payload.is_null());
    }

    #[test]
    fn rule_deserializes_from_config_json() {
        let rule: AutomationRule = serde_json::from_value(serde_json::json!({
            "id": "r1",
            "tenant_instance_id": "t1",
            "event_type": "order_paid",
            "is_active": true,
            "filters": [
                {"field": "order.total", "operator": "greater_than", "value": 100}
            ],
            "action_type": "send_message",
            "action_config": {"template": "Hi {{customer_name}}"},
            "max_executions_per_hour": 100,
            "cooldown_minutes": 0
        }))
        .unwrap();
        assert_eq!(rule.event_type, EventKind::OrderPaid);
        assert_eq!(rule.action_type, ActionType::SendMessage);
        assert_eq!(rule.filters.len(), 1);
        assert_eq!(rule.execution_count, 0);
    }

    #[test]
    fn outcome_round_trips_through_str() {
        for o in [ActionOutcome::Success, ActionOutcome::Failed, ActionOutcome::Simulated] {
            assert_eq!(o.as_str().parse::<ActionOutcome>().unwrap(), o);
        }
    }
}
