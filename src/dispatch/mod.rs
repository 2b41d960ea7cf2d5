//! Action dispatcher — executes the side effect of a matched, guarded
//! rule.
//!
//! `execute` is infallible by construction: every outbound failure is
//! folded into a `DispatchResult` so one rule's broken config or dead
//! downstream never aborts sibling rules. Simulation mode resolves and
//! validates everything but stops short of any network or store write.

mod campaign;
mod message;
mod webhook;

pub use message::{normalize_phone, render_template};

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::config::TransportConfig;
use crate::event::NormalizedEvent;
use crate::pipeline::types::{ActionType, AutomationRule};
use crate::store::traits::Database;

/// Outcome of executing one action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchResult {
    pub success: bool,
    pub message: String,
    pub credits_consumed: u32,
}

impl DispatchResult {
    pub fn ok(message: impl Into<String>, credits_consumed: u32) -> Self {
        Self {
            success: true,
            message: message.into(),
            credits_consumed,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            credits_consumed: 0,
        }
    }
}

/// Executes rule actions against external collaborators.
pub struct ActionDispatcher {
    http: reqwest::Client,
    db: Arc<dyn Database>,
    transport: TransportConfig,
    default_country_code: String,
    outbound_timeout: Duration,
}

impl ActionDispatcher {
    pub fn new(
        db: Arc<dyn Database>,
        transport: TransportConfig,
        default_country_code: String,
        outbound_timeout: Duration,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            db,
            transport,
            default_country_code,
            outbound_timeout,
        }
    }

    /// Execute the rule's action for this event.
    ///
    /// With `simulate`, reports what would happen (including the
    /// hypothetical credit cost) without performing the external call.
    pub async fn execute(
        &self,
        event: &NormalizedEvent,
        rule: &AutomationRule,
        simulate: bool,
    ) -> DispatchResult {
        let result = match &rule.action_type {
            ActionType::SendMessage => self.send_message(event, rule, simulate).await,
            ActionType::TriggerCampaign => self.trigger_campaign(event, rule, simulate).await,
            ActionType::WebhookExternal => self.call_webhook(event, rule, simulate).await,
            // Reserved extension points: acknowledged, no side effect yet.
            ActionType::StartFlow => DispatchResult::ok("flow start acknowledged", 0),
            ActionType::CallLuna => DispatchResult::ok("luna call acknowledged", 0),
            ActionType::Unknown(name) => {
                DispatchResult::failed(format!("unknown action type: {name}"))
            }
        };

        if !result.success {
            warn!(
                rule_id = %rule.id,
                action = rule.action_type.as_str(),
                reason = %result.message,
                "Action dispatch failed"
            );
        }
        result
    }
}
