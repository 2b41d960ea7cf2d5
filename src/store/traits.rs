//! Backend-agnostic `Database` trait — single async interface for all
//! persistence the orchestrator consumes: integrations, rules, the raw
//! event log, the execution log and campaign contacts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DatabaseError;
use crate::event::{EventKind, NormalizedEvent, Provider};
use crate::pipeline::types::{AutomationRule, ExecutionLogEntry};

/// A tenant's connection to one provider.
///
/// Owned by the configuration surface; the orchestrator only checks that
/// the addressed integration exists and is connected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Integration {
    pub id: String,
    pub tenant_instance_id: String,
    pub provider: Provider,
    /// Connection status; only `"connected"` integrations process events.
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl Integration {
    pub fn is_connected(&self) -> bool {
        self.status == "connected"
    }
}

/// A messaging campaign owned by a tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: String,
    pub tenant_instance_id: String,
    pub name: String,
    pub contact_count: u64,
    pub created_at: DateTime<Utc>,
}

/// One contact appended to a campaign by the `trigger_campaign` action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignContact {
    pub id: String,
    pub campaign_id: String,
    pub phone: String,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Backend-agnostic database trait.
///
/// Every write is standalone (no multi-statement transactions) and
/// idempotent by generated id; the guards rely on reads reflecting
/// history strictly older than the entry about to be appended.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    // ── Integrations ────────────────────────────────────────────────

    async fn insert_integration(&self, integration: &Integration) -> Result<(), DatabaseError>;

    async fn get_integration(&self, id: &str) -> Result<Option<Integration>, DatabaseError>;

    /// Look up a tenant's integration for one provider. Tenants hold at
    /// most one integration per provider.
    async fn find_integration(
        &self,
        tenant_instance_id: &str,
        provider: Provider,
    ) -> Result<Option<Integration>, DatabaseError>;

    // ── Automation rules ────────────────────────────────────────────

    async fn insert_rule(&self, rule: &AutomationRule) -> Result<(), DatabaseError>;

    /// All active rules for this tenant bound to the given event kind.
    async fn list_active_rules(
        &self,
        tenant_instance_id: &str,
        event_type: EventKind,
    ) -> Result<Vec<AutomationRule>, DatabaseError>;

    /// Bump `execution_count` and `last_executed_at` after a real
    /// successful execution.
    async fn record_rule_execution(
        &self,
        rule_id: &str,
        executed_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError>;

    // ── Events ──────────────────────────────────────────────────────

    /// Persist a raw+normalized event. Written once per accepted event,
    /// before any rule processing.
    async fn insert_event(&self, event: &NormalizedEvent) -> Result<(), DatabaseError>;

    // ── Execution log ───────────────────────────────────────────────

    async fn insert_execution_log(&self, entry: &ExecutionLogEntry) -> Result<(), DatabaseError>;

    /// Number of log entries for a rule created strictly after `since`.
    async fn count_executions_since(
        &self,
        rule_id: &str,
        since: DateTime<Utc>,
    ) -> Result<u64, DatabaseError>;

    /// Whether any log entry exists for this rule and customer key
    /// created strictly after `since`.
    async fn customer_executed_since(
        &self,
        rule_id: &str,
        customer_key: &str,
        since: DateTime<Utc>,
    ) -> Result<bool, DatabaseError>;

    /// Most recent log entries for a rule, newest first.
    async fn recent_executions(
        &self,
        rule_id: &str,
        limit: usize,
    ) -> Result<Vec<ExecutionLogEntry>, DatabaseError>;

    // ── Campaigns ───────────────────────────────────────────────────

    async fn insert_campaign(&self, campaign: &Campaign) -> Result<(), DatabaseError>;

    async fn get_campaign(&self, id: &str) -> Result<Option<Campaign>, DatabaseError>;

    /// Whether the campaign already holds a contact with this phone.
    async fn campaign_has_phone(
        &self,
        campaign_id: &str,
        phone: &str,
    ) -> Result<bool, DatabaseError>;

    /// Append a contact and bump the campaign's contact counter.
    async fn add_campaign_contact(&self, contact: &CampaignContact) -> Result<(), DatabaseError>;
}
