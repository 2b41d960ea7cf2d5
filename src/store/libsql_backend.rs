//! libSQL backend — async `Database` trait implementation.
//!
//! Supports local file and in-memory databases. A single connection is
//! reused for all operations; `libsql::Connection` is `Send + Sync` and
//! safe for concurrent async use.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::event::{EventKind, NormalizedEvent, Provider};
use crate::pipeline::types::{ActionOutcome, ActionType, AutomationRule, ExecutionLogEntry};
use crate::store::migrations;
use crate::store::traits::{Campaign, CampaignContact, Database, Integration};

/// libSQL database backend.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn parse_optional_datetime(s: &Option<String>) -> Option<DateTime<Utc>> {
    s.as_ref().map(|s| parse_datetime(s))
}

/// Convert `Option<String>` to a libsql Value.
fn opt_text_owned(s: Option<String>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s),
        None => libsql::Value::Null,
    }
}

fn row_to_integration(row: &libsql::Row) -> Result<Integration, DatabaseError> {
    let provider_str: String = row
        .get(2)
        .map_err(|e| DatabaseError::Query(e.to_string()))?;
    let created_str: String = row
        .get(4)
        .map_err(|e| DatabaseError::Query(e.to_string()))?;

    Ok(Integration {
        id: row.get(0).map_err(|e| DatabaseError::Query(e.to_string()))?,
        tenant_instance_id: row.get(1).map_err(|e| DatabaseError::Query(e.to_string()))?,
        provider: provider_str
            .parse::<Provider>()
            .map_err(DatabaseError::Serialization)?,
        status: row.get(3).map_err(|e| DatabaseError::Query(e.to_string()))?,
        created_at: parse_datetime(&created_str),
    })
}

fn row_to_rule(row: &libsql::Row) -> Result<AutomationRule, DatabaseError> {
    let event_type_str: String = row
        .get(2)
        .map_err(|e| DatabaseError::Query(e.to_string()))?;
    let is_active: i64 = row
        .get(3)
        .map_err(|e| DatabaseError::Query(e.to_string()))?;
    let filters_str: String = row
        .get(4)
        .map_err(|e| DatabaseError::Query(e.to_string()))?;
    let action_type_str: String = row
        .get(5)
        .map_err(|e| DatabaseError::Query(e.to_string()))?;
    let action_config_str: String = row
        .get(6)
        .map_err(|e| DatabaseError::Query(e.to_string()))?;
    let last_executed_str: Option<String> = row.get(10).ok();

    Ok(AutomationRule {
        id: row.get(0).map_err(|e| DatabaseError::Query(e.to_string()))?,
        tenant_instance_id: row.get(1).map_err(|e| DatabaseError::Query(e.to_string()))?,
        event_type: event_type_str
            .parse::<EventKind>()
            .map_err(DatabaseError::Serialization)?,
        is_active: is_active != 0,
        filters: serde_json::from_str(&filters_str)
            .map_err(|e| DatabaseError::Serialization(format!("rule filters: {e}")))?,
        action_type: ActionType::from(action_type_str),
        action_config: serde_json::from_str(&action_config_str)
            .map_err(|e| DatabaseError::Serialization(format!("rule action_config: {e}")))?,
        max_executions_per_hour: row
            .get::<i64>(7)
            .map_err(|e| DatabaseError::Query(e.to_string()))? as u32,
        cooldown_minutes: row.get(8).map_err(|e| DatabaseError::Query(e.to_string()))?,
        execution_count: row
            .get::<i64>(9)
            .map_err(|e| DatabaseError::Query(e.to_string()))? as u64,
        last_executed_at: parse_optional_datetime(&last_executed_str),
    })
}

fn row_to_log_entry(row: &libsql::Row) -> Result<ExecutionLogEntry, DatabaseError> {
    let id_str: String = row.get(0).map_err(|e| DatabaseError::Query(e.to_string()))?;
    let event_id_str: String = row.get(3).map_err(|e| DatabaseError::Query(e.to_string()))?;
    let event_type_str: String = row.get(4).map_err(|e| DatabaseError::Query(e.to_string()))?;
    let snapshot_str: String = row.get(5).map_err(|e| DatabaseError::Query(e.to_string()))?;
    let action_type_str: String = row.get(7).map_err(|e| DatabaseError::Query(e.to_string()))?;
    let outcome_str: String = row.get(8).map_err(|e| DatabaseError::Query(e.to_string()))?;
    let created_str: String = row.get(12).map_err(|e| DatabaseError::Query(e.to_string()))?;

    Ok(ExecutionLogEntry {
        id: Uuid::parse_str(&id_str).unwrap_or_else(|_| Uuid::nil()),
        rule_id: row.get(1).map_err(|e| DatabaseError::Query(e.to_string()))?,
        tenant_instance_id: row.get(2).map_err(|e| DatabaseError::Query(e.to_string()))?,
        event_id: Uuid::parse_str(&event_id_str).unwrap_or_else(|_| Uuid::nil()),
        event_type: event_type_str
            .parse::<EventKind>()
            .map_err(DatabaseError::Serialization)?,
        event_snapshot: serde_json::from_str(&snapshot_str)
            .map_err(|e| DatabaseError::Serialization(format!("event snapshot: {e}")))?,
        customer_key: row.get(6).ok(),
        action_type: ActionType::from(action_type_str),
        outcome: outcome_str
            .parse::<ActionOutcome>()
            .map_err(DatabaseError::Serialization)?,
        error_message: row.get(9).ok(),
        credits_consumed: row
            .get::<i64>(10)
            .map_err(|e| DatabaseError::Query(e.to_string()))? as u32,
        duration_ms: row
            .get::<i64>(11)
            .map_err(|e| DatabaseError::Query(e.to_string()))? as u64,
        created_at: parse_datetime(&created_str),
    })
}

// ── Trait implementation ────────────────────────────────────────────

const RULE_COLUMNS: &str = "id, tenant_instance_id, event_type, is_active, filters, action_type, action_config, max_executions_per_hour, cooldown_minutes, execution_count, last_executed_at";

const LOG_COLUMNS: &str = "id, rule_id, tenant_instance_id, event_id, event_type, event_snapshot, customer_key, action_type, outcome, error_message, credits_consumed, duration_ms, created_at";

#[async_trait]
impl Database for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    // ── Integrations ────────────────────────────────────────────────

    async fn insert_integration(&self, integration: &Integration) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO integrations (id, tenant_instance_id, provider, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    integration.id.clone(),
                    integration.tenant_instance_id.clone(),
                    integration.provider.as_str(),
                    integration.status.clone(),
                    integration.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_integration: {e}")))?;
        Ok(())
    }

    async fn get_integration(&self, id: &str) -> Result<Option<Integration>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, tenant_instance_id, provider, status, created_at
                 FROM integrations WHERE id = ?1",
                params![id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_integration: {e}")))?;

        match rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("get_integration: {e}")))?
        {
            Some(row) => Ok(Some(row_to_integration(&row)?)),
            None => Ok(None),
        }
    }

    async fn find_integration(
        &self,
        tenant_instance_id: &str,
        provider: Provider,
    ) -> Result<Option<Integration>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, tenant_instance_id, provider, status, created_at
                 FROM integrations WHERE tenant_instance_id = ?1 AND provider = ?2",
                params![tenant_instance_id, provider.as_str()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("find_integration: {e}")))?;

        match rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("find_integration: {e}")))?
        {
            Some(row) => Ok(Some(row_to_integration(&row)?)),
            None => Ok(None),
        }
    }

    // ── Automation rules ────────────────────────────────────────────

    async fn insert_rule(&self, rule: &AutomationRule) -> Result<(), DatabaseError> {
        let filters = serde_json::to_string(&rule.filters)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        let action_config = serde_json::to_string(&rule.action_config)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        let now = Utc::now().to_rfc3339();

        self.conn()
            .execute(
                "INSERT INTO automation_rules (id, tenant_instance_id, event_type, is_active, filters, action_type, action_config, max_executions_per_hour, cooldown_minutes, execution_count, last_executed_at, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    rule.id.clone(),
                    rule.tenant_instance_id.clone(),
                    rule.event_type.as_str(),
                    rule.is_active as i64,
                    filters,
                    rule.action_type.as_str().to_string(),
                    action_config,
                    i64::from(rule.max_executions_per_hour),
                    rule.cooldown_minutes,
                    rule.execution_count as i64,
                    opt_text_owned(rule.last_executed_at.map(|dt| dt.to_rfc3339())),
                    now.clone(),
                    now,
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_rule: {e}")))?;
        Ok(())
    }

    async fn list_active_rules(
        &self,
        tenant_instance_id: &str,
        event_type: EventKind,
    ) -> Result<Vec<AutomationRule>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {RULE_COLUMNS} FROM automation_rules
                     WHERE tenant_instance_id = ?1 AND event_type = ?2 AND is_active = 1
                     ORDER BY created_at"
                ),
                params![tenant_instance_id, event_type.as_str()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_active_rules: {e}")))?;

        let mut rules = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_active_rules: {e}")))?
        {
            rules.push(row_to_rule(&row)?);
        }
        Ok(rules)
    }

    async fn record_rule_execution(
        &self,
        rule_id: &str,
        executed_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let affected = self
            .conn()
            .execute(
                "UPDATE automation_rules
                 SET execution_count = execution_count + 1,
                     last_executed_at = ?1,
                     updated_at = ?1
                 WHERE id = ?2",
                params![executed_at.to_rfc3339(), rule_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("record_rule_execution: {e}")))?;

        if affected == 0 {
            return Err(DatabaseError::NotFound {
                entity: "automation_rule".into(),
                id: rule_id.into(),
            });
        }
        debug!(rule_id, "Rule execution counters bumped");
        Ok(())
    }

    // ── Events ──────────────────────────────────────────────────────

    async fn insert_event(&self, event: &NormalizedEvent) -> Result<(), DatabaseError> {
        let normalized = serde_json::to_string(event)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        let payload = serde_json::to_string(&event.metadata)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;

        self.conn()
            .execute(
                "INSERT INTO events (id, provider, event_type, tenant_instance_id, integration_id, external_id, payload, normalized, received_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    event.id.to_string(),
                    event.provider.as_str(),
                    event.event.as_str(),
                    event.tenant_instance_id.clone(),
                    event.integration_id.clone(),
                    event.external_id.clone(),
                    payload,
                    normalized,
                    event.received_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_event: {e}")))?;

        debug!(event_id = %event.id, kind = %event.event, "Event persisted");
        Ok(())
    }

    // ── Execution log ───────────────────────────────────────────────

    async fn insert_execution_log(&self, entry: &ExecutionLogEntry) -> Result<(), DatabaseError> {
        let snapshot = serde_json::to_string(&entry.event_snapshot)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;

        self.conn()
            .execute(
                "INSERT INTO execution_logs (id, rule_id, tenant_instance_id, event_id, event_type, event_snapshot, customer_key, action_type, outcome, error_message, credits_consumed, duration_ms, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    entry.id.to_string(),
                    entry.rule_id.clone(),
                    entry.tenant_instance_id.clone(),
                    entry.event_id.to_string(),
                    entry.event_type.as_str(),
                    snapshot,
                    opt_text_owned(entry.customer_key.clone()),
                    entry.action_type.as_str().to_string(),
                    entry.outcome.as_str(),
                    opt_text_owned(entry.error_message.clone()),
                    i64::from(entry.credits_consumed),
                    entry.duration_ms as i64,
                    entry.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_execution_log: {e}")))?;
        Ok(())
    }

    async fn count_executions_since(
        &self,
        rule_id: &str,
        since: DateTime<Utc>,
    ) -> Result<u64, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT COUNT(*) FROM execution_logs WHERE rule_id = ?1 AND created_at > ?2",
                params![rule_id, since.to_rfc3339()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("count_executions_since: {e}")))?;

        match rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("count_executions_since: {e}")))?
        {
            Some(row) => {
                let count: i64 = row.get(0).map_err(|e| DatabaseError::Query(e.to_string()))?;
                Ok(count.max(0) as u64)
            }
            None => Ok(0),
        }
    }

    async fn customer_executed_since(
        &self,
        rule_id: &str,
        customer_key: &str,
        since: DateTime<Utc>,
    ) -> Result<bool, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT 1 FROM execution_logs
                 WHERE rule_id = ?1 AND customer_key = ?2 AND created_at > ?3
                 LIMIT 1",
                params![rule_id, customer_key, since.to_rfc3339()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("customer_executed_since: {e}")))?;

        Ok(rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("customer_executed_since: {e}")))?
            .is_some())
    }

    async fn recent_executions(
        &self,
        rule_id: &str,
        limit: usize,
    ) -> Result<Vec<ExecutionLogEntry>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {LOG_COLUMNS} FROM execution_logs
                     WHERE rule_id = ?1 ORDER BY created_at DESC LIMIT ?2"
                ),
                params![rule_id, limit as i64],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("recent_executions: {e}")))?;

        let mut entries = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("recent_executions: {e}")))?
        {
            entries.push(row_to_log_entry(&row)?);
        }
        Ok(entries)
    }

    // ── Campaigns ───────────────────────────────────────────────────

    async fn insert_campaign(&self, campaign: &Campaign) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO campaigns (id, tenant_instance_id, name, contact_count, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    campaign.id.clone(),
                    campaign.tenant_instance_id.clone(),
                    campaign.name.clone(),
                    campaign.contact_count as i64,
                    campaign.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_campaign: {e}")))?;
        Ok(())
    }

    async fn get_campaign(&self, id: &str) -> Result<Option<Campaign>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, tenant_instance_id, name, contact_count, created_at
                 FROM campaigns WHERE id = ?1",
                params![id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_campaign: {e}")))?;

        match rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("get_campaign: {e}")))?
        {
            Some(row) => {
                let created_str: String =
                    row.get(4).map_err(|e| DatabaseError::Query(e.to_string()))?;
                let count: i64 = row.get(3).map_err(|e| DatabaseError::Query(e.to_string()))?;
                Ok(Some(Campaign {
                    id: row.get(0).map_err(|e| DatabaseError::Query(e.to_string()))?,
                    tenant_instance_id: row
                        .get(1)
                        .map_err(|e| DatabaseError::Query(e.to_string()))?,
                    name: row.get(2).map_err(|e| DatabaseError::Query(e.to_string()))?,
                    contact_count: count.max(0) as u64,
                    created_at: parse_datetime(&created_str),
                }))
            }
            None => Ok(None),
        }
    }

    async fn campaign_has_phone(
        &self,
        campaign_id: &str,
        phone: &str,
    ) -> Result<bool, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT 1 FROM campaign_contacts WHERE campaign_id = ?1 AND phone = ?2 LIMIT 1",
                params![campaign_id, phone],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("campaign_has_phone: {e}")))?;

        Ok(rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("campaign_has_phone: {e}")))?
            .is_some())
    }

    async fn add_campaign_contact(&self, contact: &CampaignContact) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO campaign_contacts (id, campaign_id, phone, name, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    contact.id.clone(),
                    contact.campaign_id.clone(),
                    contact.phone.clone(),
                    opt_text_owned(contact.name.clone()),
                    contact.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("add_campaign_contact: {e}")))?;

        self.conn()
            .execute(
                "UPDATE campaigns SET contact_count = contact_count + 1 WHERE id = ?1",
                params![contact.campaign_id.clone()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("add_campaign_contact counter: {e}")))?;
        Ok(())
    }
}
