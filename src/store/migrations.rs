//! Version-tracked database migrations for the libSQL backend.
//!
//! Each migration has a version number and SQL. `run_migrations()`
//! checks the current version and applies only the new ones
//! sequentially.

use libsql::Connection;

use crate::error::DatabaseError;

/// A single migration step.
struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// All migrations in order. Add new versions to the end.
static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    sql: r#"
        CREATE TABLE IF NOT EXISTS integrations (
            id TEXT PRIMARY KEY,
            tenant_instance_id TEXT NOT NULL,
            provider TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'disconnected',
            created_at TEXT NOT NULL,
            UNIQUE (tenant_instance_id, provider)
        );
        CREATE INDEX IF NOT EXISTS idx_integrations_tenant ON integrations(tenant_instance_id);

        CREATE TABLE IF NOT EXISTS automation_rules (
            id TEXT PRIMARY KEY,
            tenant_instance_id TEXT NOT NULL,
            event_type TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            filters TEXT NOT NULL DEFAULT '[]',
            action_type TEXT NOT NULL,
            action_config TEXT NOT NULL DEFAULT '{}',
            max_executions_per_hour INTEGER NOT NULL DEFAULT 100,
            cooldown_minutes INTEGER NOT NULL DEFAULT 0,
            execution_count INTEGER NOT NULL DEFAULT 0,
            last_executed_at TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_rules_tenant_event
            ON automation_rules(tenant_instance_id, event_type, is_active);

        CREATE TABLE IF NOT EXISTS events (
            id TEXT PRIMARY KEY,
            provider TEXT NOT NULL,
            event_type TEXT NOT NULL,
            tenant_instance_id TEXT NOT NULL,
            integration_id TEXT NOT NULL,
            external_id TEXT NOT NULL,
            payload TEXT NOT NULL,
            normalized TEXT NOT NULL,
            received_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_events_tenant ON events(tenant_instance_id);
        CREATE INDEX IF NOT EXISTS idx_events_external ON events(external_id);

        CREATE TABLE IF NOT EXISTS execution_logs (
            id TEXT PRIMARY KEY,
            rule_id TEXT NOT NULL,
            tenant_instance_id TEXT NOT NULL,
            event_id TEXT NOT NULL,
            event_type TEXT NOT NULL,
            event_snapshot TEXT NOT NULL,
            customer_key TEXT,
            action_type TEXT NOT NULL,
            outcome TEXT NOT NULL,
            error_message TEXT,
            credits_consumed INTEGER NOT NULL DEFAULT 0,
            duration_ms INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_execution_logs_rule
            ON execution_logs(rule_id, created_at);
        CREATE INDEX IF NOT EXISTS idx_execution_logs_customer
            ON execution_logs(rule_id, customer_key, created_at);

        CREATE TABLE IF NOT EXISTS campaigns (
            id TEXT PRIMARY KEY,
            tenant_instance_id TEXT NOT NULL,
            name TEXT NOT NULL,
            contact_count INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_campaigns_tenant ON campaigns(tenant_instance_id);

        CREATE TABLE IF NOT EXISTS campaign_contacts (
            id TEXT PRIMARY KEY,
            campaign_id TEXT NOT NULL REFERENCES campaigns(id) ON DELETE CASCADE,
            phone TEXT NOT NULL,
            name TEXT,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_campaign_contacts_phone
            ON campaign_contacts(campaign_id, phone);
    "#,
}];

/// Apply all pending migrations to the given connection.
pub async fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        (),
    )
    .await
    .map_err(|e| DatabaseError::Migration(format!("creating _migrations table: {e}")))?;

    let current = current_version(conn).await?;

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        tracing::info!(
            version = migration.version,
            name = migration.name,
            "Applying migration"
        );
        conn.execute_batch(migration.sql)
            .await
            .map_err(|e| {
                DatabaseError::Migration(format!("migration {} ({}): {e}", migration.version, migration.name))
            })?;
        conn.execute(
            "INSERT INTO _migrations (version, name) VALUES (?1, ?2)",
            libsql::params![migration.version, migration.name],
        )
        .await
        .map_err(|e| DatabaseError::Migration(format!("recording migration {}: {e}", migration.version)))?;
    }

    Ok(())
}

async fn current_version(conn: &Connection) -> Result<i64, DatabaseError> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM _migrations", ())
        .await
        .map_err(|e| DatabaseError::Migration(format!("reading schema version: {e}")))?;

    match rows
        .next()
        .await
        .map_err(|e| DatabaseError::Migration(e.to_string()))?
    {
        Some(row) => row
            .get::<i64>(0)
            .map_err(|e| DatabaseError::Migration(e.to_string())),
        None => Ok(0),
    }
}
