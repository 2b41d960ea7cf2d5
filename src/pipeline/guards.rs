//! Execution guards — rate limit and cooldown.
//!
//! Both checks are advisory reads against the execution log: two
//! near-simultaneous requests for the same rule or customer can both
//! pass before either log entry lands. That makes these soft ceilings,
//! not hard admission control; a dedicated counter store with atomic
//! increment-and-check would be the upgrade path if hard guarantees are
//! ever needed.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::error::DatabaseError;
use crate::pipeline::types::AutomationRule;
use crate::store::traits::Database;

/// Length of the trailing rate-limit window.
const RATE_WINDOW_MINUTES: i64 = 60;

/// Result of one guard check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardCheck {
    Pass,
    Blocked { reason: String },
}

impl GuardCheck {
    pub fn passed(&self) -> bool {
        matches!(self, GuardCheck::Pass)
    }
}

/// Stateful eligibility checks backed by the execution-history store.
pub struct GuardService {
    db: Arc<dyn Database>,
}

impl GuardService {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    /// Trailing-window rate limit: pass iff fewer than
    /// `max_executions_per_hour` log entries exist for this rule in the
    /// last 60 minutes. A trailing interval, not a calendar bucket, so
    /// there are no edge bursts at bucket boundaries.
    pub async fn check_rate_limit(
        &self,
        rule: &AutomationRule,
        now: DateTime<Utc>,
    ) -> Result<GuardCheck, DatabaseError> {
        let since = now - Duration::minutes(RATE_WINDOW_MINUTES);
        let count = self.db.count_executions_since(&rule.id, since).await?;

        if count < u64::from(rule.max_executions_per_hour) {
            Ok(GuardCheck::Pass)
        } else {
            debug!(rule_id = %rule.id, count, limit = rule.max_executions_per_hour, "Rate limit hit");
            Ok(GuardCheck::Blocked {
                reason: format!(
                    "rate limit reached: {count} executions in the last hour (max {})",
                    rule.max_executions_per_hour
                ),
            })
        }
    }

    /// Per-customer cooldown: pass iff no execution exists for this rule
    /// and customer key within the trailing `cooldown_minutes`. Rules
    /// without a cooldown, and events without an identifiable customer,
    /// always pass.
    pub async fn check_cooldown(
        &self,
        rule: &AutomationRule,
        customer_key: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<GuardCheck, DatabaseError> {
        if rule.cooldown_minutes <= 0 {
            return Ok(GuardCheck::Pass);
        }
        let Some(key) = customer_key else {
            return Ok(GuardCheck::Pass);
        };

        let since = now - Duration::minutes(rule.cooldown_minutes);
        if self.db.customer_executed_since(&rule.id, key, since).await? {
            debug!(rule_id = %rule.id, customer_key = key, "Cooldown active");
            Ok(GuardCheck::Blocked {
                reason: format!(
                    "cooldown active: customer already handled within the last {} minutes",
                    rule.cooldown_minutes
                ),
            })
        } else {
            Ok(GuardCheck::Pass)
        }
    }
}
