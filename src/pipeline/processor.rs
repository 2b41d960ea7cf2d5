//! Event processor — the orchestration controller.
//!
//! Each inbound webhook runs the same sequence, with no state held
//! across requests:
//!
//! 1. Validate the request and the addressed integration
//! 2. Normalize the raw payload into a canonical event
//! 3. Persist the event (before any rule runs)
//! 4. Load the tenant's active rules for the event kind
//! 5. Per rule: filter → rate guard → cooldown guard → dispatch → log
//! 6. Return a per-rule summary
//!
//! A rule failing any gate is recorded with a reason and never aborts
//! its siblings. Persistence failures after the event is accepted are
//! downgraded to warnings: at-least-once visibility wins over atomicity.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::dispatch::ActionDispatcher;
use crate::error::PipelineError;
use crate::event::{NormalizedEvent, Provider};
use crate::normalizer;
use crate::pipeline::filter::passes_filters;
use crate::pipeline::guards::{GuardCheck, GuardService};
use crate::pipeline::types::{
    ActionOutcome, AutomationRule, ExecutionLogEntry, IngestRequest, ProcessSummary, RuleOutcome,
};
use crate::store::traits::{Database, Integration};

/// Orchestration controller: one instance serves all requests.
pub struct EventProcessor {
    db: Arc<dyn Database>,
    guards: GuardService,
    dispatcher: ActionDispatcher,
}

impl EventProcessor {
    pub fn new(db: Arc<dyn Database>, dispatcher: ActionDispatcher) -> Self {
        let guards = GuardService::new(Arc::clone(&db));
        Self {
            db,
            guards,
            dispatcher,
        }
    }

    /// Run one inbound webhook through the full pipeline.
    pub async fn process(&self, request: IngestRequest) -> Result<ProcessSummary, PipelineError> {
        // ── Validated ───────────────────────────────────────────────
        if request.provider.trim().is_empty() {
            return Err(PipelineError::MissingField("provider"));
        }
        if request.instance_id.trim().is_empty() {
            return Err(PipelineError::MissingField("instance_id"));
        }
        if request.event.trim().is_empty() {
            return Err(PipelineError::MissingField("event"));
        }
        let provider: Provider = request
            .provider
            .trim()
            .parse()
            .map_err(|_| PipelineError::UnknownProvider(request.provider.clone()))?;

        let integration = self.resolve_integration(&request, provider).await?;
        if !integration.is_connected() {
            return Err(PipelineError::IntegrationNotConnected {
                id: integration.id,
                status: integration.status,
            });
        }

        // ── Normalized ──────────────────────────────────────────────
        let Some(event) = normalizer::normalize(
            provider,
            request.event.trim(),
            &request.payload,
            &request.instance_id,
            &integration.id,
            Utc::now(),
        ) else {
            // Unrecognized sub-events are acknowledged, not errors:
            // providers send many topics a tenant never subscribed to.
            info!(
                provider = %provider,
                raw_event = %request.event,
                "Unrecognized provider event, acknowledging without processing"
            );
            return Ok(ProcessSummary::unrecognized(request.simulate));
        };

        info!(
            event_id = %event.id,
            kind = %event.event,
            tenant = %event.tenant_instance_id,
            simulate = request.simulate,
            "Event normalized"
        );

        // ── Persisted ───────────────────────────────────────────────
        let mut warnings = Vec::new();
        if let Err(e) = self.db.insert_event(&event).await {
            error!(event_id = %event.id, error = %e, "Failed to persist event record");
            warnings.push(format!("event record write failed: {e}"));
        }

        // ── RuleLoaded ──────────────────────────────────────────────
        let rules = self
            .db
            .list_active_rules(&event.tenant_instance_id, event.event)
            .await?;
        debug!(event_id = %event.id, rules = rules.len(), "Candidate rules loaded");

        // ── RuleEvaluating ──────────────────────────────────────────
        //
        // Sequential on purpose: rule N's guard checks must see rule
        // N-1's log writes from this same request.
        let mut results = Vec::with_capacity(rules.len());
        for rule in &rules {
            results.push(self.evaluate_rule(&event, rule, request.simulate).await);
        }

        Ok(ProcessSummary {
            event_id: Some(event.id),
            rules_matched: rules.len(),
            normalized_event: Some(event),
            results,
            simulated: request.simulate,
            warnings,
        })
    }

    /// Resolve the addressed integration: explicit id first, else the
    /// tenant's unique integration for this provider.
    async fn resolve_integration(
        &self,
        request: &IngestRequest,
        provider: Provider,
    ) -> Result<Integration, PipelineError> {
        match request.integration_id.as_deref().filter(|id| !id.trim().is_empty()) {
            Some(id) => {
                let integration = self
                    .db
                    .get_integration(id)
                    .await?
                    .filter(|i| i.tenant_instance_id == request.instance_id)
                    .ok_or_else(|| PipelineError::IntegrationNotFound(format!("id {id}")))?;
                Ok(integration)
            }
            None => self
                .db
                .find_integration(&request.instance_id, provider)
                .await?
                .ok_or_else(|| {
                    PipelineError::IntegrationNotFound(format!(
                        "tenant {} provider {provider}",
                        request.instance_id
                    ))
                }),
        }
    }

    /// Filter → guards → dispatch → log → counters for one rule.
    async fn evaluate_rule(
        &self,
        event: &NormalizedEvent,
        rule: &AutomationRule,
        simulate: bool,
    ) -> RuleOutcome {
        let started = Instant::now();

        if !passes_filters(event, &rule.filters) {
            debug!(rule_id = %rule.id, "Rule filtered out");
            return RuleOutcome {
                rule_id: rule.id.clone(),
                success: false,
                message: "filtered out: event did not match rule filters".into(),
            };
        }

        let now = Utc::now();
        match self.guards.check_rate_limit(rule, now).await {
            Ok(GuardCheck::Pass) => {}
            Ok(GuardCheck::Blocked { reason }) => {
                return RuleOutcome {
                    rule_id: rule.id.clone(),
                    success: false,
                    message: reason,
                };
            }
            Err(e) => {
                return RuleOutcome {
                    rule_id: rule.id.clone(),
                    success: false,
                    message: format!("rate limit check failed: {e}"),
                };
            }
        }

        let customer_key = event.customer_key();
        match self
            .guards
            .check_cooldown(rule, customer_key.as_deref(), now)
            .await
        {
            Ok(GuardCheck::Pass) => {}
            Ok(GuardCheck::Blocked { reason }) => {
                return RuleOutcome {
                    rule_id: rule.id.clone(),
                    success: false,
                    message: reason,
                };
            }
            Err(e) => {
                return RuleOutcome {
                    rule_id: rule.id.clone(),
                    success: false,
                    message: format!("cooldown check failed: {e}"),
                };
            }
        }

        let result = self.dispatcher.execute(event, rule, simulate).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let outcome = if simulate {
            ActionOutcome::Simulated
        } else if result.success {
            ActionOutcome::Success
        } else {
            ActionOutcome::Failed
        };

        let entry = ExecutionLogEntry {
            id: Uuid::new_v4(),
            rule_id: rule.id.clone(),
            tenant_instance_id: rule.tenant_instance_id.clone(),
            event_id: event.id,
            event_type: event.event,
            event_snapshot: serde_json::to_value(event).unwrap_or_default(),
            customer_key,
            action_type: rule.action_type.clone(),
            outcome,
            error_message: (!result.success).then(|| result.message.clone()),
            credits_consumed: result.credits_consumed,
            duration_ms,
            created_at: Utc::now(),
        };

        let mut message = result.message;
        if let Err(e) = self.db.insert_execution_log(&entry).await {
            error!(rule_id = %rule.id, error = %e, "Failed to write execution log");
            message = format!("{message} (execution log write failed: {e})");
        }

        // Counters only move for real executions that actually succeeded.
        if result.success && !simulate {
            if let Err(e) = self.db.record_rule_execution(&rule.id, entry.created_at).await {
                error!(rule_id = %rule.id, error = %e, "Failed to bump rule counters");
                message = format!("{message} (rule counter update failed: {e})");
            }
        }

        RuleOutcome {
            rule_id: rule.id.clone(),
            success: result.success,
            message,
        }
    }
}
