//! HTTP surface — webhook ingestion plus a small read API.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tracing::error;

use crate::error::PipelineError;
use crate::pipeline::processor::EventProcessor;
use crate::pipeline::types::{IngestRequest, ProcessSummary};
use crate::store::traits::Database;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<EventProcessor>,
    pub db: Arc<dyn Database>,
}

/// Build the Axum router.
pub fn routes(processor: Arc<EventProcessor>, db: Arc<dyn Database>) -> Router {
    let state = AppState { processor, db };

    Router::new()
        .route("/health", get(health))
        .route("/api/webhooks/ingest", post(ingest))
        .route("/api/rules/{id}/executions", get(rule_executions))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Health ──────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "hookflow"
    }))
}

// ── Webhook ingestion ───────────────────────────────────────────────

#[derive(Serialize)]
struct IngestResponse {
    success: bool,
    #[serde(flatten)]
    summary: ProcessSummary,
}

async fn ingest(
    State(state): State<AppState>,
    Json(request): Json<IngestRequest>,
) -> impl IntoResponse {
    match state.processor.process(request).await {
        Ok(summary) => (
            StatusCode::OK,
            Json(serde_json::to_value(IngestResponse { success: true, summary }).unwrap_or_default()),
        ),
        Err(e) if e.is_client_error() => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"success": false, "error": e.to_string()})),
        ),
        Err(e) => {
            // Internal detail stays in the logs, not the response.
            error!(error = %e, "Webhook processing failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"success": false, "error": "internal error"})),
            )
        }
    }
}

// ── Execution history ───────────────────────────────────────────────

/// GET /api/rules/{id}/executions
///
/// Most recent execution log entries for one rule, newest first.
async fn rule_executions(
    State(state): State<AppState>,
    Path(rule_id): Path<String>,
) -> impl IntoResponse {
    match state.db.recent_executions(&rule_id, 50).await {
        Ok(entries) => (
            StatusCode::OK,
            Json(serde_json::json!({"success": true, "executions": entries})),
        ),
        Err(e) => {
            error!(rule_id = %rule_id, error = %e, "Failed to read execution history");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"success": false, "error": "internal error"})),
            )
        }
    }
}
