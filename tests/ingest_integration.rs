//! Integration tests for the webhook ingestion pipeline.
//!
//! Each test spins up the real Axum router against an in-memory
//! database, plus a stub messaging transport on a random port, and
//! exercises the HTTP contract end to end.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::net::TcpListener;

use hookflow::config::TransportConfig;
use hookflow::dispatch::ActionDispatcher;
use hookflow::event::{EventKind, Provider};
use hookflow::pipeline::processor::EventProcessor;
use hookflow::pipeline::types::{ActionType, AutomationRule};
use hookflow::server::routes;
use hookflow::store::traits::{Campaign, Database, Integration};
use hookflow::store::LibSqlBackend;

/// Requests captured by the stub transport.
type SentMessages = Arc<Mutex<Vec<Value>>>;

/// Stub messaging transport: records every `/send` body and answers
/// with a configurable success flag.
async fn start_stub_transport(succeed: bool) -> (String, SentMessages) {
    let sent: SentMessages = Arc::new(Mutex::new(Vec::new()));

    #[derive(Clone)]
    struct StubState {
        sent: SentMessages,
        succeed: bool,
    }

    async fn send(State(state): State<StubState>, Json(body): Json<Value>) -> Json<Value> {
        state.sent.lock().unwrap().push(body);
        if state.succeed {
            Json(json!({"success": true}))
        } else {
            Json(json!({"success": false, "error": "number is not reachable"}))
        }
    }

    let app = Router::new()
        .route("/send", post(send))
        .with_state(StubState {
            sent: Arc::clone(&sent),
            succeed,
        });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), sent)
}

/// Start the orchestrator bound to a random port, backed by an
/// in-memory database and the given transport endpoint.
async fn start_orchestrator(transport_endpoint: &str) -> (String, Arc<dyn Database>) {
    let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());

    let dispatcher = ActionDispatcher::new(
        Arc::clone(&db),
        TransportConfig {
            endpoint: transport_endpoint.to_string(),
            api_token: SecretString::from("test-token"),
        },
        "55".into(),
        Duration::from_secs(2),
    );
    let processor = Arc::new(EventProcessor::new(Arc::clone(&db), dispatcher));
    let app = routes(processor, Arc::clone(&db));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), db)
}

async fn seed_shopify_integration(db: &Arc<dyn Database>) {
    db.insert_integration(&Integration {
        id: "int-1".into(),
        tenant_instance_id: "t1".into(),
        provider: Provider::Shopify,
        status: "connected".into(),
        created_at: Utc::now(),
    })
    .await
    .unwrap();
}

fn send_message_rule(id: &str, min_total: i64) -> AutomationRule {
    serde_json::from_value(json!({
        "id": id,
        "tenant_instance_id": "t1",
        "event_type": "order_paid",
        "is_active": true,
        "filters": [
            {"field": "order.total", "operator": "greater_than", "value": min_total}
        ],
        "action_type": "send_message",
        "action_config": {"template": "Thanks {{customer_name}}! Order {{order_id}}: R$ {{order_total}}"},
        "max_executions_per_hour": 100,
        "cooldown_minutes": 0
    }))
    .unwrap()
}

fn paid_order_body() -> Value {
    json!({
        "provider": "shopify",
        "instance_id": "t1",
        "event": "orders/paid",
        "payload": {
            "id": 450789469,
            "total_price": "150.00",
            "currency": "BRL",
            "financial_status": "paid",
            "customer": {
                "id": 207119551,
                "first_name": "Ana",
                "last_name": "Souza",
                "phone": "11999998888"
            }
        }
    })
}

async fn post_ingest(base: &str, body: &Value) -> (reqwest::StatusCode, Value) {
    let response = reqwest::Client::new()
        .post(format!("{base}/api/webhooks/ingest"))
        .json(body)
        .send()
        .await
        .unwrap();
    let status = response.status();
    let body: Value = response.json().await.unwrap();
    (status, body)
}

#[tokio::test]
async fn health_endpoint_answers() {
    let (base, _db) = start_orchestrator("http://127.0.0.1:1").await;
    let body: Value = reqwest::get(format!("{base}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "hookflow");
}

#[tokio::test]
async fn paid_order_triggers_message_with_normalized_phone() {
    let (transport, sent) = start_stub_transport(true).await;
    let (base, db) = start_orchestrator(&transport).await;
    seed_shopify_integration(&db).await;
    db.insert_rule(&send_message_rule("r1", 100)).await.unwrap();

    let (status, body) = post_ingest(&base, &paid_order_body()).await;
    assert_eq!(status, reqwest::StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["rules_matched"], 1);
    assert_eq!(body["simulated"], false);
    assert!(body["event_id"].is_string());

    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["rule_id"], "r1");
    assert_eq!(results[0]["success"], true);

    // The transport saw exactly one send, to the country-code-prefixed
    // number, with the rendered template.
    let sent = sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0]["to"], "5511999998888");
    assert_eq!(sent[0]["message"], "Thanks Ana Souza! Order 450789469: R$ 150.00");
}

#[tokio::test]
async fn filtered_out_rule_sends_nothing() {
    let (transport, sent) = start_stub_transport(true).await;
    let (base, db) = start_orchestrator(&transport).await;
    seed_shopify_integration(&db).await;
    db.insert_rule(&send_message_rule("r1", 1000)).await.unwrap();

    let (status, body) = post_ingest(&base, &paid_order_body()).await;
    assert_eq!(status, reqwest::StatusCode::OK);
    assert_eq!(body["success"], true);

    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["success"], false);
    assert!(
        results[0]["message"].as_str().unwrap().contains("filtered out"),
        "{}",
        results[0]["message"]
    );
    assert!(sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn simulation_never_calls_the_transport() {
    let (transport, sent) = start_stub_transport(true).await;
    let (base, db) = start_orchestrator(&transport).await;
    seed_shopify_integration(&db).await;
    db.insert_rule(&send_message_rule("r1", 100)).await.unwrap();

    let mut body = paid_order_body();
    body["simulate"] = json!(true);

    let (status, response) = post_ingest(&base, &body).await;
    assert_eq!(status, reqwest::StatusCode::OK);
    assert_eq!(response["simulated"], true);
    let results = response["results"].as_array().unwrap();
    assert_eq!(results[0]["success"], true);
    assert!(results[0]["message"].as_str().unwrap().starts_with("[simulated]"));
    assert!(sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn transport_level_failure_is_reported_per_rule() {
    let (transport, sent) = start_stub_transport(false).await;
    let (base, db) = start_orchestrator(&transport).await;
    seed_shopify_integration(&db).await;
    db.insert_rule(&send_message_rule("r1", 100)).await.unwrap();

    let (status, body) = post_ingest(&base, &paid_order_body()).await;
    // The batch itself succeeds; the rule result carries the failure.
    assert_eq!(status, reqwest::StatusCode::OK);
    assert_eq!(body["success"], true);
    let results = body["results"].as_array().unwrap();
    assert_eq!(results[0]["success"], false);
    assert!(
        results[0]["message"].as_str().unwrap().contains("number is not reachable"),
        "{}",
        results[0]["message"]
    );
    assert_eq!(sent.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn missing_required_field_is_400() {
    let (base, db) = start_orchestrator("http://127.0.0.1:1").await;
    seed_shopify_integration(&db).await;

    let mut body = paid_order_body();
    body["event"] = json!("");
    let (status, response) = post_ingest(&base, &body).await;
    assert_eq!(status, reqwest::StatusCode::BAD_REQUEST);
    assert_eq!(response["success"], false);
}

#[tokio::test]
async fn unknown_provider_is_400() {
    let (base, _db) = start_orchestrator("http://127.0.0.1:1").await;
    let mut body = paid_order_body();
    body["provider"] = json!("magento");
    let (status, response) = post_ingest(&base, &body).await;
    assert_eq!(status, reqwest::StatusCode::BAD_REQUEST);
    assert_eq!(response["success"], false);
}

#[tokio::test]
async fn missing_integration_is_400() {
    let (base, _db) = start_orchestrator("http://127.0.0.1:1").await;
    // No integration seeded for this tenant.
    let (status, response) = post_ingest(&base, &paid_order_body()).await;
    assert_eq!(status, reqwest::StatusCode::BAD_REQUEST);
    assert_eq!(response["success"], false);
    assert!(response["error"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn unrecognized_sub_event_is_acknowledged_with_200() {
    let (base, db) = start_orchestrator("http://127.0.0.1:1").await;
    seed_shopify_integration(&db).await;

    let mut body = paid_order_body();
    body["event"] = json!("orders/edited");
    let (status, response) = post_ingest(&base, &body).await;
    assert_eq!(status, reqwest::StatusCode::OK);
    assert_eq!(response["success"], true);
    assert_eq!(response["rules_matched"], 0);
    assert!(response["event_id"].is_null());
}

#[tokio::test]
async fn replayed_webhook_is_processed_independently_twice() {
    let (transport, sent) = start_stub_transport(true).await;
    let (base, db) = start_orchestrator(&transport).await;
    seed_shopify_integration(&db).await;
    db.insert_rule(&send_message_rule("r1", 100)).await.unwrap();

    let (_, first) = post_ingest(&base, &paid_order_body()).await;
    let (_, second) = post_ingest(&base, &paid_order_body()).await;

    assert_ne!(first["event_id"], second["event_id"]);
    assert_eq!(sent.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn campaign_action_appends_contact_once() {
    let (base, db) = start_orchestrator("http://127.0.0.1:1").await;
    seed_shopify_integration(&db).await;
    db.insert_campaign(&Campaign {
        id: "camp-1".into(),
        tenant_instance_id: "t1".into(),
        name: "Welcome".into(),
        contact_count: 0,
        created_at: Utc::now(),
    })
    .await
    .unwrap();

    let rule = AutomationRule {
        id: "r-camp".into(),
        tenant_instance_id: "t1".into(),
        event_type: EventKind::OrderPaid,
        is_active: true,
        filters: vec![],
        action_type: ActionType::TriggerCampaign,
        action_config: json!({"campaign_id": "camp-1"}),
        max_executions_per_hour: 100,
        cooldown_minutes: 0,
        execution_count: 0,
        last_executed_at: None,
    };
    db.insert_rule(&rule).await.unwrap();

    // Deliver the same webhook twice: contact list stays deduplicated.
    post_ingest(&base, &paid_order_body()).await;
    let (_, second) = post_ingest(&base, &paid_order_body()).await;

    assert_eq!(second["results"][0]["success"], true);
    let campaign = db.get_campaign("camp-1").await.unwrap().unwrap();
    assert_eq!(campaign.contact_count, 1);
    assert!(db.campaign_has_phone("camp-1", "5511999998888").await.unwrap());
}

#[tokio::test]
async fn execution_history_endpoint_lists_runs() {
    let (transport, _sent) = start_stub_transport(true).await;
    let (base, db) = start_orchestrator(&transport).await;
    seed_shopify_integration(&db).await;
    db.insert_rule(&send_message_rule("r1", 100)).await.unwrap();

    post_ingest(&base, &paid_order_body()).await;

    let body: Value = reqwest::get(format!("{base}/api/rules/r1/executions"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["success"], true);
    let executions = body["executions"].as_array().unwrap();
    assert_eq!(executions.len(), 1);
    assert_eq!(executions[0]["outcome"], "success");
    assert_eq!(executions[0]["credits_consumed"], 1);
    assert_eq!(executions[0]["customer_key"], "207119551");
}