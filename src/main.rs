use std::sync::Arc;

use hookflow::config::OrchestratorConfig;
use hookflow::dispatch::ActionDispatcher;
use hookflow::pipeline::processor::EventProcessor;
use hookflow::server::routes;
use hookflow::store::{Database, LibSqlBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = OrchestratorConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  export HOOKFLOW_TRANSPORT_ENDPOINT=https://transport.example/api");
        eprintln!("  export HOOKFLOW_TRANSPORT_TOKEN=...");
        std::process::exit(1);
    });

    eprintln!("hookflow v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Ingest: http://{}/api/webhooks/ingest", config.bind_addr);
    eprintln!("   Database: {}", config.db_path);

    // ── Database ────────────────────────────────────────────────────
    let db_path = std::path::Path::new(&config.db_path);
    let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_local(db_path).await.unwrap_or_else(
        |e| {
            eprintln!("Error: Failed to open database at {}: {e}", config.db_path);
            std::process::exit(1);
        },
    ));

    // ── Pipeline ────────────────────────────────────────────────────
    let dispatcher = ActionDispatcher::new(
        Arc::clone(&db),
        config.transport.clone(),
        config.default_country_code.clone(),
        config.outbound_timeout,
    );
    let processor = Arc::new(EventProcessor::new(Arc::clone(&db), dispatcher));

    // ── HTTP server ─────────────────────────────────────────────────
    let app = routes(processor, db);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
