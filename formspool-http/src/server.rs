use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::get,
    Router,
};
use formspool::FeedbackLedger;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ServerConfig;
use crate::handlers::{health, liveness, submit_feedback, AppState};
use crate::middleware::allow_private_network;
use crate::openapi::openapi_json;

/// Install the global subscriber. `RUST_LOG` wins; otherwise `info`.
/// Safe to call more than once.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

pub fn build_router(state: Arc<AppState>, max_body_kb: usize) -> Router {
    Router::new()
        .route("/", get(liveness).post(submit_feedback))
        .route("/health", get(health))
        .route("/api-docs/openapi.json", get(openapi_json))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(max_body_kb * 1024))
        .layer(CorsLayer::very_permissive().max_age(std::time::Duration::from_secs(86400)))
        .layer(middleware::from_fn(allow_private_network))
}

pub async fn serve(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    std::fs::create_dir_all(&config.data_dir)?;
    let ledger = Arc::new(FeedbackLedger::open_dir(
        &config.data_dir,
        config.ledger_config(),
    )?);
    tracing::info!(
        sheet = %config.sheet_name,
        lock_wait_ms = config.lock_wait_ms,
        max_body_kb = config.max_body_kb,
        "Ledger ready"
    );

    let app = build_router(AppState::new(Arc::clone(&ledger)), config.max_body_kb);

    tracing::info!("Starting Formspool server on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, draining in-flight requests");
}
