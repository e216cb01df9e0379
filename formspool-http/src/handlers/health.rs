use axum::{extract::State, Json};
use std::sync::Arc;

use super::AppState;
use crate::dto::{HealthDetail, HealthResponse};

pub const LIVE_MESSAGE: &str = "Feedback endpoint is live.";

/// Read-only liveness check. Touches neither the lock nor the table.
#[utoipa::path(
    get,
    path = "/",
    tag = "health",
    responses(
        (status = 200, description = "Endpoint is live", body = HealthResponse)
    )
)]
pub async fn liveness(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        message: LIVE_MESSAGE.to_string(),
        sheet: state.ledger.sheet_name().to_string(),
        columns: state.ledger.columns(),
    })
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Server is healthy", body = HealthDetail)
    )
)]
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthDetail> {
    Json(HealthDetail {
        status: "ok".to_string(),
        sheet: state.ledger.sheet_name().to_string(),
        columns: state.ledger.columns(),
        lock_wait_ms: state.ledger.lock_wait().as_millis() as u64,
        uptime_secs: state.started_at.elapsed().as_secs(),
        build_profile: if cfg!(debug_assertions) {
            "debug"
        } else {
            "release"
        }
        .to_string(),
    })
}
