use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Body of `GET /`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
    /// Name of the sheet rows are appended to.
    pub sheet: String,
    /// Fixed number of columns per row.
    pub columns: usize,
}

/// Body of `GET /health`: liveness plus the settings an operator cares about.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthDetail {
    pub status: String,
    pub sheet: String,
    pub columns: usize,
    pub lock_wait_ms: u64,
    pub uptime_secs: u64,
    pub build_profile: String,
}
