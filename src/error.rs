use http::StatusCode;
use thiserror::Error;

/// Message returned to callers when the ledger lock could not be taken in time.
pub const SERVER_BUSY_MESSAGE: &str = "Server busy. Please try again in a moment.";

#[derive(Error, Debug, Clone)]
pub enum FormspoolError {
    #[error("lock '{lock}' not acquired within {waited_ms} ms")]
    LockTimeout { lock: String, waited_ms: u64 },

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Storage write error: {0}")]
    StorageWrite(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, FormspoolError>;

impl From<std::io::Error> for FormspoolError {
    fn from(e: std::io::Error) -> Self {
        FormspoolError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for FormspoolError {
    fn from(e: serde_json::Error) -> Self {
        FormspoolError::Json(e.to_string())
    }
}

impl FormspoolError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            FormspoolError::LockTimeout { .. } => StatusCode::SERVICE_UNAVAILABLE,
            FormspoolError::MalformedPayload(_) => StatusCode::BAD_REQUEST,
            FormspoolError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            FormspoolError::Json(_) => StatusCode::BAD_REQUEST,
            FormspoolError::StorageWrite(_) => StatusCode::INTERNAL_SERVER_ERROR,
            FormspoolError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            FormspoolError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text placed in the `message` field of the wire envelope.
    ///
    /// Lock contention gets the fixed "server busy" wording so clients can
    /// show it verbatim; everything else reports the underlying error.
    pub fn client_message(&self) -> String {
        match self {
            FormspoolError::LockTimeout { .. } => SERVER_BUSY_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }

    /// Whether a client retry has a reasonable chance of succeeding.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FormspoolError::LockTimeout { .. }
                | FormspoolError::StorageWrite(_)
                | FormspoolError::Io(_)
        )
    }
}

// Axum IntoResponse implementation (feature-gated)
#[cfg(feature = "axum-support")]
use axum::response::{IntoResponse, Json, Response};

#[cfg(feature = "axum-support")]
impl IntoResponse for FormspoolError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = crate::types::SubmitResponse::error(self.client_message());

        let mut response = (status, Json(body)).into_response();
        if matches!(&self, FormspoolError::LockTimeout { .. }) {
            response
                .headers_mut()
                .insert(http::header::RETRY_AFTER, http::HeaderValue::from_static("5"));
        }
        response
    }
}
