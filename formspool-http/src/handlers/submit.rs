use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, RawQuery, State},
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use formspool::{FormspoolError, RawPayload, SubmitResponse};
use std::sync::Arc;

use super::AppState;

pub const SAVED_MESSAGE: &str = "Feedback saved successfully.";

/// Append one feedback submission.
///
/// Accepts a JSON object or form-encoded parameters. Fields that are missing
/// or fail numeric coercion are stored as empty cells; the request is never
/// rejected for an individual field.
#[utoipa::path(
    post,
    path = "/",
    tag = "feedback",
    request_body(content = serde_json::Value, description = "studentName, rollNumber, mobileNumber, college, q1..q10, comments"),
    responses(
        (status = 200, description = "Row appended", body = SubmitResponse),
        (status = 400, description = "Body could not be decoded", body = SubmitResponse),
        (status = 413, description = "Body over the configured size limit", body = SubmitResponse),
        (status = 503, description = "Ledger lock not acquired in time", body = SubmitResponse),
        (status = 500, description = "Storage write failed", body = SubmitResponse)
    )
)]
pub async fn submit_feedback(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let body = match body {
        Ok(body) => body,
        Err(rejection) => {
            let e = body_error(rejection);
            tracing::warn!("[SUBMIT] body refused: {}", e);
            return e.into_response();
        }
    };

    let payload = RawPayload {
        content_type: headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body: body.to_vec(),
        query,
    };

    match state.ledger.append(payload).await {
        Ok(_) => (StatusCode::OK, Json(SubmitResponse::success(SAVED_MESSAGE))).into_response(),
        Err(e) => {
            match &e {
                FormspoolError::LockTimeout { .. } => {
                    tracing::warn!("[SUBMIT] rejected, ledger busy: {}", e)
                }
                FormspoolError::MalformedPayload(_) => {
                    tracing::warn!("[SUBMIT] undecodable body: {}", e)
                }
                _ => tracing::error!("[SUBMIT] append failed: {}", e),
            }
            e.into_response()
        }
    }
}

fn body_error(rejection: BytesRejection) -> FormspoolError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        FormspoolError::PayloadTooLarge(rejection.body_text())
    } else {
        FormspoolError::MalformedPayload(rejection.body_text())
    }
}
