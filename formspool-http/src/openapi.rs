use axum::Json;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Formspool API",
        version = "0.1.0",
        description = "Collects feedback-form submissions into a single append-only sheet.",
        license(name = "MIT OR Apache-2.0")
    ),
    servers(
        (url = "http://localhost:7700", description = "Local development")
    ),
    paths(
        crate::handlers::submit::submit_feedback,
        crate::handlers::health::liveness,
        crate::handlers::health::health,
    ),
    components(
        schemas(
            formspool::SubmitResponse,
            formspool::SubmitStatus,
            crate::dto::HealthResponse,
            crate::dto::HealthDetail,
        )
    ),
    tags(
        (name = "feedback", description = "Submission intake"),
        (name = "health", description = "Liveness checks"),
    )
)]
pub struct ApiDoc;

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
