use axum::body::Body;
use axum::http::{Request, StatusCode};
use formspool::schema::DEFAULT_SHEET_NAME;
use formspool::sheet::{MemoryWorkbook, Workbook};
use formspool::types::{header_cells, Cell};
use formspool::{FeedbackLedger, LedgerConfig, NamedLock};
use formspool_http::handlers::AppState;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn app_with(lock_wait: Duration) -> (axum::Router, Arc<MemoryWorkbook>, Arc<FeedbackLedger>) {
    let workbook = Arc::new(MemoryWorkbook::new());
    let ledger = Arc::new(FeedbackLedger::new(
        Arc::clone(&workbook) as Arc<dyn Workbook>,
        NamedLock::in_process(DEFAULT_SHEET_NAME),
        LedgerConfig {
            lock_wait,
            ..Default::default()
        },
    ));
    let app = formspool_http::build_router(AppState::new(Arc::clone(&ledger)), 64);
    (app, workbook, ledger)
}

fn post(content_type: Option<&str>, body: impl Into<Body>) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri("/");
    if let Some(ct) = content_type {
        builder = builder.header("content-type", ct);
    }
    builder.body(body.into()).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn asha() -> Value {
    json!({
        "timestamp": "2001-09-09T01:46:40.000Z",
        "studentName": "Asha",
        "rollNumber": "R1",
        "mobileNumber": "9876543210",
        "college": "KAHE",
        "q1": 5, "q2": 4, "q3": 4, "q4": 3, "q5": 5,
        "q6": 4, "q7": 3, "q8": 5, "q9": 4, "q10": 5,
        "comments": "great",
        "_queued_at": "2001-09-09T01:46:40.000000Z"
    })
}

#[tokio::test]
async fn test_post_json_appends_row_and_reports_success() {
    let (app, wb, _ledger) = app_with(Duration::from_secs(10));

    let response = app
        .oneshot(post(Some("application/json"), asha().to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(
        body,
        json!({"status": "success", "message": "Feedback saved successfully."})
    );

    let rows = wb.rows(DEFAULT_SHEET_NAME);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0], header_cells());
    assert_eq!(rows[1].len(), 16);
    assert_eq!(rows[1][1], Cell::Text("Asha".into()));
    assert_eq!(rows[1][5], Cell::Integer(5));
    assert_eq!(rows[1][15], Cell::Text("great".into()));
    assert_ne!(rows[1][0], Cell::Text("2001-09-09T01:46:40.000Z".into()));
}

#[tokio::test]
async fn test_text_plain_body_is_decoded_as_json() {
    let (app, wb, _ledger) = app_with(Duration::from_secs(10));

    let response = app
        .oneshot(post(
            Some("text/plain;charset=UTF-8"),
            json!({"studentName": "Ravi", "q3": "4"}).to_string(),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let row = &wb.rows(DEFAULT_SHEET_NAME)[1];
    assert_eq!(row[1], Cell::Text("Ravi".into()));
    assert_eq!(row[7], Cell::Integer(4));
}

#[tokio::test]
async fn test_form_encoded_body() {
    let (app, wb, _ledger) = app_with(Duration::from_secs(10));

    let response = app
        .oneshot(post(
            Some("application/x-www-form-urlencoded"),
            "studentName=Meera+K&college=KAHE&q1=3&q2=0",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let row = &wb.rows(DEFAULT_SHEET_NAME)[1];
    assert_eq!(row[1], Cell::Text("Meera K".into()));
    assert_eq!(row[4], Cell::Text("KAHE".into()));
    assert_eq!(row[5], Cell::Integer(3));
    // Zero coerces to an empty cell.
    assert!(row[6].is_empty());
}

#[tokio::test]
async fn test_query_parameters_when_body_is_empty() {
    let (app, wb, _ledger) = app_with(Duration::from_secs(10));

    let request = Request::builder()
        .method("POST")
        .uri("/?studentName=Asha&q1=5")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let row = &wb.rows(DEFAULT_SHEET_NAME)[1];
    assert_eq!(row[1], Cell::Text("Asha".into()));
    assert_eq!(row[5], Cell::Integer(5));
}

#[tokio::test]
async fn test_malformed_json_is_rejected_without_a_row() {
    let (app, wb, ledger) = app_with(Duration::from_secs(10));

    let response = app
        .oneshot(post(Some("application/json"), "{\"studentName\": "))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["status"], "error");
    assert!(wb.rows(DEFAULT_SHEET_NAME).len() <= 1);
    assert!(!ledger.lock().is_held());
}

#[tokio::test]
async fn test_busy_ledger_answers_server_busy() {
    let (app, wb, ledger) = app_with(Duration::from_millis(100));
    let held = ledger.lock().acquire(Duration::from_secs(1)).await.unwrap();

    let response = app
        .oneshot(post(Some("application/json"), asha().to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.headers()["retry-after"], "5");
    let body = json_body(response).await;
    assert_eq!(
        body,
        json!({"status": "error", "message": "Server busy. Please try again in a moment."})
    );
    assert!(wb.rows(DEFAULT_SHEET_NAME).is_empty());
    drop(held);
}

#[tokio::test]
async fn test_storage_failure_reports_error_envelope() {
    let (app, wb, _ledger) = app_with(Duration::from_secs(1));
    wb.set_fail_appends(true);

    let response = app
        .oneshot(post(Some("application/json"), asha().to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["status"], "error");
    assert!(!body["message"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_liveness_does_not_wait_for_the_lock() {
    let (app, wb, ledger) = app_with(Duration::from_secs(10));
    let _held = ledger.lock().acquire(Duration::from_secs(1)).await.unwrap();

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(
        body,
        json!({
            "status": "ok",
            "message": "Feedback endpoint is live.",
            "sheet": "FeedbackData",
            "columns": 16
        })
    );
    assert!(wb.rows(DEFAULT_SHEET_NAME).is_empty());
}

#[tokio::test]
async fn test_health_detail() {
    let (app, _wb, _ledger) = app_with(Duration::from_millis(2500));

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["lock_wait_ms"], 2500);
    assert_eq!(body["columns"], 16);
}

#[tokio::test]
async fn test_openapi_document_lists_endpoint() {
    let (app, _wb, _ledger) = app_with(Duration::from_secs(1));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api-docs/openapi.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let doc = json_body(response).await;
    assert!(doc["paths"]["/"]["post"].is_object());
    assert!(doc["paths"]["/"]["get"].is_object());
    assert!(doc["components"]["schemas"]["SubmitResponse"].is_object());
}

#[tokio::test]
async fn test_oversized_body_is_refused() {
    let (app, wb, _ledger) = app_with(Duration::from_secs(1));
    let huge = json!({"comments": "x".repeat(80 * 1024)}).to_string();

    let response = app
        .oneshot(post(Some("application/json"), huge))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let body = json_body(response).await;
    assert_eq!(body["status"], "error");
    assert!(body["message"].as_str().unwrap().starts_with("Payload too large"));
    assert!(wb.rows(DEFAULT_SHEET_NAME).is_empty());
}

#[tokio::test]
async fn test_preflight_allows_private_network() {
    let (app, _wb, _ledger) = app_with(Duration::from_secs(1));

    let response = app
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/")
                .header("origin", "https://forms.example.edu")
                .header("access-control-request-method", "POST")
                .header("access-control-request-private-network", "true")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["access-control-allow-private-network"], "true");
    assert_eq!(response.headers()["access-control-max-age"], "86400");
    assert!(response
        .headers()
        .contains_key("access-control-allow-origin"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_posts_each_get_one_row() {
    let (app, wb, _ledger) = app_with(Duration::from_secs(10));
    wb.set_append_delay(Duration::from_millis(10));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let app = app.clone();
            tokio::spawn(async move {
                app.oneshot(post(
                    Some("application/json"),
                    json!({"studentName": format!("s{}", i), "q1": 2}).to_string(),
                ))
                .await
                .unwrap()
                .status()
            })
        })
        .collect();

    for h in handles {
        assert_eq!(h.await.unwrap(), StatusCode::OK);
    }
    let rows = wb.rows(DEFAULT_SHEET_NAME);
    assert_eq!(rows.len(), 9);
    assert_eq!(wb.overlapping_appends(), 0);
}
