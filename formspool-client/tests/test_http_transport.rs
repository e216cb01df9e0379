use formspool_client::{AckMode, ClientError, HttpTransport, Transport};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;

fn transport(server: &MockServer, ack: AckMode, timeout: Option<Duration>) -> HttpTransport {
    HttpTransport::new(format!("{}/", server.uri()), ack, timeout, "test-client").unwrap()
}

#[tokio::test]
async fn test_posts_record_as_json_with_marker() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(header("content-type", "application/json"))
        .and(body_partial_json(json!({
            "studentName": "Asha",
            "q1": 5,
            "comments": "great",
            "_queued_at": "2026-10-18T09:00:00.000000Z"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "message": "Feedback saved successfully."
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut record = common::asha();
    record.queued_at = Some("2026-10-18T09:00:00.000000Z".into());

    transport(&server, AckMode::Application, None)
        .deliver(&record)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_transport_ack_accepts_any_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({
            "status": "error",
            "message": "Server busy. Please try again in a moment."
        })))
        .mount(&server)
        .await;

    assert!(transport(&server, AckMode::Transport, None)
        .deliver(&common::asha())
        .await
        .is_ok());
}

#[tokio::test]
async fn test_application_ack_surfaces_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({
            "status": "error",
            "message": "Server busy. Please try again in a moment."
        })))
        .mount(&server)
        .await;

    let err = transport(&server, AckMode::Application, None)
        .deliver(&common::asha())
        .await
        .unwrap_err();
    match err {
        ClientError::Rejected { status, message } => {
            assert_eq!(status, 503);
            assert_eq!(message, "Server busy. Please try again in a moment.");
        }
        other => panic!("expected Rejected, got {:?}", other),
    }
}

#[tokio::test]
async fn test_application_ack_rejects_unrecognised_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>bad gateway</html>"))
        .mount(&server)
        .await;

    let err = transport(&server, AckMode::Application, None)
        .deliver(&common::asha())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Http(502)));
}

#[tokio::test]
async fn test_request_timeout_is_a_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let err = transport(&server, AckMode::Transport, Some(Duration::from_millis(200)))
        .deliver(&common::asha())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Transport(_)));
}

#[tokio::test]
async fn test_unreachable_endpoint_is_a_transport_error() {
    let server = MockServer::start().await;
    let uri = server.uri();
    drop(server);

    let transport = HttpTransport::new(format!("{}/", uri), AckMode::Transport, None, "t").unwrap();
    assert!(matches!(
        transport.deliver(&common::asha()).await,
        Err(ClientError::Transport(_))
    ));
    assert!(transport.probe().await.is_err());
}

#[tokio::test]
async fn test_probe_hits_liveness_check() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ok",
            "message": "Feedback endpoint is live.",
            "sheet": "FeedbackData",
            "columns": 16
        })))
        .expect(1)
        .mount(&server)
        .await;

    transport(&server, AckMode::Transport, None)
        .probe()
        .await
        .unwrap();
}
