//! Wiremock integration tests for HttpEstimationService.
//!
//! These tests verify correct HTTP interaction and error handling using mocked responses.

use std::time::Duration;

use mizan::{EstimationService, HttpEstimationService, MizanError};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Test a successful generation request with bearer auth.
#[tokio::test]
async fn test_generate_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/generate"))
        .and(header("Authorization", "Bearer test_key"))
        .and(body_json(serde_json::json!({"prompt": "estimate a villa"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"text": "## Villa\n- 450,000 SAR"})),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = HttpEstimationService::new(mock_server.uri())
        .unwrap()
        .api_key("test_key");
    let text = service.invoke("estimate a villa").await.expect("invoke should succeed");
    assert_eq!(text, "## Villa\n- 450,000 SAR");
    assert_eq!(service.name(), "http");
}

/// Without a key, no Authorization header is sent.
#[tokio::test]
async fn test_generate_without_key() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/generate"))
        .and(header("Authorization", "Bearer test_key"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"text": "ok"})))
        .mount(&mock_server)
        .await;

    let service = HttpEstimationService::new(format!("{}/", mock_server.uri())).unwrap();
    assert_eq!(service.generate("p").await.unwrap(), "ok");
}

#[tokio::test]
async fn test_unauthorized() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&mock_server)
        .await;

    let service = HttpEstimationService::new(mock_server.uri()).unwrap();
    let err = service.invoke("p").await.unwrap_err();
    assert!(matches!(err, MizanError::AuthenticationFailed));
    assert!(err.is_service_error());
}

#[tokio::test]
async fn test_rate_limited_with_retry_after() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "12"))
        .mount(&mock_server)
        .await;

    let service = HttpEstimationService::new(mock_server.uri()).unwrap();
    let err = service.invoke("p").await.unwrap_err();
    assert_eq!(err.retry_after(), Some(Duration::from_secs(12)));
}

#[tokio::test]
async fn test_server_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&mock_server)
        .await;

    let service = HttpEstimationService::new(mock_server.uri()).unwrap();
    match service.invoke("p").await {
        Err(MizanError::Api { status, .. }) => assert_eq!(status, 503),
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_empty_text_is_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"text": "  "})))
        .mount(&mock_server)
        .await;

    let service = HttpEstimationService::new(mock_server.uri()).unwrap();
    let err = service.invoke("p").await.unwrap_err();
    assert!(matches!(err, MizanError::EmptyResponse));
}

#[tokio::test]
async fn test_malformed_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&mock_server)
        .await;

    let service = HttpEstimationService::new(mock_server.uri()).unwrap();
    let err = service.invoke("p").await.unwrap_err();
    assert!(matches!(err, MizanError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_request_timeout() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"text": "slow"}))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&mock_server)
        .await;

    let service =
        HttpEstimationService::with_timeout(mock_server.uri(), Duration::from_millis(100)).unwrap();
    let err = service.invoke("p").await.unwrap_err();
    assert!(matches!(err, MizanError::Http(_)));
    assert!(err.is_service_error());
}
