//! Integration tests for the authenticated operation client.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{body_json, header, header_regex, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pushgate::core::env::{HTTP_HOST_VAR, SITE_TOKEN_VAR};
use pushgate::operation::{OperationClient, OperationError};

fn client_for(server: &MockServer) -> OperationClient {
    let mut env = HashMap::new();
    env.insert(HTTP_HOST_VAR.to_string(), server.address().to_string());
    env.insert(SITE_TOKEN_VAR.to_string(), "restricted-token".to_string());
    OperationClient::new(Arc::new(env)).with_scheme("http")
}

#[tokio::test]
async fn success_returns_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/swap"))
        .and(header("authorization", "Bearer restricted-token"))
        .and(header_regex("user-agent", "^pushgate/"))
        .and(body_json(json!({ "slot": "production" })))
        .respond_with(ResponseTemplate::new(200).set_body_string("swapped"))
        .expect(1)
        .mount(&server)
        .await;

    let response = client_for(&server)
        .post_json("/api/swap", &json!({ "slot": "production" }))
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "swapped");
}

#[tokio::test]
async fn post_without_content_sends_null() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/restart"))
        .and(body_json(json!(null)))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let response = client_for(&server).post("api/restart").await.unwrap();
    assert_eq!(response.status(), 204);
}

#[tokio::test]
async fn non_success_status_is_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/swap"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    match client_for(&server).post("/api/swap").await {
        Err(OperationError::Status { path, status }) => {
            assert_eq!(path, "/api/swap");
            assert_eq!(status, 503);
        }
        other => panic!("expected Status error, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_token_fails_before_any_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut env = HashMap::new();
    env.insert(HTTP_HOST_VAR.to_string(), server.address().to_string());
    let client = OperationClient::new(Arc::new(env)).with_scheme("http");

    assert!(matches!(
        client.post("/api/swap").await,
        Err(OperationError::MissingConfig(var)) if var == SITE_TOKEN_VAR
    ));
}
