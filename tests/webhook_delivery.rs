mod helpers;

use alertdispatch::message::{ChatMessage, CustomWebhookMessage, Message};
use alertdispatch::test_utils::FakeHostResolver;
use alertdispatch::{DestinationType, DispatchError};
use helpers::{http_context, init_tracing, port_of};
use std::collections::BTreeMap;
use wiremock::matchers::{basic_auth, body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn resolver() -> FakeHostResolver {
    FakeHostResolver::new().with_host("hooks.test", &["127.0.0.1"])
}

#[tokio::test]
async fn test_custom_webhook_request_shape() {
    // Arrange
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/incoming/alerts"))
        .and(query_param("token", "abc"))
        .and(header("X-Team", "storage"))
        .and(basic_auth("svc", "hunter2"))
        .and(body_string("{\"alert\":\"disk\"}"))
        .respond_with(ResponseTemplate::new(201).set_body_string("created"))
        .expect(1)
        .mount(&server)
        .await;
    let context = http_context(resolver(), vec![DestinationType::CustomWebhook]).await;

    let mut query = BTreeMap::new();
    query.insert("token".to_string(), "abc".to_string());
    let mut headers = BTreeMap::new();
    headers.insert("X-Team".to_string(), "storage".to_string());
    let message: Message = CustomWebhookMessage::builder("storage-hook")
        .with_content("{\"alert\":\"disk\"}")
        .with_scheme("http")
        .with_host("hooks.test")
        .with_port(port_of(&server))
        .with_path("incoming/alerts")
        .with_method("PUT")
        .with_query_params(query)
        .with_header_params(headers)
        .with_basic_auth("svc", "hunter2")
        .build()
        .unwrap()
        .into();

    // Act
    let response = context.publish(&message).await.unwrap();

    // Assert
    assert_eq!(response.status_code(), 201);
    assert_eq!(response.content(), "created");
    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
    assert!(received[0].headers.get("content-type").is_none());
    context.shutdown().await;
}

#[tokio::test]
async fn test_custom_webhook_defaults_to_json_post() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(header("Content-Type", "application/json"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    let context = http_context(resolver(), vec![DestinationType::CustomWebhook]).await;
    let message: Message = CustomWebhookMessage::builder("hook")
        .with_content("{}")
        .with_url(format!("http://hooks.test:{}/hook", port_of(&server)))
        .build()
        .unwrap()
        .into();

    let response = context.publish(&message).await.unwrap();

    assert_eq!(response.status_code(), 204);
    assert_eq!(response.content(), "{}");
    context.shutdown().await;
}

#[tokio::test]
async fn test_slack_webhook_posts_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/services/T000/B000"))
        .and(header("Content-Type", "application/json"))
        .and(body_string("{\"text\":\"disk full\"}"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;
    let context = http_context(resolver(), vec![DestinationType::Slack]).await;
    let message: Message = ChatMessage::slack("ops")
        .with_url(format!("http://hooks.test:{}/services/T000/B000", port_of(&server)))
        .with_content("{\"text\":\"disk full\"}")
        .build()
        .unwrap()
        .into();

    let response = context.publish(&message).await.unwrap();

    assert_eq!(response.status_code(), 200);
    assert_eq!(response.content(), "ok");
    context.shutdown().await;
}

#[tokio::test]
async fn test_rejected_request_carries_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403).set_body_string("invalid_token"))
        .mount(&server)
        .await;
    let context = http_context(resolver(), vec![DestinationType::Chime]).await;
    let message: Message = ChatMessage::chime("ops")
        .with_url(format!("http://hooks.test:{}/incomingwebhooks/x", port_of(&server)))
        .with_content("{\"Content\":\"hi\"}")
        .build()
        .unwrap()
        .into();

    let err = context.publish(&message).await.unwrap_err();

    assert_eq!(
        err,
        DispatchError::HttpStatus {
            status: 403,
            body: "invalid_token".to_string()
        }
    );
    assert_eq!(err.to_string(), "Failed: HTTP 403: invalid_token");
    context.shutdown().await;
}

#[tokio::test]
async fn test_unknown_host_is_resolution_failure() {
    let context = http_context(FakeHostResolver::new(), vec![DestinationType::Slack]).await;
    let message: Message = ChatMessage::slack("ops")
        .with_url("https://nowhere.test/services/x")
        .with_content("hi")
        .build()
        .unwrap()
        .into();

    let err = context.publish(&message).await.unwrap_err();

    assert!(matches!(err, DispatchError::Resolution(_)));
    assert!(err.is_retryable());
    context.shutdown().await;
}
