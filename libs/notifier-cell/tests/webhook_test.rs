use std::time::Duration;

use assert_matches::assert_matches;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use notifier_cell::{ChannelError, DeliveryChannel, WebhookChannel};

#[tokio::test]
async fn test_webhook_posts_message_json() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hooks/ops"))
        .and(header("content-type", "application/json"))
        .and(body_partial_json(json!({ "message": "ALERT: https://a.example is DOWN" })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let target = format!("{}/hooks/ops", mock_server.uri());
    WebhookChannel::default()
        .deliver(&target, "ALERT: https://a.example is DOWN")
        .await
        .unwrap();

    let requests = mock_server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert!(body["timestamp"].as_str().is_some());
}

#[tokio::test]
async fn test_non_2xx_is_failure() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&mock_server)
        .await;

    let result = WebhookChannel::default().deliver(&mock_server.uri(), "hello").await;
    assert_matches!(result, Err(ChannelError::WebhookStatus { status: 502, .. }));
}

#[tokio::test]
async fn test_unreachable_webhook_is_failure() {
    let result = WebhookChannel::new(Duration::from_millis(500))
        .deliver("http://127.0.0.1:1/hook", "hello")
        .await;
    assert_matches!(result, Err(ChannelError::WebhookTransport(_)));
}
