/// End-to-end: auth exchange -> text2sql call -> normalized answer
mod common;

use common::{config_for, RecordingSleeper, LAYER_ID, MANAGEMENT_KEY};
use serde_json::json;
use std::sync::Arc;
use text2sql_core::{
    RestTransport, Secret, Text2SqlClient, Text2SqlError, TransportKind,
};
use wiremock::matchers::{body_json, body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const QUESTION: &str = "How much revenue in 2024?";

async fn mount_auth(server: &MockServer, times: u64) {
    Mock::given(method("POST"))
        .and(path("/auth"))
        .and(body_json(json!({ "management_key": MANAGEMENT_KEY })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "Bearer XYZ"})))
        .expect(times)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_rest_end_to_end_returns_message() {
    let server = MockServer::start().await;
    mount_auth(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/text2sql"))
        .and(header("authorization", "Bearer XYZ"))
        .and(body_json(json!({
            "question": QUESTION,
            "semantic_layer_ids": ["998b655a-75eb-4873-bb1e-3ddd23164065"],
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "SELECT category, SUM(revenue) FROM sales WHERE year = 2024 GROUP BY 1;"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = Text2SqlClient::new(config_for(&server, TransportKind::Rest)).unwrap();
    assert_eq!(client.transport_kind(), TransportKind::Rest);
    let answer = client.ask(QUESTION).await.unwrap();
    assert_eq!(
        answer,
        "SELECT category, SUM(revenue) FROM sales WHERE year = 2024 GROUP BY 1;"
    );
}

#[tokio::test]
async fn test_mcp_end_to_end_uses_singular_layer_id() {
    let server = MockServer::start().await;
    mount_auth(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/mcp"))
        .and(body_partial_json(json!({"method": "initialize"})))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Mcp-Session-Id", "s-9")
                .set_body_json(json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "result": {"protocolVersion": "2025-06-18", "capabilities": {}}
                })),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/mcp"))
        .and(body_partial_json(json!({"method": "notifications/initialized"})))
        .respond_with(ResponseTemplate::new(202))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/mcp"))
        .and(header("authorization", "Bearer XYZ"))
        .and(body_partial_json(json!({
            "method": "tools/call",
            "params": {"arguments": {"semantic_layer_id": LAYER_ID}}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 2,
            "result": {"content": [{"type": "text", "text": "  SELECT 2;  "}]}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/mcp"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = Text2SqlClient::new(config_for(&server, TransportKind::Mcp)).unwrap();
    assert_eq!(client.ask(QUESTION).await.unwrap(), "SELECT 2;");
}

#[tokio::test]
async fn test_missing_semantic_layer_fails_before_network() {
    let server = MockServer::start().await;
    mount_auth(&server, 0).await;

    let mut config = config_for(&server, TransportKind::Rest);
    config.semantic_layer_id = String::new();
    let client = Text2SqlClient::new(config).unwrap();

    let err = client.ask(QUESTION).await.unwrap_err();
    assert!(matches!(err, Text2SqlError::Configuration(_)), "{err:?}");
    assert!(err.to_string().contains("SEMANTIC_LAYER_ID"));
    assert!(err.is_fatal());
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_placeholder_key_fails_before_network() {
    let server = MockServer::start().await;
    mount_auth(&server, 0).await;

    let mut config = config_for(&server, TransportKind::Mcp);
    config.management_key = Secret::new("your-management-key-here");
    let client = Text2SqlClient::new(config).unwrap();

    let err = client.ask(QUESTION).await.unwrap_err();
    assert_eq!(err.code(), "CONFIGURATION_ERROR");
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_empty_question_is_invalid_input() {
    let server = MockServer::start().await;
    mount_auth(&server, 0).await;

    let client = Text2SqlClient::new(config_for(&server, TransportKind::Rest)).unwrap();
    let err = client.ask("   ").await.unwrap_err();
    assert_eq!(err.code(), "INVALID_INPUT");
}

#[tokio::test]
async fn test_auth_failure_skips_text2sql() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/text2sql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "x"})))
        .expect(0)
        .mount(&server)
        .await;

    let client = Text2SqlClient::new(config_for(&server, TransportKind::Rest)).unwrap();
    let err = client.ask(QUESTION).await.unwrap_err();
    assert_eq!(err.code(), "AUTHENTICATION_ERROR");
}

#[tokio::test]
async fn test_each_call_reauthenticates() {
    let server = MockServer::start().await;
    mount_auth(&server, 2).await;
    Mock::given(method("POST"))
        .and(path("/text2sql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "SELECT 1;"})))
        .expect(2)
        .mount(&server)
        .await;

    let config = config_for(&server, TransportKind::Rest);
    let transport = RestTransport::new(&config)
        .unwrap()
        .with_sleeper(Arc::new(RecordingSleeper::default()));
    let client = Text2SqlClient::with_transport(config, Box::new(transport)).unwrap();

    client.ask(QUESTION).await.unwrap();
    client.ask(QUESTION).await.unwrap();
}

#[tokio::test]
async fn test_injected_transport_url_is_the_one_validated() {
    let server = MockServer::start().await;
    mount_auth(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/text2sql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "SELECT 1;"})))
        .expect(1)
        .mount(&server)
        .await;

    // Configured for MCP with a broken MCP URL, but driven through REST.
    let mut config = config_for(&server, TransportKind::Mcp);
    config.mcp_server_url = "not a url".to_string();
    let transport = RestTransport::new(&config).unwrap();
    let client = Text2SqlClient::with_transport(config, Box::new(transport)).unwrap();
    assert_eq!(client.ask(QUESTION).await.unwrap(), "SELECT 1;");

    // And the reverse: a broken REST URL is caught before any request.
    let mut config = config_for(&server, TransportKind::Mcp);
    config.text2sql_url = "ftp://example.com/text2sql".to_string();
    let transport = RestTransport::new(&config).unwrap();
    let client = Text2SqlClient::with_transport(config, Box::new(transport)).unwrap();
    let err = client.ask(QUESTION).await.unwrap_err();
    assert!(err.to_string().contains("TEXT2SQL_URL"), "{err}");
}
