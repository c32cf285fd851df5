/// Credential exchange against a mocked auth endpoint
mod common;

use common::{config_for, MANAGEMENT_KEY};
use serde_json::json;
use std::time::Duration;
use text2sql_core::{Secret, Text2SqlError, TokenExchange, TransportKind};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn exchange_with(server: &MockServer, key: &str) -> Result<String, Text2SqlError> {
    let config = config_for(server, TransportKind::Rest);
    let auth = TokenExchange::new(&config)?;
    auth.exchange(&Secret::new(key))
        .await
        .map(|t| t.as_str().to_string())
}

#[tokio::test]
async fn test_exchange_strips_bearer_prefix() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({ "management_key": MANAGEMENT_KEY })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "Bearer XYZ"})))
        .expect(1)
        .mount(&server)
        .await;

    let token = exchange_with(&server, MANAGEMENT_KEY).await.unwrap();
    assert_eq!(token, "XYZ");
}

#[tokio::test]
async fn test_exchange_accepts_raw_string_and_any_prefix_case() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!("  BEARER tok-123 ")))
        .mount(&server)
        .await;

    let token = exchange_with(&server, MANAGEMENT_KEY).await.unwrap();
    assert_eq!(token, "tok-123");
}

#[tokio::test]
async fn test_token_field_precedence() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"accessToken": "camel", "token": "plain"})),
        )
        .mount(&server)
        .await;

    let token = exchange_with(&server, MANAGEMENT_KEY).await.unwrap();
    assert_eq!(token, "plain");
}

#[tokio::test]
async fn test_placeholder_keys_never_reach_the_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "t"})))
        .expect(0)
        .mount(&server)
        .await;

    for key in ["", "   ", "your-management-key", "paste-it-HERE", "YOUR_MANAGEMENT_KEY"] {
        let err = exchange_with(&server, key).await.unwrap_err();
        assert!(
            matches!(err, Text2SqlError::Configuration(_)),
            "{key:?} gave {err:?}"
        );
    }
}

#[tokio::test]
async fn test_unauthorized_is_authentication_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid key"))
        .expect(1)
        .mount(&server)
        .await;

    let err = exchange_with(&server, MANAGEMENT_KEY).await.unwrap_err();
    assert_eq!(err.code(), "AUTHENTICATION_ERROR");
    assert!(err.to_string().contains("SOLIDDATA_MANAGEMENT_KEY"));
}

#[tokio::test]
async fn test_auth_is_not_retried_on_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let err = exchange_with(&server, MANAGEMENT_KEY).await.unwrap_err();
    assert_eq!(err.code(), "TRANSPORT_ERROR");
}

#[tokio::test]
async fn test_malformed_bodies_are_authentication_errors() {
    for body in [json!({"user": "x"}), json!([1, 2]), json!({"token": 42})] {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body.clone()))
            .mount(&server)
            .await;

        let err = exchange_with(&server, MANAGEMENT_KEY).await.unwrap_err();
        assert!(
            matches!(err, Text2SqlError::Authentication(_)),
            "{body} gave {err:?}"
        );
    }
}

#[tokio::test]
async fn test_non_json_body_is_authentication_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .mount(&server)
        .await;

    let err = exchange_with(&server, MANAGEMENT_KEY).await.unwrap_err();
    assert!(matches!(err, Text2SqlError::Authentication(_)));
}

#[tokio::test]
async fn test_slow_auth_endpoint_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"token": "late"}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let mut config = config_for(&server, TransportKind::Rest);
    config.auth_timeout_secs = 1;
    let err = TokenExchange::new(&config)
        .unwrap()
        .exchange(&config.management_key)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "TIMEOUT");
}
