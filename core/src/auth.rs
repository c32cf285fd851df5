//! Management key -> bearer token exchange
//!
//! One POST of `{"management_key": ...}` to the auth endpoint. The response is
//! either a raw JSON string or an object carrying `token`, `access_token` or
//! `accessToken`. Auth failures are not transient, so nothing here retries.
use std::fmt;

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::{validate_management_key, Secret, Text2SqlConfig};
use crate::{Result, Text2SqlError};

/// Field names accepted for the token, in priority order
const TOKEN_FIELDS: &[&str] = &["token", "access_token", "accessToken"];

/// Short-lived bearer credential, stored without any `Bearer ` prefix
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    /// Wrap a raw token, stripping one leading `Bearer ` (any case).
    pub fn new(raw: &str) -> Self {
        Self(strip_bearer_prefix(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Value for an `Authorization` header: exactly one prefix.
    pub fn header_value(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(<redacted>)")
    }
}

/// Remove a single case-insensitive `Bearer ` prefix and surrounding whitespace.
pub fn strip_bearer_prefix(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.get(..7) {
        Some(head) if head.eq_ignore_ascii_case("bearer ") => trimmed[7..].trim().to_string(),
        _ => trimmed.to_string(),
    }
}

/// Pull the token string out of a decoded auth response body.
pub fn extract_token(body: &Value) -> Result<String> {
    match body {
        Value::String(s) if !s.trim().is_empty() => Ok(s.clone()),
        Value::Object(map) => {
            let found = TOKEN_FIELDS
                .iter()
                .filter_map(|field| map.get(*field))
                .find(|v| !v.is_null() && v.as_str().map_or(true, |s| !s.trim().is_empty()));
            match found {
                Some(Value::String(s)) => Ok(s.clone()),
                Some(other) => Err(Text2SqlError::Authentication(format!(
                    "Auth endpoint returned a non-string token field ({})",
                    json_kind(other)
                ))),
                None => Err(Text2SqlError::Authentication(
                    "Auth endpoint returned a JSON object but no 'token', 'access_token' or \
                     'accessToken' field."
                        .to_string(),
                )),
            }
        }
        Value::Null | Value::String(_) => Err(Text2SqlError::Authentication(
            "Auth endpoint returned an empty response.".to_string(),
        )),
        other => Err(Text2SqlError::Authentication(format!(
            "Unexpected auth response type: {}",
            json_kind(other)
        ))),
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Credential exchange against a fixed auth endpoint
#[derive(Clone)]
pub struct TokenExchange {
    http: Client,
    endpoint: String,
}

impl TokenExchange {
    pub fn new(config: &Text2SqlConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.auth_timeout())
            .build()
            .map_err(|e| Text2SqlError::Transport(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            endpoint: config.auth_endpoint.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Exchange `key` for a bearer token.
    ///
    /// Placeholder or empty keys fail before any request is sent.
    pub async fn exchange(&self, key: &Secret) -> Result<BearerToken> {
        validate_management_key(key)?;

        debug!(target: "auth", endpoint = %self.endpoint, "POST management key exchange");

        let resp = self
            .http
            .post(&self.endpoint)
            .header("content-type", "application/json")
            .json(&json!({ "management_key": key.expose() }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Text2SqlError::Timeout(format!(
                        "Auth request to {} timed out (AUTH_TIMEOUT_SECS)",
                        self.endpoint
                    ))
                } else {
                    Text2SqlError::Transport(format!(
                        "Auth request to {} failed: {}",
                        self.endpoint, e
                    ))
                }
            })?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            warn!(target: "auth", %status, "Management key rejected");
            return Err(Text2SqlError::Authentication(format!(
                "{} returned {}. Check that SOLIDDATA_MANAGEMENT_KEY is correct, not expired, \
                 and valid for this AUTH_ENDPOINT (e.g. dev vs prod).",
                self.endpoint, status
            )));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Text2SqlError::Transport(format!(
                "Auth endpoint {} returned {}: {}",
                self.endpoint, status, body
            )));
        }

        let text = resp.text().await.map_err(|e| {
            Text2SqlError::Transport(format!("Failed to read auth response body: {e}"))
        })?;
        if text.trim().is_empty() {
            return Err(Text2SqlError::Authentication(format!(
                "Auth endpoint {} returned an empty response (status {}).",
                self.endpoint, status
            )));
        }
        let body: Value = serde_json::from_str(&text).map_err(|_| {
            Text2SqlError::Authentication(format!(
                "Auth endpoint {} returned a body that is not JSON.",
                self.endpoint
            ))
        })?;

        let token = BearerToken::new(&extract_token(&body)?);
        if token.is_empty() {
            return Err(Text2SqlError::Authentication(
                "Auth endpoint returned an empty token.".to_string(),
            ));
        }

        info!(target: "auth", "Bearer token obtained");
        Ok(token)
    }
}
