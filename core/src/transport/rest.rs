use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::Text2SqlTransport;
use crate::auth::BearerToken;
use crate::config::{Secret, Text2SqlConfig, TransportKind};
use crate::normalize::RemoteResponse;
use crate::retry::{RetryPolicy, Sleeper, TokioSleeper};
use crate::sequencer::Text2SqlRequest;
use crate::{Result, Text2SqlError};

const REST_NOT_FOUND_HINT: &str = "The server may only speak MCP on this deployment; set \
     TEXT2SQL_TRANSPORT=mcp or point TEXT2SQL_URL at a REST-to-MCP bridge.";

/// REST body: the identifier travels as a one-element `semantic_layer_ids` array.
pub fn rest_payload(request: &Text2SqlRequest) -> Value {
    json!({
        "question": request.question(),
        "semantic_layer_ids": [request.semantic_layer_id()],
    })
}

/// Direct POST to the text2sql REST face, retrying 503 and timeouts
pub struct RestTransport {
    http: Client,
    url: String,
    function_key: Option<Secret>,
    retry: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    timeout_secs: u64,
}

impl RestTransport {
    pub fn new(config: &Text2SqlConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| Text2SqlError::Transport(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            url: config.text2sql_url.clone(),
            function_key: config.function_key.clone(),
            retry: config.retry.clone(),
            sleeper: Arc::new(TokioSleeper),
            timeout_secs: config.request_timeout_secs,
        })
    }

    /// Replace the sleeper used between attempts
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    async fn send_once(
        &self,
        payload: &Value,
        token: &BearerToken,
    ) -> std::result::Result<Response, reqwest::Error> {
        let mut req = self
            .http
            .post(&self.url)
            .bearer_auth(token.as_str())
            .header("content-type", "application/json")
            .json(payload);
        if let Some(ref key) = self.function_key {
            req = req.query(&[("code", key.expose())]);
        }
        req.send().await
    }

    /// Map a non-2xx status to its error; 503 never reaches here.
    async fn status_error(&self, resp: Response) -> Text2SqlError {
        let status = resp.status();
        match status {
            StatusCode::NOT_FOUND => Text2SqlError::EndpointNotExposed {
                url: self.url.clone(),
                hint: REST_NOT_FOUND_HINT.to_string(),
            },
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Text2SqlError::Authentication(format!(
                    "{} rejected the bearer token ({}). Ensure AUTH_ENDPOINT and TEXT2SQL_URL \
                     point at the same environment (and BRIDGE_FUNCTION_KEY is set for a bridge).",
                    self.url, status
                ))
            }
            s => {
                let body = resp.text().await.unwrap_or_default();
                let hint = if s == StatusCode::INTERNAL_SERVER_ERROR && body.trim().is_empty() {
                    " (empty body; check the server-side logs)"
                } else {
                    ""
                };
                Text2SqlError::Transport(format!(
                    "text2sql at {} failed: {} {}{}",
                    self.url, status, body, hint
                ))
            }
        }
    }

    fn parse_body(&self, text: &str) -> Result<RemoteResponse> {
        let body: Value = serde_json::from_str(text).map_err(|_| {
            Text2SqlError::Protocol(format!(
                "text2sql response from {} was not valid JSON.",
                self.url
            ))
        })?;
        let message = body.get("message").cloned().ok_or_else(|| {
            Text2SqlError::Protocol(format!(
                "text2sql response from {} is missing the 'message' field.",
                self.url
            ))
        })?;
        Ok(RemoteResponse::from(message))
    }
}

#[async_trait]
impl Text2SqlTransport for RestTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Rest
    }

    fn endpoint(&self) -> &str {
        &self.url
    }

    async fn invoke(
        &self,
        request: &Text2SqlRequest,
        token: &BearerToken,
    ) -> Result<RemoteResponse> {
        let payload = rest_payload(request);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            debug!(target: "text2sql_rest", url = %self.url, attempt, "POST text2sql");

            // The client timeout covers the body read too, so both count as "timed out".
            let reason = match self.send_once(&payload, token).await {
                Ok(resp) if resp.status() == StatusCode::SERVICE_UNAVAILABLE => {
                    "returned 503 (service unavailable)"
                }
                Ok(resp) if !resp.status().is_success() => {
                    return Err(self.status_error(resp).await)
                }
                Ok(resp) => match resp.text().await {
                    Ok(text) => return self.parse_body(&text),
                    Err(e) if e.is_timeout() => "timed out",
                    Err(e) => {
                        return Err(Text2SqlError::Transport(format!(
                            "Failed to read text2sql response body from {}: {}",
                            self.url, e
                        )))
                    }
                },
                Err(e) if e.is_timeout() => "timed out",
                Err(e) => {
                    return Err(Text2SqlError::Transport(format!(
                        "text2sql request to {} failed: {}",
                        self.url, e
                    )))
                }
            };

            if !self.retry.allows_retry_after(attempt) {
                return Err(Text2SqlError::Transport(format!(
                    "text2sql at {} {} on all {} attempt(s) ({}s timeout each). The service may be \
                     cold-starting; try raising TEXT2SQL_TIMEOUT_SECS or TEXT2SQL_RETRY_ATTEMPTS.",
                    self.url, reason, attempt, self.timeout_secs
                )));
            }

            let delay = self.retry.delay_before_retry((attempt - 1) as usize);
            warn!(
                target: "text2sql_rest",
                attempt,
                delay_secs = delay.as_secs_f64(),
                "text2sql {}, retrying",
                reason
            );
            self.sleeper.sleep(delay).await;
        }
    }
}
