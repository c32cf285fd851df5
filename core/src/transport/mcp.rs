use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::Text2SqlTransport;
use crate::auth::BearerToken;
use crate::config::{Text2SqlConfig, TransportKind};
use crate::mcp::{McpError, McpHttpClient, McpTool, TEXT2SQL_TOOL_NAME};
use crate::normalize::RemoteResponse;
use crate::sequencer::Text2SqlRequest;
use crate::{Result, Text2SqlError};

/// MCP arguments: the identifier travels as a scalar `semantic_layer_id`.
pub fn mcp_arguments(request: &Text2SqlRequest) -> Value {
    json!({
        "question": request.question(),
        "semantic_layer_id": request.semantic_layer_id(),
    })
}

/// Calls the remote `text2sql` tool inside a short-lived MCP session
pub struct McpTransport {
    client: McpHttpClient,
    call_timeout: Duration,
}

impl McpTransport {
    pub fn new(config: &Text2SqlConfig) -> Result<Self> {
        let client = McpHttpClient::new(
            config.mcp_server_url.clone(),
            config.mcp_protocol_version.clone(),
            config.request_timeout(),
        )
        .map_err(|e| map_error(e, &config.mcp_server_url))?;
        Ok(Self {
            client,
            call_timeout: config.request_timeout(),
        })
    }

    /// Tools the server advertises (diagnostics).
    pub async fn list_tools(&self, token: &BearerToken) -> Result<Vec<McpTool>> {
        let url = self.client.url();
        let mut session = self
            .client
            .connect(token)
            .await
            .map_err(|e| map_error(e, url))?;
        let tools = session.list_tools().await;
        session.close().await;
        tools.map_err(|e| map_error(e, url))
    }
}

#[async_trait]
impl Text2SqlTransport for McpTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Mcp
    }

    fn endpoint(&self) -> &str {
        self.client.url()
    }

    async fn invoke(
        &self,
        request: &Text2SqlRequest,
        token: &BearerToken,
    ) -> Result<RemoteResponse> {
        let url = self.client.url();
        let mut session = self
            .client
            .connect(token)
            .await
            .map_err(|e| map_error(e, url))?;
        debug!(
            target: "mcp_client",
            session = session.session_id().unwrap_or("-"),
            "Invoking text2sql tool"
        );

        let outcome = tokio::time::timeout(
            self.call_timeout,
            session.call_tool(TEXT2SQL_TOOL_NAME, mcp_arguments(request)),
        )
        .await;
        session.close().await;

        match outcome {
            Ok(Ok(result)) => {
                if result.is_error() {
                    warn!(
                        target: "mcp_client",
                        "text2sql tool returned an error result; passing its text through"
                    );
                }
                Ok(RemoteResponse::from(result))
            }
            Ok(Err(e)) => Err(map_error(e, url)),
            Err(_) => Err(Text2SqlError::Timeout(format!(
                "text2sql tool call at {} exceeded {}s (TEXT2SQL_TIMEOUT_SECS)",
                url,
                self.call_timeout.as_secs()
            ))),
        }
    }
}

/// Translate MCP client failures into the crate's error taxonomy
fn map_error(err: McpError, url: &str) -> Text2SqlError {
    match err {
        McpError::Http { status, body } if status == 401 || status == 403 => {
            Text2SqlError::Authentication(format!(
                "MCP server {} returned {}: {}. The bearer token must come from an AUTH_ENDPOINT \
                 in the same environment as MCP_SERVER_URL.",
                url, status, body
            ))
        }
        McpError::Http { status: 404, .. } => Text2SqlError::EndpointNotExposed {
            url: url.to_string(),
            hint: "No MCP endpoint at this URL; check MCP_SERVER_URL (it usually ends in /mcp)."
                .to_string(),
        },
        McpError::Http { status, body } => {
            Text2SqlError::Transport(format!("MCP server {} returned {}: {}", url, status, body))
        }
        McpError::Transport(msg) => Text2SqlError::Transport(msg),
        McpError::Server { code, message } => Text2SqlError::Transport(format!(
            "MCP server reported error {}: {}",
            code, message
        )),
        McpError::Protocol(msg) => Text2SqlError::Protocol(msg),
        McpError::Json(e) => Text2SqlError::Protocol(format!("Invalid MCP payload: {}", e)),
        McpError::Timeout => Text2SqlError::Timeout(format!(
            "MCP request to {} timed out (TEXT2SQL_TIMEOUT_SECS)",
            url
        )),
    }
}
