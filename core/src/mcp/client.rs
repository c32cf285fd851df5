/// MCP Client implementation
///
/// Speaks the streamable HTTP transport: every JSON-RPC message is POSTed to a
/// single endpoint, and the server answers with either a JSON body or an SSE
/// stream carrying the response. The session id handed out on `initialize`
/// is echoed on every later request and released with a DELETE.
use super::types::*;
use crate::auth::BearerToken;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const SESSION_ID_HEADER: &str = "Mcp-Session-Id";
pub const PROTOCOL_VERSION_HEADER: &str = "MCP-Protocol-Version";

/// Factory for MCP sessions against one server URL
#[derive(Clone)]
pub struct McpHttpClient {
    http: Client,
    url: String,
    protocol_version: String,
}

impl McpHttpClient {
    pub fn new(
        url: impl Into<String>,
        protocol_version: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, McpError> {
        let http = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| McpError::Transport(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            url: url.into(),
            protocol_version: protocol_version.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Open a session: `initialize` + `notifications/initialized`.
    pub async fn connect(&self, token: &BearerToken) -> Result<McpSession, McpError> {
        info!(target: "mcp_client", url = %self.url, "Connecting to MCP server");

        let mut session = McpSession {
            http: self.http.clone(),
            url: self.url.clone(),
            authorization: token.header_value(),
            protocol_version: self.protocol_version.clone(),
            session_id: None,
            server_info: None,
            next_id: 1,
            initialized: false,
            closed: false,
        };

        // Failures from here on still release whatever session id the server issued
        let server_info = session.initialize().await?;
        session.initialized = true;
        session.notify("notifications/initialized").await?;

        info!(
            target: "mcp_client",
            server_name = %server_info.name,
            server_version = %server_info.version,
            protocol_version = %session.protocol_version,
            "MCP session initialized"
        );
        session.server_info = Some(server_info);
        Ok(session)
    }
}

/// One live MCP session.
///
/// Call [`McpSession::close`] when done. A session dropped without closing
/// (cancellation, early return, panic) schedules the DELETE on the current
/// tokio runtime instead.
pub struct McpSession {
    http: Client,
    url: String,
    authorization: String,
    protocol_version: String,
    session_id: Option<String>,
    server_info: Option<Implementation>,
    next_id: u64,
    initialized: bool,
    closed: bool,
}

impl McpSession {
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn server_info(&self) -> Option<&Implementation> {
        self.server_info.as_ref()
    }

    pub fn protocol_version(&self) -> &str {
        &self.protocol_version
    }

    async fn initialize(&mut self) -> Result<Implementation, McpError> {
        let params = InitializeParams {
            protocol_version: self.protocol_version.clone(),
            capabilities: json!({}),
            client_info: Implementation {
                name: "text2sql".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };

        let result = self.request("initialize", Some(json!(params))).await?;
        let init: InitializeResult = serde_json::from_value(result)
            .map_err(|e| McpError::Protocol(format!("Invalid initialize result: {}", e)))?;

        if init.protocol_version != self.protocol_version {
            if validate_protocol_version(&init.protocol_version).is_err() {
                warn!(
                    target: "mcp_client",
                    offered = %self.protocol_version,
                    negotiated = %init.protocol_version,
                    "Server negotiated an unsupported protocol version; continuing"
                );
            }
            self.protocol_version = init.protocol_version.clone();
        }

        Ok(init.server_info)
    }

    /// List every tool, following `nextCursor` pagination
    pub async fn list_tools(&mut self) -> Result<Vec<McpTool>, McpError> {
        let mut all_tools = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let params = ListToolsParams { cursor };
            let result = self.request("tools/list", Some(json!(params))).await?;
            let page: ListToolsResult = serde_json::from_value(result)
                .map_err(|e| McpError::Protocol(format!("Invalid tools/list result: {}", e)))?;

            all_tools.extend(page.tools);

            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        debug!(target: "mcp_client", count = all_tools.len(), "Listed tools");
        Ok(all_tools)
    }

    /// Call a tool
    pub async fn call_tool(
        &mut self,
        name: &str,
        arguments: Value,
    ) -> Result<CallToolResult, McpError> {
        debug!(target: "mcp_client", tool = %name, "Calling tool");

        let params = CallToolParams {
            name: name.to_string(),
            arguments: Some(arguments),
        };
        let result = self.request("tools/call", Some(json!(params))).await?;
        let call_result: CallToolResult = serde_json::from_value(result)
            .map_err(|e| McpError::Protocol(format!("Invalid tools/call result: {}", e)))?;

        if call_result.is_error() {
            warn!(target: "mcp_client", tool = %name, "Tool reported an error result");
        }
        Ok(call_result)
    }

    /// Terminate the session on the server.
    pub async fn close(mut self) {
        self.closed = true;
        let Some(session_id) = self.session_id.take() else {
            return;
        };
        terminate(
            &self.http,
            &self.url,
            &self.authorization,
            &self.protocol_version,
            &session_id,
        )
        .await;
    }

    /// Send a JSON-RPC request and wait for its response
    async fn request(&mut self, method: &str, params: Option<Value>) -> Result<Value, McpError> {
        let id = self.next_id;
        self.next_id += 1;

        let request = JsonRpcRequest::new(id, method, params);
        let resp = self.post(&request).await?;

        let is_sse = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.starts_with("text/event-stream"))
            .unwrap_or(false);
        let body = resp
            .text()
            .await
            .map_err(|e| McpError::Transport(format!("Failed to read {} response: {}", method, e)))?;

        let response = if is_sse {
            response_from_sse(&body, id)?
        } else {
            serde_json::from_str::<JsonRpcResponse>(&body).map_err(|e| {
                McpError::Protocol(format!("Invalid JSON-RPC response to {}: {}", method, e))
            })?
        };

        if let Some(error) = response.error {
            return Err(McpError::Server {
                code: error.code,
                message: error.message,
            });
        }

        response
            .result
            .ok_or_else(|| McpError::Protocol("Missing result in response".to_string()))
    }

    /// Send a JSON-RPC notification (answered with 202, no body)
    async fn notify(&mut self, method: &str) -> Result<(), McpError> {
        self.post(&JsonRpcNotification::new(method)).await?;
        Ok(())
    }

    async fn post<T: Serialize>(&mut self, message: &T) -> Result<Response, McpError> {
        let mut req = self
            .http
            .post(&self.url)
            .header(AUTHORIZATION, &self.authorization)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json, text/event-stream")
            .json(message);
        if let Some(ref session_id) = self.session_id {
            req = req.header(SESSION_ID_HEADER, session_id);
        }
        if self.initialized {
            req = req.header(PROTOCOL_VERSION_HEADER, &self.protocol_version);
        }

        let resp = req.send().await.map_err(|e| {
            if e.is_timeout() {
                McpError::Timeout
            } else {
                McpError::Transport(format!("Request to {} failed: {}", self.url, e))
            }
        })?;

        if let Some(session_id) = resp
            .headers()
            .get(SESSION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            if self.session_id.as_deref() != Some(session_id) {
                debug!(target: "mcp_client", "Server assigned session id");
                self.session_id = Some(session_id.to_string());
            }
        }

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(McpError::Http {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }
}

impl Drop for McpSession {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        let Some(session_id) = self.session_id.take() else {
            return;
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(target: "mcp_client", "No runtime to release MCP session; server will expire it");
            return;
        };
        let http = self.http.clone();
        let url = self.url.clone();
        let authorization = self.authorization.clone();
        let protocol_version = self.protocol_version.clone();
        handle.spawn(async move {
            terminate(&http, &url, &authorization, &protocol_version, &session_id).await;
        });
    }
}

async fn terminate(
    http: &Client,
    url: &str,
    authorization: &str,
    protocol_version: &str,
    session_id: &str,
) {
    debug!(target: "mcp_client", url = %url, "Terminating MCP session");
    let result = http
        .delete(url)
        .header(AUTHORIZATION, authorization)
        .header(SESSION_ID_HEADER, session_id)
        .header(PROTOCOL_VERSION_HEADER, protocol_version)
        .send()
        .await;
    match result {
        Ok(resp) if resp.status().is_success() => {}
        // Servers may refuse client-initiated termination
        Ok(resp) if resp.status() == StatusCode::METHOD_NOT_ALLOWED => {}
        Ok(resp) => {
            warn!(target: "mcp_client", status = %resp.status(), "MCP session DELETE rejected")
        }
        Err(e) => warn!(target: "mcp_client", error = %e, "MCP session DELETE failed"),
    }
}

/// Pick the JSON-RPC response with `id` out of an SSE body.
///
/// Events are separated by blank lines; multi-line `data:` fields are joined
/// with `\n`. Events that are not a matching response (server notifications,
/// requests, pings) are skipped.
pub fn response_from_sse(body: &str, id: u64) -> Result<JsonRpcResponse, McpError> {
    let mut data = String::new();
    let mut events = Vec::new();

    for line in body.lines() {
        if line.is_empty() {
            if !data.is_empty() {
                events.push(std::mem::take(&mut data));
            }
        } else if let Some(rest) = line.strip_prefix("data:") {
            if !data.is_empty() {
                data.push('\n');
            }
            data.push_str(rest.strip_prefix(' ').unwrap_or(rest));
        }
    }
    if !data.is_empty() {
        events.push(data);
    }

    events
        .iter()
        .filter_map(|event| serde_json::from_str::<JsonRpcResponse>(event).ok())
        .find(|response| {
            response.id.as_u64() == Some(id)
                || response.id.as_str() == Some(id.to_string().as_str())
        })
        .ok_or_else(|| {
            McpError::Protocol(format!(
                "Event stream ended without a response for request {}",
                id
            ))
        })
}
