//! Response normalization
//!
//! The text2sql service answers with different shapes depending on the face
//! that was called: the REST face returns a JSON object, the MCP face returns
//! a tool result made of content blocks, and both have been seen wrapping the
//! payload under `content`, `text` or `result`. Everything collapses into a
//! single display string here. Normalization is total: unknown shapes come
//! back stringified instead of failing.
use serde_json::{Map, Value};

use crate::mcp::CallToolResult;

/// The closed set of shapes a remote answer can take
#[derive(Debug, Clone)]
pub enum RemoteResponse {
    /// Already a string
    Text(String),
    /// A list of content blocks, each possibly carrying `text`
    Blocks(Vec<Value>),
    /// A mapping that may nest the payload under `content`/`text`/`result`
    Object(Map<String, Value>),
    /// A typed MCP tool result exposing its `content` field (or
    /// `structuredContent` when no blocks came back)
    ToolResult(CallToolResult),
    /// Anything else (numbers, booleans, null)
    Other(Value),
}

impl From<Value> for RemoteResponse {
    fn from(value: Value) -> Self {
        match value {
            Value::String(s) => RemoteResponse::Text(s),
            Value::Array(items) => RemoteResponse::Blocks(items),
            Value::Object(map) => RemoteResponse::Object(map),
            other => RemoteResponse::Other(other),
        }
    }
}

impl From<CallToolResult> for RemoteResponse {
    fn from(result: CallToolResult) -> Self {
        RemoteResponse::ToolResult(result)
    }
}

impl From<String> for RemoteResponse {
    fn from(text: String) -> Self {
        RemoteResponse::Text(text)
    }
}

/// Reduce any remote answer to display text (first matching rule wins).
pub fn normalize(response: &RemoteResponse) -> String {
    match response {
        RemoteResponse::Text(s) => s.trim().to_string(),
        RemoteResponse::Blocks(items) => {
            let parts: Vec<String> = items.iter().filter_map(block_text).collect();
            if parts.is_empty() {
                Value::Array(items.clone()).to_string()
            } else {
                parts.join("\n")
            }
        }
        RemoteResponse::Object(map) => ["content", "text", "result"]
            .iter()
            .find_map(|key| map.get(*key).filter(|v| !v.is_null()))
            .map(normalize_value)
            .unwrap_or_else(|| Value::Object(map.clone()).to_string()),
        RemoteResponse::ToolResult(result) => match &result.structured_content {
            Some(structured) if result.content.is_empty() => normalize_value(structured),
            _ => match serde_json::to_value(&result.content) {
                Ok(content) => normalize_value(&content),
                Err(_) => format!("{:?}", result),
            },
        },
        RemoteResponse::Other(v) => v.to_string(),
    }
}

/// Convenience for raw JSON values
pub fn normalize_value(value: &Value) -> String {
    normalize(&RemoteResponse::from(value.clone()))
}

fn block_text(block: &Value) -> Option<String> {
    match block.get("text")? {
        Value::Null => None,
        Value::String(s) => {
            let t = s.trim();
            (!t.is_empty()).then(|| t.to_string())
        }
        other => Some(other.to_string()),
    }
}
