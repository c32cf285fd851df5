use super::error::ToolResult;
use async_trait::async_trait;
use serde_json::Value;

/// A capability an agent host can discover and invoke with JSON arguments
#[async_trait]
pub trait Tool: Send + Sync {
    /// Stable name the host registers the tool under
    fn name(&self) -> String;

    /// Text shown to the model when it picks a tool
    fn description(&self) -> String;

    /// JSON Schema of the accepted arguments
    fn parameters(&self) -> Value;

    async fn call(&self, arguments: Value) -> ToolResult<Value>;
}
