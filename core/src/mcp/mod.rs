/// Model Context Protocol (MCP) client
///
/// Just enough of MCP to reach a remote tool over streamable HTTP.
///
/// MCP Protocol Spec: https://spec.modelcontextprotocol.io/specification/
///
/// Architecture:
/// - `client`: session lifecycle (initialize, tools/list, tools/call, DELETE)
/// - `types`: MCP protocol types (JSON-RPC 2.0 based)
pub mod client;
pub mod types;

pub use client::{response_from_sse, McpHttpClient, McpSession};
pub use types::{
    CallToolResult, McpError, McpTool, ToolContent, DEFAULT_PROTOCOL_VERSION,
    SUPPORTED_PROTOCOL_VERSIONS, TEXT2SQL_TOOL_NAME,
};
