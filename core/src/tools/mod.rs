pub mod error;
pub mod text2sql;
pub mod traits;

pub use error::{ToolError, ToolResult};
pub use text2sql::{Text2SqlTool, TOOL_NAME};
pub use traits::Tool;
