use crate::sequencer::Text2SqlClient;
use crate::tools::{Tool, ToolError, ToolResult};
use crate::Text2SqlError;
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

pub const TOOL_NAME: &str = "solid_text2sql";

/// Agent-facing wrapper: natural-language question in, SQL plus explanation out.
///
/// The generated query is never executed. The semantic layer is fixed by
/// configuration; arguments that try to set one are ignored.
pub struct Text2SqlTool {
    client: Text2SqlClient,
}

impl Text2SqlTool {
    pub fn new(client: Text2SqlClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Text2SqlClient {
        &self.client
    }

    /// String-shaped surface for agent frameworks: the answer, or `Error: ...`.
    pub async fn run(&self, question: &str) -> String {
        let question = question.trim();
        if question.is_empty() {
            return "Error: Input 'question' is missing.".to_string();
        }
        match self.client.ask(question).await {
            Ok(text) => text,
            Err(e) => {
                warn!(target: "text2sql_tool", code = e.code(), "text2sql call failed");
                error_text(&e)
            }
        }
    }
}

fn error_text(err: &Text2SqlError) -> String {
    format!("Error: {}", err)
}

#[async_trait]
impl Tool for Text2SqlTool {
    fn name(&self) -> String {
        TOOL_NAME.to_string()
    }

    fn description(&self) -> String {
        "Convert a natural-language data question into a SQL query using SolidData's semantic \
         layer. Use this when you need to generate SQL from a business question. Returns the SQL \
         and an explanation; does not run the query."
            .to_string()
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "question": {
                    "type": "string",
                    "description": "Natural-language question to convert into a SQL query (e.g. 'How many users signed up last month?')."
                }
            },
            "required": ["question"]
        })
    }

    async fn call(&self, arguments: Value) -> ToolResult<Value> {
        let question = arguments
            .get("question")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'question' parameter".into()))?;

        if arguments.get("semantic_layer_id").is_some()
            || arguments.get("semantic_layer_ids").is_some()
        {
            debug!(target: "text2sql_tool", "Ignoring caller-supplied semantic layer id");
        }

        let text = self.client.ask(question).await?;
        Ok(json!({ "text": text }))
    }
}
