// Text2SQL Core Library
// Management-key auth exchange + text-to-SQL invocation over REST or MCP

pub mod auth;
pub mod config;
pub mod mcp;
pub mod normalize;
pub mod retry;
pub mod sequencer;
pub mod telemetry;
pub mod tools;
pub mod transport;

// Export core types
pub use auth::{BearerToken, TokenExchange};
pub use config::{Secret, Text2SqlConfig, TransportKind};
pub use normalize::{normalize, RemoteResponse};
pub use retry::{RetryPolicy, Sleeper, TokioSleeper};
pub use sequencer::{Text2SqlClient, Text2SqlRequest};
pub use transport::{McpTransport, RestTransport, Text2SqlTransport};

// Error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Text2SqlError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Endpoint not exposed: {url} returned 404. {hint}")]
    EndpointNotExposed { url: String, hint: String },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Timeout: {0}")]
    Timeout(String),
}

impl Text2SqlError {
    /// Convert to error code string
    pub fn code(&self) -> &'static str {
        match self {
            Text2SqlError::Configuration(_) => "CONFIGURATION_ERROR",
            Text2SqlError::Authentication(_) => "AUTHENTICATION_ERROR",
            Text2SqlError::Transport(_) => "TRANSPORT_ERROR",
            Text2SqlError::EndpointNotExposed { .. } => "ENDPOINT_NOT_EXPOSED",
            Text2SqlError::Protocol(_) => "PROTOCOL_ERROR",
            Text2SqlError::InvalidInput(_) => "INVALID_INPUT",
            Text2SqlError::Timeout(_) => "TIMEOUT",
        }
    }

    /// Failures that retrying the same call can never fix.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Text2SqlError::Configuration(_)
                | Text2SqlError::Authentication(_)
                | Text2SqlError::InvalidInput(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Text2SqlError>;
