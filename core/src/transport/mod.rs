//! The two faces of the text2sql service
//!
//! Both faces take the same request and token and hand back a
//! [`RemoteResponse`] for the normalizer; callers pick one through
//! configuration and never see the difference.
mod mcp;
mod rest;

pub use mcp::{mcp_arguments, McpTransport};
pub use rest::{rest_payload, RestTransport};

use async_trait::async_trait;

use crate::auth::BearerToken;
use crate::config::{Text2SqlConfig, TransportKind};
use crate::normalize::RemoteResponse;
use crate::sequencer::Text2SqlRequest;
use crate::Result;

/// One dispatch of a text2sql request
#[async_trait]
pub trait Text2SqlTransport: Send + Sync {
    fn kind(&self) -> TransportKind;

    /// URL the transport talks to (never carries secrets)
    fn endpoint(&self) -> &str;

    async fn invoke(&self, request: &Text2SqlRequest, token: &BearerToken)
        -> Result<RemoteResponse>;
}

/// Build the transport selected by `config.transport`
pub fn from_config(config: &Text2SqlConfig) -> Result<Box<dyn Text2SqlTransport>> {
    Ok(match config.transport {
        TransportKind::Mcp => Box::new(McpTransport::new(config)?),
        TransportKind::Rest => Box::new(RestTransport::new(config)?),
    })
}
