//! Invocation sequencer
//!
//! token exchange -> request -> transport -> normalize, identical for both
//! faces of the service. Each call re-authenticates; nothing is cached.
use tracing::{debug, info, instrument};

use crate::auth::{BearerToken, TokenExchange};
use crate::config::{validate_semantic_layer_id, Text2SqlConfig, TransportKind};
use crate::normalize::normalize;
use crate::transport::{self, Text2SqlTransport};
use crate::{Result, Text2SqlError};

/// A validated question bound to a semantic layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Text2SqlRequest {
    question: String,
    semantic_layer_id: String,
}

impl Text2SqlRequest {
    /// Both fields must be non-empty; the question is trimmed.
    pub fn new(question: &str, semantic_layer_id: &str) -> Result<Self> {
        let question = question.trim();
        if question.is_empty() {
            return Err(Text2SqlError::InvalidInput(
                "question must not be empty".to_string(),
            ));
        }
        validate_semantic_layer_id(semantic_layer_id)?;
        Ok(Self {
            question: question.to_string(),
            semantic_layer_id: semantic_layer_id.trim().to_string(),
        })
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn semantic_layer_id(&self) -> &str {
        &self.semantic_layer_id
    }
}

/// Entry point for asking questions
pub struct Text2SqlClient {
    config: Text2SqlConfig,
    auth: TokenExchange,
    transport: Box<dyn Text2SqlTransport>,
}

impl Text2SqlClient {
    /// Build a client using the transport named in `config`
    pub fn new(config: Text2SqlConfig) -> Result<Self> {
        let transport = transport::from_config(&config)?;
        Self::with_transport(config, transport)
    }

    /// Build a client around an explicit transport
    pub fn with_transport(
        config: Text2SqlConfig,
        transport: Box<dyn Text2SqlTransport>,
    ) -> Result<Self> {
        let auth = TokenExchange::new(&config)?;
        Ok(Self {
            config,
            auth,
            transport,
        })
    }

    pub fn config(&self) -> &Text2SqlConfig {
        &self.config
    }

    pub fn transport_kind(&self) -> TransportKind {
        self.transport.kind()
    }

    /// Run only the credential exchange
    pub async fn token(&self) -> Result<BearerToken> {
        self.auth.exchange(&self.config.management_key).await
    }

    /// Ask one question and return the normalized answer.
    ///
    /// The semantic layer always comes from configuration. Configuration
    /// problems are reported before any network call.
    #[instrument(
        target = "text2sql",
        skip(self, question),
        fields(transport = %self.transport.kind(), endpoint = %self.transport.endpoint())
    )]
    pub async fn ask(&self, question: &str) -> Result<String> {
        self.config.validate_for(self.transport.kind())?;
        let request = Text2SqlRequest::new(question, &self.config.semantic_layer_id)?;

        let token = self.token().await?;
        debug!(target: "text2sql", token_len = token.len(), "Dispatching text2sql request");

        let raw = self.transport.invoke(&request, &token).await?;
        let text = normalize(&raw);

        info!(target: "text2sql", chars = text.len(), "text2sql answered");
        Ok(text)
    }
}
