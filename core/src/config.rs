use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use tracing::{info, warn};

use crate::mcp::DEFAULT_PROTOCOL_VERSION;
use crate::retry::RetryPolicy;
use crate::{Result, Text2SqlError};

pub const DEFAULT_AUTH_ENDPOINT: &str =
    "https://backend.production.soliddata.io/api/v1/auth/exchange_user_access_key";
pub const DEFAULT_MCP_SERVER_URL: &str = "https://mcp.production.soliddata.io/mcp";
pub const DEFAULT_TEXT2SQL_URL: &str = "https://mcp.production.soliddata.io/mcp/text2sql";
pub const DEFAULT_AUTH_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_CONFIG_FILE: &str = "text2sql.toml";

/// Case-insensitive substrings that mark a value copied from `.env.example`.
const PLACEHOLDER_MARKERS: &[&str] = &["your-", "your_management_key", "here"];

/// Returns true when `value` is empty or still holds template text.
pub fn looks_like_placeholder(value: &str) -> bool {
    let lowered = value.trim().to_lowercase();
    lowered.is_empty() || PLACEHOLDER_MARKERS.iter().any(|m| lowered.contains(m))
}

/// A secret string that never prints itself.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into().trim().to_string())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

/// Which face of the text2sql service to call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// MCP `tools/call` of the `text2sql` tool over streamable HTTP
    #[default]
    Mcp,
    /// Direct REST POST with a bearer header
    Rest,
}

impl FromStr for TransportKind {
    type Err = Text2SqlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "mcp" => Ok(TransportKind::Mcp),
            "rest" | "http" => Ok(TransportKind::Rest),
            other => Err(Text2SqlError::Configuration(format!(
                "TEXT2SQL_TRANSPORT must be 'mcp' or 'rest', got '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Mcp => f.write_str("mcp"),
            TransportKind::Rest => f.write_str("rest"),
        }
    }
}

/// Process-wide settings, built once at entry and passed by reference.
///
/// Sources (later wins): built-in defaults, environment, optional TOML file.
/// Secrets are read from the environment only.
#[derive(Debug, Clone)]
pub struct Text2SqlConfig {
    pub management_key: Secret,
    pub semantic_layer_id: String,
    pub auth_endpoint: String,
    pub mcp_server_url: String,
    pub text2sql_url: String,
    /// Function-level key for a REST-to-MCP bridge, sent as `code=<key>`
    pub function_key: Option<Secret>,
    pub transport: TransportKind,
    pub auth_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub retry: RetryPolicy,
    pub mcp_protocol_version: String,
}

impl Default for Text2SqlConfig {
    fn default() -> Self {
        Self {
            management_key: Secret::default(),
            semantic_layer_id: String::new(),
            auth_endpoint: DEFAULT_AUTH_ENDPOINT.to_string(),
            mcp_server_url: DEFAULT_MCP_SERVER_URL.to_string(),
            text2sql_url: DEFAULT_TEXT2SQL_URL.to_string(),
            function_key: None,
            transport: TransportKind::default(),
            auth_timeout_secs: DEFAULT_AUTH_TIMEOUT_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            retry: RetryPolicy::default(),
            mcp_protocol_version: DEFAULT_PROTOCOL_VERSION.to_string(),
        }
    }
}

impl Text2SqlConfig {
    /// Build from the process environment. No validation, no network.
    pub fn from_env() -> Self {
        Self::from_source(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup (tests inject a map here).
    pub fn from_source<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut cfg = Self::default();

        if let Some(v) = var("SOLIDDATA_MANAGEMENT_KEY") {
            cfg.management_key = Secret::new(v);
        }
        if let Some(v) = var("SEMANTIC_LAYER_ID") {
            cfg.semantic_layer_id = v;
        }
        if let Some(v) = var("AUTH_ENDPOINT") {
            cfg.auth_endpoint = v;
        }
        if let Some(v) = var("MCP_SERVER_URL") {
            cfg.mcp_server_url = v;
        }
        if let Some(v) = var("TEXT2SQL_URL") {
            cfg.text2sql_url = v;
        }
        cfg.function_key = var("BRIDGE_FUNCTION_KEY").map(Secret::new);
        if let Some(v) = var("TEXT2SQL_TRANSPORT") {
            match v.parse::<TransportKind>() {
                Ok(kind) => cfg.transport = kind,
                Err(e) => warn!(target: "config", error = %e, "Ignoring TEXT2SQL_TRANSPORT"),
            }
        }
        if let Some(v) = var("AUTH_TIMEOUT_SECS") {
            cfg.auth_timeout_secs = parse_or(&v, "AUTH_TIMEOUT_SECS", cfg.auth_timeout_secs);
        }
        if let Some(v) = var("TEXT2SQL_TIMEOUT_SECS") {
            cfg.request_timeout_secs =
                parse_or(&v, "TEXT2SQL_TIMEOUT_SECS", cfg.request_timeout_secs);
        }
        if let Some(v) = var("TEXT2SQL_RETRY_ATTEMPTS") {
            cfg.retry.max_attempts =
                parse_or(&v, "TEXT2SQL_RETRY_ATTEMPTS", cfg.retry.max_attempts);
        }
        if let Some(v) = var("TEXT2SQL_RETRY_BACKOFF_SECS") {
            match parse_backoff(&v) {
                Some(backoff) => cfg.retry.backoff = backoff,
                None => warn!(
                    target: "config",
                    value = %v,
                    "TEXT2SQL_RETRY_BACKOFF_SECS is not a comma-separated list of seconds; keeping default"
                ),
            }
        }
        if let Some(v) = var("MCP_PROTOCOL_VERSION") {
            cfg.mcp_protocol_version = v;
        }
        cfg
    }

    /// Environment plus the TOML overlay at `TEXT2SQL_CONFIG` (or
    /// `./text2sql.toml` when it exists).
    pub fn load() -> Result<Self> {
        let base = Self::from_env();
        match std::env::var("TEXT2SQL_CONFIG")
            .ok()
            .filter(|s| !s.trim().is_empty())
        {
            Some(path) => base.overlay_file(Path::new(&path)),
            None => {
                let p = Path::new(DEFAULT_CONFIG_FILE);
                if p.exists() {
                    base.overlay_file(p)
                } else {
                    info!(target: "config", "No TOML config found; using defaults/env");
                    Ok(base)
                }
            }
        }
    }

    /// Overlay values from a TOML file onto this configuration.
    pub fn overlay_file(self, path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            Text2SqlError::Configuration(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        let parsed: Text2SqlToml = toml::from_str(&raw).map_err(|e| {
            Text2SqlError::Configuration(format!(
                "Failed to parse config file {}: {}",
                path.display(),
                e
            ))
        })?;
        info!(target: "config", path = %path.display(), "Loaded TOML config overlay");
        Ok(parsed.overlay(self))
    }

    /// Fail fast on anything that would make a call pointless.
    pub fn validate(&self) -> Result<()> {
        self.validate_for(self.transport)
    }

    /// Like [`validate`](Self::validate), checking the URL of `transport`
    /// instead of the configured one.
    pub fn validate_for(&self, transport: TransportKind) -> Result<()> {
        validate_management_key(&self.management_key)?;
        validate_semantic_layer_id(&self.semantic_layer_id)?;
        validate_url("AUTH_ENDPOINT", &self.auth_endpoint)?;
        match transport {
            TransportKind::Mcp => validate_url("MCP_SERVER_URL", &self.mcp_server_url)?,
            TransportKind::Rest => validate_url("TEXT2SQL_URL", &self.text2sql_url)?,
        }
        if self.retry.max_attempts == 0 {
            return Err(Text2SqlError::Configuration(
                "TEXT2SQL_RETRY_ATTEMPTS must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn auth_timeout(&self) -> Duration {
        Duration::from_secs(self.auth_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

pub fn validate_management_key(key: &Secret) -> Result<()> {
    if key.is_empty() {
        return Err(Text2SqlError::Configuration(
            "SOLIDDATA_MANAGEMENT_KEY is missing or empty. \
             Set it in your environment or .env file (see .env.example)."
                .to_string(),
        ));
    }
    if looks_like_placeholder(key.expose()) {
        return Err(Text2SqlError::Configuration(
            "SOLIDDATA_MANAGEMENT_KEY looks like a placeholder. \
             Replace it with your real SolidData management key."
                .to_string(),
        ));
    }
    Ok(())
}

pub fn validate_semantic_layer_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(Text2SqlError::Configuration(
            "SEMANTIC_LAYER_ID is required. Set it in the tool environment; there is no fallback."
                .to_string(),
        ));
    }
    if looks_like_placeholder(id) {
        return Err(Text2SqlError::Configuration(format!(
            "SEMANTIC_LAYER_ID looks like a placeholder ('{}'). Set the real semantic layer id.",
            id
        )));
    }
    Ok(())
}

fn validate_url(name: &str, value: &str) -> Result<()> {
    match reqwest::Url::parse(value) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => Ok(()),
        Ok(url) => Err(Text2SqlError::Configuration(format!(
            "{} must be an http(s) URL, got scheme '{}'",
            name,
            url.scheme()
        ))),
        Err(e) => Err(Text2SqlError::Configuration(format!(
            "{} is not a valid URL ('{}'): {}",
            name, value, e
        ))),
    }
}

fn parse_or<T: FromStr + Copy>(value: &str, name: &str, fallback: T) -> T {
    match value.parse::<T>() {
        Ok(v) => v,
        Err(_) => {
            warn!(target: "config", var = %name, value = %value, "Unparseable value; keeping default");
            fallback
        }
    }
}

fn parse_backoff(value: &str) -> Option<Vec<Duration>> {
    value
        .split(',')
        .map(|part| part.trim().parse::<u64>().ok().map(Duration::from_secs))
        .collect()
}

// =========================
// TOML overlay definitions
// =========================

#[derive(Debug, Clone, Default, Deserialize)]
struct Text2SqlToml {
    pub semantic_layer_id: Option<String>,
    pub auth_endpoint: Option<String>,
    pub mcp_server_url: Option<String>,
    pub text2sql_url: Option<String>,
    pub transport: Option<TransportKind>,
    pub auth_timeout_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub mcp_protocol_version: Option<String>,
    pub retry: Option<RetryToml>,
}

impl Text2SqlToml {
    fn overlay(self, mut base: Text2SqlConfig) -> Text2SqlConfig {
        if let Some(x) = self.semantic_layer_id {
            base.semantic_layer_id = x.trim().to_string();
        }
        if let Some(x) = self.auth_endpoint {
            base.auth_endpoint = x;
        }
        if let Some(x) = self.mcp_server_url {
            base.mcp_server_url = x;
        }
        if let Some(x) = self.text2sql_url {
            base.text2sql_url = x;
        }
        if let Some(x) = self.transport {
            base.transport = x;
        }
        if let Some(x) = self.auth_timeout_secs {
            base.auth_timeout_secs = x;
        }
        if let Some(x) = self.request_timeout_secs {
            base.request_timeout_secs = x;
        }
        if let Some(x) = self.mcp_protocol_version {
            base.mcp_protocol_version = x;
        }
        if let Some(r) = self.retry {
            r.apply(&mut base.retry);
        }
        base
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RetryToml {
    pub max_attempts: Option<u32>,
    pub backoff_secs: Option<Vec<u64>>,
}

impl RetryToml {
    fn apply(self, r: &mut RetryPolicy) {
        if let Some(x) = self.max_attempts {
            r.max_attempts = x;
        }
        if let Some(x) = self.backoff_secs {
            r.backoff = x.into_iter().map(Duration::from_secs).collect();
        }
    }
}
