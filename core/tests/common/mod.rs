// Shared fixtures for the wiremock-backed integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;
use text2sql_core::{Secret, Sleeper, Text2SqlConfig, TransportKind};
use wiremock::MockServer;

pub const MANAGEMENT_KEY: &str = "sk_live_abc";
pub const LAYER_ID: &str = "998b655a-75eb-4873-bb1e-3ddd23164065";

/// Config pointing every endpoint at `server`
pub fn config_for(server: &MockServer, transport: TransportKind) -> Text2SqlConfig {
    Text2SqlConfig {
        management_key: Secret::new(MANAGEMENT_KEY),
        semantic_layer_id: LAYER_ID.to_string(),
        auth_endpoint: format!("{}/auth", server.uri()),
        mcp_server_url: format!("{}/mcp", server.uri()),
        text2sql_url: format!("{}/text2sql", server.uri()),
        transport,
        auth_timeout_secs: 5,
        request_timeout_secs: 5,
        ..Default::default()
    }
}

/// Records requested delays instead of sleeping
#[derive(Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}
