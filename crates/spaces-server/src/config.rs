//! Server configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Listener and dispatch settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerConfig {
    pub host: String,
    /// Port to listen on. Use 0 for an ephemeral port.
    pub port: u16,
    /// Buffered inbound messages per streaming session.
    pub session_queue_size: usize,
    /// Deadline for a single backend call.
    pub backend_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 3000,
            session_queue_size: 64,
            backend_timeout_secs: 30,
        }
    }
}

impl ServerConfig {
    pub fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.backend_timeout_secs)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
