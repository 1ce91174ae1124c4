use serde::{Deserialize, Serialize};

/// Public Hugging Face API root.
pub const DEFAULT_BASE_URL: &str = "https://huggingface.co/api";

/// Connection settings for [`crate::HubClient`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HubConfig {
    /// API root; every endpoint path is appended to it.
    pub base_url: String,
    /// Per-request timeout at the HTTP layer.
    pub request_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: 30,
            user_agent: format!("spaces-mcp/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}
