//! Configuration for the gateway client.

use serde::{Deserialize, Serialize};

/// Connection settings for a captain controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Dashboard endpoint, with or without a scheme
    /// (e.g. `captain.example.com` or `https://captain.example.com`).
    pub endpoint: String,

    /// Dashboard password.
    pub password: String,

    /// Scheme prefixed when the endpoint carries none.
    #[serde(default = "default_protocol")]
    pub protocol: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl GatewayConfig {
    /// Settings for a controller reachable at `endpoint` with the
    /// given dashboard password.
    pub fn new(endpoint: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            password: password.into(),
            protocol: default_protocol(),
            request_timeout_secs: default_request_timeout(),
        }
    }

    /// The fully qualified base URL: scheme prefixed when missing,
    /// trailing slashes stripped.
    pub fn base_url(&self) -> String {
        let endpoint = self.endpoint.trim_end_matches('/');
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.to_string()
        } else {
            format!("{}{}", self.protocol, endpoint)
        }
    }
}

fn default_protocol() -> String {
    "https://".to_string()
}

fn default_request_timeout() -> u64 {
    60
}
