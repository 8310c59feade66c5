//! One-click bundle catalog access.
//!
//! Bundles live as versioned YAML documents in a public repository;
//! the catalog fetches the raw text for a named bundle. Variable
//! substitution and parsing happen downstream in the deployer.

use crate::error::OneClickResult;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

const DEFAULT_BASE_URL: &str =
    "https://raw.githubusercontent.com/caprover/one-click-apps/master/public/v4/apps";

/// Catalog location and fetch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Base URL the bundle name is appended to.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Fetch timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

/// Fetches raw one-click bundle documents by name.
pub struct BundleCatalog {
    client: Client,
    base_url: String,
}

impl BundleCatalog {
    /// Catalog pointing at the public one-click repository.
    pub fn new() -> OneClickResult<Self> {
        Self::with_config(CatalogConfig::default())
    }

    /// Catalog with an explicit location.
    pub fn with_config(config: CatalogConfig) -> OneClickResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch the raw YAML for the named bundle. An unknown name
    /// surfaces as an HTTP status error.
    #[instrument(skip(self))]
    pub async fn fetch(&self, one_click_name: &str) -> OneClickResult<String> {
        let url = format!("{}/{}.yml", self.base_url, one_click_name);
        debug!(url = %url, "fetching one-click bundle");
        let text = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_points_at_public_repository() {
        let config = CatalogConfig::default();
        assert!(config.base_url.starts_with("https://raw.githubusercontent.com"));
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn trailing_slash_in_base_url_is_normalized() {
        let catalog = BundleCatalog::with_config(CatalogConfig {
            base_url: "https://example.com/apps/".into(),
            ..CatalogConfig::default()
        })
        .unwrap();
        assert_eq!(catalog.base_url, "https://example.com/apps");
    }
}
