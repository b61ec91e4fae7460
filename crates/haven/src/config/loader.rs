use std::path::Path;
use std::sync::Arc;

use reqwest::header::ACCEPT;
use tracing::{info, warn};
use url::Url;

use super::ConfigDocument;
use super::defaults::default_document;
use crate::error::ConfigError;
use crate::http::Request;
use crate::network::Fetcher;

/// Fetches the configuration document from the origin
#[derive(Clone)]
pub struct ConfigLoader {
    fetcher: Arc<dyn Fetcher>,
    url: Url,
}

impl ConfigLoader {
    /// Create a loader fetching from the absolute `url`
    pub fn new(fetcher: Arc<dyn Fetcher>, url: Url) -> Self {
        Self { fetcher, url }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Load the document, falling back to [`ConfigLoader::defaults`] on any
    /// failure. Never fails.
    pub async fn load(&self) -> ConfigDocument {
        match self.try_load().await {
            Ok(config) => {
                info!(
                    event = "config_loaded",
                    version = %config.version,
                    groups = config.cache.len(),
                    "Loaded configuration from {}",
                    self.url
                );
                config
            }
            Err(e) => {
                warn!(
                    event = "config_fallback",
                    url = %self.url,
                    error = %e,
                    "Failed to load configuration, using defaults"
                );
                Self::defaults()
            }
        }
    }

    /// Load the document, reporting why it could not be used
    pub async fn try_load(&self) -> Result<ConfigDocument, ConfigError> {
        let request = Request::get(self.url.clone()).with_header(ACCEPT, "application/json");
        let response = self.fetcher.fetch(&request).await?;

        if !response.is_success() {
            return Err(ConfigError::Status(response.status()));
        }

        Ok(serde_json::from_slice(response.body())?)
    }

    /// The embedded default document, version `v1`
    pub fn defaults() -> ConfigDocument {
        default_document()
    }

    /// Read a document from disk. Unlike [`ConfigLoader::load`] errors are
    /// returned rather than replaced by defaults.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<ConfigDocument, ConfigError> {
        let data = tokio::fs::read(path.as_ref()).await?;
        Ok(serde_json::from_slice(&data)?)
    }
}
