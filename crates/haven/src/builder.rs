//! # Builder for EngineOptions
//!
//! This module provides a builder pattern implementation for creating and customizing
//! EngineOptions instances with a fluent API.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use haven_engine::EngineOptions;
//! use url::Url;
//!
//! let options = EngineOptions::builder(Url::parse("http://localhost:3000").unwrap())
//!     .with_config_path("/api/pwa/config")
//!     .with_precache_url("/assets/app.css")
//!     .with_timeout(Duration::from_secs(20))
//!     .with_user_agent("MyApp/1.0")
//!     .with_header("X-Api-Key", "my-secret-key")
//!     .build();
//!
//! assert_eq!(options.precache_urls.len(), 3);
//! ```

use std::time::Duration;

use reqwest::header::HeaderValue;
use url::Url;

use crate::EngineOptions;

/// Builder for creating EngineOptions instances with a fluent API
#[derive(Debug, Clone)]
pub struct EngineOptionsBuilder {
    /// Internal options being built
    options: EngineOptions,
}

impl EngineOptionsBuilder {
    /// Create a new builder with default options for `origin`
    pub fn new(origin: Url) -> Self {
        Self {
            options: EngineOptions::new(origin),
        }
    }

    /// Set the path of the configuration endpoint
    pub fn with_config_path(mut self, path: impl Into<String>) -> Self {
        self.options.config_path = path.into();
        self
    }

    /// Set the path of the offline fallback document
    pub fn with_offline_path(mut self, path: impl Into<String>) -> Self {
        self.options.offline_path = path.into();
        self
    }

    /// Add a path to precache on install
    pub fn with_precache_url(mut self, path: impl Into<String>) -> Self {
        self.options.precache_urls.push(path.into());
        self
    }

    /// Replace the precache list
    pub fn with_precache_urls(mut self, paths: Vec<String>) -> Self {
        self.options.precache_urls = paths;
        self
    }

    /// Set the overall timeout for a single HTTP request
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.options.http.timeout = timeout;
        self
    }

    /// Set the connection timeout (time to establish initial connection)
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.options.http.connect_timeout = timeout;
        self
    }

    /// Set whether to follow redirects
    pub fn with_follow_redirects(mut self, follow: bool) -> Self {
        self.options.http.follow_redirects = follow;
        self
    }

    /// Set the user agent string
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.options.http.user_agent = user_agent.into();
        self
    }

    /// Add a custom HTTP header
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        if let (Ok(name), Ok(value)) = (
            name.as_ref().parse::<reqwest::header::HeaderName>(),
            HeaderValue::from_str(value.as_ref()),
        ) {
            self.options.http.headers.insert(name, value);
        }
        self
    }

    /// Set whether to use system proxy settings
    pub fn with_system_proxy(mut self, use_system_proxy: bool) -> Self {
        self.options.http.use_system_proxy = use_system_proxy;
        self
    }

    /// Build the final EngineOptions
    pub fn build(self) -> EngineOptions {
        self.options
    }
}
