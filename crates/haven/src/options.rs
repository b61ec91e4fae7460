use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use url::Url;

use crate::builder::EngineOptionsBuilder;
use crate::config::CONFIG_PATH;

const DEFAULT_USER_AGENT: &str = concat!("haven/", env!("CARGO_PKG_VERSION"));

/// Path of the offline document precached on install and served as fallback
pub const OFFLINE_PATH: &str = "/offline.html";

/// Options of the HTTP client the engine fetches with
#[derive(Debug, Clone)]
pub struct HttpOptions {
    /// Upper bound for any single request, including those not raced by a strategy
    pub timeout: Duration,

    /// Connection timeout (time to establish initial connection)
    pub connect_timeout: Duration,

    /// Whether to follow redirects
    pub follow_redirects: bool,

    /// User agent string
    pub user_agent: String,

    /// Custom HTTP headers for requests
    pub headers: HeaderMap,

    /// Whether to use system proxy settings if available
    pub use_system_proxy: bool,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            follow_redirects: true,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            headers: HttpOptions::get_default_headers(),
            use_system_proxy: true,
        }
    }
}

impl HttpOptions {
    pub fn get_default_headers() -> HeaderMap {
        let mut default_headers = HeaderMap::new();

        default_headers.insert(
            reqwest::header::ACCEPT_ENCODING,
            HeaderValue::from_static("gzip, deflate"),
        );

        default_headers.insert(
            reqwest::header::CONNECTION,
            HeaderValue::from_static("keep-alive"),
        );

        default_headers
    }
}

/// Configurable options for the cache engine
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Origin the engine serves; only same-origin traffic is cache-eligible
    pub origin: Url,

    /// Path of the configuration endpoint on the origin
    pub config_path: String,

    /// Path of the offline fallback document on the origin
    pub offline_path: String,

    /// Paths precached into the static generation on install
    pub precache_urls: Vec<String>,

    /// HTTP client options
    pub http: HttpOptions,
}

impl EngineOptions {
    pub fn new(origin: Url) -> Self {
        Self {
            origin,
            config_path: CONFIG_PATH.to_owned(),
            offline_path: OFFLINE_PATH.to_owned(),
            precache_urls: vec!["/".to_owned(), OFFLINE_PATH.to_owned()],
            http: HttpOptions::default(),
        }
    }

    pub fn builder(origin: Url) -> EngineOptionsBuilder {
        EngineOptionsBuilder::new(origin)
    }

    /// Absolute URL of the offline fallback document
    pub fn offline_url(&self) -> Result<Url, url::ParseError> {
        self.origin.join(&self.offline_path)
    }

    /// Absolute URL of the configuration endpoint
    pub fn config_url(&self) -> Result<Url, url::ParseError> {
        self.origin.join(&self.config_path)
    }
}
