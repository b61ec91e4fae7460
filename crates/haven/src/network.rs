//! # Network Access
//!
//! Every network call the engine makes goes through the [`Fetcher`] trait, so
//! strategies can be raced, cancelled and tested without a live origin.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::ACCESS_CONTROL_ALLOW_ORIGIN;
use tracing::{debug, info};
use url::Url;

use crate::error::NetworkError;
use crate::http::{Request, Response, ResponseKind, ResponseSource};
use crate::options::HttpOptions;

/// Something that can turn a request into a response over the network.
///
/// Any HTTP status is a successful fetch; only transport failures are errors.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response, NetworkError>;
}

/// Create a reqwest Client with the provided options
pub fn create_client(options: &HttpOptions) -> Result<Client, NetworkError> {
    let mut client_builder = Client::builder()
        .pool_max_idle_per_host(5)
        .user_agent(&options.user_agent)
        .default_headers(options.headers.clone())
        .redirect(if options.follow_redirects {
            reqwest::redirect::Policy::limited(10)
        } else {
            reqwest::redirect::Policy::none()
        });

    if !options.timeout.is_zero() {
        client_builder = client_builder.timeout(options.timeout);
    }

    if !options.connect_timeout.is_zero() {
        client_builder = client_builder.connect_timeout(options.connect_timeout);
    }

    if options.use_system_proxy {
        // reqwest picks up system proxy settings unless no_proxy() is called
        info!("Using system proxy settings");
    } else {
        client_builder = client_builder.no_proxy();
        debug!("Proxy disabled");
    }

    client_builder.build().map_err(NetworkError::from)
}

/// [`Fetcher`] backed by a reqwest client
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    origin: Url,
    client_timeout: Duration,
}

impl HttpFetcher {
    /// Wrap an existing client; `origin` decides which responses are same-origin
    pub fn new(client: Client, origin: Url) -> Self {
        Self {
            client,
            origin,
            client_timeout: Duration::ZERO,
        }
    }

    pub fn with_options(options: &HttpOptions, origin: Url) -> Result<Self, NetworkError> {
        Ok(Self {
            client_timeout: options.timeout,
            ..Self::new(create_client(options)?, origin)
        })
    }

    /// The client's own timeout surfaces as a timeout, not a transport failure
    fn map_error(&self, err: reqwest::Error) -> NetworkError {
        if err.is_timeout() {
            NetworkError::Timeout {
                timeout_ms: self.client_timeout.as_millis() as u64,
            }
        } else {
            NetworkError::from(err)
        }
    }

    /// Classify a response the way a browser would expose it to a worker
    fn response_kind(&self, request: &Request, response: &reqwest::Response) -> ResponseKind {
        if request.is_same_origin(&self.origin) {
            ResponseKind::Basic
        } else if response.headers().contains_key(ACCESS_CONTROL_ALLOW_ORIGIN) {
            ResponseKind::Cors
        } else {
            ResponseKind::Opaque
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, NetworkError> {
        let response = self
            .client
            .request(request.method().clone(), request.url().clone())
            .headers(request.headers().clone())
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        let status = response.status();
        let kind = self.response_kind(request, &response);
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(|e| self.map_error(e))?;

        debug!(
            url = %request.url(),
            status = status.as_u16(),
            size = body.len(),
            "Fetched from network"
        );

        Ok(Response::new(status, body)
            .with_headers(headers)
            .with_kind(kind)
            .with_source(ResponseSource::Network))
    }
}
