//! # Intercepted Requests and Responses
//!
//! The engine sits between a caller and the network, so it needs its own
//! request/response values: they must be cheap to clone (a cached body is
//! handed out many times), must remember how the request was issued
//! (navigation or programmatic), and must remember where a response came from.

use std::fmt;

use bytes::Bytes;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;

const OFFLINE_PAGE: &str = "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>Offline</title></head><body><h1>Offline</h1><p>You are currently offline.</p></body></html>";
const NETWORK_UNAVAILABLE: &str = "{\"error\":\"Network unavailable\"}";
const WORKER_ERROR: &str = "Service Worker Error";

/// How a request was issued by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    /// Top-level document load; needs a renderable page on failure
    Navigate,
    /// Programmatic same-origin request
    #[default]
    SameOrigin,
    /// Programmatic request allowed to cross origins with CORS
    Cors,
    /// Cross-origin request without CORS
    NoCors,
}

/// Provenance of a response, which decides whether it may be cached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    /// Same-origin response
    Basic,
    /// Cross-origin response exposed through CORS
    Cors,
    /// Cross-origin response whose contents must be treated as uninspectable
    Opaque,
    /// Synthesized error response
    Error,
}

/// Where the engine obtained a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Network,
    Cache,
    /// Offline document or another synthesized last-resort response
    Fallback,
}

impl fmt::Display for ResponseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResponseSource::Network => "network",
            ResponseSource::Cache => "cache",
            ResponseSource::Fallback => "fallback",
        };
        f.write_str(name)
    }
}

/// An intercepted outgoing request
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: Url,
    mode: RequestMode,
    headers: HeaderMap,
}

impl Request {
    /// Create a request with the given method and URL
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            mode: RequestMode::default(),
            headers: HeaderMap::new(),
        }
    }

    /// Create a programmatic GET request
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// Create a top-level navigation request
    pub fn navigate(url: Url) -> Self {
        Self::get(url).with_mode(RequestMode::Navigate)
    }

    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    /// Add a header; invalid names or values are ignored
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        if let (Ok(name), Ok(value)) = (
            name.as_ref().parse::<HeaderName>(),
            HeaderValue::from_str(value.as_ref()),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Path component of the URL, the part routing patterns match against
    pub fn path(&self) -> &str {
        self.url.path()
    }

    pub fn mode(&self) -> RequestMode {
        self.mode
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }

    /// Whether the request targets the same origin as `base`
    pub fn is_same_origin(&self, base: &Url) -> bool {
        self.url.origin() == base.origin()
    }
}

/// A response flowing back to the caller
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    kind: ResponseKind,
    source: ResponseSource,
}

impl Response {
    /// Create a same-origin network response
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
            kind: ResponseKind::Basic,
            source: ResponseSource::Network,
        }
    }

    pub fn with_kind(mut self, kind: ResponseKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_source(mut self, source: ResponseSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Add a header; invalid names or values are ignored
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        if let (Ok(name), Ok(value)) = (
            name.as_ref().parse::<HeaderName>(),
            HeaderValue::from_str(value.as_ref()),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Minimal offline page served when no cached offline document exists
    pub fn offline_page() -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, OFFLINE_PAGE)
            .with_header(CONTENT_TYPE, "text/html; charset=utf-8")
            .with_kind(ResponseKind::Error)
            .with_source(ResponseSource::Fallback)
    }

    /// Machine-readable error for programmatic requests that could not reach the network
    pub fn network_unavailable() -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, NETWORK_UNAVAILABLE)
            .with_header(CONTENT_TYPE, "application/json")
            .with_kind(ResponseKind::Error)
            .with_source(ResponseSource::Fallback)
    }

    /// Generic failure returned when a pass-through request could not be served
    pub fn worker_error() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, WORKER_ERROR)
            .with_kind(ResponseKind::Error)
            .with_source(ResponseSource::Fallback)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn kind(&self) -> ResponseKind {
        self.kind
    }

    pub fn source(&self) -> ResponseSource {
        self.source
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}
