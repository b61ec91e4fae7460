//! # Store Types
//!
//! This module defines common types used across the cache storage backends.

use std::time::Duration;

use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::http::{Request, Response, ResponseKind, ResponseSource};

/// Freshness of a stored entry relative to its max-age
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Entry is within its max-age (or has none)
    Fresh,
    /// Entry is past its max-age; it is still served, only reported as stale
    Stale,
}

/// Identity of a request inside a cache generation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    /// Upper-case HTTP method
    pub method: String,
    /// Absolute URL of the resource
    pub url: String,
}

impl RequestKey {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
        }
    }

    /// Key of a GET request for `url`
    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    pub fn for_request(request: &Request) -> Self {
        Self::new(request.method().as_str(), request.url().as_str())
    }

    /// Convert to a filename-safe string
    pub fn to_filename(&self) -> String {
        use sha2::{Digest, Sha256};

        let mut hasher = Sha256::new();
        hasher.update(self.method.as_bytes());
        hasher.update(":");
        hasher.update(self.url.as_bytes());

        let hash = hasher.finalize();
        format!("{hash:x}")
    }
}

/// Metadata for a stored response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntryMetadata {
    /// Method of the request this entry answers
    pub method: String,
    /// URL of the request this entry answers
    pub url: String,
    /// HTTP status code of the stored response
    pub status: u16,
    /// Provenance of the stored response
    pub kind: ResponseKind,
    /// Response headers as (name, raw value) pairs
    pub headers: Vec<(String, Vec<u8>)>,
    /// When the entry was written (seconds since the Unix epoch)
    pub cached_at: u64,
    /// When the entry stops being fresh
    pub expires_at: Option<u64>,
    /// Content type of the response
    pub content_type: Option<String>,
    /// Size of the body in bytes
    pub size: u64,
}

impl EntryMetadata {
    /// Describe `response` as an answer to `key`
    pub fn new(key: &RequestKey, response: &Response) -> Self {
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| (name.as_str().to_string(), value.as_bytes().to_vec()))
            .collect();

        Self {
            method: key.method.clone(),
            url: key.url.clone(),
            status: response.status().as_u16(),
            kind: response.kind(),
            headers,
            cached_at: now_secs(),
            expires_at: None,
            content_type: response.content_type().map(str::to_string),
            size: response.body().len() as u64,
        }
    }

    /// Set the expiration time
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.expires_at = Some(self.cached_at.saturating_add(max_age.as_secs()));
        self
    }

    /// Set the expiration time as an Option
    pub fn with_max_age_option(self, max_age: Option<Duration>) -> Self {
        match max_age {
            Some(max_age) => self.with_max_age(max_age),
            None => self,
        }
    }

    /// Check if the entry is past its max-age
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at < now_secs(),
            None => false,
        }
    }

    pub fn freshness(&self) -> Freshness {
        if self.is_expired() {
            Freshness::Stale
        } else {
            Freshness::Fresh
        }
    }
}

/// A response as persisted inside a cache generation
#[derive(Debug, Clone)]
pub struct StoredEntry {
    pub body: Bytes,
    pub metadata: EntryMetadata,
}

impl StoredEntry {
    /// Capture `response` for storage under `key`
    pub fn from_response(key: &RequestKey, response: &Response, max_age: Option<Duration>) -> Self {
        Self {
            body: response.body().clone(),
            metadata: EntryMetadata::new(key, response).with_max_age_option(max_age),
        }
    }

    /// Rebuild the response this entry was captured from
    pub fn to_response(&self) -> Response {
        let mut headers = HeaderMap::new();
        for (name, value) in &self.metadata.headers {
            if let (Ok(name), Ok(value)) = (
                name.parse::<HeaderName>(),
                HeaderValue::from_bytes(value),
            ) {
                headers.append(name, value);
            }
        }

        let status = StatusCode::from_u16(self.metadata.status).unwrap_or(StatusCode::OK);
        Response::new(status, self.body.clone())
            .with_headers(headers)
            .with_kind(self.metadata.kind)
            .with_source(ResponseSource::Cache)
    }
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
