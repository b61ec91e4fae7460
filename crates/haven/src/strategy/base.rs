use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use url::Url;

use crate::config::{DEFAULT_MAX_AGE_SECS, DEFAULT_TIMEOUT_MS};
use crate::error::NetworkError;
use crate::http::{Request, Response, ResponseKind, ResponseSource};
use crate::network::Fetcher;
use crate::store::{CacheStorage, RequestKey, StoredEntry};

/// Per-group tuning of a strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrategyOptions {
    /// Bound on network-first fetches
    pub timeout: Duration,
    /// Recorded on every entry written; expired entries are still served
    pub max_age: Duration,
}

impl Default for StrategyOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            max_age: Duration::from_secs(DEFAULT_MAX_AGE_SECS),
        }
    }
}

/// Handles shared by all strategies of an engine
#[derive(Clone)]
pub struct StrategyDeps {
    pub storage: Arc<dyn CacheStorage>,
    pub fetcher: Arc<dyn Fetcher>,
    /// Absolute URL of the offline document
    pub offline_url: Url,
}

/// Helpers every strategy is built on
#[derive(Clone)]
pub struct StrategyBase {
    generation: String,
    options: StrategyOptions,
    deps: StrategyDeps,
}

impl fmt::Debug for StrategyBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyBase")
            .field("generation", &self.generation)
            .field("options", &self.options)
            .field("offline_url", &self.deps.offline_url.as_str())
            .finish_non_exhaustive()
    }
}

impl StrategyBase {
    pub fn new(generation: impl Into<String>, options: StrategyOptions, deps: StrategyDeps) -> Self {
        Self {
            generation: generation.into(),
            options,
            deps,
        }
    }

    pub fn generation(&self) -> &str {
        &self.generation
    }

    pub fn options(&self) -> &StrategyOptions {
        &self.options
    }

    pub fn timeout(&self) -> Duration {
        self.options.timeout
    }

    pub fn max_age(&self) -> Duration {
        self.options.max_age
    }

    /// Only complete same-origin or CORS responses are worth keeping
    pub fn should_cache(&self, response: &Response) -> bool {
        response.status().as_u16() == 200
            && matches!(response.kind(), ResponseKind::Basic | ResponseKind::Cors)
    }

    /// Write `response` into this generation if [`StrategyBase::should_cache`]
    /// allows it. Storage failures are logged and dropped.
    pub async fn cache_response(&self, request: &Request, response: &Response) {
        if !self.should_cache(response) {
            return;
        }

        let key = RequestKey::for_request(request);
        let entry = StoredEntry::from_response(&key, response, Some(self.options.max_age));
        match self.deps.storage.put(&self.generation, key, entry).await {
            Ok(()) => debug!(
                event = "cache_write",
                generation = %self.generation,
                url = %request.url(),
                "Cached response"
            ),
            Err(e) => warn!(
                event = "cache_write_failed",
                generation = %self.generation,
                url = %request.url(),
                error = %e,
                "Failed to cache response"
            ),
        }
    }

    /// Plain network fetch without a time bound
    pub async fn fetch(&self, request: &Request) -> Result<Response, NetworkError> {
        self.deps.fetcher.fetch(request).await
    }

    /// Race the fetch against `timeout`. When the timer wins the in-flight
    /// fetch is dropped, which cancels it.
    pub async fn fetch_with_timeout(
        &self,
        request: &Request,
        timeout: Duration,
    ) -> Result<Response, NetworkError> {
        match tokio::time::timeout(timeout, self.deps.fetcher.fetch(request)).await {
            Ok(result) => result,
            Err(_) => Err(NetworkError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            }),
        }
    }

    /// The cached offline document from any generation, or a synthesized
    /// offline page. Never fails.
    pub async fn get_fallback(&self) -> Response {
        let key = RequestKey::get(self.deps.offline_url.as_str());
        match self.deps.storage.match_any(&key).await {
            Ok(Some(entry)) => {
                debug!(event = "offline_fallback", cached = true, "Serving offline fallback");
                return entry.to_response().with_source(ResponseSource::Fallback);
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Failed to read offline fallback"),
        }

        debug!(event = "offline_fallback", cached = false, "Serving synthesized offline page");
        Response::offline_page()
    }

    /// Exact-key lookup in this generation; read errors count as a miss
    pub async fn get_cached(&self, request: &Request) -> Option<Response> {
        let key = RequestKey::for_request(request);
        match self.deps.storage.get(&self.generation, &key).await {
            Ok(Some(entry)) => {
                debug!(
                    generation = %self.generation,
                    url = %request.url(),
                    freshness = ?entry.metadata.freshness(),
                    "Found cached entry"
                );
                Some(entry.to_response())
            }
            Ok(None) => None,
            Err(e) => {
                warn!(
                    generation = %self.generation,
                    url = %request.url(),
                    error = %e,
                    "Cache read error"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStorage;
    use crate::test_utils::{RecordingStorage, ScriptedFetcher, get, html, init_tracing, ok, url};
    use reqwest::StatusCode;
    use std::time::Instant;

    fn base_with(storage: Arc<dyn CacheStorage>, fetcher: Arc<ScriptedFetcher>) -> StrategyBase {
        let deps = StrategyDeps {
            storage,
            fetcher,
            offline_url: url("/offline.html"),
        };
        StrategyBase::new("static-v1", StrategyOptions::default(), deps)
    }

    #[test]
    fn test_should_cache() {
        let base = base_with(
            Arc::new(MemoryStorage::new()),
            Arc::new(ScriptedFetcher::new()),
        );

        assert!(base.should_cache(&ok("x")));
        assert!(base.should_cache(&ok("x").with_kind(ResponseKind::Cors)));
        assert!(!base.should_cache(&ok("x").with_kind(ResponseKind::Opaque)));
        assert!(!base.should_cache(&ok("x").with_kind(ResponseKind::Error)));
        assert!(!base.should_cache(&Response::new(StatusCode::NOT_FOUND, "")));
        assert!(!base.should_cache(&Response::new(StatusCode::NO_CONTENT, "")));
    }

    #[tokio::test]
    async fn test_cache_response_skips_uncacheable() {
        let storage = Arc::new(RecordingStorage::new());
        let base = base_with(storage.clone(), Arc::new(ScriptedFetcher::new()));

        base.cache_response(&get("/a.css"), &Response::new(StatusCode::NOT_FOUND, ""))
            .await;
        assert_eq!(storage.puts(), 0);

        base.cache_response(&get("/a.css"), &ok("a{}")).await;
        assert_eq!(storage.puts(), 1);
        assert_eq!(storage.len("static-v1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_write_failure_is_swallowed() {
        init_tracing();
        let storage = Arc::new(RecordingStorage::new());
        storage.fail_writes(true);
        let base = base_with(storage.clone(), Arc::new(ScriptedFetcher::new()));

        base.cache_response(&get("/a.css"), &ok("a{}")).await;
        assert_eq!(storage.puts(), 1);
        assert!(base.get_cached(&get("/a.css")).await.is_none());
    }

    #[tokio::test]
    async fn test_read_failure_is_a_miss() {
        init_tracing();
        let storage = Arc::new(RecordingStorage::new());
        let base = base_with(storage.clone(), Arc::new(ScriptedFetcher::new()));
        base.cache_response(&get("/a.css"), &ok("a{}")).await;

        storage.fail_reads(true);
        assert!(base.get_cached(&get("/a.css")).await.is_none());
        // The fallback path reads too, and still produces a page
        assert_eq!(base.get_fallback().await.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_timeout_cancels_hanging_fetch() {
        let fetcher = Arc::new(ScriptedFetcher::new().hang("/slow"));
        let base = base_with(Arc::new(MemoryStorage::new()), fetcher.clone());

        let started = Instant::now();
        let err = base
            .fetch_with_timeout(&get("/slow"), Duration::from_millis(50))
            .await
            .unwrap_err();
        let elapsed = started.elapsed();

        assert_eq!(err, NetworkError::Timeout { timeout_ms: 50 });
        assert_eq!(err.to_string(), "Request timed out after 50ms");
        assert!(elapsed >= Duration::from_millis(50));
        assert!(elapsed < Duration::from_millis(1000), "took {elapsed:?}");
        assert_eq!(fetcher.cancelled(), 1);
    }

    #[tokio::test]
    async fn test_fetch_within_timeout_succeeds() {
        let fetcher = Arc::new(ScriptedFetcher::new().delay("/", Duration::from_millis(5), ok("hi")));
        let base = base_with(Arc::new(MemoryStorage::new()), fetcher);

        let response = base
            .fetch_with_timeout(&get("/"), Duration::from_millis(500))
            .await
            .unwrap();
        assert_eq!(response.body().as_ref(), b"hi");
    }

    #[tokio::test]
    async fn test_fallback_prefers_cached_offline_document() {
        let storage = Arc::new(MemoryStorage::new());
        let base = base_with(storage.clone(), Arc::new(ScriptedFetcher::new()));

        let synthesized = base.get_fallback().await;
        assert_eq!(synthesized.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(synthesized.content_type(), Some("text/html; charset=utf-8"));

        // The offline document may live in any generation
        let key = RequestKey::get(url("/offline.html").as_str());
        let offline = html("<h1>Offline mode</h1>");
        storage
            .put("pages-v0", key.clone(), StoredEntry::from_response(&key, &offline, None))
            .await
            .unwrap();

        let fallback = base.get_fallback().await;
        assert_eq!(fallback.status(), StatusCode::OK);
        assert_eq!(fallback.body().as_ref(), b"<h1>Offline mode</h1>");
        assert_eq!(fallback.source(), ResponseSource::Fallback);
    }
}
