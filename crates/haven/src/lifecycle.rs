//! # Worker Lifecycle
//!
//! Install precaches the application shell into the static generation of the
//! current version. Activate deletes every generation the current version does
//! not own and takes control of open clients. Both phases report failures to
//! the host, which owns retries.

use std::sync::Arc;

use futures::future::try_join_all;
use serde::Deserialize;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::error::{LifecycleError, StoreError};
use crate::generation::{GenerationNamer, RETAINED_GROUPS, STATIC};
use crate::host::WorkerHost;
use crate::http::Request;
use crate::network::Fetcher;
use crate::options::OFFLINE_PATH;
use crate::store::{CacheStorage, RequestKey, StoredEntry};

/// Control message posted to the worker by a page
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type")]
pub enum ControlMessage {
    /// Activate the waiting worker now
    #[serde(rename = "SKIP_WAITING")]
    SkipWaiting,
    #[serde(other)]
    Unknown,
}

/// What an activation removed
#[derive(Debug, Default)]
pub struct ActivationReport {
    /// Generations deleted
    pub deleted: Vec<String>,
    /// Generations that could not be deleted, with the reason
    pub failed: Vec<(String, StoreError)>,
}

/// Owns creation and deletion of cache generations
pub struct LifecycleManager {
    version: String,
    origin: Url,
    namer: GenerationNamer,
    requested: Vec<String>,
    precache_urls: Vec<String>,
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    host: Arc<dyn WorkerHost>,
}

impl LifecycleManager {
    /// `precache_urls` are added after the root document and the offline
    /// document (`/offline.html` unless changed with
    /// [`with_offline_path`](Self::with_offline_path)); duplicates are
    /// dropped, first occurrence wins.
    pub fn new(
        version: impl Into<String>,
        origin: Url,
        namer: GenerationNamer,
        precache_urls: &[String],
        storage: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn Fetcher>,
        host: Arc<dyn WorkerHost>,
    ) -> Self {
        Self {
            version: version.into(),
            origin,
            namer,
            requested: precache_urls.to_vec(),
            precache_urls: shell_list(OFFLINE_PATH, precache_urls),
            storage,
            fetcher,
            host,
        }
    }

    /// Precache `path` as the offline document instead of `/offline.html`
    pub fn with_offline_path(mut self, path: &str) -> Self {
        self.precache_urls = shell_list(path, &self.requested);
        self
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Generation name for `kind`; any group name is accepted
    pub fn cache_name(&self, kind: &str) -> String {
        self.namer.name(kind, &self.version)
    }

    /// Generations the current version keeps on activation
    pub fn all_cache_names(&self) -> Vec<String> {
        RETAINED_GROUPS
            .iter()
            .map(|group| self.cache_name(group))
            .collect()
    }

    /// De-duplicated precache list in install order
    pub fn precache_list(&self) -> &[String] {
        &self.precache_urls
    }

    /// Precache the shell into the static generation, then ask the host to
    /// activate this worker without waiting.
    ///
    /// Nothing is written unless every URL was fetched with a 2xx status.
    pub async fn install(&self) -> Result<(), LifecycleError> {
        let generation = self.cache_name(STATIC);
        info!(version = %self.version, generation = %generation, "Installing worker");

        let fetches = self
            .precache_urls
            .iter()
            .map(|path| self.fetch_for_precache(path));
        let entries = match try_join_all(fetches).await {
            Ok(entries) => entries,
            Err(e) => {
                error!(error = %e, "Install failed");
                return Err(e);
            }
        };

        if let Err(e) = self.storage.put_all(&generation, entries).await {
            error!(error = %e, "Install failed");
            return Err(e.into());
        }
        info!(urls = ?self.precache_urls, "Pre-cached critical assets");

        self.host.skip_waiting().await?;
        info!(
            event = "install_complete",
            version = %self.version,
            "Skip waiting, activating immediately"
        );
        Ok(())
    }

    async fn fetch_for_precache(
        &self,
        path: &str,
    ) -> Result<(RequestKey, StoredEntry), LifecycleError> {
        let url = self
            .origin
            .join(path)
            .map_err(|source| LifecycleError::InvalidUrl {
                url: path.to_owned(),
                source,
            })?;
        let request = Request::get(url);

        let response = self
            .fetcher
            .fetch(&request)
            .await
            .map_err(|source| LifecycleError::Precache {
                url: path.to_owned(),
                source,
            })?;

        if !response.is_success() {
            return Err(LifecycleError::PrecacheStatus {
                url: path.to_owned(),
                status: response.status(),
            });
        }

        debug!(url = %request.url(), size = response.body().len(), "Fetched for precache");
        let key = RequestKey::for_request(&request);
        let entry = StoredEntry::from_response(&key, &response, None);
        Ok((key, entry))
    }

    /// Delete every generation not owned by the current version, then claim
    /// clients.
    ///
    /// Each deletion is independent; a failed deletion is logged and reported
    /// but does not stop the others or the claim. Failing to list generations
    /// or to claim clients is an error.
    pub async fn activate(&self) -> Result<ActivationReport, LifecycleError> {
        info!(version = %self.version, "Activating worker");

        let expected = self.all_cache_names();
        let existing = self.storage.keys().await?;
        let mut report = ActivationReport::default();

        for generation in existing.into_iter().filter(|g| !expected.contains(g)) {
            info!(generation = %generation, "Deleting old cache");
            match self.storage.delete(&generation).await {
                Ok(_) => report.deleted.push(generation),
                Err(e) => {
                    warn!(generation = %generation, error = %e, "Failed to delete old cache");
                    report.failed.push((generation, e));
                }
            }
        }

        self.host.claim_clients().await?;
        info!(
            event = "activate_complete",
            version = %self.version,
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            "Claimed all clients"
        );
        Ok(report)
    }

    /// React to a control message
    pub async fn handle_message(&self, message: &ControlMessage) -> Result<(), LifecycleError> {
        match message {
            ControlMessage::SkipWaiting => {
                info!("Skip waiting requested by client");
                self.host.skip_waiting().await?;
            }
            ControlMessage::Unknown => debug!("Ignoring unknown control message"),
        }
        Ok(())
    }
}

/// Root document, offline document, then `extra`, first occurrence wins
fn shell_list(offline_path: &str, extra: &[String]) -> Vec<String> {
    let mut urls: Vec<String> = Vec::with_capacity(extra.len() + 2);
    for url in ["/", offline_path]
        .into_iter()
        .chain(extra.iter().map(String::as_str))
    {
        if !urls.iter().any(|u| u == url) {
            urls.push(url.to_owned());
        }
    }
    urls
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::LocalHost;
    use crate::http::Response;
    use crate::store::MemoryStorage;
    use crate::test_utils::{
        RecordingStorage, ScriptedFetcher, html, init_tracing, ok, origin, url,
    };
    use reqwest::StatusCode;

    struct Fixture {
        storage: Arc<RecordingStorage>,
        fetcher: Arc<ScriptedFetcher>,
        host: Arc<LocalHost>,
    }

    impl Fixture {
        fn new(fetcher: ScriptedFetcher) -> Self {
            Self {
                storage: Arc::new(RecordingStorage::new()),
                fetcher: Arc::new(fetcher),
                host: Arc::new(LocalHost::new()),
            }
        }

        fn manager(&self, version: &str, precache: &[&str]) -> LifecycleManager {
            let precache: Vec<String> = precache.iter().map(|p| (*p).to_owned()).collect();
            LifecycleManager::new(
                version,
                origin(),
                GenerationNamer::default(),
                &precache,
                self.storage.clone(),
                self.fetcher.clone(),
                self.host.clone(),
            )
        }
    }

    fn shell() -> ScriptedFetcher {
        ScriptedFetcher::new()
            .respond("/", html("<h1>Home</h1>"))
            .respond("/offline.html", html("<h1>Offline</h1>"))
            .respond("/assets/app.css", ok("body{}"))
    }

    #[test]
    fn test_cache_names() {
        let fixture = Fixture::new(ScriptedFetcher::new());
        let manager = fixture.manager("v3", &[]);

        assert_eq!(manager.cache_name("static"), "static-v3");
        assert_eq!(manager.cache_name("fonts"), "fonts-v3");
        assert_eq!(
            manager.all_cache_names(),
            vec!["static-v3", "images-v3", "pages-v3"]
        );
    }

    #[test]
    fn test_precache_list_is_deduplicated_in_order() {
        let fixture = Fixture::new(ScriptedFetcher::new());
        let manager = fixture.manager("v1", &["/assets/app.css", "/", "/assets/app.css"]);
        assert_eq!(
            manager.precache_list(),
            &["/", "/offline.html", "/assets/app.css"]
        );
    }

    #[test]
    fn test_offline_path_replaces_default_offline_document() {
        let fixture = Fixture::new(ScriptedFetcher::new());
        let manager = fixture
            .manager("v1", &["/offline", "/about"])
            .with_offline_path("/offline");
        assert_eq!(manager.precache_list(), &["/", "/offline", "/about"]);
    }

    #[tokio::test]
    async fn test_install_precaches_and_skips_waiting() {
        init_tracing();
        let fixture = Fixture::new(shell());
        let manager = fixture.manager("v1", &["/assets/app.css"]);

        manager.install().await.unwrap();

        assert_eq!(fixture.storage.len("static-v1").await.unwrap(), 3);
        let offline = fixture
            .storage
            .get("static-v1", &RequestKey::get(url("/offline.html").as_str()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(offline.body.as_ref(), b"<h1>Offline</h1>");
        assert!(fixture.host.skipped_waiting());
    }

    #[tokio::test]
    async fn test_install_is_all_or_nothing() {
        init_tracing();
        let fixture = Fixture::new(shell().fail("/assets/app.css"));
        let manager = fixture.manager("v1", &["/assets/app.css"]);

        let err = manager.install().await.unwrap_err();
        assert!(matches!(err, LifecycleError::Precache { ref url, .. } if url == "/assets/app.css"));
        assert_eq!(fixture.storage.puts(), 0);
        assert!(!fixture.storage.has("static-v1").await.unwrap());
        assert!(!fixture.host.skipped_waiting());
    }

    #[tokio::test]
    async fn test_install_rejects_error_status() {
        init_tracing();
        let fixture = Fixture::new(
            shell().respond("/offline.html", Response::new(StatusCode::NOT_FOUND, "")),
        );
        let manager = fixture.manager("v1", &[]);

        let err = manager.install().await.unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::PrecacheStatus { status: StatusCode::NOT_FOUND, .. }
        ));
        assert!(!fixture.storage.has("static-v1").await.unwrap());
    }

    #[tokio::test]
    async fn test_install_write_failure_is_fatal() {
        init_tracing();
        let fixture = Fixture::new(shell());
        fixture.storage.fail_writes(true);

        let err = fixture.manager("v1", &[]).install().await.unwrap_err();
        assert!(matches!(err, LifecycleError::Store(_)));
        assert!(!fixture.host.skipped_waiting());
    }

    #[tokio::test]
    async fn test_activate_evicts_previous_version() {
        init_tracing();
        let fixture = Fixture::new(shell());
        fixture.manager("v1", &[]).install().await.unwrap();
        for generation in ["images-v1", "pages-v1", "api-v1"] {
            let key = RequestKey::get(url("/x").as_str());
            let entry = StoredEntry::from_response(&key, &ok("x"), None);
            fixture.storage.put(generation, key, entry).await.unwrap();
        }

        let v2 = fixture.manager("v2", &[]);
        v2.install().await.unwrap();
        let report = v2.activate().await.unwrap();

        let remaining = fixture.storage.keys().await.unwrap();
        assert!(remaining.iter().all(|g| !g.ends_with("-v1")), "{remaining:?}");
        assert!(remaining.contains(&"static-v2".to_owned()));
        assert_eq!(report.deleted.len(), 4);
        assert!(report.failed.is_empty());
        assert!(fixture.host.claimed());
    }

    #[tokio::test]
    async fn test_failed_deletion_does_not_block_claim() {
        init_tracing();
        let fixture = Fixture::new(shell());
        fixture.manager("v1", &[]).install().await.unwrap();
        let key = RequestKey::get(url("/a.png").as_str());
        fixture
            .storage
            .put("images-v1", key.clone(), StoredEntry::from_response(&key, &ok("png"), None))
            .await
            .unwrap();
        fixture.storage.fail_delete_of("static-v1");

        let report = fixture.manager("v2", &[]).activate().await.unwrap();

        assert_eq!(report.deleted, vec!["images-v1"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "static-v1");
        assert!(fixture.host.claimed());
    }

    #[tokio::test]
    async fn test_skip_waiting_message() {
        let fixture = Fixture::new(ScriptedFetcher::new());
        let manager = fixture.manager("v1", &[]);

        manager.handle_message(&ControlMessage::Unknown).await.unwrap();
        assert!(!fixture.host.skipped_waiting());

        let message: ControlMessage = serde_json::from_str(r#"{"type":"SKIP_WAITING"}"#).unwrap();
        manager.handle_message(&message).await.unwrap();
        assert!(fixture.host.skipped_waiting());

        let other: ControlMessage = serde_json::from_str(r#"{"type":"CLEAR_CACHE"}"#).unwrap();
        assert_eq!(other, ControlMessage::Unknown);
    }

    #[tokio::test]
    async fn test_generation_names_shared_with_router() {
        use crate::config::ConfigLoader;
        use crate::router::StrategyRouter;
        use crate::strategy::StrategyDeps;

        let storage = Arc::new(MemoryStorage::new());
        let fetcher = Arc::new(ScriptedFetcher::new());
        for version in ["v1", "v2", "2024-06-01", "beta.3"] {
            let mut config = ConfigLoader::defaults();
            config.version = version.to_owned();

            let manager = LifecycleManager::new(
                version,
                origin(),
                GenerationNamer::default(),
                &[],
                storage.clone(),
                fetcher.clone(),
                Arc::new(LocalHost::new()),
            );
            let router = StrategyRouter::new(
                &config,
                GenerationNamer::default(),
                StrategyDeps {
                    storage: storage.clone(),
                    fetcher: fetcher.clone(),
                    offline_url: url("/offline.html"),
                },
                origin(),
            );

            for route in router.routes() {
                assert_eq!(
                    manager.cache_name(route.name()).as_bytes(),
                    route.strategy().generation().as_bytes()
                );
            }
        }
    }
}
