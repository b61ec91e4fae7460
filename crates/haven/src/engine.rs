//! # Cache Engine
//!
//! [`CacheEngine`] owns every component of a worker and is what the hosting
//! runtime talks to. Each configuration load produces an immutable
//! [`EngineState`] that is swapped in as a whole, so a request is always
//! answered by one consistent routing table.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, error, info};
use url::Url;

use crate::config::{ConfigDocument, ConfigLoader};
use crate::error::EngineError;
use crate::generation::GenerationNamer;
use crate::host::WorkerHost;
use crate::http::{Request, Response};
use crate::lifecycle::{ActivationReport, ControlMessage, LifecycleManager};
use crate::network::Fetcher;
use crate::options::EngineOptions;
use crate::router::StrategyRouter;
use crate::store::CacheStorage;
use crate::strategy::StrategyDeps;

/// Events delivered by the hosting runtime
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    Install,
    Activate,
    Message(ControlMessage),
    Fetch(Request),
}

/// Result of handling a [`WorkerEvent`]
#[derive(Debug)]
pub enum EventOutcome {
    Installed,
    Activated(ActivationReport),
    MessageHandled,
    Response(Response),
}

/// Everything derived from one configuration document
pub struct EngineState {
    config: ConfigDocument,
    lifecycle: LifecycleManager,
    router: StrategyRouter,
}

impl EngineState {
    pub fn config(&self) -> &ConfigDocument {
        &self.config
    }

    pub fn lifecycle(&self) -> &LifecycleManager {
        &self.lifecycle
    }

    pub fn router(&self) -> &StrategyRouter {
        &self.router
    }
}

/// The request-interception cache of one worker
pub struct CacheEngine {
    options: EngineOptions,
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    host: Arc<dyn WorkerHost>,
    namer: GenerationNamer,
    loader: ConfigLoader,
    offline_url: Url,
    state: RwLock<Option<Arc<EngineState>>>,
    init_lock: tokio::sync::Mutex<()>,
}

impl CacheEngine {
    pub fn new(
        options: EngineOptions,
        storage: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn Fetcher>,
        host: Arc<dyn WorkerHost>,
    ) -> Result<Self, EngineError> {
        let config_url = options.config_url().map_err(|e| {
            EngineError::InvalidOption(format!("config path {:?}: {e}", options.config_path))
        })?;
        let offline_url = options.offline_url().map_err(|e| {
            EngineError::InvalidOption(format!("offline path {:?}: {e}", options.offline_path))
        })?;

        Ok(Self {
            loader: ConfigLoader::new(fetcher.clone(), config_url),
            options,
            storage,
            fetcher,
            host,
            namer: GenerationNamer::default(),
            offline_url,
            state: RwLock::new(None),
            init_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Use a different generation naming scheme
    pub fn with_namer(mut self, namer: GenerationNamer) -> Self {
        self.namer = namer;
        self
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// The current state, if a configuration has been loaded
    pub fn state(&self) -> Option<Arc<EngineState>> {
        self.state.read().clone()
    }

    /// Load the configuration and build the state unless that already happened
    pub async fn initialize(&self) -> Arc<EngineState> {
        if let Some(state) = self.state() {
            return state;
        }

        let _guard = self.init_lock.lock().await;
        if let Some(state) = self.state() {
            return state;
        }

        let config = self.loader.load().await;
        self.apply_config(config)
    }

    /// Load the configuration again and swap in the resulting state
    pub async fn reload(&self) -> Arc<EngineState> {
        let _guard = self.init_lock.lock().await;
        let config = self.loader.load().await;
        self.apply_config(config)
    }

    /// Build a state from `config` and make it current
    pub fn apply_config(&self, config: ConfigDocument) -> Arc<EngineState> {
        let state = Arc::new(self.build_state(config));
        *self.state.write() = Some(state.clone());
        info!(
            version = %state.config.cache_version(),
            groups = ?state.router.strategy_names(),
            "Engine state ready"
        );
        state
    }

    fn build_state(&self, config: ConfigDocument) -> EngineState {
        let version = config.cache_version().to_owned();

        let precache: Vec<String> = self
            .options
            .precache_urls
            .iter()
            .chain(config.precache.iter())
            .cloned()
            .collect();

        let lifecycle = LifecycleManager::new(
            version,
            self.options.origin.clone(),
            self.namer,
            &precache,
            self.storage.clone(),
            self.fetcher.clone(),
            self.host.clone(),
        )
        .with_offline_path(&self.options.offline_path);

        let deps = StrategyDeps {
            storage: self.storage.clone(),
            fetcher: self.fetcher.clone(),
            offline_url: self.offline_url.clone(),
        };
        let router = StrategyRouter::new(&config, self.namer, deps, self.options.origin.clone());

        EngineState {
            config,
            lifecycle,
            router,
        }
    }

    /// Handle one event to completion
    pub async fn handle_event(&self, event: WorkerEvent) -> Result<EventOutcome, EngineError> {
        match event {
            WorkerEvent::Install => {
                self.initialize().await.lifecycle.install().await?;
                Ok(EventOutcome::Installed)
            }
            WorkerEvent::Activate => {
                let report = self.initialize().await.lifecycle.activate().await?;
                Ok(EventOutcome::Activated(report))
            }
            WorkerEvent::Message(message) => {
                self.initialize()
                    .await
                    .lifecycle
                    .handle_message(&message)
                    .await?;
                Ok(EventOutcome::MessageHandled)
            }
            WorkerEvent::Fetch(request) => Ok(EventOutcome::Response(self.handle_fetch(&request).await)),
        }
    }

    /// Answer an intercepted request. Never fails.
    pub async fn handle_fetch(&self, request: &Request) -> Response {
        let result = match self.state() {
            Some(state) => state.router.dispatch(request).await,
            None => {
                debug!(url = %request.url(), "Engine not initialized, using network");
                self.fetcher.fetch(request).await
            }
        };

        result.unwrap_or_else(|e| {
            error!(url = %request.url(), error = %e, "Fetch handler error");
            Response::worker_error()
        })
    }
}
