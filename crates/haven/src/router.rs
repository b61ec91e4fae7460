//! # Request Routing
//!
//! The router maps an intercepted request to the strategy of the first cache
//! group whose patterns match the request path, or lets it pass straight
//! through to the network. The table is built once per configuration and never
//! changes afterwards; a reload builds a new router.

use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use reqwest::Method;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::{CacheGroupSpec, ConfigDocument, DEFAULT_MAX_AGE_SECS, DEFAULT_TIMEOUT_MS};
use crate::error::NetworkError;
use crate::generation::GenerationNamer;
use crate::http::{Request, Response};
use crate::network::Fetcher;
use crate::strategy::{CacheStrategy, StrategyBase, StrategyDeps, StrategyKind, StrategyOptions};

/// One cache group of the routing table
#[derive(Debug, Clone)]
pub struct Route {
    name: String,
    patterns: Vec<Regex>,
    strategy: Arc<dyn CacheStrategy>,
}

impl Route {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn patterns(&self) -> &[Regex] {
        &self.patterns
    }

    pub fn strategy(&self) -> &Arc<dyn CacheStrategy> {
        &self.strategy
    }

    pub fn matches(&self, path: &str) -> bool {
        self.patterns.iter().any(|pattern| pattern.is_match(path))
    }
}

/// First-match router over the configured cache groups
pub struct StrategyRouter {
    version: String,
    origin: Url,
    routes: Vec<Route>,
    fetcher: Arc<dyn Fetcher>,
}

impl StrategyRouter {
    /// Build the routing table for `config`, in document order.
    ///
    /// Patterns that do not compile are dropped with a warning; the rest of
    /// the group is kept.
    pub fn new(
        config: &ConfigDocument,
        namer: GenerationNamer,
        deps: StrategyDeps,
        origin: Url,
    ) -> Self {
        let version = config.cache_version().to_owned();
        let fetcher = deps.fetcher.clone();

        let routes: Vec<Route> = config
            .cache
            .iter()
            .map(|(name, spec)| {
                let kind = resolve_kind(name, spec);
                let options = StrategyOptions {
                    timeout: Duration::from_millis(resolve_timeout(spec, config)),
                    max_age: Duration::from_secs(
                        spec.max_age.filter(|s| *s > 0).unwrap_or(DEFAULT_MAX_AGE_SECS),
                    ),
                };
                let base = StrategyBase::new(namer.name(name, &version), options, deps.clone());

                Route {
                    name: name.to_owned(),
                    patterns: compile_patterns(name, &spec.patterns),
                    strategy: kind.build(base),
                }
            })
            .collect();

        info!(
            version = %version,
            strategies = ?routes.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(),
            "Initialized strategies"
        );

        Self {
            version,
            origin,
            routes,
            fetcher,
        }
    }

    /// Answer an intercepted request.
    ///
    /// Only same-origin GET requests that match a group go through a strategy;
    /// everything else is fetched directly and its network error, if any, is
    /// returned to the caller.
    pub async fn dispatch(&self, request: &Request) -> Result<Response, NetworkError> {
        if request.method() != Method::GET {
            debug!(method = %request.method(), url = %request.url(), "Bypassing non-GET request");
            return self.fetcher.fetch(request).await;
        }

        if !request.is_same_origin(&self.origin) {
            debug!(url = %request.url(), "Bypassing cross-origin request");
            return self.fetcher.fetch(request).await;
        }

        let path = request.path();
        match self.find_strategy(path) {
            Some(route) => {
                info!(
                    event = "strategy_selected",
                    group = %route.name,
                    strategy = %route.strategy.kind(),
                    path = %path,
                    "Using strategy"
                );
                Ok(route.strategy.handle(request).await)
            }
            None => {
                debug!(path = %path, "No strategy match, using network");
                self.fetcher.fetch(request).await
            }
        }
    }

    /// The first route, in registration order, with a pattern matching `path`
    pub fn find_strategy(&self, path: &str) -> Option<&Route> {
        self.routes.iter().find(|route| route.matches(path))
    }

    /// Group names in registration order
    pub fn strategy_names(&self) -> Vec<&str> {
        self.routes.iter().map(|route| route.name.as_str()).collect()
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn version(&self) -> &str {
        &self.version
    }
}

fn resolve_kind(name: &str, spec: &CacheGroupSpec) -> StrategyKind {
    let kind = spec.strategy_kind();
    if let Some(strategy) = spec.strategy.as_deref() {
        if StrategyKind::from_name(strategy).is_none() {
            warn!(group = %name, strategy = %strategy, "Unknown strategy, using {kind}");
        }
    }
    kind
}

/// Group timeout, else document timeout, else the default. Zero means unset.
fn resolve_timeout(spec: &CacheGroupSpec, config: &ConfigDocument) -> u64 {
    spec.timeout
        .filter(|ms| *ms > 0)
        .or(Some(config.network.timeout).filter(|ms| *ms > 0))
        .unwrap_or(DEFAULT_TIMEOUT_MS)
}

fn compile_patterns(group: &str, patterns: &[String]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|pattern| match Regex::new(pattern) {
            Ok(regex) => Some(regex),
            Err(e) => {
                warn!(group = %group, pattern = %pattern, error = %e, "Invalid pattern");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CacheGroupSpec, CacheGroups, ConfigLoader};
    use crate::generation::versioned_name;
    use crate::http::ResponseSource;
    use crate::store::{CacheStorage, MemoryStorage};
    use crate::test_utils::{RecordingStorage, ScriptedFetcher, get, init_tracing, ok, origin, url};
    use reqwest::StatusCode;

    fn deps(storage: Arc<dyn CacheStorage>, fetcher: Arc<ScriptedFetcher>) -> StrategyDeps {
        StrategyDeps {
            storage,
            fetcher,
            offline_url: url("/offline.html"),
        }
    }

    fn doc_with(cache: CacheGroups) -> ConfigDocument {
        ConfigDocument {
            cache,
            ..ConfigLoader::defaults()
        }
    }

    fn build_router(config: &ConfigDocument, fetcher: Arc<ScriptedFetcher>) -> StrategyRouter {
        StrategyRouter::new(
            config,
            GenerationNamer::default(),
            deps(Arc::new(MemoryStorage::new()), fetcher),
            origin(),
        )
    }

    #[test]
    fn test_default_table() {
        let router = build_router(&ConfigLoader::defaults(), Arc::new(ScriptedFetcher::new()));
        assert_eq!(router.version(), "v1");
        assert_eq!(router.strategy_names(), vec!["static", "images", "pages", "api"]);

        let route = router.find_strategy("/assets/app.css").unwrap();
        assert_eq!(route.name(), "static");
        assert_eq!(route.strategy().generation(), "static-v1");
        assert_eq!(router.find_strategy("/").unwrap().name(), "pages");
        assert_eq!(router.find_strategy("/api/pwa/config").unwrap().name(), "api");
        assert!(router.find_strategy("/about").is_none());
    }

    #[test]
    fn test_first_match_wins() {
        let cache = CacheGroups::new()
            .with("a", CacheGroupSpec::new(StrategyKind::CacheFirst, &[r"\.png$"]))
            .with("b", CacheGroupSpec::new(StrategyKind::NetworkOnly, &[r"^/img/"]));
        let router = build_router(&doc_with(cache), Arc::new(ScriptedFetcher::new()));

        let route = router.find_strategy("/img/logo.png").unwrap();
        assert_eq!(route.name(), "a");
        assert_eq!(route.strategy().kind(), StrategyKind::CacheFirst);

        // Reversing registration order reverses the winner
        let cache = CacheGroups::new()
            .with("b", CacheGroupSpec::new(StrategyKind::NetworkOnly, &[r"^/img/"]))
            .with("a", CacheGroupSpec::new(StrategyKind::CacheFirst, &[r"\.png$"]));
        let router = build_router(&doc_with(cache), Arc::new(ScriptedFetcher::new()));
        assert_eq!(router.find_strategy("/img/logo.png").unwrap().name(), "b");
    }

    #[test]
    fn test_invalid_pattern_is_dropped() {
        init_tracing();
        let cache = CacheGroups::new().with(
            "static",
            CacheGroupSpec::new(StrategyKind::CacheFirst, &["([unclosed", r"\.css$"]),
        );
        let router = build_router(&doc_with(cache), Arc::new(ScriptedFetcher::new()));

        let route = router.find_strategy("/a.css").unwrap();
        assert_eq!(route.patterns().len(), 1);
    }

    #[test]
    fn test_strategy_parameters() {
        let mut doc = doc_with(
            CacheGroups::new()
                .with(
                    "pages",
                    CacheGroupSpec::new(StrategyKind::NetworkFirst, &["^/$"]).with_timeout(50),
                )
                .with("docs", CacheGroupSpec::new(StrategyKind::NetworkFirst, &["^/docs"]))
                .with(
                    "legacy",
                    CacheGroupSpec {
                        strategy: Some("fastest".to_owned()),
                        patterns: vec!["^/legacy".to_owned()],
                        max_age: Some(60),
                        timeout: Some(0),
                    },
                ),
        );
        doc.network.timeout = 1500;
        let router = build_router(&doc, Arc::new(ScriptedFetcher::new()));

        let pages = router.find_strategy("/").unwrap().strategy().base();
        assert_eq!(pages.timeout(), Duration::from_millis(50));
        assert_eq!(pages.max_age(), Duration::from_secs(86400));

        let docs = router.find_strategy("/docs/intro").unwrap().strategy().base();
        assert_eq!(docs.timeout(), Duration::from_millis(1500));

        let legacy = router.find_strategy("/legacy/x").unwrap().strategy();
        assert_eq!(legacy.kind(), StrategyKind::NetworkFirst);
        assert_eq!(legacy.base().timeout(), Duration::from_millis(1500));
        assert_eq!(legacy.base().max_age(), Duration::from_secs(60));
    }

    #[test]
    fn test_generation_names_come_from_namer() {
        fn scoped(group: &str, version: &str) -> String {
            format!("haven/{group}/{version}")
        }
        let mut doc = ConfigLoader::defaults();
        doc.version = "v42".to_owned();

        let router = StrategyRouter::new(
            &doc,
            GenerationNamer::new(scoped),
            deps(Arc::new(MemoryStorage::new()), Arc::new(ScriptedFetcher::new())),
            origin(),
        );
        for route in router.routes() {
            assert_eq!(route.strategy().generation(), scoped(route.name(), "v42"));
        }

        let router = build_router(&doc, Arc::new(ScriptedFetcher::new()));
        for route in router.routes() {
            assert_eq!(
                route.strategy().generation(),
                versioned_name(route.name(), "v42")
            );
        }
    }

    #[tokio::test]
    async fn test_bypass_rules() {
        init_tracing();
        let storage = Arc::new(RecordingStorage::new());
        let fetcher = Arc::new(
            ScriptedFetcher::new()
                .respond("/a.png", ok("png"))
                .respond("/about", ok("about")),
        );
        let router = StrategyRouter::new(
            &ConfigLoader::defaults(),
            GenerationNamer::default(),
            deps(storage.clone(), fetcher.clone()),
            origin(),
        );

        // Non-GET goes straight out, even on a cached path
        let post = Request::new(Method::POST, url("/a.png"));
        router.dispatch(&post).await.unwrap();

        // Cross-origin goes straight out
        let external = Request::get(Url::parse("https://cdn.example.com/a.png").unwrap());
        router.dispatch(&external).await.unwrap();

        // No matching group goes straight out
        let about = router.dispatch(&get("/about")).await.unwrap();
        assert_eq!(about.body().as_ref(), b"about");

        assert_eq!(storage.puts(), 0);
        assert_eq!(fetcher.calls(), 3);

        // A matching group caches
        let png = router.dispatch(&get("/a.png")).await.unwrap();
        assert_eq!(png.source(), ResponseSource::Network);
        assert_eq!(storage.puts(), 1);
    }

    #[tokio::test]
    async fn test_passthrough_error_is_returned() {
        init_tracing();
        let router = build_router(&ConfigLoader::defaults(), Arc::new(ScriptedFetcher::new()));

        let err = router.dispatch(&get("/about")).await.unwrap_err();
        assert!(matches!(err, NetworkError::Transport(_)));

        // Routed requests never fail
        let page = router.dispatch(&get("/")).await.unwrap();
        assert_eq!(page.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
