use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{CacheStrategy, StrategyBase, StrategyKind};
use crate::http::{Request, Response};

/// Prefer a fresh network response bounded by the group timeout; fall back to
/// the cached entry, then to the offline document.
#[derive(Debug, Clone)]
pub struct NetworkFirst {
    base: StrategyBase,
}

impl NetworkFirst {
    pub fn new(base: StrategyBase) -> Self {
        Self { base }
    }
}

#[async_trait]
impl CacheStrategy for NetworkFirst {
    fn kind(&self) -> StrategyKind {
        StrategyKind::NetworkFirst
    }

    fn base(&self) -> &StrategyBase {
        &self.base
    }

    async fn handle(&self, request: &Request) -> Response {
        debug!(url = %request.url(), "NetworkFirst: fetching");

        let error = match self
            .base
            .fetch_with_timeout(request, self.base.timeout())
            .await
        {
            Ok(response) => {
                self.cache_response(request, &response).await;
                return response;
            }
            Err(e) => e,
        };

        if error.is_timeout() {
            warn!(
                event = "network_timeout",
                url = %request.url(),
                timeout_ms = self.base.timeout().as_millis() as u64,
                "{error}"
            );
        } else {
            warn!(
                event = "network_error",
                url = %request.url(),
                error = %error,
                "Network request failed"
            );
        }

        if let Some(cached) = self.base.get_cached(request).await {
            info!(
                event = "cache_hit",
                generation = %self.base.generation(),
                url = %request.url(),
                "Serving from cache"
            );
            return cached;
        }

        info!(
            event = "cache_miss",
            generation = %self.base.generation(),
            url = %request.url(),
            "No cache, serving fallback"
        );
        self.base.get_fallback().await
    }
}
