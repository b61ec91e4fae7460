use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{CacheStrategy, StrategyBase, StrategyKind};
use crate::http::{Request, Response};

/// Serve from the cache when possible and refresh the entry in the background
/// (stale-while-revalidate). Misses go to the network without a time bound.
#[derive(Debug, Clone)]
pub struct CacheFirst {
    base: StrategyBase,
}

impl CacheFirst {
    pub fn new(base: StrategyBase) -> Self {
        Self { base }
    }

    /// Re-fetch `request` on a separate task and overwrite the entry when the
    /// result is cacheable. The caller never waits for it.
    fn refresh_in_background(&self, request: &Request) {
        let base = self.base.clone();
        let request = request.clone();

        tokio::spawn(async move {
            match base.fetch(&request).await {
                Ok(response) if base.should_cache(&response) => {
                    base.cache_response(&request, &response).await;
                    debug!(
                        event = "background_refresh",
                        generation = %base.generation(),
                        url = %request.url(),
                        "Background cache update"
                    );
                }
                Ok(response) => debug!(
                    event = "background_refresh",
                    url = %request.url(),
                    status = response.status().as_u16(),
                    "Background update returned an uncacheable response"
                ),
                Err(e) => debug!(
                    event = "background_refresh_failed",
                    url = %request.url(),
                    error = %e,
                    "Background update failed"
                ),
            }
        });
    }
}

#[async_trait]
impl CacheStrategy for CacheFirst {
    fn kind(&self) -> StrategyKind {
        StrategyKind::CacheFirst
    }

    fn base(&self) -> &StrategyBase {
        &self.base
    }

    async fn handle(&self, request: &Request) -> Response {
        if let Some(cached) = self.base.get_cached(request).await {
            info!(
                event = "cache_hit",
                generation = %self.base.generation(),
                url = %request.url(),
                "Cache hit"
            );
            self.refresh_in_background(request);
            return cached;
        }

        info!(
            event = "cache_miss",
            generation = %self.base.generation(),
            url = %request.url(),
            "Cache miss, fetching"
        );

        match self.base.fetch(request).await {
            Ok(response) => {
                self.cache_response(request, &response).await;
                response
            }
            Err(e) => {
                warn!(
                    event = "network_error",
                    url = %request.url(),
                    error = %e,
                    "CacheFirst fetch failed"
                );
                // Another request may have filled the entry meanwhile
                if let Some(cached) = self.base.get_cached(request).await {
                    return cached;
                }
                self.base.get_fallback().await
            }
        }
    }
}
