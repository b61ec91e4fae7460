use async_trait::async_trait;
use tracing::{debug, warn};

use super::{CacheStrategy, StrategyBase, StrategyKind};
use crate::http::{Request, Response};

/// Always go to the network and never persist anything
#[derive(Debug, Clone)]
pub struct NetworkOnly {
    base: StrategyBase,
}

impl NetworkOnly {
    pub fn new(base: StrategyBase) -> Self {
        Self { base }
    }
}

#[async_trait]
impl CacheStrategy for NetworkOnly {
    fn kind(&self) -> StrategyKind {
        StrategyKind::NetworkOnly
    }

    fn base(&self) -> &StrategyBase {
        &self.base
    }

    async fn handle(&self, request: &Request) -> Response {
        debug!(url = %request.url(), "NetworkOnly: fetching");

        match self.base.fetch(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(
                    event = "network_error",
                    url = %request.url(),
                    error = %e,
                    "NetworkOnly fetch failed"
                );
                if request.is_navigation() {
                    self.base.get_fallback().await
                } else {
                    Response::network_unavailable()
                }
            }
        }
    }

    /// Never writes, whatever max-age the group was configured with
    async fn cache_response(&self, _request: &Request, _response: &Response) {}
}
