//! # Caching Strategies
//!
//! A strategy decides, for one cache group, how an intercepted request is
//! answered from the network, the group's cache generation, or the offline
//! fallback. The set is closed: [`CacheFirst`], [`NetworkFirst`] and
//! [`NetworkOnly`]. Shared plumbing lives in [`StrategyBase`], which has no
//! `handle` of its own and therefore cannot serve requests by itself.

mod base;
mod cache_first;
mod network_first;
mod network_only;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::http::{Request, Response};

pub use base::{StrategyBase, StrategyDeps, StrategyOptions};
pub use cache_first::CacheFirst;
pub use network_first::NetworkFirst;
pub use network_only::NetworkOnly;

/// The request-handling contract every strategy implements
#[async_trait]
pub trait CacheStrategy: Send + Sync + fmt::Debug {
    fn kind(&self) -> StrategyKind;

    fn base(&self) -> &StrategyBase;

    /// Answer a request. Never fails: every error ends in a fallback response.
    async fn handle(&self, request: &Request) -> Response;

    /// Store `response` in this strategy's generation if it is cacheable
    async fn cache_response(&self, request: &Request, response: &Response) {
        self.base().cache_response(request, response).await;
    }

    /// Name of the generation this strategy reads and writes
    fn generation(&self) -> &str {
        self.base().generation()
    }
}

/// Names of the available strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StrategyKind {
    CacheFirst,
    /// Used for unknown or missing strategy names
    #[default]
    NetworkFirst,
    NetworkOnly,
}

impl StrategyKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "cache-first" => Some(StrategyKind::CacheFirst),
            "network-first" => Some(StrategyKind::NetworkFirst),
            "network-only" => Some(StrategyKind::NetworkOnly),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::CacheFirst => "cache-first",
            StrategyKind::NetworkFirst => "network-first",
            StrategyKind::NetworkOnly => "network-only",
        }
    }

    /// Create the strategy of this kind around `base`
    pub fn build(self, base: StrategyBase) -> Arc<dyn CacheStrategy> {
        match self {
            StrategyKind::CacheFirst => Arc::new(CacheFirst::new(base)),
            StrategyKind::NetworkFirst => Arc::new(NetworkFirst::new(base)),
            StrategyKind::NetworkOnly => Arc::new(NetworkOnly::new(base)),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
