//! # Haven
//!
//! An offline-capable request-interception cache for installable web front
//! ends. A worker runtime hands every intercepted request to a
//! [`CacheEngine`], which routes it to a caching strategy chosen by URL path
//! and keeps versioned cache generations on disk or in memory.
//!
//! ## Features
//!
//! - Cache-first, network-first and network-only strategies
//! - First-match routing configured by a JSON document from the origin
//! - Versioned cache generations with install-time precaching and
//!   activation-time eviction
//! - Timeout-bound network racing with layered offline fallbacks

pub mod builder;
pub mod config;
pub mod engine;
pub mod error;
pub mod generation;
pub mod host;
pub mod http;
pub mod lifecycle;
pub mod network;
pub mod options;
pub mod router;
pub mod store;
pub mod strategy;

#[cfg(test)]
pub(crate) mod test_utils;

pub use builder::EngineOptionsBuilder;
pub use config::{CacheGroupSpec, CacheGroups, ConfigDocument, ConfigLoader};
pub use engine::{CacheEngine, EngineState, EventOutcome, WorkerEvent};
pub use error::{ConfigError, EngineError, HostError, LifecycleError, NetworkError, StoreError};
pub use generation::GenerationNamer;
pub use host::{LocalHost, WorkerHost};
pub use http::{Request, RequestMode, Response, ResponseKind, ResponseSource};
pub use lifecycle::{ActivationReport, ControlMessage, LifecycleManager};
pub use options::{EngineOptions, HttpOptions};

// Re-export network utilities
pub use network::{Fetcher, HttpFetcher, create_client};

// Re-export storage backends
pub use store::{CacheStorage, FileStorage, MemoryStorage, TieredStorage};

pub use router::{Route, StrategyRouter};
pub use strategy::{CacheFirst, CacheStrategy, NetworkFirst, NetworkOnly, StrategyKind};
