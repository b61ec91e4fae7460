//! # Worker Configuration
//!
//! The configuration document tells the engine which cache groups exist, which
//! strategy serves each of them and how long to wait for the network. It is
//! served by the origin at [`CONFIG_PATH`]; when that fails the embedded
//! defaults are used instead, so a worker always has a routing table.

mod defaults;
mod document;
mod loader;

pub use document::{CacheGroupSpec, CacheGroups, ConfigDocument, NetworkSettings};
pub use loader::ConfigLoader;

/// Well-known path of the configuration endpoint
pub const CONFIG_PATH: &str = "/api/pwa/config";

/// Version assumed when a document does not carry one
pub const DEFAULT_VERSION: &str = "v1";

/// Network timeout used when neither the group nor the document sets one
pub const DEFAULT_TIMEOUT_MS: u64 = 3000;

/// Max-age used when a group does not set one (24 hours)
pub const DEFAULT_MAX_AGE_SECS: u64 = 86400;
