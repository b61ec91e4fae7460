//! # Cache Store
//!
//! This module provides the persistent, generation-partitioned response
//! store the strategies read from and write to. Generations are created on
//! first write and only ever removed as a whole.

// Module declarations
pub mod providers;
mod tiered;
mod types;

pub use tiered::TieredStorage;
pub use types::{EntryMetadata, Freshness, RequestKey, StoredEntry};

pub use providers::{CacheStorage, FileStorage, MemoryStorage};
