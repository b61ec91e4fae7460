//! # Storage Providers
//!
//! This module contains the different cache storage implementations.

// Re-export providers for easier access
pub use self::file::FileStorage;
pub use self::memory::MemoryStorage;
pub use self::storage::CacheStorage;

// Storage interface
pub mod storage;

// Individual backend implementations
pub mod file;
pub mod memory;
