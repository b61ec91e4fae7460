//! # Cache Storage
//!
//! This module defines the storage trait that all cache backends must follow.
//! Storage is partitioned into named generations; each generation maps a
//! request key to at most one stored response.

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::store::types::{RequestKey, StoredEntry};

/// A generation-partitioned, keyed-by-request store
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Names of all existing generations
    async fn keys(&self) -> StoreResult<Vec<String>>;

    /// Check if a generation exists
    async fn has(&self, generation: &str) -> StoreResult<bool>;

    /// Delete a whole generation. Returns whether it existed.
    async fn delete(&self, generation: &str) -> StoreResult<bool>;

    /// Exact-key lookup inside one generation
    async fn get(&self, generation: &str, key: &RequestKey) -> StoreResult<Option<StoredEntry>>;

    /// Store an entry, creating the generation on first write and
    /// overwriting any previous entry for the same key
    async fn put(&self, generation: &str, key: RequestKey, entry: StoredEntry) -> StoreResult<()>;

    /// Store several entries; either all of them are written or none are
    async fn put_all(
        &self,
        generation: &str,
        entries: Vec<(RequestKey, StoredEntry)>,
    ) -> StoreResult<()>;

    /// Number of entries in a generation (zero if it does not exist)
    async fn len(&self, generation: &str) -> StoreResult<usize>;

    /// Look the key up in every generation, in the order `keys` returns them
    async fn match_any(&self, key: &RequestKey) -> StoreResult<Option<StoredEntry>> {
        for generation in self.keys().await? {
            if let Some(entry) = self.get(&generation, key).await? {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }
}
