//! # Memory Storage Backend
//!
//! This module provides an in-memory cache storage using one Moka cache per
//! generation. Generations are unbounded: entries never leave a generation
//! except when the whole generation is deleted.

use moka::future::Cache as MokaCache;
use parking_lot::RwLock;
use tracing::debug;

use crate::error::StoreResult;
use crate::store::providers::CacheStorage;
use crate::store::types::{RequestKey, StoredEntry};

type Generation = MokaCache<RequestKey, StoredEntry>;

/// Memory storage backend implementation using Moka
#[derive(Default)]
pub struct MemoryStorage {
    /// Generations in creation order
    generations: RwLock<Vec<(String, Generation)>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn find(&self, generation: &str) -> Option<Generation> {
        self.generations
            .read()
            .iter()
            .find(|(name, _)| name == generation)
            .map(|(_, cache)| cache.clone())
    }

    fn open(&self, generation: &str) -> Generation {
        if let Some(cache) = self.find(generation) {
            return cache;
        }

        let mut generations = self.generations.write();
        // Another writer may have created it between the two locks
        if let Some((_, cache)) = generations.iter().find(|(name, _)| name == generation) {
            return cache.clone();
        }

        let cache: Generation = MokaCache::builder().build();
        generations.push((generation.to_string(), cache.clone()));
        debug!(generation, "Created memory cache generation");
        cache
    }
}

#[async_trait::async_trait]
impl CacheStorage for MemoryStorage {
    async fn keys(&self) -> StoreResult<Vec<String>> {
        Ok(self
            .generations
            .read()
            .iter()
            .map(|(name, _)| name.clone())
            .collect())
    }

    async fn has(&self, generation: &str) -> StoreResult<bool> {
        Ok(self.find(generation).is_some())
    }

    async fn delete(&self, generation: &str) -> StoreResult<bool> {
        let removed = {
            let mut generations = self.generations.write();
            generations
                .iter()
                .position(|(name, _)| name == generation)
                .map(|index| generations.remove(index))
        };

        match removed {
            Some((_, cache)) => {
                cache.invalidate_all();
                debug!(generation, "Deleted memory cache generation");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get(&self, generation: &str, key: &RequestKey) -> StoreResult<Option<StoredEntry>> {
        match self.find(generation) {
            Some(cache) => Ok(cache.get(key).await),
            None => Ok(None),
        }
    }

    async fn put(&self, generation: &str, key: RequestKey, entry: StoredEntry) -> StoreResult<()> {
        self.open(generation).insert(key, entry).await;
        Ok(())
    }

    async fn put_all(
        &self,
        generation: &str,
        entries: Vec<(RequestKey, StoredEntry)>,
    ) -> StoreResult<()> {
        // In-memory inserts cannot fail, so the batch is all-or-nothing already
        let cache = self.open(generation);
        for (key, entry) in entries {
            cache.insert(key, entry).await;
        }
        Ok(())
    }

    async fn len(&self, generation: &str) -> StoreResult<usize> {
        match self.find(generation) {
            Some(cache) => {
                cache.run_pending_tasks().await;
                Ok(cache.entry_count() as usize)
            }
            None => Ok(0),
        }
    }
}
