//! # Tiered Storage
//!
//! This module provides a storage that coordinates between memory and file
//! backends: the file backend is authoritative, the memory backend serves
//! repeated reads. Writes and read promotions are serialized so both tiers
//! agree on the last writer.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::StoreResult;
use crate::store::providers::{CacheStorage, FileStorage, MemoryStorage};
use crate::store::types::{RequestKey, StoredEntry};

/// Storage handling both memory and file caching
#[derive(Clone)]
pub struct TieredStorage {
    memory: Arc<MemoryStorage>,
    file: Arc<FileStorage>,
    write_lock: Arc<Mutex<()>>,
}

impl TieredStorage {
    /// Create a tiered storage persisting under `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            memory: Arc::new(MemoryStorage::new()),
            file: Arc::new(FileStorage::new(root)),
            write_lock: Arc::new(Mutex::new(())),
        }
    }
}

#[async_trait]
impl CacheStorage for TieredStorage {
    async fn keys(&self) -> StoreResult<Vec<String>> {
        self.file.keys().await
    }

    async fn has(&self, generation: &str) -> StoreResult<bool> {
        self.file.has(generation).await
    }

    async fn delete(&self, generation: &str) -> StoreResult<bool> {
        let _guard = self.write_lock.lock().await;
        // Drop the memory copy even if the file removal fails, so reads
        // never outlive the authoritative data
        let _ = self.memory.delete(generation).await;
        self.file.delete(generation).await
    }

    async fn get(&self, generation: &str, key: &RequestKey) -> StoreResult<Option<StoredEntry>> {
        // Check memory first
        if let Some(entry) = self.memory.get(generation, key).await? {
            return Ok(Some(entry));
        }

        // A write between the file read and the promotion would leave the
        // memory tier behind
        let _guard = self.write_lock.lock().await;
        if let Some(entry) = self.file.get(generation, key).await? {
            // Store in memory for faster access next time
            let _ = self
                .memory
                .put(generation, key.clone(), entry.clone())
                .await;
            return Ok(Some(entry));
        }

        Ok(None)
    }

    async fn put(&self, generation: &str, key: RequestKey, entry: StoredEntry) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        self.file.put(generation, key.clone(), entry.clone()).await?;
        self.memory.put(generation, key, entry).await
    }

    async fn put_all(
        &self,
        generation: &str,
        entries: Vec<(RequestKey, StoredEntry)>,
    ) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        self.file.put_all(generation, entries.clone()).await?;
        self.memory.put_all(generation, entries).await
    }

    async fn len(&self, generation: &str) -> StoreResult<usize> {
        self.file.len(generation).await
    }
}
