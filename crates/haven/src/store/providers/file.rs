//! # File Storage Backend
//!
//! This module implements a file-based persistent cache storage. Each
//! generation is a directory named after the hex-encoded generation name;
//! each entry is one `.entry` file named after the SHA-256 of its key,
//! holding a length-prefixed JSON metadata header followed by the body.
//! Entries are written to a unique temp file and published with a single
//! rename, so a reader sees either the old entry or the new one.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use tokio::fs;
use tokio::io;
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::store::types::{EntryMetadata, RequestKey, StoredEntry};

use super::CacheStorage;

const TRASH_PREFIX: &str = ".trash-";
const ENTRY_EXTENSION: &str = "entry";
const HEADER_LEN: usize = 4;

#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
    initialized: Arc<AtomicBool>,
}

impl FileStorage {
    /// Create a new file storage rooted at the specified directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            initialized: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Initialize the root directory
    pub(crate) async fn ensure_initialized(&self) -> io::Result<()> {
        // Fast path - already initialized
        if self.initialized.load(Ordering::Acquire) {
            return Ok(());
        }

        fs::create_dir_all(&self.root).await?;
        self.initialized.store(true, Ordering::Release);
        Ok(())
    }

    fn generation_dir(&self, generation: &str) -> PathBuf {
        self.root.join(hex::encode(generation))
    }

    /// Get the path of a stored entry
    fn entry_path(&self, generation: &str, key: &RequestKey) -> PathBuf {
        self.generation_dir(generation)
            .join(format!("{}.{ENTRY_EXTENSION}", key.to_filename()))
    }

    async fn read_raw(path: &Path) -> io::Result<Option<Vec<u8>>> {
        match fs::read(path).await {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn write_entry(
        &self,
        generation: &str,
        key: &RequestKey,
        entry: &StoredEntry,
    ) -> StoreResult<()> {
        let dir = self.generation_dir(generation);
        fs::create_dir_all(&dir).await?;

        let path = self.entry_path(generation, key);
        if let Err(e) = publish(dir, path.clone(), encode_entry(entry)?).await {
            warn!(path = ?path, error = %e, "Failed to write cache entry file");
            return Err(e.into());
        }
        Ok(())
    }

    /// Put back what a failed bulk write replaced, newest first
    async fn roll_back(
        &self,
        generation: &str,
        written: Vec<(PathBuf, Option<Vec<u8>>)>,
        created: bool,
    ) {
        let dir = self.generation_dir(generation);
        for (path, previous) in written.into_iter().rev() {
            let restored = match previous {
                Some(raw) => publish(dir.clone(), path.clone(), raw).await,
                None => fs::remove_file(&path).await,
            };
            if let Err(e) = restored {
                warn!(path = ?path, error = %e, "Failed to roll back cache entry");
            }
        }

        if created {
            // Only succeeds if nothing else wrote into the generation meanwhile
            let _ = fs::remove_dir(&dir).await;
        }
    }
}

/// Write `contents` to a fresh temp file in `dir`, then rename it over `path`
async fn publish(dir: PathBuf, path: PathBuf, contents: Vec<u8>) -> io::Result<()> {
    tokio::task::spawn_blocking(move || {
        let mut temp = tempfile::NamedTempFile::new_in(&dir)?;
        temp.write_all(&contents)?;
        temp.persist(&path).map_err(|e| e.error)?;
        Ok::<_, io::Error>(())
    })
    .await
    .map_err(io::Error::other)?
}

fn encode_entry(entry: &StoredEntry) -> StoreResult<Vec<u8>> {
    let metadata = serde_json::to_vec(&entry.metadata)?;
    let len = u32::try_from(metadata.len())
        .map_err(|_| StoreError::Corrupt(format!("metadata of {} bytes", metadata.len())))?;

    let mut out = Vec::with_capacity(HEADER_LEN + metadata.len() + entry.body.len());
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(&metadata);
    out.extend_from_slice(&entry.body);
    Ok(out)
}

fn decode_entry(raw: Vec<u8>) -> StoreResult<StoredEntry> {
    let mut raw = Bytes::from(raw);
    if raw.len() < HEADER_LEN {
        return Err(StoreError::Corrupt("truncated entry header".to_string()));
    }
    let header = raw.split_to(HEADER_LEN);
    let metadata_len = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
    if raw.len() < metadata_len {
        return Err(StoreError::Corrupt("truncated entry metadata".to_string()));
    }

    let metadata: EntryMetadata = serde_json::from_slice(&raw.split_to(metadata_len))?;
    if metadata.size != raw.len() as u64 {
        return Err(StoreError::Corrupt(format!(
            "body of {} bytes, metadata says {}",
            raw.len(),
            metadata.size
        )));
    }

    Ok(StoredEntry {
        body: raw,
        metadata,
    })
}

#[async_trait::async_trait]
impl CacheStorage for FileStorage {
    async fn keys(&self) -> StoreResult<Vec<String>> {
        self.ensure_initialized().await?;

        let mut names = Vec::new();
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let dir_name = entry.file_name();
            let Some(dir_name) = dir_name.to_str() else {
                continue;
            };
            if dir_name.starts_with(TRASH_PREFIX) {
                continue;
            }
            match hex::decode(dir_name).ok().and_then(|raw| String::from_utf8(raw).ok()) {
                Some(name) => names.push(name),
                None => debug!(dir = dir_name, "Skipping foreign directory in cache root"),
            }
        }

        // Directory order is unspecified, keep listings stable
        names.sort();
        Ok(names)
    }

    async fn has(&self, generation: &str) -> StoreResult<bool> {
        self.ensure_initialized().await?;
        Ok(fs::try_exists(self.generation_dir(generation)).await?)
    }

    async fn delete(&self, generation: &str) -> StoreResult<bool> {
        self.ensure_initialized().await?;

        let dir = self.generation_dir(generation);
        if !fs::try_exists(&dir).await? {
            return Ok(false);
        }

        // The rename makes the whole generation disappear at once; the
        // recursive removal afterwards only reclaims space
        let trash = self
            .root
            .join(format!("{TRASH_PREFIX}{}", hex::encode(generation)));
        if fs::try_exists(&trash).await? {
            fs::remove_dir_all(&trash).await?;
        }
        fs::rename(&dir, &trash).await?;

        if let Err(e) = fs::remove_dir_all(&trash).await {
            warn!(path = ?trash, error = %e, "Failed to reclaim deleted generation");
        }

        debug!(generation, "Deleted file cache generation");
        Ok(true)
    }

    async fn get(&self, generation: &str, key: &RequestKey) -> StoreResult<Option<StoredEntry>> {
        self.ensure_initialized().await?;

        let Some(raw) = Self::read_raw(&self.entry_path(generation, key)).await? else {
            return Ok(None);
        };
        let entry = decode_entry(raw)?;

        if entry.metadata.method != key.method || entry.metadata.url != key.url {
            return Err(StoreError::Corrupt(format!(
                "entry for {} {} holds {} {}",
                key.method, key.url, entry.metadata.method, entry.metadata.url
            )));
        }

        Ok(Some(entry))
    }

    async fn put(&self, generation: &str, key: RequestKey, entry: StoredEntry) -> StoreResult<()> {
        self.ensure_initialized().await?;
        self.write_entry(generation, &key, &entry).await?;
        debug!(generation, url = %key.url, "Stored entry to file");
        Ok(())
    }

    async fn put_all(
        &self,
        generation: &str,
        entries: Vec<(RequestKey, StoredEntry)>,
    ) -> StoreResult<()> {
        self.ensure_initialized().await?;

        let created = !fs::try_exists(self.generation_dir(generation)).await?;

        // Previous contents of every key written so far, for rollback
        let mut written: Vec<(PathBuf, Option<Vec<u8>>)> = Vec::with_capacity(entries.len());
        for (key, entry) in &entries {
            let path = self.entry_path(generation, key);
            let previous = match Self::read_raw(&path).await {
                Ok(previous) => previous,
                Err(e) => {
                    self.roll_back(generation, written, created).await;
                    return Err(e.into());
                }
            };

            if let Err(e) = self.write_entry(generation, key, entry).await {
                warn!(
                    generation,
                    url = %key.url,
                    rolled_back = written.len(),
                    "Bulk write failed, rolling back"
                );
                self.roll_back(generation, written, created).await;
                return Err(e);
            }
            written.push((path, previous));
        }

        debug!(generation, count = entries.len(), "Stored entries to file");
        Ok(())
    }

    async fn len(&self, generation: &str) -> StoreResult<usize> {
        self.ensure_initialized().await?;

        let dir = self.generation_dir(generation);
        if !fs::try_exists(&dir).await? {
            return Ok(0);
        }

        let mut count = 0;
        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.path().extension().is_some_and(|ext| ext == ENTRY_EXTENSION) {
                count += 1;
            }
        }
        Ok(count)
    }
}
