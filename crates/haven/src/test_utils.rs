//! # Test Utilities
//!
//! Scripted network and instrumented storage doubles shared by the unit tests.
//! The fetcher answers by request path so tests can take the network down,
//! slow it down or make it hang without a live server.

use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use tracing_subscriber::fmt::MakeWriter;
use url::Url;

use crate::error::{NetworkError, StoreError, StoreResult};
use crate::http::{Request, Response};
use crate::network::Fetcher;
use crate::store::{CacheStorage, MemoryStorage, RequestKey, StoredEntry};

pub const ORIGIN: &str = "http://localhost:3000";

/// Initialize tracing for tests with appropriate settings
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn origin() -> Url {
    Url::parse(ORIGIN).unwrap()
}

pub fn url(path: &str) -> Url {
    origin().join(path).unwrap()
}

pub fn get(path: &str) -> Request {
    Request::get(url(path))
}

pub fn navigate(path: &str) -> Request {
    Request::navigate(url(path))
}

pub fn ok(body: &'static str) -> Response {
    Response::new(StatusCode::OK, body)
}

pub fn html(body: &'static str) -> Response {
    ok(body).with_header(CONTENT_TYPE, "text/html")
}

/// What the scripted network does for one path
#[derive(Debug, Clone)]
pub enum Script {
    Respond(Response),
    Fail,
    Delay(Duration, Response),
    /// Never resolves; counts a cancellation when the call is dropped
    Hang,
}

/// Increments the counter when the in-flight call is dropped
struct CancelGuard(Arc<AtomicUsize>);

impl Drop for CancelGuard {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// A [`Fetcher`] answering from per-path scripts. Unscripted paths fail like
/// a refused connection.
#[derive(Default)]
pub struct ScriptedFetcher {
    scripts: Mutex<HashMap<String, Script>>,
    calls: Mutex<Vec<String>>,
    cancelled: Arc<AtomicUsize>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, path: &str, response: Response) -> Self {
        self.set(path, Script::Respond(response));
        self
    }

    pub fn fail(self, path: &str) -> Self {
        self.set(path, Script::Fail);
        self
    }

    pub fn delay(self, path: &str, delay: Duration, response: Response) -> Self {
        self.set(path, Script::Delay(delay, response));
        self
    }

    pub fn hang(self, path: &str) -> Self {
        self.set(path, Script::Hang);
        self
    }

    /// Change the script of a path after construction
    pub fn set(&self, path: &str, script: Script) {
        self.scripts.lock().insert(path.to_owned(), script);
    }

    /// Total number of fetches started
    pub fn calls(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn calls_to(&self, path: &str) -> usize {
        self.calls.lock().iter().filter(|p| *p == path).count()
    }

    /// Number of hanging fetches that were dropped before completing
    pub fn cancelled(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, NetworkError> {
        let path = request.path().to_owned();
        self.calls.lock().push(path.clone());
        let script = self.scripts.lock().get(&path).cloned();

        match script {
            Some(Script::Respond(response)) => Ok(response),
            Some(Script::Delay(delay, response)) => {
                tokio::time::sleep(delay).await;
                Ok(response)
            }
            Some(Script::Hang) => {
                let _guard = CancelGuard(self.cancelled.clone());
                futures::future::pending::<()>().await;
                unreachable!()
            }
            Some(Script::Fail) | None => {
                Err(NetworkError::Transport("connection refused".to_owned()))
            }
        }
    }
}

/// Memory storage that counts writes and can be told to fail
#[derive(Default)]
pub struct RecordingStorage {
    inner: MemoryStorage,
    puts: AtomicUsize,
    fail_writes: Mutex<bool>,
    fail_reads: Mutex<bool>,
    fail_deletes: Mutex<Vec<String>>,
}

impl RecordingStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of write calls that reached the storage
    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn fail_writes(&self, fail: bool) {
        *self.fail_writes.lock() = fail;
    }

    pub fn fail_reads(&self, fail: bool) {
        *self.fail_reads.lock() = fail;
    }

    pub fn fail_delete_of(&self, generation: &str) {
        self.fail_deletes.lock().push(generation.to_owned());
    }

    fn write_guard(&self) -> StoreResult<()> {
        if *self.fail_writes.lock() {
            return Err(StoreError::Io(io::Error::other("disk full")));
        }
        Ok(())
    }
}

#[async_trait]
impl CacheStorage for RecordingStorage {
    async fn keys(&self) -> StoreResult<Vec<String>> {
        self.inner.keys().await
    }

    async fn has(&self, generation: &str) -> StoreResult<bool> {
        self.inner.has(generation).await
    }

    async fn delete(&self, generation: &str) -> StoreResult<bool> {
        if self.fail_deletes.lock().iter().any(|g| g == generation) {
            return Err(StoreError::Io(io::Error::other("permission denied")));
        }
        self.inner.delete(generation).await
    }

    async fn get(&self, generation: &str, key: &RequestKey) -> StoreResult<Option<StoredEntry>> {
        if *self.fail_reads.lock() {
            return Err(StoreError::Io(io::Error::other("read failed")));
        }
        self.inner.get(generation, key).await
    }

    async fn put(&self, generation: &str, key: RequestKey, entry: StoredEntry) -> StoreResult<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.write_guard()?;
        self.inner.put(generation, key, entry).await
    }

    async fn put_all(
        &self,
        generation: &str,
        entries: Vec<(RequestKey, StoredEntry)>,
    ) -> StoreResult<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.write_guard()?;
        self.inner.put_all(generation, entries).await
    }

    async fn len(&self, generation: &str) -> StoreResult<usize> {
        self.inner.len(generation).await
    }
}

/// Collects formatted log output so tests can assert on emitted events
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }

    /// A subscriber writing into this capture
    pub fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync + 'static {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(self.clone())
            .finish()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCapture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
