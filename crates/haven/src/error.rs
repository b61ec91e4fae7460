use reqwest::StatusCode;

/// Errors raised while talking to the network.
///
/// Strategies consume these and turn them into a fallback response, so they
/// never travel past a strategy boundary.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("Request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Network error: {0}")]
    Transport(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl NetworkError {
    /// Whether the request ran out of time, in the strategy race or the client.
    pub fn is_timeout(&self) -> bool {
        matches!(self, NetworkError::Timeout { .. })
    }
}

impl From<reqwest::Error> for NetworkError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            NetworkError::InvalidRequest(err.to_string())
        } else {
            NetworkError::Transport(err.to_string())
        }
    }
}

/// Errors raised by a cache storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to (de)serialize entry metadata: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt cache entry: {0}")]
    Corrupt(String),
}

/// Result of a cache storage operation
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors raised while obtaining the configuration document.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration fetch failed: {0}")]
    Fetch(#[from] NetworkError),

    #[error("Configuration endpoint returned status code {0}")]
    Status(StatusCode),

    #[error("Invalid configuration document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Error reported by the hosting runtime for `skip_waiting` / `claim_clients`.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct HostError(pub String);

/// Install/activate failures. These are the only fatal errors of the engine and
/// are handed back to the hosting runtime, which decides whether to retry.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("Failed to precache {url}: {source}")]
    Precache { url: String, source: NetworkError },

    #[error("Failed to precache {url}: server returned status code {status}")]
    PrecacheStatus { url: String, status: StatusCode },

    #[error("Invalid precache URL {url}: {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },

    #[error("Cache storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Host runtime error: {0}")]
    Host(#[from] HostError),
}

/// Top-level error of the engine, used by the orchestrator and hosts.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Cache storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid engine option: {0}")]
    InvalidOption(String),
}
