//! The hosting runtime as seen by the lifecycle manager.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tracing::debug;

use crate::error::HostError;

/// Controls the runtime exposes to an installing or activating worker
#[async_trait]
pub trait WorkerHost: Send + Sync {
    /// Activate the new worker without waiting for old clients to close
    async fn skip_waiting(&self) -> Result<(), HostError>;

    /// Route all open clients through the active worker immediately
    async fn claim_clients(&self) -> Result<(), HostError>;
}

/// In-process host that simply records the requests it receives
#[derive(Debug, Default)]
pub struct LocalHost {
    skipped_waiting: AtomicBool,
    claimed: AtomicBool,
}

impl LocalHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn skipped_waiting(&self) -> bool {
        self.skipped_waiting.load(Ordering::SeqCst)
    }

    pub fn claimed(&self) -> bool {
        self.claimed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WorkerHost for LocalHost {
    async fn skip_waiting(&self) -> Result<(), HostError> {
        debug!("Skip waiting requested");
        self.skipped_waiting.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn claim_clients(&self) -> Result<(), HostError> {
        debug!("Claiming clients");
        self.claimed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
