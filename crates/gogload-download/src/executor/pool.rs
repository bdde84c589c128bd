//! System-wide limit on concurrent segment transfers.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::control::TaskControl;

/// Bounded pool shared by every file of every job.
///
/// A permit is held for the duration of one transfer attempt and released
/// during retry backoff, so a sleeping segment never starves the others.
#[derive(Clone, Debug)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    pub fn new(size: u32) -> Self {
        let size = size.max(1) as usize;
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    /// Wait for a free worker. Returns `None` if the job is stopped first.
    pub async fn acquire(&self, control: &TaskControl) -> Option<OwnedSemaphorePermit> {
        tokio::select! {
            biased;

            () = control.stopped() => None,
            permit = Arc::clone(&self.permits).acquire_owned() => permit.ok(),
        }
    }

    /// Workers currently idle.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    pub const fn size(&self) -> usize {
        self.size
    }
}
