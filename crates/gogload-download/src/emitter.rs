//! Broadcast-channel event emitter.

use tokio::sync::broadcast;

use gogload_core::{DownloadEvent, DownloadEventEmitterPort};

/// Fans events out to any number of subscribers.
///
/// Slow subscribers lag and skip events instead of blocking the engine.
#[derive(Clone, Debug)]
pub struct BroadcastEmitter {
    tx: broadcast::Sender<DownloadEvent>,
}

impl BroadcastEmitter {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DownloadEvent> {
        self.tx.subscribe()
    }
}

impl DownloadEventEmitterPort for BroadcastEmitter {
    fn emit(&self, event: DownloadEvent) {
        // No subscribers is fine
        let _ = self.tx.send(event);
    }
}
