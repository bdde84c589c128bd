//! Download event emitter port.
//!
//! This port abstracts event delivery so the supervisor can publish progress
//! and status changes without coupling to a transport (channel, UI bridge,
//! notification layer).

use crate::download::DownloadEvent;

/// Port for emitting download events.
///
/// Implementations must not block; buffer or drop instead.
pub trait DownloadEventEmitterPort: Send + Sync {
    /// Emit a download event.
    fn emit(&self, event: DownloadEvent);
}
