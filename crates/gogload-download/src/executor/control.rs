//! Cooperative stop signalling for running jobs.
//!
//! A [`TaskControl`] wraps a `CancellationToken` and remembers *why* the job
//! was asked to stop, so the task that observes the signal knows whether to
//! keep its partial data (pause, shutdown) or discard it (cancel).

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use tokio_util::sync::CancellationToken;

/// Why a running job was asked to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StopReason {
    /// User or connectivity pause: keep segments and part files.
    Pause = 1,
    /// User cancel: discard everything.
    Cancel = 2,
    /// Process shutdown: leave the record as it is so the next start resumes it.
    Shutdown = 3,
}

impl StopReason {
    const fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Pause),
            2 => Some(Self::Cancel),
            3 => Some(Self::Shutdown),
            _ => None,
        }
    }
}

const NOT_STOPPED: u8 = 0;

/// Stop handle shared by a job and everything it spawns.
#[derive(Clone, Debug)]
pub struct TaskControl {
    token: CancellationToken,
    reason: Arc<AtomicU8>,
    parent: Option<Box<TaskControl>>,
}

impl Default for TaskControl {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskControl {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            reason: Arc::new(AtomicU8::new(NOT_STOPPED)),
            parent: None,
        }
    }

    /// A control that stops when this one does, but can also be stopped alone.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            reason: Arc::new(AtomicU8::new(NOT_STOPPED)),
            parent: Some(Box::new(self.clone())),
        }
    }

    pub fn pause(&self) {
        self.stop(StopReason::Pause);
    }

    pub fn cancel(&self) {
        self.stop(StopReason::Cancel);
    }

    pub fn shutdown(&self) {
        self.stop(StopReason::Shutdown);
    }

    /// Signal a stop. The first reason wins, except that a cancel overrides anything.
    pub fn stop(&self, reason: StopReason) {
        let new = reason as u8;
        let _ = self
            .reason
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                (current == NOT_STOPPED || reason == StopReason::Cancel).then_some(new)
            });
        self.token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once a stop has been signalled here or on any ancestor.
    pub async fn stopped(&self) {
        self.token.cancelled().await;
    }

    /// The effective stop reason, falling back to the ancestors' reason.
    pub fn reason(&self) -> Option<StopReason> {
        StopReason::from_u8(self.reason.load(Ordering::SeqCst))
            .or_else(|| self.parent.as_ref().and_then(|p| p.reason()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_control_is_running() {
        let control = TaskControl::new();
        assert!(!control.is_stopped());
        assert_eq!(control.reason(), None);
    }

    #[test]
    fn first_reason_wins() {
        let control = TaskControl::new();
        control.pause();
        control.shutdown();
        assert_eq!(control.reason(), Some(StopReason::Pause));
    }

    #[test]
    fn cancel_upgrades_a_pause() {
        let control = TaskControl::new();
        control.pause();
        control.cancel();
        assert_eq!(control.reason(), Some(StopReason::Cancel));

        control.pause();
        assert_eq!(control.reason(), Some(StopReason::Cancel));
    }

    #[tokio::test]
    async fn child_inherits_parent_signal_and_reason() {
        let parent = TaskControl::new();
        let child = parent.child();

        parent.cancel();
        child.stopped().await;
        assert!(child.is_stopped());
        assert_eq!(child.reason(), Some(StopReason::Cancel));
    }

    #[test]
    fn child_can_stop_alone() {
        let parent = TaskControl::new();
        let child = parent.child();

        child.pause();
        assert!(child.is_stopped());
        assert!(!parent.is_stopped());
        assert_eq!(parent.reason(), None);
    }
}
