//! Messages flowing from running tasks back to their owner.

use gogload_core::{BatchId, DownloadError, DownloadId, DownloadStatus, ProgressSnapshot, StorageHandle};

use super::control::StopReason;

/// Internal progress and completion messages.
///
/// Tasks never talk to the event emitter themselves; the supervisor turns
/// these into outbound `DownloadEvent`s.
#[derive(Debug, Clone)]
pub enum TaskEvent {
    /// Byte-level progress of one file.
    FileProgress {
        download_id: DownloadId,
        file_index: u32,
        downloaded: u64,
        total: u64,
        speed_bps: f64,
        /// Seconds left at the current speed, 0 when unknown.
        eta_seconds: f64,
    },
    /// Aggregated progress of a batch.
    BatchProgress {
        batch_id: BatchId,
        snapshot: ProgressSnapshot,
    },
    /// A file of a batch reached a terminal state.
    FileFinished {
        download_id: DownloadId,
        file_index: u32,
        file_name: String,
        status: DownloadStatus,
        error: Option<String>,
    },
}

/// How a single file download ended.
#[derive(Debug, Clone, PartialEq)]
pub enum FileOutcome {
    Completed { destination: StorageHandle },
    Failed(DownloadError),
    Paused,
    Cancelled,
    /// Stopped by shutdown; the record is left untouched for the next start.
    Interrupted,
}

impl FileOutcome {
    pub(crate) const fn from_stop(reason: Option<StopReason>) -> Self {
        match reason {
            Some(StopReason::Pause) => Self::Paused,
            Some(StopReason::Cancel) => Self::Cancelled,
            Some(StopReason::Shutdown) | None => Self::Interrupted,
        }
    }

    pub const fn status(&self) -> DownloadStatus {
        match self {
            Self::Completed { .. } => DownloadStatus::Completed,
            Self::Failed(_) => DownloadStatus::Failed,
            Self::Paused => DownloadStatus::Paused,
            Self::Cancelled => DownloadStatus::Cancelled,
            Self::Interrupted => DownloadStatus::Downloading,
        }
    }

    pub fn error(&self) -> Option<String> {
        match self {
            Self::Failed(e) => Some(e.to_string()),
            _ => None,
        }
    }
}

/// How a batch ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    Completed,
    /// At least one file failed; the message reads `"2/3 files completed"`.
    Failed(String),
    Paused,
    Cancelled,
    Interrupted,
}

impl BatchOutcome {
    pub(crate) const fn from_stop(reason: Option<StopReason>) -> Self {
        match reason {
            Some(StopReason::Pause) => Self::Paused,
            Some(StopReason::Cancel) => Self::Cancelled,
            Some(StopReason::Shutdown) | None => Self::Interrupted,
        }
    }

    pub const fn status(&self) -> DownloadStatus {
        match self {
            Self::Completed => DownloadStatus::Completed,
            Self::Failed(_) => DownloadStatus::Failed,
            Self::Paused => DownloadStatus::Paused,
            Self::Cancelled => DownloadStatus::Cancelled,
            Self::Interrupted => DownloadStatus::Downloading,
        }
    }

    pub fn message(&self) -> Option<String> {
        match self {
            Self::Failed(message) => Some(message.clone()),
            _ => None,
        }
    }
}
