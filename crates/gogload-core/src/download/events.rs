//! Download events - discriminated union for everything listeners observe.

use serde::{Deserialize, Serialize};

use super::records::{DownloadStatus, GameDownloadStatus};

/// Single discriminated union for all outbound download events.
///
/// Serialized with a `type` tag so UI layers can switch on it:
///
/// ```json
/// { "type": "progress", "job_id": "batch:42", "bytes_downloaded": 1024, ... }
/// { "type": "status_changed", "job_id": "batch:42", "status": "paused", ... }
/// { "type": "file_finished", "job_id": "batch:42", "download_id": "42:setup", ... }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DownloadEvent {
    /// Progress tick for a single download or a whole batch.
    Progress {
        /// Job the tick belongs to (`download:...` or `batch:...`).
        job_id: String,
        /// Game being downloaded.
        game_id: String,
        /// Bytes downloaded so far (aggregate for batches).
        bytes_downloaded: u64,
        /// Total bytes (aggregate for batches).
        total_bytes: u64,
        /// Current speed in bytes per second.
        speed_bps: f64,
        /// Estimated time remaining in seconds.
        eta_seconds: f64,
        /// File that caused this tick (0-based).
        current_file_index: u32,
        /// Number of files in the job.
        total_files: u32,
        /// Progress percentage (0.0 - 100.0).
        percentage: f64,
    },

    /// A job moved to a new lifecycle state.
    StatusChanged {
        /// Job that changed.
        job_id: String,
        /// Game being downloaded.
        game_id: String,
        /// New job status.
        status: DownloadStatus,
        /// Game status after this transition.
        game_status: GameDownloadStatus,
        /// Failure reason or summary, if any.
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// One file of a batch reached a terminal outcome.
    FileFinished {
        /// Batch job the file belongs to.
        job_id: String,
        /// Game being downloaded.
        game_id: String,
        /// Canonical ID of the file download.
        download_id: String,
        /// Position of the file in the batch.
        file_index: u32,
        /// File name.
        file_name: String,
        /// Terminal status of the file.
        status: DownloadStatus,
        /// Failure reason, if any.
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

/// Raw numbers for a progress tick, before the percentage is derived.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ProgressSnapshot {
    /// Bytes downloaded so far.
    pub bytes_downloaded: u64,
    /// Total bytes.
    pub total_bytes: u64,
    /// Current speed in bytes per second.
    pub speed_bps: f64,
    /// Seconds left at the current speed, 0 when unknown.
    pub eta_seconds: f64,
    /// File that caused this tick.
    pub current_file_index: u32,
    /// Number of files in the job.
    pub total_files: u32,
}

impl DownloadEvent {
    /// Create a progress event, deriving the percentage.
    #[allow(clippy::cast_precision_loss)]
    pub fn progress(
        job_id: impl Into<String>,
        game_id: impl Into<String>,
        snapshot: ProgressSnapshot,
    ) -> Self {
        let ProgressSnapshot {
            bytes_downloaded,
            total_bytes,
            speed_bps,
            eta_seconds,
            current_file_index,
            total_files,
        } = snapshot;

        let percentage = if total_bytes > 0 {
            (bytes_downloaded as f64 / total_bytes as f64) * 100.0
        } else {
            0.0
        };

        Self::Progress {
            job_id: job_id.into(),
            game_id: game_id.into(),
            bytes_downloaded,
            total_bytes,
            speed_bps,
            eta_seconds,
            current_file_index,
            total_files,
            percentage,
        }
    }

    /// Create a status change event.
    pub fn status_changed(
        job_id: impl Into<String>,
        game_id: impl Into<String>,
        status: DownloadStatus,
        message: Option<String>,
    ) -> Self {
        Self::StatusChanged {
            job_id: job_id.into(),
            game_id: game_id.into(),
            status,
            game_status: status.game_status(),
            message,
        }
    }

    /// Get the job ID from any event type.
    #[must_use]
    pub fn job_id(&self) -> &str {
        match self {
            Self::Progress { job_id, .. }
            | Self::StatusChanged { job_id, .. }
            | Self::FileFinished { job_id, .. } => job_id,
        }
    }

    /// The new status if this is a status change.
    #[must_use]
    pub const fn status(&self) -> Option<DownloadStatus> {
        match self {
            Self::StatusChanged { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Get the event name for wire protocols.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::Progress { .. } => "download:progress",
            Self::StatusChanged { .. } => "download:status",
            Self::FileFinished { .. } => "download:file_finished",
        }
    }
}
