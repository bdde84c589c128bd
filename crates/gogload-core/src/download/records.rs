//! Persisted per-file and per-batch state.

use serde::{Deserialize, Serialize};

use super::types::{BatchId, DownloadId, DownloadTarget, destination_name};

/// Lifecycle status of a download or batch.
///
/// `Pending → Downloading → {Paused ⇄ Downloading} → {Completed | Failed | Cancelled}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStatus {
    /// Accepted, not yet started.
    Pending,
    /// Transferring (or interrupted by process death while transferring).
    Downloading,
    /// Stopped on request; resumable.
    Paused,
    /// Completed successfully.
    Completed,
    /// Failed with an error.
    Failed,
    /// Cancelled by user.
    Cancelled,
}

impl DownloadStatus {
    /// Convert to string representation for database storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Downloading => "downloading",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse from string representation.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "downloading" => Self::Downloading,
            "paused" => Self::Paused,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            "cancelled" => Self::Cancelled,
            // "pending" or unknown values default to Pending
            _ => Self::Pending,
        }
    }

    /// Whether no further transition is possible without an explicit retry.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether `resume` may pick this record up.
    #[must_use]
    pub const fn is_resumable(&self) -> bool {
        matches!(self, Self::Pending | Self::Downloading | Self::Paused)
    }

    /// Game-level status implied by a job in this state.
    #[must_use]
    pub const fn game_status(&self) -> GameDownloadStatus {
        match self {
            Self::Pending | Self::Downloading => GameDownloadStatus::Downloading,
            Self::Paused => GameDownloadStatus::Paused,
            Self::Completed => GameDownloadStatus::Downloaded,
            Self::Failed => GameDownloadStatus::Failed,
            Self::Cancelled => GameDownloadStatus::NotDownloaded,
        }
    }
}

impl std::fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate status of a game as shown by the library.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameDownloadStatus {
    /// Nothing on disk.
    #[default]
    NotDownloaded,
    /// At least one job is transferring.
    Downloading,
    /// Work stopped, resumable.
    Paused,
    /// Installers are complete.
    Downloaded,
    /// The last job failed.
    Failed,
}

impl GameDownloadStatus {
    /// Convert to string representation for database storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NotDownloaded => "not_downloaded",
            Self::Downloading => "downloading",
            Self::Paused => "paused",
            Self::Downloaded => "downloaded",
            Self::Failed => "failed",
        }
    }

    /// Parse from string representation.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "downloading" => Self::Downloading,
            "paused" => Self::Paused,
            "downloaded" => Self::Downloaded,
            "failed" => Self::Failed,
            _ => Self::NotDownloaded,
        }
    }
}

/// Persisted state of one file download.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DownloadRecord {
    /// Canonical ID (`game_id:link_id`).
    pub id: DownloadId,
    /// Game the file belongs to.
    pub game_id: String,
    /// Link identifier within the game.
    pub link_id: String,
    /// Owning batch, if this file is part of one.
    pub batch_id: Option<BatchId>,
    /// Position within the batch (0 for standalone downloads).
    pub file_index: u32,
    /// File name of the final artifact.
    pub file_name: String,
    /// Last resolved URL.
    pub url: Option<String>,
    /// Current status.
    pub status: DownloadStatus,
    /// Progress percentage (0.0 - 100.0).
    pub progress_percent: f64,
    /// Probed total size (0 until known).
    pub total_bytes: u64,
    /// Bytes downloaded across all segments.
    pub downloaded_bytes: u64,
    /// When the download first started (milliseconds since epoch).
    pub start_time: Option<i64>,
    /// When the download reached a terminal state (milliseconds since epoch).
    pub end_time: Option<i64>,
    /// Number of explicit retries.
    pub retry_count: u32,
    /// Human-readable reason for the last failure.
    pub error_message: Option<String>,
}

impl DownloadRecord {
    /// A fresh `Pending` record for a target.
    #[must_use]
    pub fn pending(target: &DownloadTarget, batch_id: Option<BatchId>, file_index: u32) -> Self {
        Self {
            id: DownloadId::for_target(target),
            game_id: target.game_id.clone(),
            link_id: target.link_id.clone(),
            batch_id,
            file_index,
            file_name: target.file_name.clone(),
            url: target.url.clone(),
            status: DownloadStatus::Pending,
            progress_percent: 0.0,
            total_bytes: target.expected_size.unwrap_or(0),
            downloaded_bytes: 0,
            start_time: None,
            end_time: None,
            retry_count: 0,
            error_message: None,
        }
    }

    /// Rebuild the inbound descriptor this record was created from.
    #[must_use]
    pub fn target(&self) -> DownloadTarget {
        DownloadTarget {
            game_id: self.game_id.clone(),
            link_id: self.link_id.clone(),
            file_name: self.file_name.clone(),
            url: self.url.clone(),
            expected_size: (self.total_bytes > 0).then_some(self.total_bytes),
        }
    }

    /// Storage-relative path of the final artifact.
    #[must_use]
    pub fn destination_name(&self) -> String {
        destination_name(&self.game_id, &self.file_name)
    }
}

/// Persisted state of a batch (one logical game install).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BatchRecord {
    /// Batch ID.
    pub id: BatchId,
    /// Game being installed.
    pub game_id: String,
    /// Number of files in the batch.
    pub total_files: u32,
    /// Files that reached a terminal outcome in the current run.
    pub completed_files: u32,
    /// How many of the finished files failed.
    pub failed_files: u32,
    /// Current status.
    pub status: DownloadStatus,
    /// When the batch first started (milliseconds since epoch).
    pub start_time: Option<i64>,
    /// When the batch reached a terminal state (milliseconds since epoch).
    pub end_time: Option<i64>,
    /// Human-readable reason for the last failure.
    pub error_message: Option<String>,
    /// Durable file descriptions, used to rebuild the batch after a restart.
    pub targets: Vec<DownloadTarget>,
}

impl BatchRecord {
    /// A fresh `Pending` batch.
    #[must_use]
    pub fn pending(game_id: impl Into<String>, targets: Vec<DownloadTarget>) -> Self {
        let game_id = game_id.into();
        Self {
            id: BatchId::for_game(&game_id),
            total_files: u32::try_from(targets.len()).unwrap_or(u32::MAX),
            game_id,
            completed_files: 0,
            failed_files: 0,
            status: DownloadStatus::Pending,
            start_time: None,
            end_time: None,
            error_message: None,
            targets,
        }
    }

    /// Whether every file has reported a terminal outcome.
    #[must_use]
    pub const fn all_reported(&self) -> bool {
        self.completed_files >= self.total_files
    }

    /// Files that finished successfully.
    #[must_use]
    pub const fn succeeded_files(&self) -> u32 {
        self.completed_files.saturating_sub(self.failed_files)
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch.
#[must_use]
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
