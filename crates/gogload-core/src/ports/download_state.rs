//! Download state repository port definition.
//!
//! This port defines the interface for persisting per-file download records,
//! batch records and the game aggregate status. Implementations handle durable
//! storage so interrupted work survives process restarts.
//!
//! # Design
//!
//! - Intent-based methods, not generic CRUD
//! - Every mutation targets one row by id; different ids may be written in parallel
//! - Batch file results are counted atomically in storage

use async_trait::async_trait;

use super::RepositoryError;
use crate::download::{
    BatchId, BatchRecord, DownloadId, DownloadRecord, DownloadStatus, GameDownloadStatus,
};

/// Port for persisting download and batch state.
///
/// Implemented by `gogload-db` and injected into the download supervisor.
#[async_trait]
pub trait DownloadStateRepositoryPort: Send + Sync {
    /// Insert a download record, or refresh the descriptive columns of an
    /// existing one (batch membership, file index, name).
    ///
    /// Progress, status and timestamps of an existing row are left untouched.
    async fn upsert_download(&self, record: &DownloadRecord) -> Result<(), RepositoryError>;

    /// Load a single download record.
    async fn get_download(&self, id: &DownloadId)
    -> Result<Option<DownloadRecord>, RepositoryError>;

    /// All file records belonging to a batch, ordered by file index.
    async fn list_batch_downloads(
        &self,
        batch_id: &BatchId,
    ) -> Result<Vec<DownloadRecord>, RepositoryError>;

    /// Standalone (non-batch) downloads that are pending, downloading or paused.
    async fn list_unfinished_downloads(&self) -> Result<Vec<DownloadRecord>, RepositoryError>;

    /// Transition a download to a new status.
    ///
    /// `Downloading` stamps the start time if unset and clears any previous error;
    /// terminal states stamp the end time. `error` is stored as the failure reason.
    async fn update_download_status(
        &self,
        id: &DownloadId,
        status: DownloadStatus,
        error: Option<&str>,
    ) -> Result<(), RepositoryError>;

    /// Record aggregate progress for a download.
    async fn update_download_progress(
        &self,
        id: &DownloadId,
        downloaded_bytes: u64,
        total_bytes: u64,
    ) -> Result<(), RepositoryError>;

    /// Store the most recently resolved URL.
    async fn update_download_url(&self, id: &DownloadId, url: &str)
    -> Result<(), RepositoryError>;

    /// Reset a terminal download for an explicit retry.
    ///
    /// Clears progress, timestamps and error, sets `Pending` and bumps `retry_count`.
    async fn reset_download(&self, id: &DownloadId) -> Result<(), RepositoryError>;

    /// Delete a download record.
    async fn remove_download(&self, id: &DownloadId) -> Result<(), RepositoryError>;

    /// Insert or replace a batch record.
    async fn upsert_batch(&self, batch: &BatchRecord) -> Result<(), RepositoryError>;

    /// Load a single batch record.
    async fn get_batch(&self, id: &BatchId) -> Result<Option<BatchRecord>, RepositoryError>;

    /// Batches that are pending, downloading or paused.
    async fn list_unfinished_batches(&self) -> Result<Vec<BatchRecord>, RepositoryError>;

    /// Transition a batch to a new status (same timestamp rules as downloads).
    async fn update_batch_status(
        &self,
        id: &BatchId,
        status: DownloadStatus,
        error: Option<&str>,
    ) -> Result<(), RepositoryError>;

    /// Atomically count one file's terminal outcome and return the updated batch.
    async fn record_batch_file_result(
        &self,
        id: &BatchId,
        succeeded: bool,
    ) -> Result<BatchRecord, RepositoryError>;

    /// Zero the completed/failed counters before a batch (re)starts.
    async fn reset_batch_progress(&self, id: &BatchId) -> Result<(), RepositoryError>;

    /// Update the game aggregate status shown by the library.
    async fn set_game_status(
        &self,
        game_id: &str,
        status: GameDownloadStatus,
    ) -> Result<(), RepositoryError>;

    /// Current game aggregate status (`NotDownloaded` if never set).
    async fn game_status(&self, game_id: &str) -> Result<GameDownloadStatus, RepositoryError>;

    /// Delete terminal downloads and batches that ended more than `older_than_days` ago.
    ///
    /// Returns the number of records removed.
    async fn prune_finished(&self, older_than_days: u32) -> Result<u32, RepositoryError>;
}
