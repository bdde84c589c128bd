//! Segment store port definition.
//!
//! The segment store is the durable source of truth for per-segment progress,
//! so a process that dies mid-download loses at most the in-flight buffer.

use async_trait::async_trait;

use super::RepositoryError;
use crate::download::{DownloadId, Segment, SegmentStatus};

/// Port for persisting segment byte ranges and progress.
///
/// Safe to call concurrently from workers handling *different* segments of the
/// same download. No two workers ever touch the same segment.
#[async_trait]
pub trait SegmentStorePort: Send + Sync {
    /// Partition `[0, total_size)` into `segment_count` segments and persist them.
    ///
    /// If segments already exist for this download they are returned unchanged;
    /// segments are created once and never resized.
    async fn create_segments(
        &self,
        download_id: &DownloadId,
        total_size: u64,
        segment_count: u32,
    ) -> Result<Vec<Segment>, RepositoryError>;

    /// All segments of a download, ordered by index.
    async fn list_segments(&self, download_id: &DownloadId)
    -> Result<Vec<Segment>, RepositoryError>;

    /// Record persisted bytes for one segment.
    ///
    /// Monotonic: a smaller value than the stored one is ignored, and the value
    /// is clamped to the segment's range length.
    async fn update_progress(
        &self,
        download_id: &DownloadId,
        index: u32,
        downloaded_bytes: u64,
    ) -> Result<(), RepositoryError>;

    /// Set the status of one segment.
    async fn set_status(
        &self,
        download_id: &DownloadId,
        index: u32,
        status: SegmentStatus,
    ) -> Result<(), RepositoryError>;

    /// Delete all segment rows of a download (after assembly or cancel).
    async fn delete_segments(&self, download_id: &DownloadId) -> Result<(), RepositoryError>;
}
