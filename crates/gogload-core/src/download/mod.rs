//! Download domain types, events, and errors.
//!
//! Pure data types for the download engine. No networking or runtime
//! dependencies allowed here.
//!
//! # Structure
//!
//! - `types` - Identifiers and inbound descriptors (`DownloadId`, `JobId`, `DownloadTarget`)
//! - `segment` - Byte-range segments and the partitioning rule
//! - `records` - Persisted state (`DownloadRecord`, `BatchRecord`, statuses)
//! - `events` - Outbound events (`DownloadEvent`)
//! - `errors` - Error types for download operations

pub mod errors;
pub mod events;
pub mod records;
pub mod segment;
pub mod types;

// Re-export commonly used types
pub use errors::DownloadError;
pub use events::{DownloadEvent, ProgressSnapshot};
pub use records::{BatchRecord, DownloadRecord, DownloadStatus, GameDownloadStatus, now_ms};
pub use segment::{Segment, SegmentStatus, partition};
pub use types::{
    BatchId, DownloadId, DownloadTarget, JobId, ParseIdError, destination_name, part_name,
};
