//! Task execution: segments, files and batches.
//!
//! Everything here runs inside tasks spawned by the supervisor. Tasks operate
//! on value types and cloned `Arc` dependencies ([`WorkerDeps`]) and report
//! back through channels only.
//!
//! ```text
//! BatchTask ──spawns──▶ FileTask ──spawns──▶ SegmentDownloader (× segment_count)
//!     │                     │                         │
//!     ▼                     ▼                         ▼
//!  TaskEvent            TaskEvent               SegmentProgress
//! ```

mod batch_task;
mod batch_tracker;
mod control;
mod events;
mod file_task;
mod pool;
mod segment;

#[cfg(test)]
pub(crate) mod testkit;

use std::sync::Arc;

use gogload_core::{
    DownloadStateRepositoryPort, EngineConfig, SegmentStorePort, StoragePort, UrlResolverPort,
};

use crate::http::HttpBackend;

pub use batch_task::BatchTask;
pub use batch_tracker::BatchTracker;
pub use control::{StopReason, TaskControl};
pub use events::{BatchOutcome, FileOutcome, TaskEvent};
pub use file_task::{FileTask, discard_partial};
pub use pool::WorkerPool;
pub use segment::{SegmentDownloader, SegmentProgress, SegmentResult};

/// Dependencies shared by every task.
///
/// These are cloned Arc references to ports, so tasks run independently of
/// the supervisor's registry.
#[derive(Clone)]
pub struct WorkerDeps {
    pub downloads: Arc<dyn DownloadStateRepositoryPort>,
    pub segments: Arc<dyn SegmentStorePort>,
    pub storage: Arc<dyn StoragePort>,
    pub http: Arc<dyn HttpBackend>,
    pub resolver: Arc<dyn UrlResolverPort>,
    pub pool: WorkerPool,
    pub config: EngineConfig,
}
