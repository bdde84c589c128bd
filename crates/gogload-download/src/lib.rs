#![doc = include_str!("../README.md")]

// Re-export core types for convenience
pub use gogload_core::{
    BatchId, DownloadError, DownloadEvent, DownloadId, DownloadStatus, DownloadTarget,
    EngineConfig, JobId,
};

pub mod emitter;
pub mod executor;
pub mod http;
pub(crate) mod progress;
pub mod storage;

// Re-export speed measurement for consumers (CLI progress display)
pub use progress::SpeedMeter;

// Public API - the supervisor
mod manager;

pub use emitter::BroadcastEmitter;
pub use http::{HttpBackend, ReqwestBackend};
pub use manager::{
    DownloadSupervisor, RestoreSummary, SupervisorDeps, UnfinishedJobs, build_supervisor,
};
pub use storage::LocalStorage;
