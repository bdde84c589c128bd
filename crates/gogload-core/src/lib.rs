#![doc = include_str!("../README.md")]

pub mod config;
pub mod download;
pub mod paths;
pub mod ports;

// Re-export commonly used types for convenience
pub use config::{ConfigError, EngineConfig};
pub use download::{
    BatchId, BatchRecord, DownloadError, DownloadEvent, DownloadId, DownloadRecord,
    DownloadStatus, DownloadTarget, GameDownloadStatus, JobId, ParseIdError,
    ProgressSnapshot, Segment, SegmentStatus, destination_name, part_name, partition,
};
pub use paths::{PathError, data_root, database_path, default_download_dir};
pub use ports::{
    DownloadEventEmitterPort, DownloadStateRepositoryPort, RepositoryError,
    ResolvedLink, SegmentStorePort, StorageHandle, StoragePort, Stores, StoredUrlResolver,
    UrlResolverPort,
};
