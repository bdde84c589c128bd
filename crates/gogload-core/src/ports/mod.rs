//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define the interfaces the download engine needs from its
//! collaborators: persistence, destination storage, URL resolution and event
//! delivery. They contain no implementation details.
//!
//! # Design Rules
//!
//! - No `sqlx`, `reqwest` or filesystem types in signatures
//! - Traits are minimal and intent-based
//! - Errors are domain-specific (`RepositoryError`, `DownloadError`)

use std::sync::Arc;

use thiserror::Error;

pub mod download_event_emitter;
pub mod download_state;
pub mod segment_store;
pub mod storage;
pub mod url_resolver;

pub use download_event_emitter::DownloadEventEmitterPort;
pub use download_state::DownloadStateRepositoryPort;
pub use segment_store::SegmentStorePort;
pub use storage::{StorageHandle, StoragePort, StorageReader, StorageWriter};
pub use url_resolver::{ResolvedLink, StoredUrlResolver, UrlResolverPort};

/// Container for the persistence trait objects.
///
/// Lives in core so the engine can accept it without depending on `gogload-db`.
///
/// ```ignore
/// let stores = gogload_db::CoreFactory::build_stores(pool);
/// let supervisor = build_supervisor(SupervisorDeps { downloads: stores.downloads, ... });
/// ```
#[derive(Clone)]
pub struct Stores {
    /// Download, batch and game status records.
    pub downloads: Arc<dyn DownloadStateRepositoryPort>,
    /// Per-segment progress.
    pub segments: Arc<dyn SegmentStorePort>,
}

/// Domain-specific errors for repository operations.
///
/// Abstracts away storage implementation details (`SQLite` errors, etc.)
/// and provides a clean interface for the engine to handle failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RepositoryError {
    /// The requested entity was not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// An entity with the same identifier already exists.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Storage backend error (database, filesystem, etc.).
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A constraint was violated (e.g., foreign key, unique constraint).
    #[error("Constraint violation: {0}")]
    Constraint(String),
}
