//! Repository implementations using `SQLite`.
//!
//! These implementations encapsulate all SQL queries and database access.
//! The `SqlitePool` is confined to this module and never exposed through
//! the port trait signatures.

mod row_mappers;
mod sqlite_download_state_repository;
mod sqlite_segment_store;

pub use sqlite_download_state_repository::SqliteDownloadStateRepository;
pub use sqlite_segment_store::SqliteSegmentStore;
