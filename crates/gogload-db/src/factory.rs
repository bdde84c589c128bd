//! Composition utilities for building the engine's stores with `SQLite` backends.
//!
//! This module is focused purely on construction and should not contain any
//! domain logic.

use sqlx::SqlitePool;
use std::path::Path;
use std::sync::Arc;

use gogload_core::Stores;

use crate::repositories::{SqliteDownloadStateRepository, SqliteSegmentStore};

/// Factory for creating repository instances with `SQLite` backends.
pub struct CoreFactory;

impl CoreFactory {
    /// Open (or create) the database at `db_path` and apply the schema.
    pub async fn create_pool(db_path: &Path) -> anyhow::Result<SqlitePool> {
        crate::setup::setup_database(db_path).await
    }

    /// Build all `SQLite` stores from a pool.
    ///
    /// Returns the `Stores` container from `gogload-core` so adapters never
    /// name a concrete repository type.
    pub fn build_stores(pool: SqlitePool) -> Stores {
        Stores {
            downloads: Arc::new(SqliteDownloadStateRepository::new(pool.clone())),
            segments: Arc::new(SqliteSegmentStore::new(pool)),
        }
    }
}

/// Test database helper for integration tests.
///
/// Provides an in-memory `SQLite` database with the production schema applied.
#[cfg(any(test, feature = "test-utils"))]
pub struct TestDb {
    pool: SqlitePool,
}

#[cfg(any(test, feature = "test-utils"))]
impl TestDb {
    /// Create a new in-memory test database with full schema.
    pub async fn new() -> anyhow::Result<Self> {
        let pool = crate::setup::setup_test_database().await?;
        Ok(Self { pool })
    }

    /// Stores backed by this database.
    pub fn stores(&self) -> Stores {
        CoreFactory::build_stores(self.pool.clone())
    }

    /// Get a reference to the pool.
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gogload_core::{DownloadId, DownloadRecord, DownloadTarget};

    #[tokio::test]
    async fn test_stores_share_one_database() {
        let db = TestDb::new().await.unwrap();
        let stores = db.stores();
        let target = DownloadTarget::new("1", "a", "setup.exe");
        let record = DownloadRecord::pending(&target, None, 0);

        stores.downloads.upsert_download(&record).await.unwrap();
        stores
            .segments
            .create_segments(&record.id, 100, 2)
            .await
            .unwrap();

        let again = db.stores();
        assert!(again.downloads.get_download(&record.id).await.unwrap().is_some());
        assert_eq!(
            again
                .segments
                .list_segments(&DownloadId::new("1", "a"))
                .await
                .unwrap()
                .len(),
            2
        );
    }
}
