//! `SQLite` implementation of the `SegmentStorePort` trait.

use async_trait::async_trait;
use sqlx::SqlitePool;

use gogload_core::download::partition;
use gogload_core::{DownloadId, RepositoryError, Segment, SegmentStatus, SegmentStorePort};

use super::row_mappers::{SEGMENT_SELECT_COLUMNS, row_to_segment};

/// `SQLite` implementation of the `SegmentStorePort` trait.
///
/// Each segment is its own row keyed by `(download_id, segment_index)`, so
/// workers writing different segments never contend on the same row.
pub struct SqliteSegmentStore {
    pool: SqlitePool,
}

impl SqliteSegmentStore {
    /// Create a new `SQLite` segment store.
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn storage_err(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Storage(e.to_string())
}

#[async_trait]
impl SegmentStorePort for SqliteSegmentStore {
    async fn create_segments(
        &self,
        download_id: &DownloadId,
        total_size: u64,
        segment_count: u32,
    ) -> Result<Vec<Segment>, RepositoryError> {
        let id_str = download_id.to_string();
        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        let existing = sqlx::query(&format!(
            "SELECT {SEGMENT_SELECT_COLUMNS} FROM download_segments
             WHERE download_id = ? ORDER BY segment_index ASC"
        ))
        .bind(&id_str)
        .fetch_all(&mut *tx)
        .await
        .map_err(storage_err)?;

        if !existing.is_empty() {
            tracing::debug!(download_id = %download_id, "Segments already exist, reusing");
            return existing.iter().map(row_to_segment).collect();
        }

        let segments = partition(download_id, total_size, segment_count);
        for segment in &segments {
            sqlx::query(
                r#"
                INSERT INTO download_segments (
                    download_id, segment_index, start_byte, end_byte, downloaded_bytes, status
                ) VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&id_str)
            .bind(i64::from(segment.index))
            .bind(segment.start_byte as i64)
            .bind(segment.end_byte as i64)
            .bind(segment.downloaded_bytes as i64)
            .bind(segment.status.as_str())
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;
        }

        tx.commit().await.map_err(storage_err)?;

        tracing::debug!(
            download_id = %download_id,
            total_size,
            segments = segments.len(),
            "Created segments"
        );
        Ok(segments)
    }

    async fn list_segments(
        &self,
        download_id: &DownloadId,
    ) -> Result<Vec<Segment>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {SEGMENT_SELECT_COLUMNS} FROM download_segments
             WHERE download_id = ? ORDER BY segment_index ASC"
        ))
        .bind(download_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        rows.iter().map(row_to_segment).collect()
    }

    async fn update_progress(
        &self,
        download_id: &DownloadId,
        index: u32,
        downloaded_bytes: u64,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE download_segments
            SET downloaded_bytes = MAX(downloaded_bytes, MIN(?, end_byte - start_byte + 1))
            WHERE download_id = ? AND segment_index = ?
            "#,
        )
        .bind(downloaded_bytes as i64)
        .bind(download_id.to_string())
        .bind(i64::from(index))
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!(
                "Segment {index} of '{download_id}'"
            )));
        }

        Ok(())
    }

    async fn set_status(
        &self,
        download_id: &DownloadId,
        index: u32,
        status: SegmentStatus,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE download_segments SET status = ? WHERE download_id = ? AND segment_index = ?",
        )
        .bind(status.as_str())
        .bind(download_id.to_string())
        .bind(i64::from(index))
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!(
                "Segment {index} of '{download_id}'"
            )));
        }

        Ok(())
    }

    async fn delete_segments(&self, download_id: &DownloadId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM download_segments WHERE download_id = ?")
            .bind(download_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::setup_test_database;

    async fn store() -> SqliteSegmentStore {
        SqliteSegmentStore::new(setup_test_database().await.unwrap())
    }

    fn id() -> DownloadId {
        DownloadId::new("1207658924", "en1installer0")
    }

    #[tokio::test]
    async fn test_create_segments_covers_file() {
        let store = store().await;
        let segments = store.create_segments(&id(), 10 * 1024 * 1024, 4).await.unwrap();

        assert_eq!(segments.len(), 4);
        assert_eq!(segments[0].start_byte, 0);
        assert_eq!(segments[3].end_byte, 10 * 1024 * 1024 - 1);
        for pair in segments.windows(2) {
            assert_eq!(pair[0].end_byte + 1, pair[1].start_byte);
        }

        let listed = store.list_segments(&id()).await.unwrap();
        assert_eq!(listed, segments);
    }

    #[tokio::test]
    async fn test_create_segments_is_idempotent() {
        let store = store().await;
        let first = store.create_segments(&id(), 1000, 4).await.unwrap();
        store.update_progress(&id(), 1, 100).await.unwrap();

        // Different parameters must not resize existing segments
        let second = store.create_segments(&id(), 5000, 8).await.unwrap();
        assert_eq!(second.len(), first.len());
        assert_eq!(second[3].end_byte, 999);
        assert_eq!(second[1].downloaded_bytes, 100);
    }

    #[tokio::test]
    async fn test_update_progress_is_monotonic_and_clamped() {
        let store = store().await;
        let segments = store.create_segments(&id(), 1000, 4).await.unwrap();
        let len = segments[0].range_len();

        store.update_progress(&id(), 0, 100).await.unwrap();
        store.update_progress(&id(), 0, 50).await.unwrap();
        let after_regress = store.list_segments(&id()).await.unwrap();
        assert_eq!(after_regress[0].downloaded_bytes, 100);

        store.update_progress(&id(), 0, len + 500).await.unwrap();
        let after_overflow = store.list_segments(&id()).await.unwrap();
        assert_eq!(after_overflow[0].downloaded_bytes, len);
        assert!(after_overflow[0].is_complete());
    }

    #[tokio::test]
    async fn test_resume_offset_follows_persisted_progress() {
        let store = store().await;
        store.create_segments(&id(), 1000, 4).await.unwrap();
        store.update_progress(&id(), 2, 70).await.unwrap();

        let segments = store.list_segments(&id()).await.unwrap();
        assert_eq!(segments[2].resume_offset(), segments[2].start_byte + 70);
    }

    #[tokio::test]
    async fn test_set_status_and_delete() {
        let store = store().await;
        store.create_segments(&id(), 1000, 2).await.unwrap();
        store
            .set_status(&id(), 1, SegmentStatus::Failed)
            .await
            .unwrap();

        let segments = store.list_segments(&id()).await.unwrap();
        assert_eq!(segments[0].status, SegmentStatus::Pending);
        assert_eq!(segments[1].status, SegmentStatus::Failed);

        store.delete_segments(&id()).await.unwrap();
        assert!(store.list_segments(&id()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_segment_is_not_found() {
        let store = store().await;
        let result = store.update_progress(&id(), 0, 10).await;
        assert!(matches!(result, Err(RepositoryError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_concurrent_updates_on_different_segments() {
        let store = std::sync::Arc::new(store().await);
        store.create_segments(&id(), 4000, 4).await.unwrap();

        let mut handles = Vec::new();
        for index in 0..4u32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                for step in 1..=10u64 {
                    store.update_progress(&id(), index, step * 100).await.unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let segments = store.list_segments(&id()).await.unwrap();
        assert!(segments.iter().all(Segment::is_complete));
    }
}
