//! `SQLite` implementation of the `DownloadStateRepositoryPort` trait.

use async_trait::async_trait;
use sqlx::SqlitePool;

use gogload_core::download::now_ms;
use gogload_core::{
    BatchId, BatchRecord, DownloadId, DownloadRecord, DownloadStateRepositoryPort, DownloadStatus,
    GameDownloadStatus, RepositoryError,
};

use super::row_mappers::{
    BATCH_SELECT_COLUMNS, DOWNLOAD_SELECT_COLUMNS, row_to_batch, row_to_download,
};

const UNFINISHED_STATUSES: &str = "('pending', 'downloading', 'paused')";
const TERMINAL_STATUSES: &str = "('completed', 'failed', 'cancelled')";
const MS_PER_DAY: i64 = 86_400_000;

/// `SQLite` implementation of the `DownloadStateRepositoryPort` trait.
///
/// Persists download, batch and game status records for durability across restarts.
pub struct SqliteDownloadStateRepository {
    pool: SqlitePool,
}

impl SqliteDownloadStateRepository {
    /// Create a new `SQLite` download state repository.
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a reference to the underlying pool (for testing only).
    #[cfg(test)]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn storage_err(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Storage(e.to_string())
}

fn not_found(kind: &str, id: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::NotFound(format!("{kind} with ID '{id}'"))
}

/// SET clause for a status transition.
///
/// Binds `?1` status, `?2` timestamp, `?3` error text.
const fn status_update_clause(status: DownloadStatus) -> &'static str {
    match status {
        DownloadStatus::Downloading => {
            "status = ?1, start_time = COALESCE(start_time, ?2), end_time = NULL, error_message = NULL"
        }
        DownloadStatus::Completed => "status = ?1, end_time = ?2, error_message = NULL",
        DownloadStatus::Failed | DownloadStatus::Cancelled => {
            "status = ?1, end_time = ?2, error_message = ?3"
        }
        DownloadStatus::Pending | DownloadStatus::Paused => {
            "status = ?1, error_message = COALESCE(?3, error_message)"
        }
    }
}

fn status_stamp(status: DownloadStatus) -> Option<i64> {
    match status {
        DownloadStatus::Pending | DownloadStatus::Paused => None,
        _ => Some(now_ms()),
    }
}

#[async_trait]
impl DownloadStateRepositoryPort for SqliteDownloadStateRepository {
    async fn upsert_download(&self, record: &DownloadRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO downloads (
                id, game_id, link_id, batch_id, file_index, file_name, url, status,
                progress_percent, total_bytes, downloaded_bytes, start_time, end_time,
                retry_count, error_message
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                batch_id = excluded.batch_id,
                file_index = excluded.file_index,
                file_name = excluded.file_name,
                url = COALESCE(excluded.url, downloads.url),
                total_bytes = MAX(downloads.total_bytes, excluded.total_bytes)
            "#,
        )
        .bind(record.id.to_string())
        .bind(&record.game_id)
        .bind(&record.link_id)
        .bind(record.batch_id.as_ref().map(BatchId::as_str))
        .bind(i64::from(record.file_index))
        .bind(&record.file_name)
        .bind(&record.url)
        .bind(record.status.as_str())
        .bind(record.progress_percent)
        .bind(record.total_bytes as i64)
        .bind(record.downloaded_bytes as i64)
        .bind(record.start_time)
        .bind(record.end_time)
        .bind(i64::from(record.retry_count))
        .bind(&record.error_message)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(())
    }

    async fn get_download(
        &self,
        id: &DownloadId,
    ) -> Result<Option<DownloadRecord>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {DOWNLOAD_SELECT_COLUMNS} FROM downloads WHERE id = ?"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        row.as_ref().map(row_to_download).transpose()
    }

    async fn list_batch_downloads(
        &self,
        batch_id: &BatchId,
    ) -> Result<Vec<DownloadRecord>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {DOWNLOAD_SELECT_COLUMNS} FROM downloads WHERE batch_id = ? ORDER BY file_index ASC"
        ))
        .bind(batch_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        rows.iter().map(row_to_download).collect()
    }

    async fn list_unfinished_downloads(&self) -> Result<Vec<DownloadRecord>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {DOWNLOAD_SELECT_COLUMNS} FROM downloads
             WHERE batch_id IS NULL AND status IN {UNFINISHED_STATUSES}
             ORDER BY rowid ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        rows.iter().map(row_to_download).collect()
    }

    async fn update_download_status(
        &self,
        id: &DownloadId,
        status: DownloadStatus,
        error: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let id_str = id.to_string();
        let completion = if status == DownloadStatus::Completed {
            ", progress_percent = 100, downloaded_bytes = total_bytes"
        } else {
            ""
        };
        let sql = format!(
            "UPDATE downloads SET {}{completion} WHERE id = ?4",
            status_update_clause(status)
        );

        let result = sqlx::query(&sql)
            .bind(status.as_str())
            .bind(status_stamp(status))
            .bind(error)
            .bind(&id_str)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        if result.rows_affected() == 0 {
            return Err(not_found("Download", id_str));
        }

        Ok(())
    }

    async fn update_download_progress(
        &self,
        id: &DownloadId,
        downloaded_bytes: u64,
        total_bytes: u64,
    ) -> Result<(), RepositoryError> {
        let percent = if total_bytes > 0 {
            (downloaded_bytes as f64 / total_bytes as f64) * 100.0
        } else {
            0.0
        };

        sqlx::query(
            r#"
            UPDATE downloads
            SET downloaded_bytes = ?, total_bytes = ?, progress_percent = ?
            WHERE id = ?
            "#,
        )
        .bind(downloaded_bytes as i64)
        .bind(total_bytes as i64)
        .bind(percent.min(100.0))
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(())
    }

    async fn update_download_url(
        &self,
        id: &DownloadId,
        url: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE downloads SET url = ? WHERE id = ?")
            .bind(url)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        Ok(())
    }

    async fn reset_download(&self, id: &DownloadId) -> Result<(), RepositoryError> {
        let id_str = id.to_string();
        let result = sqlx::query(
            r#"
            UPDATE downloads
            SET status = 'pending', progress_percent = 0, downloaded_bytes = 0,
                start_time = NULL, end_time = NULL, error_message = NULL,
                retry_count = retry_count + 1
            WHERE id = ?
            "#,
        )
        .bind(&id_str)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        if result.rows_affected() == 0 {
            return Err(not_found("Download", id_str));
        }

        Ok(())
    }

    async fn remove_download(&self, id: &DownloadId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM downloads WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        Ok(())
    }

    async fn upsert_batch(&self, batch: &BatchRecord) -> Result<(), RepositoryError> {
        let targets_json = serde_json::to_string(&batch.targets)
            .map_err(|e| RepositoryError::Serialization(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO download_batches (
                id, game_id, total_files, completed_files, failed_files, status,
                start_time, end_time, error_message, targets_json
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                game_id = excluded.game_id,
                total_files = excluded.total_files,
                completed_files = excluded.completed_files,
                failed_files = excluded.failed_files,
                status = excluded.status,
                start_time = excluded.start_time,
                end_time = excluded.end_time,
                error_message = excluded.error_message,
                targets_json = excluded.targets_json
            "#,
        )
        .bind(batch.id.as_str())
        .bind(&batch.game_id)
        .bind(i64::from(batch.total_files))
        .bind(i64::from(batch.completed_files))
        .bind(i64::from(batch.failed_files))
        .bind(batch.status.as_str())
        .bind(batch.start_time)
        .bind(batch.end_time)
        .bind(&batch.error_message)
        .bind(&targets_json)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(())
    }

    async fn get_batch(&self, id: &BatchId) -> Result<Option<BatchRecord>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {BATCH_SELECT_COLUMNS} FROM download_batches WHERE id = ?"
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        row.as_ref().map(row_to_batch).transpose()
    }

    async fn list_unfinished_batches(&self) -> Result<Vec<BatchRecord>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {BATCH_SELECT_COLUMNS} FROM download_batches
             WHERE status IN {UNFINISHED_STATUSES}
             ORDER BY rowid ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        rows.iter().map(row_to_batch).collect()
    }

    async fn update_batch_status(
        &self,
        id: &BatchId,
        status: DownloadStatus,
        error: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let sql = format!(
            "UPDATE download_batches SET {} WHERE id = ?4",
            status_update_clause(status)
        );
        let result = sqlx::query(&sql)
            .bind(status.as_str())
            .bind(status_stamp(status))
            .bind(error)
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        if result.rows_affected() == 0 {
            return Err(not_found("Batch", id));
        }

        Ok(())
    }

    async fn record_batch_file_result(
        &self,
        id: &BatchId,
        succeeded: bool,
    ) -> Result<BatchRecord, RepositoryError> {
        // Single statement, so concurrent file results are serialized by SQLite
        let row = sqlx::query(&format!(
            "UPDATE download_batches
             SET completed_files = completed_files + 1,
                 failed_files = failed_files + ?
             WHERE id = ?
             RETURNING {BATCH_SELECT_COLUMNS}"
        ))
        .bind(i64::from(!succeeded))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        match row {
            Some(row) => row_to_batch(&row),
            None => Err(not_found("Batch", id)),
        }
    }

    async fn reset_batch_progress(&self, id: &BatchId) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE download_batches SET completed_files = 0, failed_files = 0 WHERE id = ?",
        )
        .bind(id.as_str())
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(())
    }

    async fn set_game_status(
        &self,
        game_id: &str,
        status: GameDownloadStatus,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO game_status (game_id, status, updated_at) VALUES (?, ?, ?)
            ON CONFLICT(game_id) DO UPDATE SET
                status = excluded.status,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(game_id)
        .bind(status.as_str())
        .bind(now_ms())
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(())
    }

    async fn game_status(&self, game_id: &str) -> Result<GameDownloadStatus, RepositoryError> {
        let status: Option<(String,)> =
            sqlx::query_as("SELECT status FROM game_status WHERE game_id = ?")
                .bind(game_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(storage_err)?;

        Ok(status.map_or_else(GameDownloadStatus::default, |(s,)| {
            GameDownloadStatus::parse(&s)
        }))
    }

    async fn prune_finished(&self, older_than_days: u32) -> Result<u32, RepositoryError> {
        let cutoff = now_ms() - i64::from(older_than_days) * MS_PER_DAY;
        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        sqlx::query(&format!(
            "DELETE FROM download_segments WHERE download_id IN (
                SELECT id FROM downloads
                WHERE status IN {TERMINAL_STATUSES} AND end_time < ?
            )"
        ))
        .bind(cutoff)
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?;

        let downloads = sqlx::query(&format!(
            "DELETE FROM downloads WHERE status IN {TERMINAL_STATUSES} AND end_time < ?"
        ))
        .bind(cutoff)
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?;

        let batches = sqlx::query(&format!(
            "DELETE FROM download_batches WHERE status IN {TERMINAL_STATUSES} AND end_time < ?"
        ))
        .bind(cutoff)
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?;

        tx.commit().await.map_err(storage_err)?;

        let removed = downloads.rows_affected() + batches.rows_affected();
        Ok(u32::try_from(removed).unwrap_or(u32::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::setup_test_database;
    use gogload_core::DownloadTarget;

    async fn repo() -> SqliteDownloadStateRepository {
        SqliteDownloadStateRepository::new(setup_test_database().await.unwrap())
    }

    fn target(link: &str) -> DownloadTarget {
        DownloadTarget::new("1207658924", link, format!("{link}.bin"))
            .with_url(format!("https://cdn.example/{link}"))
    }

    #[tokio::test]
    async fn test_upsert_and_get() {
        let repo = repo().await;
        let record = DownloadRecord::pending(&target("en1installer0"), None, 0);

        repo.upsert_download(&record).await.unwrap();

        let loaded = repo.get_download(&record.id).await.unwrap().unwrap();
        assert_eq!(loaded, record);
    }

    #[tokio::test]
    async fn test_upsert_keeps_progress_of_existing_row() {
        let repo = repo().await;
        let record = DownloadRecord::pending(&target("a"), None, 0);
        repo.upsert_download(&record).await.unwrap();
        repo.update_download_progress(&record.id, 40, 100).await.unwrap();
        repo.update_download_status(&record.id, DownloadStatus::Paused, None)
            .await
            .unwrap();

        let batch = BatchId::for_game("1207658924");
        repo.upsert_download(&DownloadRecord::pending(&target("a"), Some(batch.clone()), 2))
            .await
            .unwrap();

        let loaded = repo.get_download(&record.id).await.unwrap().unwrap();
        assert_eq!(loaded.downloaded_bytes, 40);
        assert_eq!(loaded.status, DownloadStatus::Paused);
        assert_eq!(loaded.batch_id, Some(batch));
        assert_eq!(loaded.file_index, 2);
    }

    #[tokio::test]
    async fn test_upsert_records_resolved_size() {
        let repo = repo().await;
        let record = DownloadRecord::pending(&target("a"), None, 0);
        repo.upsert_download(&record).await.unwrap();
        assert_eq!(repo.get_download(&record.id).await.unwrap().unwrap().total_bytes, 0);

        let mut sized = DownloadRecord::pending(&target("a"), None, 0);
        sized.total_bytes = 4096;
        repo.upsert_download(&sized).await.unwrap();
        assert_eq!(repo.get_download(&record.id).await.unwrap().unwrap().total_bytes, 4096);

        // An unsized re-registration never forgets a known size
        repo.upsert_download(&record).await.unwrap();
        assert_eq!(repo.get_download(&record.id).await.unwrap().unwrap().total_bytes, 4096);
    }

    #[tokio::test]
    async fn test_status_transitions_stamp_times() {
        let repo = repo().await;
        let record = DownloadRecord::pending(&target("a"), None, 0);
        repo.upsert_download(&record).await.unwrap();

        repo.update_download_status(&record.id, DownloadStatus::Downloading, None)
            .await
            .unwrap();
        let started = repo.get_download(&record.id).await.unwrap().unwrap();
        assert!(started.start_time.is_some());
        assert!(started.end_time.is_none());

        repo.update_download_status(&record.id, DownloadStatus::Failed, Some("HTTP 404"))
            .await
            .unwrap();
        let failed = repo.get_download(&record.id).await.unwrap().unwrap();
        assert_eq!(failed.status, DownloadStatus::Failed);
        assert_eq!(failed.error_message.as_deref(), Some("HTTP 404"));
        assert!(failed.end_time.is_some());
        assert_eq!(failed.start_time, started.start_time);
    }

    #[tokio::test]
    async fn test_completed_marks_full_progress() {
        let repo = repo().await;
        let record = DownloadRecord::pending(&target("a"), None, 0);
        repo.upsert_download(&record).await.unwrap();
        repo.update_download_progress(&record.id, 512, 1024).await.unwrap();

        repo.update_download_status(&record.id, DownloadStatus::Completed, None)
            .await
            .unwrap();

        let done = repo.get_download(&record.id).await.unwrap().unwrap();
        assert_eq!(done.downloaded_bytes, 1024);
        assert!((done.progress_percent - 100.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_update_status_missing_row_is_not_found() {
        let repo = repo().await;
        let result = repo
            .update_download_status(&DownloadId::new("1", "x"), DownloadStatus::Paused, None)
            .await;
        assert!(matches!(result, Err(RepositoryError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_unfinished_skips_batch_members_and_terminal() {
        let repo = repo().await;
        let standalone = DownloadRecord::pending(&target("a"), None, 0);
        let member = DownloadRecord::pending(&target("b"), Some(BatchId::for_game("1207658924")), 0);
        let done = DownloadRecord::pending(&target("c"), None, 0);
        for record in [&standalone, &member, &done] {
            repo.upsert_download(record).await.unwrap();
        }
        repo.update_download_status(&done.id, DownloadStatus::Completed, None)
            .await
            .unwrap();

        let unfinished = repo.list_unfinished_downloads().await.unwrap();
        assert_eq!(unfinished.len(), 1);
        assert_eq!(unfinished[0].id, standalone.id);
    }

    #[tokio::test]
    async fn test_reset_download_bumps_retry_count() {
        let repo = repo().await;
        let record = DownloadRecord::pending(&target("a"), None, 0);
        repo.upsert_download(&record).await.unwrap();
        repo.update_download_progress(&record.id, 10, 100).await.unwrap();
        repo.update_download_status(&record.id, DownloadStatus::Failed, Some("boom"))
            .await
            .unwrap();

        repo.reset_download(&record.id).await.unwrap();

        let reset = repo.get_download(&record.id).await.unwrap().unwrap();
        assert_eq!(reset.status, DownloadStatus::Pending);
        assert_eq!(reset.downloaded_bytes, 0);
        assert_eq!(reset.retry_count, 1);
        assert!(reset.error_message.is_none());
        assert!(reset.end_time.is_none());
    }

    #[tokio::test]
    async fn test_batch_round_trip_keeps_targets() {
        let repo = repo().await;
        let batch = BatchRecord::pending("1207658924", vec![target("a"), target("b")]);
        repo.upsert_batch(&batch).await.unwrap();

        let loaded = repo.get_batch(&batch.id).await.unwrap().unwrap();
        assert_eq!(loaded, batch);
        assert_eq!(repo.list_unfinished_batches().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_record_batch_file_result_counts_atomically() {
        let repo = std::sync::Arc::new(repo().await);
        let batch = BatchRecord::pending("1", vec![target("a"), target("b"), target("c")]);
        repo.upsert_batch(&batch).await.unwrap();

        let mut handles = Vec::new();
        for succeeded in [true, false, true] {
            let repo = repo.clone();
            let id = batch.id.clone();
            handles.push(tokio::spawn(async move {
                repo.record_batch_file_result(&id, succeeded).await.unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let loaded = repo.get_batch(&batch.id).await.unwrap().unwrap();
        assert_eq!(loaded.completed_files, 3);
        assert_eq!(loaded.failed_files, 1);
        assert!(loaded.all_reported());
        assert_eq!(loaded.succeeded_files(), 2);

        repo.reset_batch_progress(&batch.id).await.unwrap();
        let reset = repo.get_batch(&batch.id).await.unwrap().unwrap();
        assert_eq!(reset.completed_files, 0);
        assert_eq!(reset.failed_files, 0);
    }

    #[tokio::test]
    async fn test_record_batch_file_result_missing_batch() {
        let repo = repo().await;
        let result = repo
            .record_batch_file_result(&BatchId::for_game("404"), true)
            .await;
        assert!(matches!(result, Err(RepositoryError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_game_status_defaults_and_updates() {
        let repo = repo().await;
        assert_eq!(
            repo.game_status("1").await.unwrap(),
            GameDownloadStatus::NotDownloaded
        );

        repo.set_game_status("1", GameDownloadStatus::Downloading)
            .await
            .unwrap();
        repo.set_game_status("1", GameDownloadStatus::Downloaded)
            .await
            .unwrap();

        assert_eq!(
            repo.game_status("1").await.unwrap(),
            GameDownloadStatus::Downloaded
        );
    }

    #[tokio::test]
    async fn test_prune_finished_removes_old_terminal_records() {
        let repo = repo().await;
        let old = DownloadRecord::pending(&target("old"), None, 0);
        let active = DownloadRecord::pending(&target("active"), None, 1);
        repo.upsert_download(&old).await.unwrap();
        repo.upsert_download(&active).await.unwrap();
        repo.update_download_status(&old.id, DownloadStatus::Completed, None)
            .await
            .unwrap();

        sqlx::query("UPDATE downloads SET end_time = ? WHERE id = ?")
            .bind(now_ms() - 10 * MS_PER_DAY)
            .bind(old.id.to_string())
            .execute(repo.pool())
            .await
            .unwrap();

        assert_eq!(repo.prune_finished(30).await.unwrap(), 0);
        assert_eq!(repo.prune_finished(7).await.unwrap(), 1);
        assert!(repo.get_download(&old.id).await.unwrap().is_none());
        assert!(repo.get_download(&active.id).await.unwrap().is_some());
    }
}
