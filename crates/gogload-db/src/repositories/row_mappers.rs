//! Row mapping helpers for `SQLite` queries.

use gogload_core::{
    BatchId, BatchRecord, DownloadId, DownloadRecord, DownloadStatus, DownloadTarget,
    RepositoryError, Segment, SegmentStatus,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

/// Shared SELECT column list for download queries.
pub const DOWNLOAD_SELECT_COLUMNS: &str = "id, game_id, link_id, batch_id, file_index, file_name, url, status, progress_percent, total_bytes, downloaded_bytes, start_time, end_time, retry_count, error_message";

/// Shared SELECT column list for batch queries.
pub const BATCH_SELECT_COLUMNS: &str = "id, game_id, total_files, completed_files, failed_files, status, start_time, end_time, error_message, targets_json";

/// Shared SELECT column list for segment queries.
pub const SEGMENT_SELECT_COLUMNS: &str =
    "download_id, segment_index, start_byte, end_byte, downloaded_bytes, status";

fn get<'r, T>(row: &'r SqliteRow, column: &str) -> Result<T, RepositoryError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(column)
        .map_err(|e| RepositoryError::Storage(e.to_string()))
}

fn get_u64(row: &SqliteRow, column: &str) -> Result<u64, RepositoryError> {
    let value: i64 = get(row, column)?;
    Ok(u64::try_from(value).unwrap_or(0))
}

fn get_u32(row: &SqliteRow, column: &str) -> Result<u32, RepositoryError> {
    let value: i64 = get(row, column)?;
    Ok(u32::try_from(value).unwrap_or(0))
}

fn parse_download_id(raw: &str) -> Result<DownloadId, RepositoryError> {
    raw.parse()
        .map_err(|e: gogload_core::download::ParseIdError| {
            RepositoryError::Serialization(e.to_string())
        })
}

/// Parse a database row into a `DownloadRecord`.
pub fn row_to_download(row: &SqliteRow) -> Result<DownloadRecord, RepositoryError> {
    let id_str: String = get(row, "id")?;
    let batch_id: Option<String> = get(row, "batch_id")?;
    let status_str: String = get(row, "status")?;

    Ok(DownloadRecord {
        id: parse_download_id(&id_str)?,
        game_id: get(row, "game_id")?,
        link_id: get(row, "link_id")?,
        batch_id: batch_id.map(BatchId::for_game),
        file_index: get_u32(row, "file_index")?,
        file_name: get(row, "file_name")?,
        url: get(row, "url")?,
        status: DownloadStatus::parse(&status_str),
        progress_percent: get(row, "progress_percent")?,
        total_bytes: get_u64(row, "total_bytes")?,
        downloaded_bytes: get_u64(row, "downloaded_bytes")?,
        start_time: get(row, "start_time")?,
        end_time: get(row, "end_time")?,
        retry_count: get_u32(row, "retry_count")?,
        error_message: get(row, "error_message")?,
    })
}

/// Parse a database row into a `BatchRecord`.
pub fn row_to_batch(row: &SqliteRow) -> Result<BatchRecord, RepositoryError> {
    let id_str: String = get(row, "id")?;
    let status_str: String = get(row, "status")?;
    let targets_json: String = get(row, "targets_json")?;
    let targets: Vec<DownloadTarget> = serde_json::from_str(&targets_json)
        .map_err(|e| RepositoryError::Serialization(e.to_string()))?;

    Ok(BatchRecord {
        id: BatchId::for_game(id_str),
        game_id: get(row, "game_id")?,
        total_files: get_u32(row, "total_files")?,
        completed_files: get_u32(row, "completed_files")?,
        failed_files: get_u32(row, "failed_files")?,
        status: DownloadStatus::parse(&status_str),
        start_time: get(row, "start_time")?,
        end_time: get(row, "end_time")?,
        error_message: get(row, "error_message")?,
        targets,
    })
}

/// Parse a database row into a `Segment`.
pub fn row_to_segment(row: &SqliteRow) -> Result<Segment, RepositoryError> {
    let id_str: String = get(row, "download_id")?;
    let status_str: String = get(row, "status")?;

    Ok(Segment {
        download_id: parse_download_id(&id_str)?,
        index: get_u32(row, "segment_index")?,
        start_byte: get_u64(row, "start_byte")?,
        end_byte: get_u64(row, "end_byte")?,
        downloaded_bytes: get_u64(row, "downloaded_bytes")?,
        status: SegmentStatus::parse(&status_str),
    })
}
