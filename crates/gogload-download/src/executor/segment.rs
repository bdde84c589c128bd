//! Single-segment transfer with resume and retry.
//!
//! A segment streams its byte range into its own part file. Every buffered
//! chunk is written and flushed *before* the new offset is persisted, so the
//! recorded progress never runs ahead of the bytes on disk. A part file that
//! is longer than the recorded progress (crash between write and persist) is
//! truncated back before the next attempt.

use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use gogload_core::ports::StorageWriter;
use gogload_core::{DownloadError, Segment, SegmentStatus, StorageHandle};

use super::WorkerDeps;
use super::control::TaskControl;

/// Progress of one segment, relative to its own range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentProgress {
    pub index: u32,
    pub downloaded: u64,
}

/// How a segment worker ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SegmentResult {
    Completed,
    /// The job was paused, cancelled or shut down.
    Stopped,
    Failed(DownloadError),
}

enum Transfer {
    Completed,
    Stopped,
}

/// Downloads one segment, retrying transient failures with backoff.
pub struct SegmentDownloader {
    deps: WorkerDeps,
    url: String,
    part: StorageHandle,
    control: TaskControl,
    progress: mpsc::UnboundedSender<SegmentProgress>,
}

impl SegmentDownloader {
    pub fn new(
        deps: WorkerDeps,
        url: impl Into<String>,
        part: StorageHandle,
        control: TaskControl,
        progress: mpsc::UnboundedSender<SegmentProgress>,
    ) -> Self {
        Self {
            deps,
            url: url.into(),
            part,
            control,
            progress,
        }
    }

    /// Run until the segment completes, fails for good, or the job stops.
    pub async fn run(self, mut segment: Segment) -> SegmentResult {
        if segment.is_complete() {
            return match self.mark(&segment, SegmentStatus::Completed).await {
                Ok(()) => SegmentResult::Completed,
                Err(e) => SegmentResult::Failed(e),
            };
        }
        if let Err(e) = self
            .deps
            .segments
            .set_status(&segment.download_id, segment.index, SegmentStatus::Downloading)
            .await
        {
            return SegmentResult::Failed(e.into());
        }

        let max_attempts = self.deps.config.max_attempts;
        let mut attempt = 0;
        loop {
            attempt += 1;

            let Some(permit) = self.deps.pool.acquire(&self.control).await else {
                return SegmentResult::Stopped;
            };
            let result = self.transfer(&mut segment).await;
            drop(permit);

            let error = match result {
                Ok(Transfer::Completed) => {
                    debug!(
                        download_id = %segment.download_id,
                        segment = segment.index,
                        attempt,
                        "Segment complete"
                    );
                    return match self.mark(&segment, SegmentStatus::Completed).await {
                        Ok(()) => SegmentResult::Completed,
                        Err(e) => SegmentResult::Failed(e),
                    };
                }
                Ok(Transfer::Stopped) => return SegmentResult::Stopped,
                Err(_) if self.control.is_stopped() => return SegmentResult::Stopped,
                Err(e) => e,
            };

            if !error.is_transient() || attempt >= max_attempts {
                warn!(
                    download_id = %segment.download_id,
                    segment = segment.index,
                    attempt,
                    error = %error,
                    "Segment failed"
                );
                if let Err(e) = self.mark(&segment, SegmentStatus::Failed).await {
                    warn!(error = %e, "Could not record segment failure");
                }
                return SegmentResult::Failed(error);
            }

            let delay = self.deps.config.backoff_for(attempt);
            warn!(
                download_id = %segment.download_id,
                segment = segment.index,
                attempt,
                retry_in_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %error,
                "Segment attempt failed, retrying"
            );
            tokio::select! {
                biased;

                () = self.control.stopped() => return SegmentResult::Stopped,
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn mark(&self, segment: &Segment, status: SegmentStatus) -> Result<(), DownloadError> {
        self.deps
            .segments
            .set_status(&segment.download_id, segment.index, status)
            .await
            .map_err(Into::into)
    }

    /// One attempt: align the part file, request the remaining range, stream it.
    async fn transfer(&self, segment: &mut Segment) -> Result<Transfer, DownloadError> {
        let storage = &self.deps.storage;
        storage.create_file(self.part.name()).await?;

        let on_disk = storage.size(&self.part).await?.unwrap_or(0);
        if on_disk > segment.downloaded_bytes {
            debug!(part = %self.part, on_disk, recorded = segment.downloaded_bytes, "Trimming unrecorded bytes");
            storage.truncate(&self.part, segment.downloaded_bytes).await?;
        } else if on_disk < segment.downloaded_bytes {
            return Err(DownloadError::storage(format!(
                "{} holds {on_disk} bytes but {} were recorded",
                self.part, segment.downloaded_bytes
            )));
        }

        let start = segment.resume_offset();
        let end = segment.end_byte;
        let read_timeout = self.deps.config.read_timeout;
        let response = tokio::select! {
            biased;

            () = self.control.stopped() => return Ok(Transfer::Stopped),
            response = tokio::time::timeout(read_timeout, self.deps.http.get_range(&self.url, start, end)) => {
                response.map_err(|_| {
                    DownloadError::timeout(format!(
                        "no response to bytes={start}-{end} within {:.1}s",
                        read_timeout.as_secs_f64()
                    ))
                })??
            }
        };

        match response.status {
            206 => {}
            // A server ignoring Range is only usable from the very first byte
            200 if start == 0 => {}
            status => {
                return Err(DownloadError::http_status(
                    status,
                    format!("unexpected response to bytes={start}-{end}"),
                ));
            }
        }

        let mut writer = storage.open_for_write(&self.part, true).await?;
        let mut body = response.body;
        let chunk_size = self.deps.config.chunk_size;
        let mut buffer = Vec::with_capacity(chunk_size);
        let mut remaining = segment.remaining();

        let ended = loop {
            let next = tokio::select! {
                biased;

                () = self.control.stopped() => break Ok(Transfer::Stopped),
                next = tokio::time::timeout(read_timeout, body.next()) => next,
            };

            match next {
                Err(_) => {
                    break Err(DownloadError::timeout(format!(
                        "no data received for {:.1}s",
                        read_timeout.as_secs_f64()
                    )));
                }
                Ok(None) => {
                    break Err(DownloadError::network(format!(
                        "connection closed with {remaining} bytes missing"
                    )));
                }
                Ok(Some(Err(e))) => break Err(e),
                Ok(Some(Ok(chunk))) => {
                    let take = usize::try_from(remaining).map_or(chunk.len(), |r| r.min(chunk.len()));
                    buffer.extend_from_slice(&chunk[..take]);
                    remaining -= take as u64;

                    if buffer.len() >= chunk_size || remaining == 0 {
                        self.persist(&mut writer, &mut buffer, segment).await?;
                    }
                    if remaining == 0 {
                        break Ok(Transfer::Completed);
                    }
                }
            }
        };

        // Bytes that arrived intact are kept whatever ended the attempt
        self.persist(&mut writer, &mut buffer, segment).await?;
        ended
    }

    async fn persist(
        &self,
        writer: &mut StorageWriter,
        buffer: &mut Vec<u8>,
        segment: &mut Segment,
    ) -> Result<(), DownloadError> {
        if buffer.is_empty() {
            return Ok(());
        }

        writer
            .write_all(buffer)
            .await
            .map_err(|e| DownloadError::storage_io("write", &e))?;
        writer
            .flush()
            .await
            .map_err(|e| DownloadError::storage_io("flush", &e))?;

        segment.downloaded_bytes += buffer.len() as u64;
        buffer.clear();

        self.deps
            .segments
            .update_progress(&segment.download_id, segment.index, segment.downloaded_bytes)
            .await?;

        // The file task may already be gone after a stop
        let _ = self.progress.send(SegmentProgress {
            index: segment.index,
            downloaded: segment.downloaded_bytes,
        });
        Ok(())
    }
}
