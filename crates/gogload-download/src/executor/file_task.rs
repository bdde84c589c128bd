//! Single-file coordination: size, segment, run, assemble.
//!
//! A file task owns the record of one file from `DOWNLOADING` to its final
//! state. It sizes the file (or reuses recorded segments), runs one
//! [`SegmentDownloader`] per segment, waits for *all* of them, and then either
//! concatenates the part files in index order or records why it could not.

use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use gogload_core::{
    DownloadError, DownloadId, DownloadRecord, DownloadStatus, StorageHandle, part_name,
};

use super::WorkerDeps;
use super::control::TaskControl;
use super::events::{FileOutcome, TaskEvent};
use super::segment::{SegmentDownloader, SegmentProgress, SegmentResult};
use crate::progress::{ProgressThrottle, SpeedMeter};

/// Delete a file's part files and segment rows.
///
/// Used on cancel and before a retry; a missing part is not an error.
pub async fn discard_partial(
    deps: &WorkerDeps,
    download_id: &DownloadId,
    destination: &str,
) -> Result<(), DownloadError> {
    let segments = deps.segments.list_segments(download_id).await?;
    for segment in &segments {
        let part = StorageHandle::new(part_name(destination, segment.index));
        deps.storage.delete(&part).await?;
    }
    deps.segments.delete_segments(download_id).await?;
    Ok(())
}

/// Running byte counts of one file.
struct FileProgress {
    by_segment: Vec<u64>,
    total: u64,
    meter: SpeedMeter,
    throttle: ProgressThrottle,
}

impl FileProgress {
    fn apply(&mut self, update: SegmentProgress) -> u64 {
        if let Some(slot) = self.by_segment.get_mut(update.index as usize) {
            *slot = (*slot).max(update.downloaded);
        }
        self.downloaded()
    }

    fn downloaded(&self) -> u64 {
        self.by_segment.iter().sum()
    }
}

/// Downloads one file of a job.
pub struct FileTask {
    deps: WorkerDeps,
    download_id: DownloadId,
    file_index: u32,
    destination: String,
    url: String,
    expected_size: Option<u64>,
    control: TaskControl,
    events: mpsc::UnboundedSender<TaskEvent>,
}

impl FileTask {
    /// Create a task for `record`, downloading from the freshly resolved `url`.
    pub fn new(
        deps: WorkerDeps,
        record: &DownloadRecord,
        url: impl Into<String>,
        control: TaskControl,
        events: mpsc::UnboundedSender<TaskEvent>,
    ) -> Self {
        Self {
            deps,
            download_id: record.id.clone(),
            file_index: record.file_index,
            destination: record.destination_name(),
            url: url.into(),
            expected_size: (record.total_bytes > 0).then_some(record.total_bytes),
            control,
            events,
        }
    }

    /// Persist the state matching a stop that happened before any work started.
    pub(crate) async fn record_stop(
        deps: &WorkerDeps,
        download_id: &DownloadId,
        destination: &str,
        control: &TaskControl,
    ) -> FileOutcome {
        let outcome = FileOutcome::from_stop(control.reason());
        let persisted = match outcome {
            FileOutcome::Paused => {
                deps.downloads
                    .update_download_status(download_id, DownloadStatus::Paused, None)
                    .await
            }
            FileOutcome::Cancelled => {
                if let Err(e) = discard_partial(deps, download_id, destination).await {
                    warn!(download_id = %download_id, error = %e, "Could not discard partial data");
                }
                deps.downloads
                    .update_download_status(download_id, DownloadStatus::Cancelled, None)
                    .await
            }
            _ => Ok(()),
        };
        if let Err(e) = persisted {
            warn!(download_id = %download_id, error = %e, "Could not persist stopped state");
        }
        outcome
    }

    /// Run the file to an outcome and persist it.
    pub async fn run(self) -> FileOutcome {
        info!(
            download_id = %self.download_id,
            destination = %self.destination,
            "File download starting"
        );

        if self.control.is_stopped() {
            return Self::record_stop(&self.deps, &self.download_id, &self.destination, &self.control)
                .await;
        }

        let outcome = match self.execute().await {
            Ok(outcome) => outcome,
            Err(e) => FileOutcome::Failed(e),
        };
        self.finish(outcome).await
    }

    async fn execute(&self) -> Result<FileOutcome, DownloadError> {
        let downloads = &self.deps.downloads;
        downloads
            .update_download_status(&self.download_id, DownloadStatus::Downloading, None)
            .await?;

        let mut segments = self.deps.segments.list_segments(&self.download_id).await?;
        let total = if let Some(last) = segments.last() {
            debug!(
                download_id = %self.download_id,
                segments = segments.len(),
                "Resuming from recorded segments"
            );
            last.end_byte + 1
        } else {
            let probe_timeout = self.deps.config.connect_timeout + self.deps.config.read_timeout;
            let probed = tokio::select! {
                biased;

                () = self.control.stopped() => {
                    return Ok(FileOutcome::from_stop(self.control.reason()));
                }
                size = tokio::time::timeout(probe_timeout, self.deps.http.content_length(&self.url)) => {
                    size.unwrap_or_else(|_| {
                        Err(DownloadError::timeout(format!(
                            "no answer to the size probe within {:.1}s",
                            probe_timeout.as_secs_f64()
                        )))
                    })
                }
            };
            let total = probed.map_err(|e| match e {
                DownloadError::SizeUnknown { .. } => e,
                other => DownloadError::size_unknown(other.to_string()),
            })?;

            if let Some(expected) = self.expected_size.filter(|&size| size != total) {
                warn!(
                    download_id = %self.download_id,
                    expected,
                    actual = total,
                    "Server size differs from catalog size"
                );
            }
            segments = self
                .deps
                .segments
                .create_segments(&self.download_id, total, self.deps.config.segment_count)
                .await?;
            total
        };

        if segments.is_empty() {
            return self.complete_empty().await;
        }

        let already: u64 = segments.iter().map(|s| s.downloaded_bytes).sum();
        downloads
            .update_download_progress(&self.download_id, already, total)
            .await?;

        let config = &self.deps.config;
        let mut progress = FileProgress {
            by_segment: segments.iter().map(|s| s.downloaded_bytes).collect(),
            total,
            meter: SpeedMeter::new(config.speed_sample_interval),
            throttle: ProgressThrottle::new(config.persist_interval),
        };
        progress.meter.update(already);
        progress.throttle.ready();
        self.emit_progress(already, total, 0.0, None);

        let indices: Vec<u32> = segments.iter().map(|s| s.index).collect();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut workers = JoinSet::new();
        for segment in segments {
            let part = StorageHandle::new(part_name(&self.destination, segment.index));
            let downloader = SegmentDownloader::new(
                self.deps.clone(),
                self.url.clone(),
                part,
                self.control.clone(),
                tx.clone(),
            );
            workers.spawn(downloader.run(segment));
        }
        drop(tx);

        let mut results = Vec::with_capacity(indices.len());
        loop {
            tokio::select! {
                Some(update) = rx.recv() => self.on_segment_progress(&mut progress, update).await,
                joined = workers.join_next() => match joined {
                    Some(result) => results.push(result),
                    None => break,
                },
            }
        }
        while let Ok(update) = rx.try_recv() {
            self.on_segment_progress(&mut progress, update).await;
        }
        self.persist_progress(progress.downloaded(), total).await;

        let mut failed = 0u32;
        let mut first_error = None;
        for result in results {
            match result {
                Ok(SegmentResult::Completed | SegmentResult::Stopped) => {}
                Ok(SegmentResult::Failed(e)) => {
                    failed += 1;
                    first_error.get_or_insert_with(|| e.to_string());
                }
                Err(join_error) => {
                    error!(download_id = %self.download_id, error = %join_error, "Segment worker crashed");
                    failed += 1;
                    first_error.get_or_insert_with(|| format!("segment worker crashed: {join_error}"));
                }
            }
        }

        // A stop outranks failures: paused or cancelled work is not "failed"
        if self.control.is_stopped() {
            return Ok(FileOutcome::from_stop(self.control.reason()));
        }
        if failed > 0 {
            return Err(DownloadError::segments_failed(
                failed,
                u32::try_from(indices.len()).unwrap_or(u32::MAX),
                first_error.unwrap_or_default(),
            ));
        }

        let destination = self.assemble(&indices, total).await?;
        Ok(FileOutcome::Completed { destination })
    }

    async fn on_segment_progress(&self, progress: &mut FileProgress, update: SegmentProgress) {
        let downloaded = progress.apply(update);
        let speed = progress.meter.update(downloaded);
        let eta = progress.meter.eta(downloaded, progress.total);
        self.emit_progress(downloaded, progress.total, speed, eta);
        if progress.throttle.ready() {
            self.persist_progress(downloaded, progress.total).await;
        }
    }

    fn emit_progress(&self, downloaded: u64, total: u64, speed_bps: f64, eta: Option<Duration>) {
        let _ = self.events.send(TaskEvent::FileProgress {
            download_id: self.download_id.clone(),
            file_index: self.file_index,
            downloaded,
            total,
            speed_bps,
            eta_seconds: eta.map_or(0.0, |eta| eta.as_secs_f64()),
        });
    }

    async fn persist_progress(&self, downloaded: u64, total: u64) {
        if let Err(e) = self
            .deps
            .downloads
            .update_download_progress(&self.download_id, downloaded, total)
            .await
        {
            warn!(download_id = %self.download_id, error = %e, "Could not persist progress");
        }
    }

    async fn complete_empty(&self) -> Result<FileOutcome, DownloadError> {
        let storage = &self.deps.storage;
        let destination = storage.create_file(&self.destination).await?;
        let mut writer = storage.open_for_write(&destination, false).await?;
        writer
            .flush()
            .await
            .map_err(|e| DownloadError::storage_io("flush", &e))?;
        self.emit_progress(0, 0, 0.0, None);
        Ok(FileOutcome::Completed { destination })
    }

    /// Concatenate parts in index order and verify the length.
    ///
    /// On failure the partial destination is removed and the parts are kept.
    async fn assemble(&self, indices: &[u32], total: u64) -> Result<StorageHandle, DownloadError> {
        let storage = &self.deps.storage;
        let destination = storage.create_file(&self.destination).await?;

        if let Err(e) = self.concatenate(&destination, indices, total).await {
            if let Err(cleanup) = storage.delete(&destination).await {
                warn!(destination = %destination, error = %cleanup, "Could not remove partial file");
            }
            return Err(match e {
                DownloadError::Assembly { .. } => e,
                other => DownloadError::assembly(other.to_string()),
            });
        }

        for &index in indices {
            let part = StorageHandle::new(part_name(&self.destination, index));
            if let Err(e) = storage.delete(&part).await {
                warn!(part = %part, error = %e, "Could not remove part file");
            }
        }
        if let Err(e) = self.deps.segments.delete_segments(&self.download_id).await {
            warn!(download_id = %self.download_id, error = %e, "Could not remove segment rows");
        }

        info!(download_id = %self.download_id, bytes = total, "File assembled");
        Ok(destination)
    }

    async fn concatenate(
        &self,
        destination: &StorageHandle,
        indices: &[u32],
        total: u64,
    ) -> Result<(), DownloadError> {
        let storage = &self.deps.storage;
        let mut writer = storage.open_for_write(destination, false).await?;
        for &index in indices {
            let part = StorageHandle::new(part_name(&self.destination, index));
            let mut reader = storage.open_for_read(&part).await?;
            tokio::io::copy(&mut reader, &mut writer)
                .await
                .map_err(|e| DownloadError::assembly(format!("copying part {index}: {e}")))?;
        }
        writer
            .flush()
            .await
            .map_err(|e| DownloadError::assembly(format!("flushing: {e}")))?;
        drop(writer);

        let size = storage.size(destination).await?.unwrap_or(0);
        if size != total {
            return Err(DownloadError::assembly(format!(
                "assembled {size} bytes, expected {total}"
            )));
        }
        Ok(())
    }

    async fn finish(&self, outcome: FileOutcome) -> FileOutcome {
        let downloads = &self.deps.downloads;
        let id = &self.download_id;

        let persisted = match &outcome {
            FileOutcome::Completed { .. } => {
                downloads
                    .update_download_status(id, DownloadStatus::Completed, None)
                    .await
            }
            FileOutcome::Failed(e) => {
                warn!(download_id = %id, error = %e, "File download failed");
                downloads
                    .update_download_status(id, DownloadStatus::Failed, Some(&e.to_string()))
                    .await
            }
            FileOutcome::Paused | FileOutcome::Cancelled | FileOutcome::Interrupted => {
                return Self::record_stop(&self.deps, id, &self.destination, &self.control).await;
            }
        };
        if let Err(e) = persisted {
            warn!(download_id = %id, error = %e, "Could not persist file outcome");
        }

        if let FileOutcome::Completed { destination } = &outcome {
            info!(download_id = %id, destination = %destination, "File download complete");
        }
        outcome
    }
}
