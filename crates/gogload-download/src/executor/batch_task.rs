//! Multi-file batch coordination.
//!
//! A batch walks its targets in order. Each target is resolved to a fresh URL
//! right before its file task starts (links expire), and files already
//! completed by an earlier run are counted without touching the network.
//! File tasks run concurrently; the shared worker pool bounds the actual
//! transfers. Per-file outcomes are counted atomically in storage, and the
//! batch only finalizes once every file has reported.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use gogload_core::{
    BatchRecord, DownloadError, DownloadId, DownloadRecord, DownloadStatus, ResolvedLink,
};

use super::WorkerDeps;
use super::batch_tracker::BatchTracker;
use super::control::TaskControl;
use super::events::{BatchOutcome, FileOutcome, TaskEvent};
use super::file_task::{FileTask, discard_partial};

type Resolution = BoxFuture<'static, (usize, Result<ResolvedLink, DownloadError>)>;

/// Downloads every file of a batch.
pub struct BatchTask {
    deps: WorkerDeps,
    batch: BatchRecord,
    control: TaskControl,
    events: mpsc::UnboundedSender<TaskEvent>,
}

impl BatchTask {
    pub fn new(
        deps: WorkerDeps,
        batch: BatchRecord,
        control: TaskControl,
        events: mpsc::UnboundedSender<TaskEvent>,
    ) -> Self {
        Self {
            deps,
            batch,
            control,
            events,
        }
    }

    /// Run the batch to an outcome and persist it.
    pub async fn run(self) -> BatchOutcome {
        info!(
            batch_id = %self.batch.id,
            files = self.batch.targets.len(),
            "Batch download starting"
        );

        let outcome = match self.execute().await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(batch_id = %self.batch.id, error = %e, "Batch could not run");
                BatchOutcome::Failed(e.to_string())
            }
        };
        self.finish(&outcome).await;
        outcome
    }

    async fn execute(&self) -> Result<BatchOutcome, DownloadError> {
        let downloads = &self.deps.downloads;
        let batch_id = &self.batch.id;
        downloads
            .update_batch_status(batch_id, DownloadStatus::Downloading, None)
            .await?;
        downloads.reset_batch_progress(batch_id).await?;

        let existing: HashMap<DownloadId, DownloadRecord> = downloads
            .list_batch_downloads(batch_id)
            .await?
            .into_iter()
            .map(|record| (record.id.clone(), record))
            .collect();

        let targets = &self.batch.targets;
        let mut tracker = BatchTracker::new(
            targets.iter().map(|t| t.expected_size),
            self.deps.config.speed_sample_interval,
        );
        let (file_tx, mut file_rx) = mpsc::unbounded_channel();
        let mut files: JoinSet<(usize, FileOutcome)> = JoinSet::new();
        let mut resolving: Option<Resolution> = None;
        let mut next = 0;

        loop {
            while resolving.is_none() && next < targets.len() && !self.control.is_stopped() {
                let index = next;
                next += 1;

                let id = DownloadId::for_target(&targets[index]);
                if let Some(done) = existing
                    .get(&id)
                    .filter(|r| r.status == DownloadStatus::Completed)
                {
                    debug!(download_id = %id, "File already complete");
                    tracker.set_total(index, done.total_bytes);
                    self.count_file(&mut tracker, index, true).await;
                    tracker.restart_speed_window();
                    continue;
                }

                let resolver = Arc::clone(&self.deps.resolver);
                let target = targets[index].clone();
                resolving = Some(Box::pin(async move {
                    let resolved = resolver.resolve(&target).await;
                    (index, resolved)
                }));
            }

            if resolving.is_none() && files.is_empty() {
                break;
            }

            tokio::select! {
                () = self.control.stopped(), if resolving.is_some() => {
                    resolving = None;
                }
                Some((index, resolved)) = async {
                    match resolving.as_mut() {
                        Some(resolution) => Some(resolution.await),
                        None => None,
                    }
                }, if resolving.is_some() => {
                    resolving = None;
                    self.launch(index, resolved, &existing, &mut tracker, &mut files, &file_tx)
                        .await;
                }
                Some(event) = file_rx.recv() => self.on_file_event(&mut tracker, event),
                Some(joined) = files.join_next(), if !files.is_empty() => {
                    self.on_file_finished(&mut tracker, joined).await;
                }
            }
        }

        while let Ok(event) = file_rx.try_recv() {
            self.on_file_event(&mut tracker, event);
        }

        // A stop only matters while some files have not reported
        if self.control.is_stopped() && !tracker.is_complete() {
            return Ok(BatchOutcome::from_stop(self.control.reason()));
        }

        Ok(match tracker.failure_message() {
            None => BatchOutcome::Completed,
            Some(message) => BatchOutcome::Failed(message),
        })
    }

    async fn launch(
        &self,
        index: usize,
        resolved: Result<ResolvedLink, DownloadError>,
        existing: &HashMap<DownloadId, DownloadRecord>,
        tracker: &mut BatchTracker,
        files: &mut JoinSet<(usize, FileOutcome)>,
        file_tx: &mpsc::UnboundedSender<TaskEvent>,
    ) {
        let target = &self.batch.targets[index];
        let file_index = u32::try_from(index).unwrap_or(u32::MAX);
        let mut record = existing
            .get(&DownloadId::for_target(target))
            .cloned()
            .unwrap_or_else(|| DownloadRecord::pending(target, Some(self.batch.id.clone()), file_index));
        record.batch_id = Some(self.batch.id.clone());
        record.file_index = file_index;

        let link = match resolved {
            Ok(link) => link,
            Err(e) => {
                warn!(
                    batch_id = %self.batch.id,
                    file = %record.file_name,
                    error = %e,
                    "Could not resolve download link"
                );
                self.fail_file(tracker, index, &record, &e).await;
                return;
            }
        };

        if let Some(size) = link.size {
            tracker.set_total(index, size);
            if record.total_bytes == 0 {
                record.total_bytes = size;
            }
        }
        record.url = Some(link.url.clone());
        if let Err(e) = self.deps.downloads.upsert_download(&record).await {
            self.fail_file(tracker, index, &record, &e.into()).await;
            return;
        }

        let task = FileTask::new(
            self.deps.clone(),
            &record,
            link.url,
            self.control.child(),
            file_tx.clone(),
        );
        files.spawn(async move {
            let outcome = AssertUnwindSafe(task.run())
                .catch_unwind()
                .await
                .unwrap_or_else(|_| FileOutcome::Failed(DownloadError::other("file task crashed")));
            (index, outcome)
        });
    }

    async fn fail_file(
        &self,
        tracker: &mut BatchTracker,
        index: usize,
        record: &DownloadRecord,
        error: &DownloadError,
    ) {
        let message = error.to_string();
        let downloads = &self.deps.downloads;
        let persisted = match downloads.upsert_download(record).await {
            Ok(()) => {
                downloads
                    .update_download_status(&record.id, DownloadStatus::Failed, Some(&message))
                    .await
            }
            Err(e) => Err(e),
        };
        if let Err(e) = persisted {
            warn!(download_id = %record.id, error = %e, "Could not record file failure");
        }

        self.count_file(tracker, index, false).await;
        let _ = self.events.send(TaskEvent::FileFinished {
            download_id: record.id.clone(),
            file_index: record.file_index,
            file_name: record.file_name.clone(),
            status: DownloadStatus::Failed,
            error: Some(message),
        });
    }

    async fn count_file(&self, tracker: &mut BatchTracker, index: usize, succeeded: bool) {
        if !tracker.on_file_done(index, succeeded) {
            return;
        }
        match self
            .deps
            .downloads
            .record_batch_file_result(&self.batch.id, succeeded)
            .await
        {
            Ok(batch) => debug!(
                batch_id = %batch.id,
                completed = batch.completed_files,
                failed = batch.failed_files,
                total = batch.total_files,
                "Batch file reported"
            ),
            Err(e) => warn!(batch_id = %self.batch.id, error = %e, "Could not count file result"),
        }
        self.emit_progress(tracker, index);
    }

    fn on_file_event(&self, tracker: &mut BatchTracker, event: TaskEvent) {
        match event {
            TaskEvent::FileProgress {
                file_index,
                downloaded,
                total,
                ..
            } => {
                let snapshot =
                    tracker.on_progress(file_index as usize, downloaded, total, Instant::now());
                let _ = self.events.send(TaskEvent::BatchProgress {
                    batch_id: self.batch.id.clone(),
                    snapshot,
                });
            }
            other => {
                let _ = self.events.send(other);
            }
        }
    }

    async fn on_file_finished(
        &self,
        tracker: &mut BatchTracker,
        joined: Result<(usize, FileOutcome), JoinError>,
    ) {
        let (index, outcome) = match joined {
            Ok(finished) => finished,
            Err(e) => {
                error!(batch_id = %self.batch.id, error = %e, "File task aborted");
                return;
            }
        };

        match &outcome {
            FileOutcome::Completed { .. } | FileOutcome::Failed(_) => {
                let succeeded = matches!(outcome, FileOutcome::Completed { .. });
                self.count_file(tracker, index, succeeded).await;

                let target = &self.batch.targets[index];
                let _ = self.events.send(TaskEvent::FileFinished {
                    download_id: DownloadId::for_target(target),
                    file_index: u32::try_from(index).unwrap_or(u32::MAX),
                    file_name: target.file_name.clone(),
                    status: outcome.status(),
                    error: outcome.error(),
                });
            }
            FileOutcome::Paused | FileOutcome::Cancelled | FileOutcome::Interrupted => {
                debug!(batch_id = %self.batch.id, file_index = index, "File stopped");
            }
        }
    }

    fn emit_progress(&self, tracker: &BatchTracker, index: usize) {
        let _ = self.events.send(TaskEvent::BatchProgress {
            batch_id: self.batch.id.clone(),
            snapshot: tracker.snapshot(index),
        });
    }

    async fn finish(&self, outcome: &BatchOutcome) {
        let downloads = &self.deps.downloads;
        let batch_id = &self.batch.id;

        let status = match outcome {
            BatchOutcome::Interrupted => {
                info!(batch_id = %batch_id, "Batch interrupted by shutdown");
                return;
            }
            BatchOutcome::Cancelled => {
                self.cancel_unfinished_files().await;
                DownloadStatus::Cancelled
            }
            other => other.status(),
        };

        let message = outcome.message();
        if let Err(e) = downloads
            .update_batch_status(batch_id, status, message.as_deref())
            .await
        {
            warn!(batch_id = %batch_id, error = %e, "Could not persist batch outcome");
        }

        match outcome {
            BatchOutcome::Completed => info!(batch_id = %batch_id, "Batch download complete"),
            BatchOutcome::Failed(message) => warn!(batch_id = %batch_id, %message, "Batch download failed"),
            _ => info!(batch_id = %batch_id, status = %status, "Batch download stopped"),
        }
    }

    /// Files that never started in this run keep their old state; cancel them too.
    async fn cancel_unfinished_files(&self) {
        let records = match self.deps.downloads.list_batch_downloads(&self.batch.id).await {
            Ok(records) => records,
            Err(e) => {
                warn!(batch_id = %self.batch.id, error = %e, "Could not list batch files");
                return;
            }
        };
        for record in records.iter().filter(|r| !r.status.is_terminal()) {
            if let Err(e) = discard_partial(&self.deps, &record.id, &record.destination_name()).await {
                warn!(download_id = %record.id, error = %e, "Could not discard partial data");
            }
            if let Err(e) = self
                .deps
                .downloads
                .update_download_status(&record.id, DownloadStatus::Cancelled, None)
                .await
            {
                warn!(download_id = %record.id, error = %e, "Could not cancel file");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::testkit::{Harness, pattern, target, test_config, url_for};
    use crate::http::testing::FakeBackend;
    use gogload_core::{BatchId, DownloadTarget};
    use std::time::Duration;

    const SIZES: [usize; 3] = [48 * 1024, 64 * 1024, 32 * 1024];

    async fn batch(harness: &Harness) -> BatchRecord {
        let targets: Vec<DownloadTarget> = ["a", "b", "c"]
            .iter()
            .zip(SIZES)
            .map(|(link, len)| {
                harness.backend.add_file(&url_for(link), pattern(len));
                target("42", link, &format!("{link}.bin"))
            })
            .collect();
        let batch = BatchRecord::pending("42", targets);
        harness.deps.downloads.upsert_batch(&batch).await.unwrap();
        batch
    }

    fn task(
        harness: &Harness,
        batch: &BatchRecord,
        control: &TaskControl,
    ) -> (BatchTask, mpsc::UnboundedReceiver<TaskEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = BatchTask::new(harness.deps.clone(), batch.clone(), control.clone(), tx);
        (task, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<TaskEvent>) -> Vec<TaskEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    async fn file_status(harness: &Harness, link: &str) -> DownloadStatus {
        harness
            .deps
            .downloads
            .get_download(&DownloadId::new("42", link))
            .await
            .unwrap()
            .unwrap()
            .status
    }

    #[tokio::test]
    async fn all_files_complete() {
        let harness = Harness::new(FakeBackend::new(), test_config()).await;
        let batch = batch(&harness).await;
        let (task, mut rx) = task(&harness, &batch, &TaskControl::new());

        assert_eq!(task.run().await, BatchOutcome::Completed);

        for (link, len) in ["a", "b", "c"].iter().zip(SIZES) {
            assert_eq!(harness.read(&format!("42/{link}.bin")).unwrap(), pattern(len));
            assert_eq!(file_status(&harness, link).await, DownloadStatus::Completed);
        }

        let stored = harness.deps.downloads.get_batch(&batch.id).await.unwrap().unwrap();
        assert_eq!(stored.status, DownloadStatus::Completed);
        assert_eq!((stored.completed_files, stored.failed_files), (3, 0));

        let events = drain(&mut rx);
        let total: u64 = SIZES.iter().map(|&s| s as u64).sum();
        let snapshots: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                TaskEvent::BatchProgress { snapshot, .. } => Some(*snapshot),
                _ => None,
            })
            .collect();
        assert!(!snapshots.is_empty());
        for pair in snapshots.windows(2) {
            assert!(pair[1].bytes_downloaded >= pair[0].bytes_downloaded, "aggregate never goes back");
            assert!(pair[1].total_bytes >= pair[0].total_bytes);
        }
        for snapshot in &snapshots {
            assert!(snapshot.bytes_downloaded <= snapshot.total_bytes, "{snapshot:?}");
            assert!(snapshot.total_bytes <= total);
        }
        let last = snapshots[snapshots.len() - 1];
        assert_eq!(last.bytes_downloaded, total, "aggregate equals the sum of files");
        assert_eq!(last.total_bytes, total);
        assert_eq!(last.total_files, 3);

        let finished = events
            .iter()
            .filter(|e| matches!(e, TaskEvent::FileFinished { .. }))
            .count();
        assert_eq!(finished, 3);
    }

    #[tokio::test]
    async fn one_unresolvable_file_fails_the_batch_after_the_others_finish() {
        let harness = Harness::new(FakeBackend::new(), test_config()).await;
        let batch = batch(&harness).await;
        harness.resolver.break_link("b");

        let (task, mut rx) = task(&harness, &batch, &TaskControl::new());
        assert_eq!(
            task.run().await,
            BatchOutcome::Failed("2/3 files completed".to_string())
        );

        assert_eq!(file_status(&harness, "a").await, DownloadStatus::Completed);
        assert_eq!(file_status(&harness, "b").await, DownloadStatus::Failed);
        assert_eq!(file_status(&harness, "c").await, DownloadStatus::Completed);

        let stored = harness.deps.downloads.get_batch(&batch.id).await.unwrap().unwrap();
        assert_eq!(stored.status, DownloadStatus::Failed);
        assert_eq!((stored.completed_files, stored.failed_files), (3, 1));
        assert_eq!(stored.error_message.as_deref(), Some("2/3 files completed"));

        let failed: Vec<_> = drain(&mut rx)
            .into_iter()
            .filter_map(|e| match e {
                TaskEvent::FileFinished {
                    status: DownloadStatus::Failed,
                    file_index,
                    error,
                    ..
                } => Some((file_index, error)),
                _ => None,
            })
            .collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].0, 1);
        assert!(failed[0].1.as_deref().unwrap().contains("expired"));
    }

    #[tokio::test]
    async fn every_file_failing_reports_all_failed() {
        let harness = Harness::new(FakeBackend::new(), test_config()).await;
        let batch = batch(&harness).await;
        for link in ["a", "b", "c"] {
            harness.backend.fail_with_status(&url_for(link), 404, None);
        }

        let (task, _rx) = task(&harness, &batch, &TaskControl::new());
        assert_eq!(
            task.run().await,
            BatchOutcome::Failed("all 3 files failed".to_string())
        );
    }

    #[tokio::test]
    async fn completed_files_are_not_downloaded_again() {
        let harness = Harness::new(FakeBackend::new(), test_config()).await;
        let batch = batch(&harness).await;

        let done = DownloadRecord::pending(&batch.targets[0], Some(BatchId::for_game("42")), 0);
        harness.deps.downloads.upsert_download(&done).await.unwrap();
        harness
            .deps
            .downloads
            .update_download_status(&done.id, DownloadStatus::Completed, None)
            .await
            .unwrap();

        let (task, _rx) = task(&harness, &batch, &TaskControl::new());
        assert_eq!(task.run().await, BatchOutcome::Completed);

        assert_eq!(harness.resolver.calls(), 2);
        assert!(harness.backend.requests_for(&url_for("a")).is_empty());
        let stored = harness.deps.downloads.get_batch(&batch.id).await.unwrap().unwrap();
        assert_eq!(stored.completed_files, 3);
    }

    #[tokio::test]
    async fn pause_then_resume_finishes_the_batch() {
        let backend = FakeBackend::new().with_chunking(1024, Duration::from_millis(10));
        let harness = Harness::new(backend, test_config().with_chunk_size(1024)).await;
        let batch = batch(&harness).await;

        let control = TaskControl::new();
        let (paused_task, _rx) = task(&harness, &batch, &control);
        let handle = tokio::spawn(paused_task.run());
        tokio::time::sleep(Duration::from_millis(40)).await;
        control.pause();
        assert_eq!(handle.await.unwrap(), BatchOutcome::Paused);

        let stored = harness.deps.downloads.get_batch(&batch.id).await.unwrap().unwrap();
        assert_eq!(stored.status, DownloadStatus::Paused);
        assert_eq!(file_status(&harness, "b").await, DownloadStatus::Paused);

        let (resumed, _rx) = task(&harness, &batch, &TaskControl::new());
        assert_eq!(resumed.run().await, BatchOutcome::Completed);
        for (link, len) in ["a", "b", "c"].iter().zip(SIZES) {
            assert_eq!(harness.read(&format!("42/{link}.bin")).unwrap(), pattern(len));
        }
    }

    #[tokio::test]
    async fn cancel_discards_every_unfinished_file() {
        let backend = FakeBackend::new().with_chunking(1024, Duration::from_millis(10));
        let harness = Harness::new(backend, test_config().with_chunk_size(1024)).await;
        let batch = batch(&harness).await;

        let control = TaskControl::new();
        let (task, _rx) = task(&harness, &batch, &control);
        let handle = tokio::spawn(task.run());
        tokio::time::sleep(Duration::from_millis(30)).await;
        control.cancel();
        assert_eq!(handle.await.unwrap(), BatchOutcome::Cancelled);

        let stored = harness.deps.downloads.get_batch(&batch.id).await.unwrap().unwrap();
        assert_eq!(stored.status, DownloadStatus::Cancelled);
        for record in harness.deps.downloads.list_batch_downloads(&batch.id).await.unwrap() {
            assert_eq!(record.status, DownloadStatus::Cancelled);
            assert!(harness.deps.segments.list_segments(&record.id).await.unwrap().is_empty());
        }
    }
}
