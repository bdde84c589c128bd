//! Download supervisor.
//!
//! The supervisor is the only entry point external callers use. It owns the
//! registry of running jobs, turns task messages into outbound events, and
//! implements the lifecycle rules on top of the persisted records.
//!
//! # Architecture
//!
//! - **Supervisor**: validates requests, persists records, spawns one task per job
//! - **Tasks** (`executor`): do the work and report over an `mpsc` channel only
//! - **Job runner**: forwards task messages to the emitter and publishes the
//!   final status on the job's `watch` channel
//!
//! # State machine
//!
//! `Pending → Downloading → {Paused ⇄ Downloading} → {Completed | Failed | Cancelled}`
//!
//! A download that belongs to a batch is always driven through its batch.

mod registry;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, mpsc};
use tracing::{debug, error, info, warn};

use gogload_core::{
    BatchId, BatchRecord, ConfigError, DownloadError, DownloadEvent, DownloadEventEmitterPort,
    DownloadId, DownloadRecord, DownloadStatus, DownloadTarget, EngineConfig, JobId,
    ProgressSnapshot, StoragePort, Stores, UrlResolverPort,
};

use crate::executor::{
    BatchTask, FileOutcome, FileTask, TaskControl, TaskEvent, WorkerDeps, WorkerPool,
    discard_partial,
};
use crate::http::HttpBackend;

use registry::{FinishedSender, JobRegistry, wait_finished};

/// Dependencies for creating a supervisor.
pub struct SupervisorDeps {
    /// Download, batch and segment persistence.
    pub stores: Stores,
    /// Destination storage for parts and final artifacts.
    pub storage: Arc<dyn StoragePort>,
    /// HTTP transport.
    pub http: Arc<dyn HttpBackend>,
    /// Turns a target description into a fresh URL.
    pub resolver: Arc<dyn UrlResolverPort>,
    /// Receives every outbound event.
    pub emitter: Arc<dyn DownloadEventEmitterPort>,
    /// Engine tuning.
    pub config: EngineConfig,
}

/// Build a supervisor from its dependencies.
///
/// The configuration is validated here; the worker pool is created once and
/// shared by every job the supervisor runs.
pub fn build_supervisor(deps: SupervisorDeps) -> Result<Arc<DownloadSupervisor>, ConfigError> {
    deps.config.validate()?;
    let worker_deps = WorkerDeps {
        downloads: deps.stores.downloads,
        segments: deps.stores.segments,
        storage: deps.storage,
        http: deps.http,
        resolver: deps.resolver,
        pool: WorkerPool::new(deps.config.max_workers),
        config: deps.config,
    };
    Ok(Arc::new(DownloadSupervisor {
        deps: worker_deps,
        emitter: deps.emitter,
        registry: JobRegistry::new(),
        auto_paused: Mutex::new(HashSet::new()),
        online: AtomicBool::new(true),
    }))
}

/// What [`DownloadSupervisor::restore`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreSummary {
    /// Interrupted jobs that were started again.
    pub resumed: u32,
    /// Paused jobs that were only re-announced.
    pub paused: u32,
}

/// Persisted jobs that have not reached a terminal state.
#[derive(Debug, Clone, Default)]
pub struct UnfinishedJobs {
    /// Batches with their file records.
    pub batches: Vec<(BatchRecord, Vec<DownloadRecord>)>,
    /// Standalone downloads.
    pub downloads: Vec<DownloadRecord>,
}

/// The persisted record behind a job.
enum PersistedJob {
    Download(DownloadRecord),
    Batch(BatchRecord),
}

impl PersistedJob {
    fn id(&self) -> JobId {
        match self {
            Self::Download(record) => JobId::Download(record.id.clone()),
            Self::Batch(batch) => JobId::Batch(batch.id.clone()),
        }
    }

    const fn status(&self) -> DownloadStatus {
        match self {
            Self::Download(record) => record.status,
            Self::Batch(batch) => batch.status,
        }
    }
}

/// Process-wide owner of every download and batch.
pub struct DownloadSupervisor {
    deps: WorkerDeps,
    emitter: Arc<dyn DownloadEventEmitterPort>,
    registry: JobRegistry,
    /// Jobs paused because connectivity was lost, resumed when it returns.
    auto_paused: Mutex<HashSet<JobId>>,
    online: AtomicBool,
}

impl DownloadSupervisor {
    // =========================================================================
    // Starting work
    // =========================================================================

    /// Start (or continue) a single-file download.
    ///
    /// A file that is part of an unfinished batch resumes that batch instead.
    /// A finished record for the same file is discarded and downloaded afresh.
    pub async fn start_download(
        self: &Arc<Self>,
        target: DownloadTarget,
    ) -> Result<JobId, DownloadError> {
        let id = DownloadId::for_target(&target);
        let job = JobId::Download(id.clone());
        if let Some(active) = self.registry.conflict(&job).await {
            return Err(DownloadError::already_active(active));
        }

        let downloads = &self.deps.downloads;
        if let Some(mut existing) = downloads.get_download(&id).await? {
            if !existing.status.is_terminal() {
                if let Some(batch_id) = &existing.batch_id {
                    debug!(download_id = %id, batch_id = %batch_id, "Download belongs to a batch");
                    return self.resume(&JobId::Batch(batch_id.clone())).await;
                }
                if target.url.is_some() {
                    existing.url.clone_from(&target.url);
                }
                downloads.upsert_download(&existing).await?;
                return self.launch(PersistedJob::Download(existing)).await;
            }

            discard_partial(&self.deps, &id, &existing.destination_name()).await?;
            downloads.remove_download(&id).await?;
        }

        let record = DownloadRecord::pending(&target, None, 0);
        downloads.upsert_download(&record).await?;
        info!(
            target: "gogload.download",
            job_id = %job,
            file = %record.file_name,
            "Download queued"
        );
        self.announce(&job, DownloadStatus::Pending, None).await;
        self.launch(PersistedJob::Download(record)).await
    }

    /// Start a batch installing `targets` for `game_id`.
    ///
    /// An empty batch, or one with targets of another game, is rejected.
    pub async fn start_batch(
        self: &Arc<Self>,
        game_id: &str,
        targets: Vec<DownloadTarget>,
    ) -> Result<JobId, DownloadError> {
        validate_batch(game_id, &targets)?;

        let batch = BatchRecord::pending(game_id, targets);
        let job = JobId::Batch(batch.id.clone());
        if let Some(active) = self.registry.conflict(&job).await {
            return Err(DownloadError::already_active(active));
        }

        if let Some(previous) = self.deps.downloads.get_batch(&batch.id).await? {
            // Unfinished files keep their segments; finished batches start over
            let keep: HashSet<DownloadId> = if previous.status.is_terminal() {
                HashSet::new()
            } else {
                batch.targets.iter().map(DownloadId::for_target).collect()
            };
            self.discard_batch_files(&batch.id, &keep).await?;
        }

        self.deps.downloads.upsert_batch(&batch).await?;
        info!(target: "gogload.download", job_id = %job, files = batch.total_files, "Batch queued");
        self.announce(&job, DownloadStatus::Pending, None).await;
        self.launch(PersistedJob::Batch(batch)).await
    }

    // =========================================================================
    // Lifecycle control
    // =========================================================================

    /// Pause a job and wait for it to stop.
    ///
    /// Returns the status the job settled in, which is `Completed` if it
    /// finished before the pause took effect.
    pub async fn pause(&self, job: &JobId) -> Result<DownloadStatus, DownloadError> {
        let persisted = self.load(job).await?;
        let id = persisted.id();
        // An explicit pause is never undone by connectivity coming back
        self.auto_paused.lock().await.remove(&id);

        if let Some(active) = self.registry.get(&id).await {
            info!(target: "gogload.download", job_id = %id, "Pausing download");
            active.control.pause();
            return Ok(wait_finished(active.finished)
                .await
                .unwrap_or(DownloadStatus::Paused));
        }

        match persisted.status() {
            DownloadStatus::Paused => Ok(DownloadStatus::Paused),
            status if status.is_terminal() => {
                Err(DownloadError::invalid_state(&id, "pause", status))
            }
            _ => {
                self.persist_status(&id, DownloadStatus::Paused, None).await?;
                self.announce(&id, DownloadStatus::Paused, None).await;
                Ok(DownloadStatus::Paused)
            }
        }
    }

    /// Resume a paused or interrupted job from its persisted state.
    pub async fn resume(self: &Arc<Self>, job: &JobId) -> Result<JobId, DownloadError> {
        let persisted = self.load(job).await?;
        let id = persisted.id();
        self.auto_paused.lock().await.remove(&id);

        let status = persisted.status();
        if !status.is_resumable() {
            return Err(DownloadError::invalid_state(&id, "resume", status));
        }
        self.launch(persisted).await
    }

    /// Cancel a job, discarding partial data.
    ///
    /// Cancelling a completed or cancelled job is a no-op.
    pub async fn cancel(&self, job: &JobId) -> Result<DownloadStatus, DownloadError> {
        let persisted = self.load(job).await?;
        let id = persisted.id();
        self.auto_paused.lock().await.remove(&id);

        if let Some(active) = self.registry.get(&id).await {
            info!(target: "gogload.download", job_id = %id, "Cancelling download");
            active.control.cancel();
            return Ok(wait_finished(active.finished)
                .await
                .unwrap_or(DownloadStatus::Cancelled));
        }

        match &persisted {
            PersistedJob::Download(record) => match record.status {
                status @ (DownloadStatus::Completed | DownloadStatus::Cancelled) => {
                    return Ok(status);
                }
                _ => discard_partial(&self.deps, &record.id, &record.destination_name()).await?,
            },
            PersistedJob::Batch(batch) => match batch.status {
                status @ (DownloadStatus::Completed | DownloadStatus::Cancelled) => {
                    return Ok(status);
                }
                _ => self.cancel_batch_files(&batch.id).await?,
            },
        }

        self.persist_status(&id, DownloadStatus::Cancelled, None).await?;
        info!(target: "gogload.download", job_id = %id, "Download cancelled");
        self.announce(&id, DownloadStatus::Cancelled, None).await;
        Ok(DownloadStatus::Cancelled)
    }

    /// Retry a failed or cancelled job.
    ///
    /// Partial data of the affected files is discarded. For a batch only the
    /// files that did not complete are downloaded again.
    pub async fn retry(self: &Arc<Self>, job: &JobId) -> Result<JobId, DownloadError> {
        let persisted = self.load(job).await?;
        let id = persisted.id();
        if let Some(active) = self.registry.conflict(&id).await {
            return Err(DownloadError::already_active(active));
        }

        let status = persisted.status();
        if !matches!(status, DownloadStatus::Failed | DownloadStatus::Cancelled) {
            return Err(DownloadError::invalid_state(&id, "retry", status));
        }

        let persisted = match persisted {
            PersistedJob::Download(record) => {
                self.reset_file(&record).await?;
                let record = self
                    .deps
                    .downloads
                    .get_download(&record.id)
                    .await?
                    .ok_or_else(|| DownloadError::not_found(&id))?;
                PersistedJob::Download(record)
            }
            PersistedJob::Batch(batch) => {
                let files = self.deps.downloads.list_batch_downloads(&batch.id).await?;
                for record in files
                    .iter()
                    .filter(|r| r.status != DownloadStatus::Completed)
                {
                    self.reset_file(record).await?;
                }
                PersistedJob::Batch(batch)
            }
        };

        info!(target: "gogload.download", job_id = %id, "Retrying download");
        self.launch(persisted).await
    }

    /// Pick up whatever a previous process left unfinished.
    ///
    /// Jobs left `Downloading` or `Pending` were interrupted and start again.
    /// Paused jobs stay paused and are only re-announced.
    pub async fn restore(self: &Arc<Self>) -> Result<RestoreSummary, DownloadError> {
        let batches = self.deps.downloads.list_unfinished_batches().await?;
        let downloads = self.deps.downloads.list_unfinished_downloads().await?;
        let jobs = batches
            .into_iter()
            .map(PersistedJob::Batch)
            .chain(downloads.into_iter().map(PersistedJob::Download));

        let mut summary = RestoreSummary::default();
        for job in jobs {
            let id = job.id();
            if self.registry.conflict(&id).await.is_some() {
                continue;
            }
            match job.status() {
                DownloadStatus::Paused => {
                    self.announce(&id, DownloadStatus::Paused, None).await;
                    summary.paused += 1;
                }
                _ => match self.launch(job).await {
                    Ok(_) => summary.resumed += 1,
                    Err(e) => warn!(job_id = %id, error = %e, "Could not restore download"),
                },
            }
        }

        info!(
            target: "gogload.download",
            resumed = summary.resumed,
            paused = summary.paused,
            "Restored unfinished downloads"
        );
        Ok(summary)
    }

    // =========================================================================
    // Connectivity
    // =========================================================================

    /// Pause every running job and remember it for [`on_connectivity_restored`].
    ///
    /// Returns the jobs that were auto-paused.
    ///
    /// [`on_connectivity_restored`]: Self::on_connectivity_restored
    pub async fn on_connectivity_lost(&self) -> Vec<JobId> {
        self.online.store(false, Ordering::SeqCst);

        let active = self.registry.snapshot().await;
        for (_, job) in &active {
            job.control.pause();
        }

        let mut paused = Vec::new();
        for (id, job) in active {
            if wait_finished(job.finished).await == Some(DownloadStatus::Paused) {
                paused.push(id);
            }
        }

        self.auto_paused.lock().await.extend(paused.iter().cloned());
        info!(
            target: "gogload.download",
            count = paused.len(),
            "Connectivity lost, downloads paused"
        );
        paused
    }

    /// Resume exactly the jobs paused by connectivity loss.
    pub async fn on_connectivity_restored(self: &Arc<Self>) -> Vec<JobId> {
        self.online.store(true, Ordering::SeqCst);

        let waiting: Vec<JobId> = self.auto_paused.lock().await.drain().collect();
        let mut resumed = Vec::new();
        for job in waiting {
            match self.resume(&job).await {
                Ok(id) => resumed.push(id),
                Err(e) => warn!(job_id = %job, error = %e, "Could not auto-resume download"),
            }
        }

        info!(
            target: "gogload.download",
            count = resumed.len(),
            "Connectivity restored, downloads resumed"
        );
        resumed
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Queries and teardown
    // =========================================================================

    /// Stop every running job, leaving it to be restored by the next process.
    ///
    /// Returns the number of jobs stopped.
    pub async fn shutdown(&self) -> usize {
        let active = self.registry.snapshot().await;
        for (_, job) in &active {
            job.control.shutdown();
        }
        let count = active.len();
        for (_, job) in active {
            wait_finished(job.finished).await;
        }
        info!(target: "gogload.download", count, "Download supervisor shut down");
        count
    }

    pub async fn active_jobs(&self) -> Vec<JobId> {
        self.registry.ids().await
    }

    /// Wait for a running job to finish. `None` if it is not running.
    pub async fn wait(&self, job: &JobId) -> Option<DownloadStatus> {
        let active = self.registry.get(job).await?;
        wait_finished(active.finished).await
    }

    /// Wait until no job is running.
    pub async fn wait_all(&self) {
        loop {
            let active = self.registry.snapshot().await;
            if active.is_empty() {
                return;
            }
            for (_, job) in active {
                wait_finished(job.finished).await;
            }
        }
    }

    /// Persisted status of a job (of the owning batch for batch files).
    pub async fn status(&self, job: &JobId) -> Result<DownloadStatus, DownloadError> {
        Ok(self.load(job).await?.status())
    }

    /// Everything a previous run left unfinished, for listing.
    pub async fn unfinished(&self) -> Result<UnfinishedJobs, DownloadError> {
        let downloads = &self.deps.downloads;
        let mut batches = Vec::new();
        for batch in downloads.list_unfinished_batches().await? {
            let files = downloads.list_batch_downloads(&batch.id).await?;
            batches.push((batch, files));
        }
        Ok(UnfinishedJobs {
            batches,
            downloads: downloads.list_unfinished_downloads().await?,
        })
    }

    /// Delete finished records older than `days`.
    pub async fn prune_history(&self, days: u32) -> Result<u32, DownloadError> {
        let removed = self.deps.downloads.prune_finished(days).await?;
        info!(target: "gogload.download", removed, days, "Pruned download history");
        Ok(removed)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Load a job's record, mapping batch files to their batch.
    async fn load(&self, job: &JobId) -> Result<PersistedJob, DownloadError> {
        let batch_id = match job {
            JobId::Download(id) => {
                let record = self
                    .deps
                    .downloads
                    .get_download(id)
                    .await?
                    .ok_or_else(|| DownloadError::not_found(job))?;
                match record.batch_id.clone() {
                    Some(batch_id) => batch_id,
                    None => return Ok(PersistedJob::Download(record)),
                }
            }
            JobId::Batch(id) => id.clone(),
        };

        let batch = self.deps.downloads.get_batch(&batch_id).await?;
        batch
            .map(PersistedJob::Batch)
            .ok_or_else(|| DownloadError::not_found(JobId::Batch(batch_id)))
    }

    /// Start the task for a job, or park it while offline.
    async fn launch(self: &Arc<Self>, job: PersistedJob) -> Result<JobId, DownloadError> {
        let id = job.id();

        if !self.is_online() {
            if let Some(active) = self.registry.conflict(&id).await {
                return Err(DownloadError::already_active(active));
            }
            self.persist_status(&id, DownloadStatus::Paused, None).await?;
            self.auto_paused.lock().await.insert(id.clone());
            info!(
                target: "gogload.download",
                job_id = %id,
                "Offline, download waits for connectivity"
            );
            self.announce(
                &id,
                DownloadStatus::Paused,
                Some("waiting for network".to_string()),
            )
            .await;
            return Ok(id);
        }

        let control = TaskControl::new();
        let finished = self.registry.reserve(&id, control.clone()).await?;
        self.announce(&id, DownloadStatus::Downloading, None).await;
        tokio::spawn(Arc::clone(self).run_job(id.clone(), job, control, finished));
        Ok(id)
    }

    /// Drive one job to its end and publish the outcome.
    async fn run_job(
        self: Arc<Self>,
        job: JobId,
        persisted: PersistedJob,
        control: TaskControl,
        finished: FinishedSender,
    ) {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let deps = self.deps.clone();
        let work = tokio::spawn(async move {
            match persisted {
                PersistedJob::Download(record) => {
                    let outcome = run_download(deps, record, control, events_tx).await;
                    (outcome.status(), outcome.error())
                }
                PersistedJob::Batch(batch) => {
                    let outcome = BatchTask::new(deps, batch, control, events_tx).run().await;
                    (outcome.status(), outcome.message())
                }
            }
        });

        // The channel closes once the task and all its children are gone
        while let Some(event) = events_rx.recv().await {
            self.forward(&job, event);
        }

        let (status, message) = match work.await {
            Ok(result) => result,
            Err(e) => {
                error!(job_id = %job, error = %e, "Download task crashed");
                let message = "download task crashed".to_string();
                if let Err(e) = self
                    .persist_status(&job, DownloadStatus::Failed, Some(&message))
                    .await
                {
                    warn!(job_id = %job, error = %e, "Could not persist crash");
                }
                (DownloadStatus::Failed, Some(message))
            }
        };

        if status == DownloadStatus::Downloading {
            debug!(job_id = %job, "Job interrupted, left for the next start");
        } else {
            self.announce(&job, status, message).await;
        }

        self.registry.remove(&job).await;
        finished.send_replace(Some(status));
    }

    /// Turn a task message into an outbound event.
    fn forward(&self, job: &JobId, event: TaskEvent) {
        let job_id = job.to_string();
        let game_id = job.game_id().to_string();
        let event = match event {
            TaskEvent::FileProgress {
                downloaded,
                total,
                speed_bps,
                eta_seconds,
                ..
            } => DownloadEvent::progress(
                job_id,
                game_id,
                ProgressSnapshot {
                    bytes_downloaded: downloaded,
                    total_bytes: total,
                    speed_bps,
                    eta_seconds,
                    current_file_index: 0,
                    total_files: 1,
                },
            ),
            TaskEvent::BatchProgress { snapshot, .. } => {
                DownloadEvent::progress(job_id, game_id, snapshot)
            }
            TaskEvent::FileFinished {
                download_id,
                file_index,
                file_name,
                status,
                error,
            } => DownloadEvent::FileFinished {
                job_id,
                game_id,
                download_id: download_id.to_string(),
                file_index,
                file_name,
                status,
                error,
            },
        };
        self.emitter.emit(event);
    }

    /// Update the game status and tell listeners about a transition.
    async fn announce(&self, job: &JobId, status: DownloadStatus, message: Option<String>) {
        let game_id = job.game_id();
        if let Err(e) = self
            .deps
            .downloads
            .set_game_status(game_id, status.game_status())
            .await
        {
            warn!(game_id, error = %e, "Could not update game status");
        }
        self.emitter.emit(DownloadEvent::status_changed(
            job.to_string(),
            game_id,
            status,
            message,
        ));
    }

    async fn persist_status(
        &self,
        job: &JobId,
        status: DownloadStatus,
        error: Option<&str>,
    ) -> Result<(), DownloadError> {
        let downloads = &self.deps.downloads;
        match job {
            JobId::Download(id) => downloads.update_download_status(id, status, error).await?,
            JobId::Batch(id) => downloads.update_batch_status(id, status, error).await?,
        }
        Ok(())
    }

    async fn reset_file(&self, record: &DownloadRecord) -> Result<(), DownloadError> {
        discard_partial(&self.deps, &record.id, &record.destination_name()).await?;
        self.deps.downloads.reset_download(&record.id).await?;
        Ok(())
    }

    /// Remove the file records of a batch that are not in `keep`.
    async fn discard_batch_files(
        &self,
        batch_id: &BatchId,
        keep: &HashSet<DownloadId>,
    ) -> Result<(), DownloadError> {
        let files = self.deps.downloads.list_batch_downloads(batch_id).await?;
        for record in files.iter().filter(|r| !keep.contains(&r.id)) {
            discard_partial(&self.deps, &record.id, &record.destination_name()).await?;
            self.deps.downloads.remove_download(&record.id).await?;
        }
        Ok(())
    }

    async fn cancel_batch_files(&self, batch_id: &BatchId) -> Result<(), DownloadError> {
        let files = self.deps.downloads.list_batch_downloads(batch_id).await?;
        for record in files.iter().filter(|r| {
            !matches!(
                r.status,
                DownloadStatus::Completed | DownloadStatus::Cancelled
            )
        }) {
            discard_partial(&self.deps, &record.id, &record.destination_name()).await?;
            self.deps
                .downloads
                .update_download_status(&record.id, DownloadStatus::Cancelled, None)
                .await?;
        }
        Ok(())
    }
}

fn validate_batch(game_id: &str, targets: &[DownloadTarget]) -> Result<(), DownloadError> {
    if targets.is_empty() {
        return Err(DownloadError::invalid_batch("a batch needs at least one file"));
    }
    if let Some(foreign) = targets.iter().find(|t| t.game_id != game_id) {
        return Err(DownloadError::invalid_batch(format!(
            "file {} belongs to game {}, not {game_id}",
            foreign.file_name, foreign.game_id
        )));
    }
    let mut seen = HashMap::new();
    for target in targets {
        if let Some(first) = seen.insert(&target.link_id, &target.file_name) {
            return Err(DownloadError::invalid_batch(format!(
                "link {} is listed twice ({first}, {})",
                target.link_id, target.file_name
            )));
        }
    }
    Ok(())
}

/// Resolve a standalone file's URL, then download it.
async fn run_download(
    deps: WorkerDeps,
    mut record: DownloadRecord,
    control: TaskControl,
    events: mpsc::UnboundedSender<TaskEvent>,
) -> FileOutcome {
    let target = record.target();
    let resolved = tokio::select! {
        () = control.stopped() => None,
        resolved = deps.resolver.resolve(&target) => Some(resolved),
    };

    let link = match resolved {
        None => {
            return FileTask::record_stop(&deps, &record.id, &record.destination_name(), &control)
                .await;
        }
        Some(Err(e)) => {
            warn!(download_id = %record.id, error = %e, "Could not resolve download link");
            let message = e.to_string();
            if let Err(e) = deps
                .downloads
                .update_download_status(&record.id, DownloadStatus::Failed, Some(&message))
                .await
            {
                warn!(download_id = %record.id, error = %e, "Could not record failure");
            }
            return FileOutcome::Failed(e);
        }
        Some(Ok(link)) => link,
    };

    if let Err(e) = deps.downloads.update_download_url(&record.id, &link.url).await {
        warn!(download_id = %record.id, error = %e, "Could not store resolved URL");
    }
    if record.total_bytes == 0 {
        record.total_bytes = link.size.unwrap_or(0);
    }

    FileTask::new(deps, &record, link.url, control, events)
        .run()
        .await
}
