//! Registry of running jobs.
//!
//! Each entry holds the job's stop signal and a `watch` receiver that flips to
//! `Some(status)` once the job has finished, so callers can signal a job and
//! then wait for it to settle.

use std::collections::HashMap;

use tokio::sync::{Mutex, watch};

use gogload_core::{DownloadError, DownloadStatus, JobId};

use crate::executor::TaskControl;

/// Sender half handed to the task running a job.
pub type FinishedSender = watch::Sender<Option<DownloadStatus>>;

/// A running job.
#[derive(Clone)]
pub struct ActiveJob {
    pub control: TaskControl,
    pub finished: watch::Receiver<Option<DownloadStatus>>,
}

/// Active jobs keyed by id.
///
/// A batch owns its whole game, so a batch and any other job of the same game
/// never run side by side.
#[derive(Default)]
pub struct JobRegistry {
    jobs: Mutex<HashMap<JobId, ActiveJob>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `job` as running, failing if it (or a job it overlaps) already is.
    pub async fn reserve(
        &self,
        job: &JobId,
        control: TaskControl,
    ) -> Result<FinishedSender, DownloadError> {
        let mut jobs = self.jobs.lock().await;
        if let Some(existing) = Self::find_conflict(&jobs, job) {
            return Err(DownloadError::already_active(existing));
        }
        let (tx, rx) = watch::channel(None);
        jobs.insert(
            job.clone(),
            ActiveJob {
                control,
                finished: rx,
            },
        );
        Ok(tx)
    }

    pub async fn get(&self, job: &JobId) -> Option<ActiveJob> {
        self.jobs.lock().await.get(job).cloned()
    }

    pub async fn remove(&self, job: &JobId) {
        self.jobs.lock().await.remove(job);
    }

    pub async fn ids(&self) -> Vec<JobId> {
        self.jobs.lock().await.keys().cloned().collect()
    }

    pub async fn snapshot(&self) -> Vec<(JobId, ActiveJob)> {
        self.jobs
            .lock()
            .await
            .iter()
            .map(|(id, job)| (id.clone(), job.clone()))
            .collect()
    }

    /// The running job that would block `job` from starting, if any.
    pub async fn conflict(&self, job: &JobId) -> Option<JobId> {
        Self::find_conflict(&*self.jobs.lock().await, job)
    }

    fn find_conflict(jobs: &HashMap<JobId, ActiveJob>, job: &JobId) -> Option<JobId> {
        if jobs.contains_key(job) {
            return Some(job.clone());
        }
        jobs.keys()
            .find(|running| {
                let either_batch =
                    matches!(running, JobId::Batch(_)) || matches!(job, JobId::Batch(_));
                either_batch && running.game_id() == job.game_id()
            })
            .cloned()
    }
}

/// Wait until a job reports its final status.
///
/// Returns `None` if the job went away without reporting.
pub async fn wait_finished(
    mut finished: watch::Receiver<Option<DownloadStatus>>,
) -> Option<DownloadStatus> {
    finished
        .wait_for(Option::is_some)
        .await
        .ok()
        .and_then(|status| *status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gogload_core::{BatchId, DownloadId};

    fn download(game: &str, link: &str) -> JobId {
        JobId::Download(DownloadId::new(game, link))
    }

    #[tokio::test]
    async fn reserve_rejects_the_same_job_twice() {
        let registry = JobRegistry::new();
        let job = download("1", "a");

        registry.reserve(&job, TaskControl::new()).await.unwrap();
        let err = registry.reserve(&job, TaskControl::new()).await.unwrap_err();
        assert!(matches!(err, DownloadError::AlreadyActive { .. }));

        registry.remove(&job).await;
        assert!(registry.reserve(&job, TaskControl::new()).await.is_ok());
    }

    #[tokio::test]
    async fn batch_blocks_other_jobs_of_its_game() {
        let registry = JobRegistry::new();
        let batch = JobId::Batch(BatchId::for_game("1"));
        registry.reserve(&batch, TaskControl::new()).await.unwrap();

        assert_eq!(registry.conflict(&download("1", "a")).await, Some(batch.clone()));
        assert_eq!(registry.conflict(&download("2", "a")).await, None);
    }

    #[tokio::test]
    async fn standalone_downloads_of_one_game_coexist() {
        let registry = JobRegistry::new();
        registry.reserve(&download("1", "a"), TaskControl::new()).await.unwrap();
        registry.reserve(&download("1", "b"), TaskControl::new()).await.unwrap();

        assert_eq!(registry.ids().await.len(), 2);
        assert!(
            registry
                .conflict(&JobId::Batch(BatchId::for_game("1")))
                .await
                .is_some()
        );
    }

    #[tokio::test]
    async fn wait_finished_sees_the_reported_status() {
        let registry = JobRegistry::new();
        let job = download("1", "a");
        let done = registry.reserve(&job, TaskControl::new()).await.unwrap();
        let active = registry.get(&job).await.unwrap();

        let waiter = tokio::spawn(wait_finished(active.finished));
        done.send_replace(Some(DownloadStatus::Paused));
        assert_eq!(waiter.await.unwrap(), Some(DownloadStatus::Paused));
    }

    #[tokio::test]
    async fn wait_finished_returns_none_when_dropped() {
        let registry = JobRegistry::new();
        let job = download("1", "a");
        let done = registry.reserve(&job, TaskControl::new()).await.unwrap();
        let active = registry.get(&job).await.unwrap();

        drop(done);
        assert_eq!(wait_finished(active.finished).await, None);
    }
}
