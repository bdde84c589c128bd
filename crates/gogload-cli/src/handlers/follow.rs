//! Foreground wait for running jobs.
//!
//! Renders events until every job has settled, and turns Ctrl-C into a clean
//! shutdown that leaves the jobs resumable.

use tokio::sync::broadcast::{self, error::RecvError};

use gogload_core::{DownloadEvent, DownloadStatus, JobId};

use crate::bootstrap::CliContext;
use crate::error::CliError;
use crate::presentation::ProgressDisplay;

/// Render events until every running job has finished, then check how `jobs` ended.
///
/// `events` must have been subscribed before the jobs were started so no
/// early event is missed.
pub async fn execute(
    ctx: &CliContext,
    mut events: broadcast::Receiver<DownloadEvent>,
    jobs: &[JobId],
) -> Result<(), CliError> {
    let mut display = ProgressDisplay::new();

    let done = ctx.supervisor.wait_all();
    tokio::pin!(done);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut events_open = true;

    let interrupted = loop {
        tokio::select! {
            () = &mut done => break false,
            _ = &mut ctrl_c => {
                eprintln!("Stopping downloads...");
                ctx.supervisor.shutdown().await;
                break true;
            }
            event = events.recv(), if events_open => match event {
                Ok(event) => display.handle(&event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "progress display fell behind");
                }
                Err(RecvError::Closed) => events_open = false,
            },
        }
    };

    while let Ok(event) = events.try_recv() {
        display.handle(&event);
    }
    display.finish();

    if interrupted {
        return Err(CliError::Interrupted);
    }

    let mut failed = 0;
    for job in jobs {
        let status = ctx.supervisor.status(job).await?;
        if status != DownloadStatus::Completed {
            failed += 1;
        }
    }
    if failed > 0 {
        return Err(CliError::Incomplete {
            failed,
            total: jobs.len(),
        });
    }
    Ok(())
}
