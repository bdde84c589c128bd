//! Job control handlers: pause, cancel, retry and resume.

use gogload_core::JobId;

use crate::bootstrap::CliContext;
use crate::error::CliError;
use crate::handlers::follow;

/// Pause a job.
pub async fn pause(ctx: &CliContext, job: &JobId) -> Result<(), CliError> {
    let status = ctx.supervisor.pause(job).await?;
    println!("{job}: {status}");
    Ok(())
}

/// Cancel a job and discard its partial data.
pub async fn cancel(ctx: &CliContext, job: &JobId) -> Result<(), CliError> {
    let status = ctx.supervisor.cancel(job).await?;
    println!("{job}: {status}");
    Ok(())
}

/// Retry a failed or cancelled job in the foreground.
pub async fn retry(ctx: &CliContext, job: &JobId) -> Result<(), CliError> {
    let events = ctx.events.subscribe();
    let started = ctx.supervisor.retry(job).await?;
    println!("Retrying {started}");
    follow::execute(ctx, events, &[started]).await
}

/// Resume one job, or everything a previous run left unfinished.
pub async fn resume(ctx: &CliContext, job: Option<&JobId>) -> Result<(), CliError> {
    let events = ctx.events.subscribe();

    let jobs = if let Some(job) = job {
        let started = ctx.supervisor.resume(job).await?;
        println!("Resuming {started}");
        vec![started]
    } else {
        let summary = ctx.supervisor.restore().await?;
        if summary.paused > 0 {
            println!(
                "{} paused job(s) left alone; resume them by name",
                summary.paused
            );
        }
        if summary.resumed == 0 {
            println!("Nothing to resume.");
            return Ok(());
        }
        println!("Resuming {} job(s)", summary.resumed);
        ctx.supervisor.active_jobs().await
    };

    follow::execute(ctx, events, &jobs).await
}
