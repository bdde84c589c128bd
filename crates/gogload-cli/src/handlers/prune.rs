//! Prune command handler.

use crate::bootstrap::CliContext;
use crate::error::CliError;

/// Forget jobs that finished more than `days` days ago.
pub async fn execute(ctx: &CliContext, days: u32) -> Result<(), CliError> {
    let removed = ctx.supervisor.prune_history(days).await?;
    println!("Removed {removed} finished job(s) older than {days} day(s).");
    Ok(())
}
