//! Status command handler.
//!
//! Lists every download and batch that has not reached a final state.

use gogload_core::{DownloadRecord, JobId};

use crate::bootstrap::CliContext;
use crate::error::CliError;
use crate::presentation::{format_bytes, format_timestamp, print_separator, truncate_string};

/// Execute the status command.
pub async fn execute(ctx: &CliContext) -> Result<(), CliError> {
    let unfinished = ctx.supervisor.unfinished().await?;

    if unfinished.batches.is_empty() && unfinished.downloads.is_empty() {
        println!("No unfinished downloads.");
        return Ok(());
    }

    println!(
        "{:<36} {:<12} {:>8} {:>10} {:>10} {:<16}",
        "Job", "Status", "Progress", "Done", "Size", "Started"
    );
    print_separator(98);

    for (batch, files) in &unfinished.batches {
        let done: u64 = files.iter().map(|f| f.downloaded_bytes).sum();
        let total: u64 = files.iter().map(|f| f.total_bytes).sum();
        let job = JobId::Batch(batch.id.clone()).to_string();
        println!(
            "{:<36} {:<12} {:>7.1}% {:>10} {:>10} {:<16}",
            truncate_string(&job, 35),
            batch.status,
            percent(done, total),
            format_bytes(done),
            format_bytes(total),
            format_timestamp(batch.start_time),
        );
        for file in files {
            println!(
                "  {:<34} {:<12} {:>7.1}% {:>10} {:>10}",
                truncate_string(&file.file_name, 33),
                file.status,
                file.progress_percent,
                format_bytes(file.downloaded_bytes),
                format_bytes(file.total_bytes),
            );
        }
    }

    for record in &unfinished.downloads {
        print_download(record);
    }

    Ok(())
}

fn print_download(record: &DownloadRecord) {
    let job = JobId::Download(record.id.clone()).to_string();
    println!(
        "{:<36} {:<12} {:>7.1}% {:>10} {:>10} {:<16}",
        truncate_string(&job, 35),
        record.status,
        record.progress_percent,
        format_bytes(record.downloaded_bytes),
        format_bytes(record.total_bytes),
        format_timestamp(record.start_time),
    );
    if let Some(error) = &record.error_message {
        println!("  last error: {error}");
    }
}

#[allow(clippy::cast_precision_loss)]
fn percent(done: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        done as f64 / total as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_of_unknown_total_is_zero() {
        assert!(percent(10, 0).abs() < f64::EPSILON);
        assert!((percent(25, 100) - 25.0).abs() < f64::EPSILON);
    }
}
