//! Main CLI parser and top-level argument handling.
//!
//! This module defines the root CLI structure with global options.

use std::path::PathBuf;

use clap::Parser;

use gogload_core::{BatchId, DownloadId, JobId};

use crate::commands::Commands;

/// Command-line interface for the gogload download engine.
///
/// Global options configure the engine; the subcommand says what to do.
#[derive(Parser)]
#[command(name = "gogload")]
#[command(about = "Segmented, resumable downloads of game installers")]
#[command(version)]
pub struct Cli {
    /// Database holding download state
    #[arg(long = "db", env = "GOGLOAD_DB", global = true)]
    pub db: Option<PathBuf>,

    /// Directory downloads are written to
    #[arg(long = "dest", env = "GOGLOAD_DEST", global = true)]
    pub dest: Option<PathBuf>,

    /// Segments per file
    #[arg(long = "segments", env = "GOGLOAD_SEGMENTS", global = true)]
    pub segments: Option<u32>,

    /// Concurrent segment transfers
    #[arg(long = "workers", env = "GOGLOAD_WORKERS", global = true)]
    pub workers: Option<u32>,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Parse a job reference.
///
/// Accepts the canonical `download:<game>:<link>` and `batch:<game>` forms, plus
/// the shorthands `<game>:<link>` and `<game>`.
pub fn parse_job_id(raw: &str) -> Result<JobId, String> {
    let raw = raw.trim();
    if raw.starts_with("download:") || raw.starts_with("batch:") {
        return raw.parse().map_err(|e| format!("{e}"));
    }
    if raw.contains(':') {
        return raw
            .parse::<DownloadId>()
            .map(JobId::Download)
            .map_err(|e| format!("{e}"));
    }
    if raw.is_empty() {
        return Err("job id must not be empty".to_string());
    }
    Ok(JobId::Batch(BatchId::for_game(raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parser_builds() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_args() {
        let cli = Cli::parse_from([
            "gogload",
            "--verbose",
            "--dest",
            "/tmp/games",
            "--segments",
            "8",
            "status",
        ]);
        assert!(cli.verbose);
        assert_eq!(cli.dest, Some(PathBuf::from("/tmp/games")));
        assert_eq!(cli.segments, Some(8));
        assert!(matches!(cli.command, Some(Commands::Status)));
    }

    #[test]
    fn test_job_id_forms() {
        assert_eq!(
            parse_job_id("download:42:setup").unwrap(),
            JobId::Download(DownloadId::new("42", "setup"))
        );
        assert_eq!(
            parse_job_id("42:setup").unwrap(),
            JobId::Download(DownloadId::new("42", "setup"))
        );
        assert_eq!(
            parse_job_id("batch:42").unwrap(),
            JobId::Batch(BatchId::for_game("42"))
        );
        assert_eq!(parse_job_id("42").unwrap(), JobId::Batch(BatchId::for_game("42")));
        assert!(parse_job_id("").is_err());
        assert!(parse_job_id("42:").is_err());
    }

    #[test]
    fn test_pause_takes_a_job() {
        let cli = Cli::parse_from(["gogload", "pause", "42:setup"]);
        match cli.command {
            Some(Commands::Pause { job }) => {
                assert_eq!(job, JobId::Download(DownloadId::new("42", "setup")));
            }
            _ => panic!("expected pause"),
        }
    }
}
