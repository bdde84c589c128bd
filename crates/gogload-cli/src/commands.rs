//! Available subcommands.

use std::path::PathBuf;

use clap::Subcommand;

use gogload_core::JobId;

use crate::parser::parse_job_id;

/// Commands understood by `gogload`.
#[derive(Subcommand)]
pub enum Commands {
    /// Download a single file
    Fetch {
        /// Game the file belongs to
        #[arg(long)]
        game: String,
        /// Link id of the file within the game
        #[arg(long)]
        link: String,
        /// URL to download from
        #[arg(long)]
        url: String,
        /// File name to save as (defaults to the last URL path segment)
        #[arg(long)]
        name: Option<String>,
        /// Expected size in bytes, used when the server does not report one
        #[arg(long)]
        size: Option<u64>,
    },

    /// Download every file listed in a JSON manifest
    Batch {
        /// Path to the manifest
        manifest: PathBuf,
    },

    /// Resume a job, or every unfinished job when none is given
    Resume {
        /// Job to resume
        #[arg(value_parser = parse_job_id)]
        job: Option<JobId>,
    },

    /// Pause a job
    Pause {
        #[arg(value_parser = parse_job_id)]
        job: JobId,
    },

    /// Cancel a job and delete its partial data
    Cancel {
        #[arg(value_parser = parse_job_id)]
        job: JobId,
    },

    /// Retry a failed or cancelled job
    Retry {
        #[arg(value_parser = parse_job_id)]
        job: JobId,
    },

    /// List unfinished downloads and batches
    Status,

    /// Forget finished jobs
    Prune {
        /// Remove jobs that finished more than this many days ago
        #[arg(long, default_value_t = 30)]
        days: u32,
    },
}
