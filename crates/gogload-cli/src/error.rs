//! CLI-specific error types and mappings.
//!
//! Maps engine errors to exit codes and user-facing messages.

use gogload_core::{ConfigError, DownloadError, PathError, RepositoryError};
use thiserror::Error;

/// CLI-specific error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Engine error.
    #[error("{}", .0.user_message())]
    Download(#[from] DownloadError),

    /// Argument or input file error.
    #[error("Invalid arguments: {0}")]
    Arguments(String),

    /// IO error (file not found, permission denied, etc.).
    #[error("IO error: {0}")]
    Io(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Some jobs did not complete.
    #[error("{failed} of {total} job(s) did not complete")]
    Incomplete { failed: usize, total: usize },

    /// Stopped by Ctrl-C; progress was kept.
    #[error("Interrupted; run 'gogload resume' to continue")]
    Interrupted,
}

impl CliError {
    /// Map error to appropriate exit code.
    ///
    /// Exit codes follow Unix conventions:
    /// - 0: Success
    /// - 1: General error
    /// - 2: Misuse of shell command (invalid arguments)
    /// - 64-78: Reserved for specific error categories (see sysexits.h)
    /// - 130: Terminated by SIGINT
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Download(_) | Self::Incomplete { .. } => 1,
            Self::Arguments(_) => 2, // EX_USAGE
            Self::Io(_) => 74,       // EX_IOERR
            Self::Config(_) => 78,   // EX_CONFIG
            Self::Database(_) => 73, // EX_CANTCREAT (closest fit)
            Self::Interrupted => 130,
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<PathError> for CliError {
    fn from(err: PathError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<RepositoryError> for CliError {
    fn from(err: RepositoryError) -> Self {
        Self::Database(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes() {
        assert_eq!(CliError::Arguments("x".into()).exit_code(), 2);
        assert_eq!(CliError::Interrupted.exit_code(), 130);
        assert_eq!(
            CliError::Incomplete {
                failed: 1,
                total: 2
            }
            .exit_code(),
            1
        );
        assert_eq!(CliError::from(ConfigError::InvalidChunkSize).exit_code(), 78);
    }

    #[test]
    fn download_errors_show_the_user_message() {
        let err = CliError::from(DownloadError::not_found("batch:42"));
        assert_eq!(err.to_string(), "No download named 'batch:42'.");
        assert_eq!(err.exit_code(), 1);
    }
}
