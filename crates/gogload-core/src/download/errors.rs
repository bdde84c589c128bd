//! Download error types.
//!
//! These errors are serializable and carry strings rather than foreign error
//! types like `std::io::Error` or `reqwest::Error`, so they can be persisted as
//! a record's failure reason and cloned into events.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ports::RepositoryError;

/// Error type for download operations.
#[derive(Clone, Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum DownloadError {
    /// Network/HTTP error during a request.
    #[error("Network error: {message}")]
    Network {
        /// Detailed error message.
        message: String,
        /// HTTP status code if available.
        #[serde(skip_serializing_if = "Option::is_none")]
        status_code: Option<u16>,
    },

    /// A read stalled past the configured timeout.
    #[error("Timed out: {message}")]
    Timeout {
        /// What timed out.
        message: String,
    },

    /// The server did not report a usable content length.
    #[error("Could not determine file size: {message}")]
    SizeUnknown {
        /// Detailed error message.
        message: String,
    },

    /// The URL-resolution collaborator could not produce a fresh link.
    #[error("Resolution failed: {message}")]
    ResolutionFailed {
        /// Detailed error message.
        message: String,
    },

    /// Concatenating completed segments into the final file failed.
    #[error("Assembly failed: {message}")]
    Assembly {
        /// Detailed error message.
        message: String,
    },

    /// Destination storage rejected an operation (revoked or missing handle).
    #[error("Storage error: {message}")]
    Storage {
        /// Detailed error message.
        message: String,
    },

    /// One or more segments exhausted their retries.
    #[error("{failed} of {total} segments failed: {first_error}")]
    SegmentsFailed {
        /// Number of failed segments.
        failed: u32,
        /// Number of segments in the file.
        total: u32,
        /// The first segment failure, for context.
        first_error: String,
    },

    /// A batch request was malformed (e.g. no targets).
    #[error("Invalid batch: {message}")]
    InvalidBatch {
        /// Detailed error message.
        message: String,
    },

    /// A job with this id is already running.
    #[error("Already active: {id}")]
    AlreadyActive {
        /// The job ID that is already running.
        id: String,
    },

    /// No job or record with this id exists.
    #[error("Not found: {id}")]
    NotFound {
        /// The ID that wasn't found.
        id: String,
    },

    /// The requested transition is not allowed from the current state.
    #[error("Cannot {action} {id} while {status}")]
    InvalidState {
        /// The job ID.
        id: String,
        /// The attempted operation.
        action: String,
        /// The current status.
        status: String,
    },

    /// Persistence layer failure.
    #[error("Repository error: {message}")]
    Repository {
        /// Detailed error message.
        message: String,
    },

    /// General/uncategorized error.
    #[error("{message}")]
    Other {
        /// Error message.
        message: String,
    },
}

impl DownloadError {
    /// Create a network error without a status code.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            status_code: None,
        }
    }

    /// Create a network error for an unexpected HTTP status.
    pub fn http_status(status_code: u16, message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            status_code: Some(status_code),
        }
    }

    /// Create a timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Create a size-probe error.
    pub fn size_unknown(message: impl Into<String>) -> Self {
        Self::SizeUnknown {
            message: message.into(),
        }
    }

    /// Create a resolution failed error.
    pub fn resolution_failed(message: impl Into<String>) -> Self {
        Self::ResolutionFailed {
            message: message.into(),
        }
    }

    /// Create an assembly error.
    pub fn assembly(message: impl Into<String>) -> Self {
        Self::Assembly {
            message: message.into(),
        }
    }

    /// Create a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Create a storage error from a `std::io::Error`, keeping the operation for context.
    #[must_use]
    pub fn storage_io(operation: &str, err: &std::io::Error) -> Self {
        Self::Storage {
            message: format!("{operation}: {err}"),
        }
    }

    /// Create an aggregate segment failure.
    pub fn segments_failed(failed: u32, total: u32, first_error: impl Into<String>) -> Self {
        Self::SegmentsFailed {
            failed,
            total,
            first_error: first_error.into(),
        }
    }

    /// Create an invalid batch error.
    pub fn invalid_batch(message: impl Into<String>) -> Self {
        Self::InvalidBatch {
            message: message.into(),
        }
    }

    /// Create an already active error.
    pub fn already_active(id: impl std::fmt::Display) -> Self {
        Self::AlreadyActive { id: id.to_string() }
    }

    /// Create a not found error.
    pub fn not_found(id: impl std::fmt::Display) -> Self {
        Self::NotFound { id: id.to_string() }
    }

    /// Create an invalid state transition error.
    pub fn invalid_state(
        id: impl std::fmt::Display,
        action: impl Into<String>,
        status: impl std::fmt::Display,
    ) -> Self {
        Self::InvalidState {
            id: id.to_string(),
            action: action.into(),
            status: status.to_string(),
        }
    }

    /// Create a generic error.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// Whether a segment transfer that failed with this error should be retried.
    ///
    /// Connection resets, stalls and 5xx responses are transient. 4xx responses,
    /// malformed range responses and local storage failures are not.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Network {
                status_code: Some(code),
                ..
            } => *code >= 500,
            Self::Network {
                status_code: None, ..
            }
            | Self::Timeout { .. } => true,
            _ => false,
        }
    }

    /// Convert to a user-friendly message.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Network {
                message,
                status_code: Some(code),
            } => format!("Server responded with HTTP {code}: {message}"),
            Self::Network { message, .. } => format!("Network error: {message}"),
            Self::Timeout { .. } => {
                "The connection stalled. Check your network and resume the download.".to_string()
            }
            Self::SizeUnknown { .. } => {
                "The server did not report the file size, so the download cannot be split."
                    .to_string()
            }
            Self::ResolutionFailed { message } => {
                format!("Could not get a download link: {message}")
            }
            Self::Assembly { message } => format!("Could not assemble the file: {message}"),
            Self::Storage { message } => {
                format!("The download folder is not writable: {message}")
            }
            Self::SegmentsFailed { failed, total, .. } => {
                format!("{failed} of {total} parts could not be downloaded.")
            }
            Self::InvalidBatch { message } => format!("Nothing to download: {message}"),
            Self::AlreadyActive { id } => format!("'{id}' is already downloading."),
            Self::NotFound { id } => format!("No download named '{id}'."),
            Self::InvalidState { id, action, status } => {
                format!("Cannot {action} '{id}' because it is {status}.")
            }
            Self::Repository { message } => format!("Could not save download state: {message}"),
            Self::Other { message } => message.clone(),
        }
    }
}

impl From<RepositoryError> for DownloadError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(id) => Self::NotFound { id },
            other => Self::Repository {
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only volume");
        let err = DownloadError::storage_io("write", &io_err);

        match err {
            DownloadError::Storage { message } => {
                assert_eq!(message, "write: read-only volume");
            }
            _ => panic!("Expected Storage variant"),
        }
        assert!(!DownloadError::storage_io("flush", &io_err).is_transient());
    }

    #[test]
    fn test_error_serialization() {
        let err = DownloadError::http_status(503, "service unavailable");
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("503"));

        let parsed: DownloadError = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, err);
    }

    #[test]
    fn server_errors_and_stalls_are_transient() {
        assert!(DownloadError::http_status(500, "boom").is_transient());
        assert!(DownloadError::http_status(503, "busy").is_transient());
        assert!(DownloadError::network("connection reset").is_transient());
        assert!(DownloadError::timeout("read").is_transient());
    }

    #[test]
    fn client_errors_and_local_failures_are_not_transient() {
        assert!(!DownloadError::http_status(403, "expired link").is_transient());
        assert!(!DownloadError::http_status(404, "gone").is_transient());
        assert!(!DownloadError::storage("revoked").is_transient());
        assert!(!DownloadError::resolution_failed("no link").is_transient());
    }

    #[test]
    fn segment_failure_message_reports_count() {
        let err = DownloadError::segments_failed(2, 4, "HTTP 500");
        assert_eq!(err.to_string(), "2 of 4 segments failed: HTTP 500");
        assert!(err.user_message().contains("2 of 4"));
    }

    #[test]
    fn repository_not_found_maps_to_not_found() {
        let err: DownloadError = RepositoryError::NotFound("42:setup".into()).into();
        assert_eq!(err, DownloadError::not_found("42:setup"));

        let err: DownloadError = RepositoryError::Storage("disk I/O".into()).into();
        assert!(matches!(err, DownloadError::Repository { .. }));
    }
}
