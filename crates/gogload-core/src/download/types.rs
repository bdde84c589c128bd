//! Core identifiers and inbound descriptors for downloads.
//!
//! Pure data types with no I/O dependencies.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Canonical identifier for a single file download.
///
/// Represented as `game_id:link_id`. The same file of the same game always maps
/// to the same id, which is what lets a restarted process find its segments.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DownloadId {
    game_id: String,
    link_id: String,
}

impl DownloadId {
    /// Create a new download ID.
    pub fn new(game_id: impl Into<String>, link_id: impl Into<String>) -> Self {
        Self {
            game_id: game_id.into(),
            link_id: link_id.into(),
        }
    }

    /// Derive the download ID for a target.
    #[must_use]
    pub fn for_target(target: &DownloadTarget) -> Self {
        Self::new(&target.game_id, &target.link_id)
    }

    /// Get the game ID.
    #[must_use]
    pub fn game_id(&self) -> &str {
        &self.game_id
    }

    /// Get the link ID within the game.
    #[must_use]
    pub fn link_id(&self) -> &str {
        &self.link_id
    }
}

impl fmt::Display for DownloadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.game_id, self.link_id)
    }
}

/// Error returned when parsing a malformed identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid identifier '{0}'")]
pub struct ParseIdError(pub String);

impl FromStr for DownloadId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Game ids are numeric, so the first colon separates the link id
        match s.split_once(':') {
            Some((game, link)) if !game.is_empty() && !link.is_empty() => {
                Ok(Self::new(game, link))
            }
            _ => Err(ParseIdError(s.to_string())),
        }
    }
}

/// Identifier for a batch (one logical install of a game).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(String);

impl BatchId {
    /// The batch ID for a game install.
    pub fn for_game(game_id: impl Into<String>) -> Self {
        Self(game_id.into())
    }

    /// Get the game ID this batch installs.
    #[must_use]
    pub fn game_id(&self) -> &str {
        &self.0
    }

    /// Borrow as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier for anything the supervisor tracks: a standalone file or a batch.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum JobId {
    /// A standalone single-file download.
    Download(DownloadId),
    /// A multi-file batch.
    Batch(BatchId),
}

impl JobId {
    /// The game this job belongs to.
    #[must_use]
    pub fn game_id(&self) -> &str {
        match self {
            Self::Download(id) => id.game_id(),
            Self::Batch(id) => id.game_id(),
        }
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Download(id) => write!(f, "download:{id}"),
            Self::Batch(id) => write!(f, "batch:{id}"),
        }
    }
}

impl FromStr for JobId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some(("download", rest)) => rest.parse().map(Self::Download),
            Some(("batch", rest)) if !rest.is_empty() => Ok(Self::Batch(BatchId::for_game(rest))),
            _ => Err(ParseIdError(s.to_string())),
        }
    }
}

/// One downloadable file, as described by the library/catalog collaborator.
///
/// The URL is optional because links expire: batches persist this description
/// and re-resolve a fresh URL immediately before each use.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadTarget {
    /// Game the file belongs to.
    pub game_id: String,
    /// Stable link identifier within the game (installer part, patch, extra).
    pub link_id: String,
    /// File name of the final artifact.
    pub file_name: String,
    /// A resolved or resolvable URL, if the caller already has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Size advertised by the catalog, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_size: Option<u64>,
}

impl DownloadTarget {
    /// Create a target without a pre-resolved URL.
    pub fn new(
        game_id: impl Into<String>,
        link_id: impl Into<String>,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            game_id: game_id.into(),
            link_id: link_id.into(),
            file_name: file_name.into(),
            url: None,
            expected_size: None,
        }
    }

    /// Attach a URL.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Attach the catalog-advertised size.
    #[must_use]
    pub const fn with_expected_size(mut self, size: u64) -> Self {
        self.expected_size = Some(size);
        self
    }

    /// Storage-relative path of the final artifact.
    #[must_use]
    pub fn destination_name(&self) -> String {
        destination_name(&self.game_id, &self.file_name)
    }
}

/// Storage-relative path of a game's file: `game_id/file_name`.
#[must_use]
pub fn destination_name(game_id: &str, file_name: &str) -> String {
    format!("{game_id}/{file_name}")
}

/// Storage-relative path of one segment's temporary part file.
#[must_use]
pub fn part_name(destination: &str, index: u32) -> String {
    format!("{destination}.part{index}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn download_id_round_trips_through_display() {
        let id = DownloadId::new("1207658924", "en1installer0");
        assert_eq!(id.to_string(), "1207658924:en1installer0");
        assert_eq!("1207658924:en1installer0".parse::<DownloadId>(), Ok(id));
    }

    #[test]
    fn download_id_rejects_missing_link() {
        assert!("1207658924".parse::<DownloadId>().is_err());
        assert!("1207658924:".parse::<DownloadId>().is_err());
    }

    #[test]
    fn job_id_parses_both_kinds() {
        let download: JobId = "download:42:setup".parse().unwrap();
        assert_eq!(download, JobId::Download(DownloadId::new("42", "setup")));
        assert_eq!(download.game_id(), "42");

        let batch: JobId = "batch:42".parse().unwrap();
        assert_eq!(batch, JobId::Batch(BatchId::for_game("42")));
        assert_eq!(batch.to_string(), "batch:42");

        assert!("game:42".parse::<JobId>().is_err());
    }

    #[test]
    fn target_names_are_scoped_by_game() {
        let target = DownloadTarget::new("42", "setup", "setup_game.exe");
        assert_eq!(target.destination_name(), "42/setup_game.exe");
        assert_eq!(part_name(&target.destination_name(), 3), "42/setup_game.exe.part3");
    }
}
