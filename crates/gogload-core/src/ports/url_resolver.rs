//! URL resolution port.
//!
//! Store links are signed and expire, so the engine asks the API-client
//! collaborator for a fresh URL immediately before every file (re)start.

use async_trait::async_trait;

use crate::download::{DownloadError, DownloadTarget};

/// A freshly resolved download link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLink {
    /// Time-limited URL to fetch.
    pub url: String,
    /// Size reported alongside the link, if any.
    pub size: Option<u64>,
}

impl ResolvedLink {
    /// A link without size information.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            size: None,
        }
    }
}

/// Port for resolving `(game_id, link_id)` to a fresh URL.
#[async_trait]
pub trait UrlResolverPort: Send + Sync {
    /// Resolve a fresh URL for a target.
    ///
    /// Errors should be `DownloadError::ResolutionFailed`; the file is then marked
    /// failed without any segment work.
    async fn resolve(&self, target: &DownloadTarget) -> Result<ResolvedLink, DownloadError>;
}

/// Resolver that trusts the URL already stored in the target.
///
/// Suitable for static mirrors and for the command-line tool, where the user
/// supplies the URL directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoredUrlResolver;

#[async_trait]
impl UrlResolverPort for StoredUrlResolver {
    async fn resolve(&self, target: &DownloadTarget) -> Result<ResolvedLink, DownloadError> {
        target
            .url
            .as_ref()
            .map(|url| ResolvedLink {
                url: url.clone(),
                size: target.expected_size,
            })
            .ok_or_else(|| {
                DownloadError::resolution_failed(format!(
                    "no URL recorded for {}:{}",
                    target.game_id, target.link_id
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stored_resolver_returns_target_url() {
        let target = DownloadTarget::new("42", "setup", "setup.exe")
            .with_url("https://cdn.example/setup.exe")
            .with_expected_size(10);
        let link = StoredUrlResolver.resolve(&target).await.unwrap();
        assert_eq!(link.url, "https://cdn.example/setup.exe");
        assert_eq!(link.size, Some(10));
    }

    #[tokio::test]
    async fn stored_resolver_fails_without_url() {
        let target = DownloadTarget::new("42", "setup", "setup.exe");
        let err = StoredUrlResolver.resolve(&target).await.unwrap_err();
        assert!(matches!(err, DownloadError::ResolutionFailed { .. }));
    }
}
