//! Destination storage port.
//!
//! Storage is owned by an external collaborator (a folder picked by the user,
//! a mounted volume). The engine only ever sees opaque handles and streams.

use std::fmt;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::download::DownloadError;

/// Boxed reader returned by [`StoragePort::open_for_read`].
pub type StorageReader = Box<dyn AsyncRead + Send + Unpin>;

/// Boxed writer returned by [`StoragePort::open_for_write`].
pub type StorageWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Opaque reference to a file inside destination storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageHandle(String);

impl StorageHandle {
    /// Wrap a storage-relative name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The storage-relative name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StorageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Port for the destination storage collaborator.
///
/// Every failure is reported as `DownloadError::Storage`; the engine never tries
/// to re-acquire permissions itself.
#[async_trait]
pub trait StoragePort: Send + Sync {
    /// Create `name` if it does not exist (existing content is kept) and return its handle.
    async fn create_file(&self, name: &str) -> Result<StorageHandle, DownloadError>;

    /// Open for writing, appending to existing content or truncating it.
    async fn open_for_write(
        &self,
        handle: &StorageHandle,
        append: bool,
    ) -> Result<StorageWriter, DownloadError>;

    /// Open for reading from the start.
    async fn open_for_read(&self, handle: &StorageHandle) -> Result<StorageReader, DownloadError>;

    /// Cut the file back to `len` bytes.
    async fn truncate(&self, handle: &StorageHandle, len: u64) -> Result<(), DownloadError>;

    /// Current size, or `None` if the file does not exist.
    async fn size(&self, handle: &StorageHandle) -> Result<Option<u64>, DownloadError>;

    /// Delete the file. Deleting a missing file is not an error.
    async fn delete(&self, handle: &StorageHandle) -> Result<(), DownloadError>;
}
