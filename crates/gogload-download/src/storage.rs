//! Local filesystem storage.
//!
//! Implements [`StoragePort`] over a root directory. Handles are relative
//! paths (`game_id/file_name`) resolved under that root.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{self, OpenOptions};

use gogload_core::{DownloadError, StorageHandle, StoragePort};
use gogload_core::ports::{StorageReader, StorageWriter};

/// Destination storage rooted at a local directory.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path for a storage name. Names escaping the root are rejected.
    pub fn resolve(&self, name: &str) -> Result<PathBuf, DownloadError> {
        let relative = Path::new(name);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if name.is_empty() || escapes {
            return Err(DownloadError::storage(format!(
                "'{name}' is not a path inside the download folder"
            )));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl StoragePort for LocalStorage {
    async fn create_file(&self, name: &str) -> Result<StorageHandle, DownloadError> {
        let path = self.resolve(name)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| DownloadError::storage_io("create directory", &e))?;
        }
        OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .await
            .map_err(|e| DownloadError::storage_io("create", &e))?;
        Ok(StorageHandle::new(name))
    }

    async fn open_for_write(
        &self,
        handle: &StorageHandle,
        append: bool,
    ) -> Result<StorageWriter, DownloadError> {
        let path = self.resolve(handle.name())?;
        let mut options = OpenOptions::new();
        options.create(true);
        if append {
            options.append(true);
        } else {
            options.write(true).truncate(true);
        }
        let file = options
            .open(&path)
            .await
            .map_err(|e| DownloadError::storage_io("open for write", &e))?;
        Ok(Box::new(file))
    }

    async fn open_for_read(&self, handle: &StorageHandle) -> Result<StorageReader, DownloadError> {
        let path = self.resolve(handle.name())?;
        let file = fs::File::open(&path)
            .await
            .map_err(|e| DownloadError::storage_io("open for read", &e))?;
        Ok(Box::new(file))
    }

    async fn truncate(&self, handle: &StorageHandle, len: u64) -> Result<(), DownloadError> {
        let path = self.resolve(handle.name())?;
        let file = OpenOptions::new()
            .write(true)
            .open(&path)
            .await
            .map_err(|e| DownloadError::storage_io("open for truncate", &e))?;
        file.set_len(len)
            .await
            .map_err(|e| DownloadError::storage_io("truncate", &e))
    }

    async fn size(&self, handle: &StorageHandle) -> Result<Option<u64>, DownloadError> {
        let path = self.resolve(handle.name())?;
        match fs::metadata(&path).await {
            Ok(meta) => Ok(Some(meta.len())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(DownloadError::storage_io("stat", &e)),
        }
    }

    async fn delete(&self, handle: &StorageHandle) -> Result<(), DownloadError> {
        let path = self.resolve(handle.name())?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(DownloadError::storage_io("delete", &e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    async fn write(storage: &LocalStorage, handle: &StorageHandle, data: &[u8], append: bool) {
        let mut writer = storage.open_for_write(handle, append).await.unwrap();
        writer.write_all(data).await.unwrap();
        writer.flush().await.unwrap();
    }

    async fn read(storage: &LocalStorage, handle: &StorageHandle) -> Vec<u8> {
        let mut reader = storage.open_for_read(handle).await.unwrap();
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await.unwrap();
        buf
    }

    #[tokio::test]
    async fn create_makes_parent_dirs_and_keeps_content() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());

        let handle = storage.create_file("42/setup.exe").await.unwrap();
        assert!(dir.path().join("42/setup.exe").exists());

        write(&storage, &handle, b"abc", false).await;
        storage.create_file("42/setup.exe").await.unwrap();
        assert_eq!(read(&storage, &handle).await, b"abc");
    }

    #[tokio::test]
    async fn append_and_truncate() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        let handle = storage.create_file("42/a.part0").await.unwrap();

        write(&storage, &handle, b"hello", true).await;
        write(&storage, &handle, b" world", true).await;
        assert_eq!(storage.size(&handle).await.unwrap(), Some(11));

        storage.truncate(&handle, 5).await.unwrap();
        assert_eq!(read(&storage, &handle).await, b"hello");

        write(&storage, &handle, b"X", false).await;
        assert_eq!(read(&storage, &handle).await, b"X");
    }

    #[tokio::test]
    async fn size_and_delete_of_missing_file() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        let handle = StorageHandle::new("42/missing.bin");

        assert_eq!(storage.size(&handle).await.unwrap(), None);
        storage.delete(&handle).await.unwrap();
    }

    #[test]
    fn names_cannot_escape_the_root() {
        let storage = LocalStorage::new("/downloads");
        assert!(storage.resolve("../etc/passwd").is_err());
        assert!(storage.resolve("/etc/passwd").is_err());
        assert!(storage.resolve("").is_err());
        assert_eq!(
            storage.resolve("42/setup.exe").unwrap(),
            PathBuf::from("/downloads/42/setup.exe")
        );
    }
}
