//! Default locations for application data.
//!
//! Entry points call these to find the database and the default download
//! folder when the user does not supply them.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Environment variable overriding the data root.
pub const DATA_DIR_ENV: &str = "GOGLOAD_DATA_DIR";

/// Errors that can occur during path resolution.
#[derive(Debug, Error)]
pub enum PathError {
    /// Could not determine the system data directory.
    #[error("Cannot determine system data directory")]
    NoDataDir,

    /// Failed to create a directory.
    #[error("Failed to create directory {path}: {reason}")]
    CreateFailed { path: PathBuf, reason: String },
}

/// Get the root directory for application data.
///
/// Resolution order:
/// 1. `GOGLOAD_DATA_DIR` environment variable
/// 2. System data directory (e.g., `~/.local/share/gogload`)
pub fn data_root() -> Result<PathBuf, PathError> {
    let root = match env::var(DATA_DIR_ENV) {
        Ok(path) if !path.trim().is_empty() => PathBuf::from(path),
        _ => dirs::data_local_dir()
            .ok_or(PathError::NoDataDir)?
            .join("gogload"),
    };
    ensure_dir(&root)?;
    Ok(root)
}

/// Path of the `SQLite` database holding download state.
pub fn database_path() -> Result<PathBuf, PathError> {
    Ok(data_root()?.join("gogload.db"))
}

/// Default folder downloaded games are written to.
pub fn default_download_dir() -> Result<PathBuf, PathError> {
    let dir = dirs::download_dir()
        .map_or_else(|| data_root().map(|root| root.join("games")), |d| Ok(d.join("gogload")))?;
    Ok(dir)
}

fn ensure_dir(path: &Path) -> Result<(), PathError> {
    if !path.exists() {
        fs::create_dir_all(path).map_err(|e| PathError::CreateFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_path_ends_with_gogload_db() {
        let result = database_path();
        assert!(result.is_ok());
        let path = result.unwrap();
        assert!(path.to_string_lossy().ends_with("gogload.db"));
    }

    #[test]
    fn test_ensure_dir_creates_nested() {
        let base = env::temp_dir().join(format!("gogload-paths-{}", std::process::id()));
        let nested = base.join("a").join("b");
        ensure_dir(&nested).unwrap();
        assert!(nested.is_dir());
        fs::remove_dir_all(&base).unwrap();
    }
}
