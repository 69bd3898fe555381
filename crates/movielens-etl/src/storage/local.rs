//! Directory-backed durable storage

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, trace};

use super::{CopyOptions, StorageBridge, invalid_path};
use crate::errors::{StorageError, StorageResult};

/// Treats storage paths as local filesystem paths
#[derive(Debug, Clone, Default)]
pub struct LocalStorageBridge;

impl LocalStorageBridge {
    pub fn new() -> Self {
        Self
    }

    fn resolve(operation: &'static str, path: &str) -> StorageResult<PathBuf> {
        let trimmed = path.strip_prefix("file:").unwrap_or(path);
        if trimmed.trim().is_empty() {
            return Err(invalid_path(operation, path));
        }
        Ok(PathBuf::from(trimmed))
    }
}

async fn copy_file(source: &Path, destination: &Path) -> io::Result<u64> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::copy(source, destination).await
}

/// Iterative directory copy; returns the number of files copied
async fn copy_tree(source: &Path, destination: &Path) -> io::Result<usize> {
    let mut copied = 0;
    let mut pending = vec![(source.to_path_buf(), destination.to_path_buf())];

    while let Some((from, to)) = pending.pop() {
        fs::create_dir_all(&to).await?;
        let mut entries = fs::read_dir(&from).await?;
        while let Some(entry) = entries.next_entry().await? {
            let target = to.join(entry.file_name());
            if entry.file_type().await?.is_dir() {
                pending.push((entry.path(), target));
            } else {
                trace!("Copying {:?} -> {:?}", entry.path(), target);
                fs::copy(entry.path(), &target).await?;
                copied += 1;
            }
        }
    }

    Ok(copied)
}

async fn remove_any(path: &Path) -> io::Result<()> {
    let metadata = fs::symlink_metadata(path).await?;
    if metadata.is_dir() {
        fs::remove_dir_all(path).await
    } else {
        fs::remove_file(path).await
    }
}

#[async_trait]
impl StorageBridge for LocalStorageBridge {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn copy(
        &self,
        source: &str,
        destination: &str,
        options: CopyOptions,
    ) -> StorageResult<()> {
        let from = Self::resolve("copy", source)?;
        let to = Self::resolve("copy", destination)?;

        let metadata = fs::metadata(&from)
            .await
            .map_err(|e| StorageError::from_io("copy", e))?;

        if fs::try_exists(&to).await.unwrap_or(false) {
            if !options.overwrite {
                return Err(StorageError::new(
                    "copy",
                    io::ErrorKind::AlreadyExists,
                    format!("destination '{destination}' already exists"),
                ));
            }
            remove_any(&to)
                .await
                .map_err(|e| StorageError::from_io("copy", e))?;
        }

        if metadata.is_dir() {
            if !options.recursive {
                return Err(StorageError::new(
                    "copy",
                    io::ErrorKind::InvalidInput,
                    format!("'{source}' is a directory; recursive copy required"),
                ));
            }
            let files = copy_tree(&from, &to)
                .await
                .map_err(|e| StorageError::from_io("copy", e))?;
            debug!("Copied {} files from {} to {}", files, source, destination);
        } else {
            copy_file(&from, &to)
                .await
                .map_err(|e| StorageError::from_io("copy", e))?;
            debug!("Copied {} to {}", source, destination);
        }

        Ok(())
    }

    async fn remove(&self, path: &str, recursive: bool) -> StorageResult<()> {
        let target = Self::resolve("remove", path)?;

        let metadata = match fs::symlink_metadata(&target).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Nothing to remove at {}", path);
                return Ok(());
            }
            Err(e) => return Err(StorageError::from_io("remove", e)),
        };

        let result = if metadata.is_dir() {
            if recursive {
                fs::remove_dir_all(&target).await
            } else {
                fs::remove_dir(&target).await
            }
        } else {
            fs::remove_file(&target).await
        };

        result.map_err(|e| StorageError::from_io("remove", e))?;
        debug!("Removed {}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn path_str(path: &Path) -> String {
        path.to_string_lossy().into_owned()
    }

    async fn seed_dataset(root: &Path) -> PathBuf {
        let dataset = root.join("ml-latest-small");
        std::fs::create_dir_all(dataset.join("nested")).unwrap();
        std::fs::write(dataset.join("movies.csv"), "movieId,title,genres\n").unwrap();
        std::fs::write(dataset.join("nested/readme.txt"), "hello").unwrap();
        dataset
    }

    #[tokio::test]
    async fn test_recursive_copy_replaces_destination() {
        let temp = TempDir::new().unwrap();
        let source = seed_dataset(temp.path()).await;
        let destination = temp.path().join("remote/ml-latest-small");
        std::fs::create_dir_all(&destination).unwrap();
        std::fs::write(destination.join("stale.csv"), "old").unwrap();

        let bridge = LocalStorageBridge::new();
        bridge
            .copy(
                &path_str(&source),
                &path_str(&destination),
                CopyOptions::recursive_overwrite(),
            )
            .await
            .unwrap();

        assert!(destination.join("movies.csv").exists());
        assert!(destination.join("nested/readme.txt").exists());
        assert!(!destination.join("stale.csv").exists());
    }

    #[tokio::test]
    async fn test_copy_without_overwrite_fails_on_existing_destination() {
        let temp = TempDir::new().unwrap();
        let source = seed_dataset(temp.path()).await;
        let destination = temp.path().join("copy");
        std::fs::create_dir_all(&destination).unwrap();

        let err = LocalStorageBridge::new()
            .copy(
                &path_str(&source),
                &path_str(&destination),
                CopyOptions {
                    recursive: true,
                    overwrite: false,
                },
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind, io::ErrorKind::AlreadyExists);
    }

    #[tokio::test]
    async fn test_directory_copy_requires_recursive() {
        let temp = TempDir::new().unwrap();
        let source = seed_dataset(temp.path()).await;

        let err = LocalStorageBridge::new()
            .copy(
                &path_str(&source),
                &path_str(&temp.path().join("flat")),
                CopyOptions::default(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind, io::ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_copy_of_missing_source_is_not_found() {
        let temp = TempDir::new().unwrap();
        let err = LocalStorageBridge::new()
            .copy(
                &path_str(&temp.path().join("missing")),
                &path_str(&temp.path().join("dest")),
                CopyOptions::recursive_overwrite(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind, io::ErrorKind::NotFound);
        assert_eq!(err.operation, "copy");
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let dataset = seed_dataset(temp.path()).await;
        let bridge = LocalStorageBridge::new();

        bridge.remove(&path_str(&dataset), true).await.unwrap();
        assert!(!dataset.exists());

        bridge.remove(&path_str(&dataset), true).await.unwrap();
    }

    #[tokio::test]
    async fn test_empty_path_is_rejected() {
        let err = LocalStorageBridge::new().remove("  ", true).await.unwrap_err();
        assert_eq!(err.kind, io::ErrorKind::InvalidInput);
    }
}
