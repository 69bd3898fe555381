//! Durable storage bridge
//!
//! The pipeline stages its dataset on durable storage between download and
//! warehouse load, and removes it again during cleanup. Two backends exist:
//!
//! - **Local**: the durable root is a directory on this machine
//! - **Command**: paths are handed to an external CLI (`dbfs cp`, `dbfs rm`)
//!
//! Both report failures as [`StorageError`] and never panic past this boundary.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::config::{StorageBackend, StorageConfig};
use crate::errors::{StorageError, StorageResult};

pub mod command;
pub mod local;

pub use command::CommandStorageBridge;
pub use local::LocalStorageBridge;

/// Options for [`StorageBridge::copy`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyOptions {
    pub recursive: bool,
    pub overwrite: bool,
}

impl CopyOptions {
    /// Recursive copy that replaces whatever is already at the destination
    pub fn recursive_overwrite() -> Self {
        Self {
            recursive: true,
            overwrite: true,
        }
    }
}

/// Copy and remove operations against durable storage
#[async_trait]
pub trait StorageBridge: Send + Sync {
    /// Short backend name for logging
    fn name(&self) -> &'static str;

    async fn copy(&self, source: &str, destination: &str, options: CopyOptions)
        -> StorageResult<()>;

    /// Remove `path`. Removing something that does not exist is not an error.
    async fn remove(&self, path: &str, recursive: bool) -> StorageResult<()>;
}

/// Build the bridge selected by `[storage] backend`
pub fn create_storage_bridge(config: &StorageConfig) -> Arc<dyn StorageBridge> {
    debug!("Creating {:?} storage bridge", config.backend);
    match config.backend {
        StorageBackend::Local => Arc::new(LocalStorageBridge::new()),
        StorageBackend::Command => Arc::new(
            CommandStorageBridge::new(config.command.clone()).with_timeout(config.command_timeout),
        ),
    }
}

pub(crate) fn invalid_path(operation: &'static str, path: &str) -> StorageError {
    StorageError::new(
        operation,
        std::io::ErrorKind::InvalidInput,
        format!("invalid storage path '{path}'"),
    )
}
