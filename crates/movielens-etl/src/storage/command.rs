//! Durable storage through an external CLI
//!
//! Invocations follow the `dbfs` shape:
//! `{program} cp [--recursive] [--overwrite] <src> <dst>` and
//! `{program} rm [--recursive] <path>`.

use async_trait::async_trait;
use std::io;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use super::{CopyOptions, StorageBridge, invalid_path};
use crate::errors::{StorageError, StorageResult};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Clone)]
pub struct CommandStorageBridge {
    program: String,
    timeout: Duration,
}

impl CommandStorageBridge {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn copy_args(source: &str, destination: &str, options: CopyOptions) -> Vec<String> {
        let mut args = vec!["cp".to_string()];
        if options.recursive {
            args.push("--recursive".to_string());
        }
        if options.overwrite {
            args.push("--overwrite".to_string());
        }
        args.push(source.to_string());
        args.push(destination.to_string());
        args
    }

    pub fn remove_args(path: &str, recursive: bool) -> Vec<String> {
        let mut args = vec!["rm".to_string()];
        if recursive {
            args.push("--recursive".to_string());
        }
        args.push(path.to_string());
        args
    }

    async fn run(&self, operation: &'static str, args: Vec<String>) -> StorageResult<()> {
        debug!("Running {} {}", self.program, args.join(" "));

        let mut cmd = Command::new(&self.program);
        cmd.args(&args);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| {
                StorageError::new(
                    operation,
                    io::ErrorKind::TimedOut,
                    format!("{} timed out after {:?}", self.program, self.timeout),
                )
            })?
            .map_err(|e| StorageError::from_io(operation, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let code = output
                .status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            warn!("{} {} exited with {}: {}", self.program, operation, code, stderr);
            return Err(StorageError::new(
                operation,
                io::ErrorKind::Other,
                format!("{} exited with status {}: {}", self.program, code, stderr),
            ));
        }

        Ok(())
    }
}

#[async_trait]
impl StorageBridge for CommandStorageBridge {
    fn name(&self) -> &'static str {
        "command"
    }

    async fn copy(
        &self,
        source: &str,
        destination: &str,
        options: CopyOptions,
    ) -> StorageResult<()> {
        if source.trim().is_empty() {
            return Err(invalid_path("copy", source));
        }
        if destination.trim().is_empty() {
            return Err(invalid_path("copy", destination));
        }
        self.run("copy", Self::copy_args(source, destination, options))
            .await
    }

    async fn remove(&self, path: &str, recursive: bool) -> StorageResult<()> {
        if path.trim().is_empty() {
            return Err(invalid_path("remove", path));
        }
        self.run("remove", Self::remove_args(path, recursive)).await
    }
}
