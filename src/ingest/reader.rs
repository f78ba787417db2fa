// src/ingest/reader.rs
use super::shutdown::Shutdown;
use crate::domain::errors::{IngestError, IngestResult};
use std::io;
use std::path::Path;
use std::time::Duration;

/// How often and how patiently a freshly created file is re-read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_secs(1),
        }
    }
}

/// Non-empty lines of a file and the attempt that produced them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLines {
    pub lines: Vec<String>,
    pub attempts: u32,
}

/// Reads files announced by the watcher, which may fire before the writer has
/// made the path visible or readable.
#[derive(Debug, Clone)]
pub struct RetryingFileReader {
    policy: RetryPolicy,
    shutdown: Shutdown,
}

impl RetryingFileReader {
    pub fn new(policy: RetryPolicy, shutdown: Shutdown) -> Self {
        Self { policy, shutdown }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Read the non-empty lines of `path`, retrying missing or unreadable files.
    ///
    /// Gives up with `RetriesExhausted` after `max_attempts`; a shutdown
    /// request between attempts ends the read with `Cancelled`.
    pub async fn read_lines(&self, path: &Path) -> IngestResult<FileLines> {
        let max_attempts = self.policy.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            match try_read(path).await {
                Ok(content) => {
                    return Ok(FileLines {
                        lines: non_empty_lines(&content),
                        attempts: attempt,
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    log::info!("File does not exist, retrying after delay: {}", path.display());
                }
                Err(e) => {
                    log::warn!(
                        "Failed to read file, retrying after delay {}: {}",
                        path.display(),
                        e
                    );
                }
            }

            if attempt < max_attempts {
                self.pause(path).await?;
            }
        }

        Err(IngestError::RetriesExhausted {
            path: path.to_path_buf(),
            attempts: max_attempts,
        })
    }

    async fn pause(&self, path: &Path) -> IngestResult<()> {
        let mut shutdown = self.shutdown.clone();
        tokio::select! {
            _ = tokio::time::sleep(self.policy.delay) => Ok(()),
            _ = shutdown.wait() => Err(IngestError::Cancelled {
                path: path.to_path_buf(),
            }),
        }
    }
}

async fn try_read(path: &Path) -> io::Result<Vec<u8>> {
    tokio::fs::metadata(path).await?;
    tokio::fs::read(path).await
}

/// Split raw file content into lines, dropping blank ones.
///
/// Each line is converted on its own; invalid UTF-8 is replaced within that
/// line only, so it fails to decode without taking its neighbours with it.
pub fn non_empty_lines(content: &[u8]) -> Vec<String> {
    content
        .split(|&byte| byte == b'\n')
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
        .map(|line| String::from_utf8_lossy(line).into_owned())
        .filter(|line| !line.trim().is_empty())
        .collect()
}
