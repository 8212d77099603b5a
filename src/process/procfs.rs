use std::path::{Path, PathBuf};

use futures::future::join_all;
use log::{trace, warn};

use super::{ProcessListFuture, ProcessRecord, ProcessSource};
use crate::error::{RelayError, Result};

const DELETED_SUFFIX: &str = " (deleted)";

/// Scans a proc pseudo-filesystem
#[derive(Debug, Clone)]
pub struct ProcFsSource {
    root: PathBuf,
}

impl Default for ProcFsSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcFsSource {
    pub fn new() -> Self {
        Self::with_root("/proc")
    }

    /// Scan a different root, laid out as `<root>/<pid>/exe`
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    async fn scan(&self) -> Result<Vec<ProcessRecord>> {
        let mut entries = tokio::fs::read_dir(&self.root)
            .await
            .map_err(|e| RelayError::enumeration(format!("{}: {}", self.root.display(), e)))?;

        let mut pids = Vec::new();
        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => {
                    if let Some(pid) = entry.file_name().to_str().and_then(|n| n.parse::<u32>().ok()) {
                        pids.push(pid);
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    warn!("Stopped reading {} early: {}", self.root.display(), err);
                    break;
                }
            }
        }

        let lookups = pids.into_iter().map(|pid| resolve_executable(&self.root, pid));
        Ok(join_all(lookups).await.into_iter().flatten().collect())
    }
}

impl ProcessSource for ProcFsSource {
    fn list_processes(&self) -> ProcessListFuture<'_> {
        Box::pin(self.scan())
    }
}

/// Read `<root>/<pid>/exe`. Failures (exited, permission denied, kernel
/// threads without an image) yield `None`.
pub(super) async fn resolve_executable(root: &Path, pid: u32) -> Option<ProcessRecord> {
    let link = root.join(pid.to_string()).join("exe");
    match tokio::fs::read_link(&link).await {
        Ok(target) => {
            let raw = target.to_string_lossy();
            let path = raw.strip_suffix(DELETED_SUFFIX).unwrap_or(&raw);
            Some(ProcessRecord::new(pid, path))
        }
        Err(err) => {
            trace!("Skipping pid {}: {}", pid, err);
            None
        }
    }
}
