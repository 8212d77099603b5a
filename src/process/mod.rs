//! Process enumeration
//!
//! One [`ProcessSource`] implementation per platform family, chosen once by
//! [`default_source`]:
//!
//! - Linux / Android: [`ProcFsSource`] walks `/proc` and reads each
//!   `exe` link. No subprocess, and a process exiting mid-scan only drops
//!   that one entry.
//! - Other Unix (macOS, BSD): [`PsSource`] runs `ps` and resolves each pid
//!   through `/proc` where it exists, else keeps the reported command path.
//! - Windows: `SysinfoSource` reads the process table through `sysinfo`.
//!
//! Results are unordered.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::error::Result;

#[cfg(unix)]
mod procfs;
#[cfg(unix)]
mod ps;
#[cfg(windows)]
mod windows;

#[cfg(unix)]
pub use procfs::ProcFsSource;
#[cfg(unix)]
pub use ps::{parse_ps_output, PsEntry, PsSource};
#[cfg(windows)]
pub use windows::SysinfoSource;

/// One running process as seen by a single poll
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcessRecord {
    pub pid: u32,
    pub executable_path: String,
}

impl ProcessRecord {
    pub fn new(pid: u32, executable_path: impl Into<String>) -> Self {
        Self {
            pid,
            executable_path: executable_path.into(),
        }
    }
}

/// Future returned by [`ProcessSource::list_processes`]
pub type ProcessListFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<ProcessRecord>>> + Send + 'a>>;

/// Something that can list the running processes
pub trait ProcessSource: Send + Sync {
    /// List all running processes with their executable paths.
    ///
    /// Fails with [`RelayError::Enumeration`](crate::RelayError::Enumeration)
    /// only when the whole facility is unavailable; processes that cannot be
    /// resolved are left out.
    fn list_processes(&self) -> ProcessListFuture<'_>;
}

/// The process source for the current platform
pub fn default_source() -> Box<dyn ProcessSource> {
    #[cfg(any(target_os = "linux", target_os = "android"))]
    {
        Box::new(ProcFsSource::new())
    }

    #[cfg(all(unix, not(any(target_os = "linux", target_os = "android"))))]
    {
        Box::new(PsSource::new())
    }

    #[cfg(windows)]
    {
        Box::new(SysinfoSource::new())
    }
}

/// A fixed process list, for tests and for feeding externally gathered data
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    processes: Vec<ProcessRecord>,
}

impl StaticSource {
    pub fn new(processes: Vec<ProcessRecord>) -> Self {
        Self { processes }
    }
}

impl ProcessSource for StaticSource {
    fn list_processes(&self) -> ProcessListFuture<'_> {
        Box::pin(async move { Ok(self.processes.clone()) })
    }
}
