use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind};

use super::{ProcessListFuture, ProcessRecord, ProcessSource};
use crate::error::{RelayError, Result};

/// Reads the Windows process table through `sysinfo`
#[derive(Debug, Default, Clone)]
pub struct SysinfoSource;

impl SysinfoSource {
    pub fn new() -> Self {
        Self
    }

    async fn scan(&self) -> Result<Vec<ProcessRecord>> {
        tokio::task::spawn_blocking(|| {
            let mut sys = System::new();
            sys.refresh_processes_specifics(
                ProcessesToUpdate::All,
                true,
                ProcessRefreshKind::new().with_exe(UpdateKind::OnlyIfNotSet),
            );

            // Processes we may not open (protected services) have no exe
            sys.processes()
                .iter()
                .filter_map(|(pid, process)| {
                    process
                        .exe()
                        .map(|exe| ProcessRecord::new(pid.as_u32(), exe.to_string_lossy()))
                })
                .collect()
        })
        .await
        .map_err(RelayError::enumeration)
    }
}

impl ProcessSource for SysinfoSource {
    fn list_processes(&self) -> ProcessListFuture<'_> {
        Box::pin(self.scan())
    }
}
