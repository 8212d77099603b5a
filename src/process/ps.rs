use std::path::{Path, PathBuf};

use futures::future::join_all;
use log::debug;
use tokio::process::Command;

use super::procfs::resolve_executable;
use super::{ProcessListFuture, ProcessRecord, ProcessSource};
use crate::error::{RelayError, Result};

/// `comm` is the last column so paths containing spaces survive the split
const PS_ARGS: [&str; 3] = ["-axww", "-o", "pid=,comm="];

/// One parsed row of `ps` output.
///
/// Arguments are not requested: matching only looks at the executable
/// path, and `comm` as the last column keeps paths with spaces intact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PsEntry {
    pub pid: u32,
    pub command: String,
}

/// Parse `pid command` rows; rows without a numeric pid or a command are
/// skipped.
pub fn parse_ps_output(output: &str) -> Vec<PsEntry> {
    output
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            let (pid, command) = line.split_once(char::is_whitespace)?;
            let pid = pid.parse::<u32>().ok()?;
            let command = command.trim();
            if command.is_empty() {
                return None;
            }
            Some(PsEntry {
                pid,
                command: command.to_string(),
            })
        })
        .collect()
}

/// Lists processes by running `ps`
#[derive(Debug, Clone)]
pub struct PsSource {
    program: String,
    args: Vec<String>,
    proc_root: Option<PathBuf>,
}

impl Default for PsSource {
    fn default() -> Self {
        Self::new()
    }
}

impl PsSource {
    pub fn new() -> Self {
        let proc_root = Path::new("/proc");
        Self {
            program: "ps".to_string(),
            args: PS_ARGS.iter().map(|a| a.to_string()).collect(),
            proc_root: proc_root.is_dir().then(|| proc_root.to_path_buf()),
        }
    }

    /// Run a different listing command; its output must use the
    /// `pid command` layout.
    pub fn with_command<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            ..Self::new()
        }
    }

    /// Resolve pids through `<root>/<pid>/exe`, or not at all with `None`
    pub fn with_proc_root(mut self, root: Option<PathBuf>) -> Self {
        self.proc_root = root;
        self
    }

    async fn scan(&self) -> Result<Vec<ProcessRecord>> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| RelayError::enumeration(format!("failed to run {}: {}", self.program, e)))?;

        if !output.status.success() {
            return Err(RelayError::enumeration(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let entries = parse_ps_output(&String::from_utf8_lossy(&output.stdout));
        debug!("{} listed {} processes", self.program, entries.len());

        let lookups = entries.into_iter().map(|entry| self.resolve(entry));
        Ok(join_all(lookups).await)
    }

    async fn resolve(&self, entry: PsEntry) -> ProcessRecord {
        if let Some(root) = &self.proc_root {
            if let Some(record) = resolve_executable(root, entry.pid).await {
                return record;
            }
        }
        ProcessRecord::new(entry.pid, entry.command)
    }
}

impl ProcessSource for PsSource {
    fn list_processes(&self) -> ProcessListFuture<'_> {
        Box::pin(self.scan())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rows_with_spaces_in_command() {
        let output = "    1 /sbin/launchd\n  512 /Applications/My Game.app/Contents/MacOS/My Game\n";
        let entries = parse_ps_output(output);
        assert_eq!(
            entries,
            vec![
                PsEntry { pid: 1, command: "/sbin/launchd".into() },
                PsEntry {
                    pid: 512,
                    command: "/Applications/My Game.app/Contents/MacOS/My Game".into()
                },
            ]
        );
    }

    #[test]
    fn skips_malformed_rows() {
        let output = "  PID COMMAND\n\n  42\nabc /bin/sh\n  7 /bin/zsh\n";
        let entries = parse_ps_output(output);
        assert_eq!(entries, vec![PsEntry { pid: 7, command: "/bin/zsh".into() }]);
    }

    #[tokio::test]
    async fn falls_back_to_command_column_without_proc() {
        let source = PsSource::with_command(
            "printf",
            ["%s\\n%s\\n", "  10 /usr/bin/game", "  20 /opt/other bin/tool"],
        )
        .with_proc_root(None);

        let mut records = source.list_processes().await.unwrap();
        records.sort_by_key(|r| r.pid);
        assert_eq!(
            records,
            vec![
                ProcessRecord::new(10, "/usr/bin/game"),
                ProcessRecord::new(20, "/opt/other bin/tool"),
            ]
        );
    }

    #[tokio::test]
    async fn missing_program_is_an_enumeration_error() {
        let source = PsSource::with_command("presencerelay-no-such-ps", Vec::<String>::new());
        let err = source.list_processes().await.unwrap_err();
        assert!(matches!(err, RelayError::Enumeration(_)));
    }
}
