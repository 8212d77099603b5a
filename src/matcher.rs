//! Process to application matching
//!
//! [`match_processes`] is a pure function over one process list.
//! [`poll`] diffs a fresh match against the [`MatchState`] left by the
//! previous poll and reports what started and what stopped. The state is
//! owned by the caller, so the matcher can be driven without a live
//! process table.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::activity::{ActivityAssets, ActivityParty};
use crate::catalog::{ApplicationSignature, Catalog};
use crate::process::ProcessRecord;

/// A process currently recognised as a known application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub application_id: String,
    pub pid: u32,
    /// Milliseconds since the UNIX epoch when the process was first matched
    pub start_timestamp: u64,
    pub state: Option<String>,
    pub details: Option<String>,
    pub party: Option<ActivityParty>,
    pub assets: Option<ActivityAssets>,
}

impl ActivityRecord {
    pub fn new(signature: &ApplicationSignature, pid: u32, start_timestamp: u64) -> Self {
        Self {
            application_id: signature.id.clone(),
            pid,
            start_timestamp,
            state: None,
            details: None,
            party: None,
            assets: signature.icon_assets.clone(),
        }
    }
}

/// A change between two polls
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityEvent {
    Started(ActivityRecord),
    Stopped(ActivityRecord),
}

impl ActivityEvent {
    pub fn record(&self) -> &ActivityRecord {
        match self {
            Self::Started(record) | Self::Stopped(record) => record,
        }
    }
}

/// Records produced by the previous poll, keyed by pid
#[derive(Debug, Clone, Default)]
pub struct MatchState {
    tracked: HashMap<u32, ActivityRecord>,
}

impl MatchState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, pid: u32) -> Option<&ActivityRecord> {
        self.tracked.get(&pid)
    }

    pub fn len(&self) -> usize {
        self.tracked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracked.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &ActivityRecord> {
        self.tracked.values()
    }
}

/// Match every process against the catalog.
///
/// At most one record per pid; the first signature in catalog order wins.
pub fn match_processes(processes: &[ProcessRecord], catalog: &Catalog, now: u64) -> Vec<ActivityRecord> {
    let mut seen = HashSet::new();
    processes
        .iter()
        .filter(|p| seen.insert(p.pid))
        .filter_map(|p| catalog.find_match(p).map(|sig| ActivityRecord::new(sig, p.pid, now)))
        .collect()
}

/// Run one poll: match `processes`, update `state`, return the changes.
///
/// Stops are listed before starts so a pid that switched application is
/// cleared before it is announced again. Start timestamps survive for pids
/// that keep matching the same application.
pub fn poll(
    catalog: &Catalog,
    processes: &[ProcessRecord],
    state: &mut MatchState,
    now: u64,
) -> Vec<ActivityEvent> {
    let mut next = HashMap::new();
    let mut started = Vec::new();

    for record in match_processes(processes, catalog, now) {
        match state.tracked.get(&record.pid) {
            Some(previous) if previous.application_id == record.application_id => {
                next.insert(record.pid, previous.clone());
            }
            _ => {
                started.push(ActivityEvent::Started(record.clone()));
                next.insert(record.pid, record);
            }
        }
    }

    let mut stopped: Vec<ActivityRecord> = state
        .tracked
        .values()
        .filter(|old| {
            next.get(&old.pid)
                .map_or(true, |new| new.application_id != old.application_id)
        })
        .cloned()
        .collect();
    stopped.sort_by_key(|r| r.pid);

    state.tracked = next;

    stopped
        .into_iter()
        .map(ActivityEvent::Stopped)
        .chain(started)
        .collect()
}

/// A catalog together with the state of the previous poll
#[derive(Debug, Clone)]
pub struct ActivityMatcher {
    catalog: Arc<Catalog>,
    state: MatchState,
}

impl ActivityMatcher {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            state: MatchState::new(),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn state(&self) -> &MatchState {
        &self.state
    }

    pub fn poll(&mut self, processes: &[ProcessRecord], now: u64) -> Vec<ActivityEvent> {
        poll(&self.catalog, processes, &mut self.state, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Catalog {
        Catalog::new(vec![
            ApplicationSignature::new("game1", "Game One", ["game1.exe"]),
            ApplicationSignature::new("game2", "Game Two", ["game2.exe", "shared.exe"]),
            ApplicationSignature::new("game3", "Game Three", ["shared.exe"]),
        ])
    }

    #[test]
    fn first_catalog_entry_wins() {
        let processes = [ProcessRecord::new(5, "/opt/shared.exe")];
        let records = match_processes(&processes, &catalog(), 0);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].application_id, "game2");
    }

    #[test]
    fn duplicate_pids_produce_one_record() {
        let processes = [
            ProcessRecord::new(5, "/opt/game1.exe"),
            ProcessRecord::new(5, "/opt/game2.exe"),
        ];
        let records = match_processes(&processes, &catalog(), 0);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].application_id, "game1");
    }

    #[test]
    fn pid_switching_application_stops_then_starts() {
        let catalog = catalog();
        let mut state = MatchState::new();
        poll(&catalog, &[ProcessRecord::new(9, "/g/game1.exe")], &mut state, 100);

        let events = poll(&catalog, &[ProcessRecord::new(9, "/g/game2.exe")], &mut state, 200);
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], ActivityEvent::Stopped(r) if r.application_id == "game1"));
        assert!(matches!(&events[1], ActivityEvent::Started(r) if r.application_id == "game2" && r.start_timestamp == 200));
        assert_eq!(state.get(9).map(|r| r.application_id.as_str()), Some("game2"));
    }

    #[test]
    fn matcher_wrapper_keeps_state_between_polls() {
        let mut matcher = ActivityMatcher::new(Arc::new(catalog()));
        let processes = [ProcessRecord::new(1, "/g/game1.exe")];
        assert_eq!(matcher.poll(&processes, 1).len(), 1);
        assert!(matcher.poll(&processes, 2).is_empty());
        assert_eq!(matcher.state().len(), 1);
    }
}
