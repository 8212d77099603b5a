//! Periodic process scan
//!
//! Every tick: enumerate processes, diff them against the previous poll and
//! push the resulting start/stop notifications through the relay. The
//! scanner owns its [`MatchState`](crate::matcher::MatchState) outright;
//! nothing else reads or writes it.

use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

use crate::activity::now_millis;
use crate::catalog::Catalog;
use crate::matcher::{ActivityEvent, ActivityMatcher, MatchState};
use crate::process::ProcessSource;
use crate::relay::EventRelay;

pub struct ProcessScanner {
    source: Box<dyn ProcessSource>,
    matcher: ActivityMatcher,
    relay: EventRelay,
    interval: Duration,
}

impl ProcessScanner {
    pub fn new(
        source: Box<dyn ProcessSource>,
        catalog: Arc<Catalog>,
        relay: EventRelay,
        interval: Duration,
    ) -> Self {
        Self {
            source,
            matcher: ActivityMatcher::new(catalog),
            relay,
            interval,
        }
    }

    pub fn state(&self) -> &MatchState {
        self.matcher.state()
    }

    /// Run a single poll and relay its changes.
    ///
    /// An enumeration failure counts as an empty process list for this
    /// poll; the next tick tries again.
    pub async fn poll_once(&mut self) -> Vec<ActivityEvent> {
        let processes = match self.source.list_processes().await {
            Ok(processes) => processes,
            Err(err) => {
                warn!("Process enumeration failed: {}", err);
                Vec::new()
            }
        };

        let now = now_millis().unwrap_or_else(|err| {
            warn!("{}", err);
            0
        });

        let events = self.matcher.poll(&processes, now);
        self.relay_events(&events);
        events
    }

    /// Stop every tracked record so the UI drops what this scanner reported
    pub fn clear(&mut self) -> Vec<ActivityEvent> {
        let events = self.matcher.poll(&[], 0);
        self.relay_events(&events);
        events
    }

    fn relay_events(&self, events: &[ActivityEvent]) {
        for event in events {
            match event {
                ActivityEvent::Started(record) => {
                    info!("Detected {} (pid {})", record.application_id, record.pid)
                }
                ActivityEvent::Stopped(record) => {
                    info!("Lost {} (pid {})", record.application_id, record.pid)
                }
            }
            self.relay.activity_event(event, self.matcher.catalog());
        }
    }

    /// Poll until `shutdown` flips to `true` or its sender is dropped, then
    /// clear everything still tracked
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.poll_once().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        self.clear();
        info!("Process scanner stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ApplicationSignature;
    use crate::error::RelayError;
    use crate::process::{ProcessListFuture, ProcessRecord, StaticSource};
    use crate::relay::RelayEvent;
    use std::sync::Mutex;

    /// Hands out one scripted result per call, then empty lists
    struct ScriptedSource {
        script: Mutex<Vec<crate::error::Result<Vec<ProcessRecord>>>>,
    }

    impl ProcessSource for ScriptedSource {
        fn list_processes(&self) -> ProcessListFuture<'_> {
            let next = self.script.lock().unwrap().pop().unwrap_or(Ok(Vec::new()));
            Box::pin(async move { next })
        }
    }

    fn scanner(mut script: Vec<crate::error::Result<Vec<ProcessRecord>>>) -> (ProcessScanner, crate::relay::RelayReceiver) {
        script.reverse();
        let catalog = Catalog::new(vec![ApplicationSignature::new("game1", "Game One", ["game1.exe"])]);
        let (relay, rx) = EventRelay::channel();
        let source = ScriptedSource {
            script: Mutex::new(script),
        };
        (
            ProcessScanner::new(Box::new(source), Arc::new(catalog), relay, Duration::from_millis(100)),
            rx,
        )
    }

    #[tokio::test]
    async fn enumeration_failure_counts_as_empty_list() {
        let (mut scanner, mut rx) = scanner(vec![
            Ok(vec![ProcessRecord::new(100, r"C:\Games\game1.exe")]),
            Err(RelayError::enumeration("ps missing")),
        ]);

        assert_eq!(scanner.poll_once().await.len(), 1);
        let events = scanner.poll_once().await;
        assert!(matches!(events.as_slice(), [ActivityEvent::Stopped(r)] if r.pid == 100));
        assert!(scanner.state().is_empty());

        assert!(matches!(rx.try_recv(), Some(RelayEvent::Activity(n)) if n.activity.is_some()));
        assert!(matches!(rx.try_recv(), Some(RelayEvent::Activity(n)) if n.activity.is_none()));
    }

    #[tokio::test]
    async fn shutdown_clears_detected_activities() {
        let catalog = Catalog::new(vec![ApplicationSignature::new("game1", "Game One", ["game1.exe"])]);
        let source = StaticSource::new(vec![ProcessRecord::new(100, "/games/game1.exe")]);
        let (relay, mut rx) = EventRelay::channel();
        let scanner = ProcessScanner::new(Box::new(source), Arc::new(catalog), relay, Duration::from_secs(60));

        let (tx, shutdown) = watch::channel(false);
        let task = tokio::spawn(scanner.run(shutdown));

        let started = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap();
        assert!(matches!(started, Some(RelayEvent::Activity(n)) if n.activity.is_some()));

        tx.send(true).unwrap();
        task.await.unwrap();

        match rx.recv().await {
            Some(RelayEvent::Activity(n)) => {
                assert!(n.activity.is_none());
                assert_eq!(n.socket_id, "game1:100");
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let (scanner, _rx) = scanner(Vec::new());
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(scanner.run(rx));
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("scanner did not stop")
            .unwrap();
    }
}
