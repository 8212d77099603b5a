//! Event relay to the UI boundary
//!
//! Detected processes and connected clients both end up as the same
//! `activity` notification; invites are passed through as their code. The
//! relay does nothing else: no filtering, no state.

use log::debug;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::activity::{Activity, ActivityBuilder};
use crate::catalog::{ApplicationSignature, Catalog};
use crate::error::Result;
use crate::matcher::{ActivityEvent, ActivityRecord};

/// Activity type shown as "Playing"
const ACTIVITY_TYPE_PLAYING: u8 = 0;

/// Payload of an `activity` event. A `null` activity clears the socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityNotification {
    pub activity: Option<Activity>,
    pub pid: Option<u32>,
    #[serde(rename = "socketId")]
    pub socket_id: String,
}

/// What the UI receives
#[derive(Debug, Clone, PartialEq)]
pub enum RelayEvent {
    Activity(ActivityNotification),
    /// An invite code a client asked the user to open
    Invite(String),
}

impl RelayEvent {
    /// Event name at the UI boundary
    pub fn name(&self) -> &'static str {
        match self {
            Self::Activity(_) => "activity",
            Self::Invite(_) => "invite",
        }
    }

    /// JSON form handed to the UI
    pub fn to_json(&self) -> Result<String> {
        Ok(match self {
            Self::Activity(notification) => serde_json::to_string(notification)?,
            Self::Invite(code) => serde_json::to_string(code)?,
        })
    }
}

/// Socket id under which a detected process is reported
pub fn process_socket_id(record: &ActivityRecord) -> String {
    format!("{}:{}", record.application_id, record.pid)
}

/// Presence payload for a detected process
pub fn detected_activity(record: &ActivityRecord, signature: Option<&ApplicationSignature>) -> Activity {
    let mut builder = ActivityBuilder::new()
        .application_id(
            signature
                .map(|s| s.rpc_client_id.clone())
                .unwrap_or_else(|| record.application_id.clone()),
        )
        .name(
            signature
                .map(|s| s.display_name.clone())
                .unwrap_or_else(|| record.application_id.clone()),
        )
        .kind(ACTIVITY_TYPE_PLAYING)
        .start_timestamp(record.start_timestamp as i64);

    if let Some(assets) = &record.assets {
        builder = builder.assets(assets.clone());
    }
    if let Some(state) = &record.state {
        builder = builder.state(state.as_str());
    }
    if let Some(details) = &record.details {
        builder = builder.details(details.as_str());
    }

    let mut activity = builder.build();
    activity.party = record.party.clone();
    activity
}

/// Sending half; cheap to clone, one per producer
#[derive(Debug, Clone)]
pub struct EventRelay {
    tx: mpsc::UnboundedSender<RelayEvent>,
}

/// Receiving half, owned by the UI side
#[derive(Debug)]
pub struct RelayReceiver {
    rx: mpsc::UnboundedReceiver<RelayEvent>,
}

impl RelayReceiver {
    /// Next event; `None` once every [`EventRelay`] is gone
    pub async fn recv(&mut self) -> Option<RelayEvent> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<RelayEvent> {
        self.rx.try_recv().ok()
    }
}

impl EventRelay {
    pub fn channel() -> (Self, RelayReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, RelayReceiver { rx })
    }

    /// Forward a matcher change
    pub fn activity_event(&self, event: &ActivityEvent, catalog: &Catalog) {
        let record = event.record();
        let activity = match event {
            ActivityEvent::Started(_) => {
                Some(detected_activity(record, catalog.get(&record.application_id)))
            }
            ActivityEvent::Stopped(_) => None,
        };

        self.send(RelayEvent::Activity(ActivityNotification {
            activity,
            pid: Some(record.pid),
            socket_id: process_socket_id(record),
        }));
    }

    /// Forward a presence set (or cleared, with `None`) by a connected client
    pub fn presence_updated(&self, socket_id: &str, pid: Option<u32>, activity: Option<Activity>) {
        self.send(RelayEvent::Activity(ActivityNotification {
            activity,
            pid,
            socket_id: socket_id.to_string(),
        }));
    }

    pub fn invite(&self, code: impl Into<String>) {
        self.send(RelayEvent::Invite(code.into()));
    }

    fn send(&self, event: RelayEvent) {
        if let Err(err) = self.tx.send(event) {
            debug!("No UI listening, dropped {} event", err.0.name());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::ActivityAssets;
    use serde_json::json;

    fn signature() -> ApplicationSignature {
        ApplicationSignature::new("game1", "Game One", ["game1.exe"])
            .with_rpc_client_id("1234")
            .with_icon_assets(ActivityAssets {
                large_image: Some("cover".into()),
                ..ActivityAssets::default()
            })
    }

    #[test]
    fn started_event_becomes_playing_activity() {
        let catalog = Catalog::new(vec![signature()]);
        let record = ActivityRecord::new(&signature(), 100, 5000);
        let (relay, mut rx) = EventRelay::channel();

        relay.activity_event(&ActivityEvent::Started(record), &catalog);

        let event = rx.try_recv().unwrap();
        let json: serde_json::Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(
            json,
            json!({
                "activity": {
                    "application_id": "1234",
                    "name": "Game One",
                    "type": 0,
                    "timestamps": { "start": 5000 },
                    "assets": { "large_image": "cover" }
                },
                "pid": 100,
                "socketId": "game1:100"
            })
        );
    }

    #[test]
    fn stopped_event_clears_activity() {
        let catalog = Catalog::new(vec![signature()]);
        let record = ActivityRecord::new(&signature(), 100, 5000);
        let (relay, mut rx) = EventRelay::channel();

        relay.activity_event(&ActivityEvent::Stopped(record), &catalog);

        match rx.try_recv() {
            Some(RelayEvent::Activity(n)) => {
                assert!(n.activity.is_none());
                assert_eq!(n.socket_id, "game1:100");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn sending_without_receiver_is_silent() {
        let (relay, rx) = EventRelay::channel();
        drop(rx);
        relay.invite("abc");
    }

    #[test]
    fn invite_serializes_as_string() {
        let event = RelayEvent::Invite("abcdef".into());
        assert_eq!(event.name(), "invite");
        assert_eq!(event.to_json().unwrap(), "\"abcdef\"");
    }
}
