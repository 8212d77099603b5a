use crate::activity::types::{
    Activity, ActivityAssets, ActivityButton, ActivityParty, ActivityTimestamps,
};
use crate::error::{RelayError, Result};
use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the UNIX epoch
pub fn now_millis() -> Result<u64> {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).map_err(|e| {
        RelayError::SystemTime(format!("System time is before UNIX epoch: {}", e))
    })?;
    Ok(now.as_millis() as u64)
}

/// Builder for Rich Presence activities
#[derive(Debug, Default)]
pub struct ActivityBuilder {
    activity: Activity,
}

impl ActivityBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn application_id<S: Into<String>>(mut self, id: S) -> Self {
        self.activity.application_id = Some(id.into());
        self
    }

    /// Set the application name shown above the activity
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.activity.name = Some(name.into());
        self
    }

    /// Set the activity type (0 = Playing)
    pub fn kind(mut self, kind: u8) -> Self {
        self.activity.kind = Some(kind);
        self
    }

    /// Set the activity state (what the player is currently doing)
    pub fn state<S: Into<String>>(mut self, state: S) -> Self {
        self.activity.state = Some(state.into());
        self
    }

    pub fn details<S: Into<String>>(mut self, details: S) -> Self {
        self.activity.details = Some(details.into());
        self
    }

    /// Set the start timestamp to now, in milliseconds
    ///
    /// # Errors
    ///
    /// Returns an error if the system time is before the UNIX epoch.
    pub fn start_timestamp_now(self) -> Result<Self> {
        Ok(self.start_timestamp(now_millis()? as i64))
    }

    pub fn start_timestamp(mut self, timestamp: i64) -> Self {
        self.get_timestamps().start = Some(timestamp);
        self
    }

    /// Replace all assets at once
    pub fn assets(mut self, assets: ActivityAssets) -> Self {
        self.activity.assets = Some(assets);
        self
    }

    pub fn large_image<S: Into<String>>(mut self, key: S) -> Self {
        self.get_assets().large_image = Some(key.into());
        self
    }

    /// Set party information
    pub fn party<S: Into<String>>(mut self, id: S, current_size: u32, max_size: u32) -> Self {
        self.activity.party = Some(ActivityParty {
            id: Some(id.into()),
            size: Some([current_size, max_size]),
        });
        self
    }

    pub fn button<L: Into<String>, U: Into<String>>(mut self, label: L, url: U) -> Self {
        let buttons = self.activity.buttons.get_or_insert_with(Vec::new);
        buttons.push(ActivityButton {
            label: label.into(),
            url: url.into(),
        });
        self
    }

    pub fn build(self) -> Activity {
        self.activity
    }

    fn get_timestamps(&mut self) -> &mut ActivityTimestamps {
        self.activity
            .timestamps
            .get_or_insert_with(ActivityTimestamps::default)
    }

    fn get_assets(&mut self) -> &mut ActivityAssets {
        self.activity
            .assets
            .get_or_insert_with(ActivityAssets::default)
    }
}
