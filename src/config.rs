//! Runtime configuration for the relay
//!
//! Mirrors the knobs a vendor client exposes implicitly: how many instance
//! slots to try, how large a frame may be, how long a client may sit before
//! handshaking, and how often the process table is scanned.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{RelayError, Result};
use crate::ipc::constants;

/// Synthetic user reported to clients in the `READY` dispatch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RelayIdentity {
    pub id: String,
    pub username: String,
    pub discriminator: String,
    pub global_name: String,
    pub avatar: Option<String>,
}

impl Default for RelayIdentity {
    fn default() -> Self {
        Self {
            id: "1045800378228281345".to_string(),
            username: "presencerelay".to_string(),
            discriminator: "0".to_string(),
            global_name: "Presence Relay".to_string(),
            avatar: None,
        }
    }
}

/// Configuration for the relay server and the process poll loop
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Number of instance slots to try when binding
    pub max_sockets: u8,

    /// Maximum accepted payload size in bytes
    pub max_payload_size: u32,

    /// Protocol version clients must declare in their handshake
    pub ipc_version: u32,

    /// How long a connection may stay un-handshaken
    pub handshake_timeout_ms: u64,

    /// Period of the process scan
    pub poll_interval_ms: u64,

    /// Directory for Unix sockets. `None` resolves from the environment.
    pub socket_dir: Option<PathBuf>,

    pub identity: RelayIdentity,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_sockets: constants::MAX_IPC_SOCKETS,
            max_payload_size: constants::MAX_PAYLOAD_SIZE,
            ipc_version: constants::IPC_VERSION,
            handshake_timeout_ms: constants::DEFAULT_HANDSHAKE_TIMEOUT_MS,
            poll_interval_ms: constants::DEFAULT_POLL_INTERVAL_MS,
            socket_dir: None,
            identity: RelayIdentity::default(),
        }
    }
}

impl RelayConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan processes every second instead of every five.
    ///
    /// Presence shows up faster at the cost of a full process table walk
    /// per second.
    pub fn fast_poll() -> Self {
        Self {
            poll_interval_ms: 1000,
            ..Default::default()
        }
    }

    pub fn with_max_sockets(mut self, max_sockets: u8) -> Self {
        self.max_sockets = max_sockets;
        self
    }

    pub fn with_max_payload_size(mut self, max_payload_size: u32) -> Self {
        self.max_payload_size = max_payload_size;
        self
    }

    pub fn with_handshake_timeout(mut self, handshake_timeout_ms: u64) -> Self {
        self.handshake_timeout_ms = handshake_timeout_ms;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    pub fn with_socket_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.socket_dir = Some(dir.into());
        self
    }

    pub fn with_identity(mut self, identity: RelayIdentity) -> Self {
        self.identity = identity;
        self
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result {
        if self.max_sockets == 0 {
            return Err(RelayError::InvalidConfig("max_sockets must be greater than 0"));
        }
        if self.max_sockets > constants::MAX_IPC_SOCKETS {
            return Err(RelayError::InvalidConfig(
                "max_sockets exceeds the 10 slots clients scan",
            ));
        }
        if self.max_payload_size < 1024 {
            return Err(RelayError::InvalidConfig(
                "max_payload_size too small (minimum 1 KB)",
            ));
        }
        if self.max_payload_size > 100 * 1024 * 1024 {
            return Err(RelayError::InvalidConfig(
                "max_payload_size too large (maximum 100 MB)",
            ));
        }
        if self.handshake_timeout_ms == 0 {
            return Err(RelayError::InvalidConfig(
                "handshake_timeout_ms must be greater than 0",
            ));
        }
        if self.poll_interval_ms < 100 {
            return Err(RelayError::InvalidConfig(
                "poll_interval_ms too small (minimum 100ms)",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(RelayConfig::default().validate().is_ok());
        assert!(RelayConfig::fast_poll().validate().is_ok());
    }

    #[test]
    fn validation_rejects_out_of_range_values() {
        assert!(RelayConfig::default().with_max_sockets(0).validate().is_err());
        assert!(RelayConfig::default().with_max_sockets(11).validate().is_err());
        assert!(RelayConfig::default()
            .with_max_payload_size(512)
            .validate()
            .is_err());
        assert!(RelayConfig::default()
            .with_handshake_timeout(0)
            .validate()
            .is_err());
        assert!(RelayConfig::default().with_poll_interval(10).validate().is_err());
    }

    #[test]
    fn durations_follow_millisecond_fields() {
        let config = RelayConfig::default()
            .with_handshake_timeout(250)
            .with_poll_interval(2000);
        assert_eq!(config.handshake_timeout(), Duration::from_millis(250));
        assert_eq!(config.poll_interval(), Duration::from_secs(2));
    }
}
