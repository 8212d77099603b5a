//! # PresenceRelay
//!
//! A local Rich Presence bridge. It watches the process table for known
//! applications, serves the Discord-compatible local IPC protocol to game
//! clients, and funnels both into one stream of activity notifications for
//! a UI to display.
//!
//! Supports Unix-like systems (Linux, macOS) using Unix domain sockets
//! and Windows using named pipes.
//!
//! ## Example
//!
//! ```no_run
//! use presencerelay::{default_source, Catalog, PresenceBridge, RelayConfig};
//!
//! # async fn run() -> presencerelay::Result {
//! let catalog = Catalog::from_path("detectable.json")?;
//! let (bridge, mut events) =
//!     PresenceBridge::start(RelayConfig::default(), catalog, default_source()).await?;
//!
//! while let Some(event) = events.recv().await {
//!     println!("{}: {}", event.name(), event.to_json()?);
//! }
//!
//! bridge.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod activity;
pub mod bridge;
pub mod catalog;
pub mod config;
pub mod error;
pub mod ids;
pub mod ipc;
pub mod matcher;
pub mod process;
pub mod relay;
pub mod scanner;
pub mod server;

// Re-export the main public API
pub use activity::{
    Activity, ActivityAssets, ActivityBuilder, ActivityButton, ActivityParty, ActivitySecrets,
    ActivityTimestamps,
};
pub use bridge::PresenceBridge;
pub use catalog::{ApplicationSignature, Catalog};
pub use config::{RelayConfig, RelayIdentity};
pub use error::{ErrorCategory, ProtocolContext, RelayError, Result};
pub use ipc::{Command, Opcode};
pub use matcher::{ActivityEvent, ActivityMatcher, ActivityRecord, MatchState};
pub use process::{default_source, ProcessRecord, ProcessSource, StaticSource};
pub use relay::{ActivityNotification, EventRelay, RelayEvent, RelayReceiver};
pub use server::RpcServer;
