//! Rich Presence payload types

mod builder;
mod types;

pub use builder::{now_millis, ActivityBuilder};
pub use types::{
    Activity, ActivityAssets, ActivityButton, ActivityParty, ActivitySecrets, ActivityTimestamps,
    MAX_BUTTONS, MAX_TEXT_LEN,
};
