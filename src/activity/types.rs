use serde::{Deserialize, Serialize};

/// Longest `state` / `details` string accepted
pub const MAX_TEXT_LEN: usize = 128;
/// Longest asset key or hover text accepted
pub const MAX_ASSET_LEN: usize = 256;
/// Most buttons a single activity can carry
pub const MAX_BUTTONS: usize = 2;

/// Rich Presence Activity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Activity type; 0 is "Playing"
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<u8>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamps: Option<ActivityTimestamps>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub assets: Option<ActivityAssets>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub party: Option<ActivityParty>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub secrets: Option<ActivitySecrets>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub buttons: Option<Vec<ActivityButton>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub flags: Option<u32>,
}

/// Activity timestamps
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityTimestamps {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<i64>,
}

/// Activity assets (images)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityAssets {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub large_image: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub large_text: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub small_image: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub small_text: Option<String>,
}

/// Activity party information
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityParty {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<[u32; 2]>, // [current, max]
}

/// Activity secrets for join/spectate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivitySecrets {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub spectate: Option<String>,

    #[serde(rename = "match", skip_serializing_if = "Option::is_none")]
    pub match_secret: Option<String>,
}

/// Activity button
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityButton {
    pub label: String,
    pub url: String,
}

fn check_len(field: &str, value: Option<&String>, max: usize) -> Result<(), String> {
    match value {
        Some(v) if v.chars().count() > max => Err(format!(
            "{} is {} characters, limit is {}",
            field,
            v.chars().count(),
            max
        )),
        _ => Ok(()),
    }
}

impl Activity {
    /// Check the payload against the limits clients enforce
    pub fn validate(&self) -> Result<(), String> {
        check_len("state", self.state.as_ref(), MAX_TEXT_LEN)?;
        check_len("details", self.details.as_ref(), MAX_TEXT_LEN)?;

        if let Some(assets) = &self.assets {
            check_len("large_image", assets.large_image.as_ref(), MAX_ASSET_LEN)?;
            check_len("large_text", assets.large_text.as_ref(), MAX_ASSET_LEN)?;
            check_len("small_image", assets.small_image.as_ref(), MAX_ASSET_LEN)?;
            check_len("small_text", assets.small_text.as_ref(), MAX_ASSET_LEN)?;
        }

        if let Some([current, max]) = self.party.as_ref().and_then(|p| p.size) {
            if current > max {
                return Err(format!(
                    "party size {} exceeds party maximum {}",
                    current, max
                ));
            }
        }

        if let Some(buttons) = &self.buttons {
            if buttons.len() > MAX_BUTTONS {
                return Err(format!(
                    "{} buttons given, limit is {}",
                    buttons.len(),
                    MAX_BUTTONS
                ));
            }
            for button in buttons {
                if button.label.is_empty() {
                    return Err("button label is empty".to_string());
                }
                if !(button.url.starts_with("https://") || button.url.starts_with("http://")) {
                    return Err(format!("button url must be http(s): {}", button.url));
                }
            }
        }

        Ok(())
    }
}
