//! Application signature catalog
//!
//! An ordered list of known applications and the executable patterns that
//! identify them. Order matters: when a process matches several signatures
//! the earliest one wins.
//!
//! Two JSON shapes are accepted for each entry:
//!
//! ```json
//! { "id": "game1", "display_name": "Game One", "match_patterns": ["game1.exe"] }
//! { "id": "356875570916753438", "name": "Minecraft",
//!   "executables": [{ "name": "minecraft.exe", "os": "win32" },
//!                   { "name": "launcher.exe", "is_launcher": true }] }
//! ```

use std::fs;
use std::path::Path;

use log::info;
use serde::Deserialize;

use crate::activity::ActivityAssets;
use crate::error::{RelayError, Result};
use crate::process::ProcessRecord;

/// Markers stripped from path candidates so 64-bit builds match their base name
const ARCH_MARKERS: [&str; 4] = [".x64", "x64", "_64", "64"];

/// Lower-case and use `/` as the only separator
fn normalize(path: &str) -> String {
    path.to_lowercase().replace('\\', "/")
}

/// One executable pattern of a signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchPattern {
    /// Matches a trailing run of whole path components, e.g. `bin/game.exe`
    Suffix(String),
    /// Written `>name`; matches the file name exactly, never a stripped variant
    ExactName(String),
}

impl MatchPattern {
    /// Parse a catalog pattern string. Empty patterns are dropped.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = normalize(raw.trim());
        match normalized.strip_prefix('>') {
            Some(name) if !name.is_empty() => Some(Self::ExactName(name.to_string())),
            Some(_) => None,
            None => {
                let suffix = normalized.trim_start_matches('/');
                (!suffix.is_empty()).then(|| Self::Suffix(suffix.to_string()))
            }
        }
    }

    pub fn matches(&self, candidates: &PathCandidates) -> bool {
        match self {
            Self::Suffix(suffix) => candidates.suffixes.iter().any(|c| c == suffix),
            Self::ExactName(name) => candidates.file_name == *name,
        }
    }
}

/// Every form of one executable path that patterns are compared against
#[derive(Debug, Clone)]
pub struct PathCandidates {
    file_name: String,
    suffixes: Vec<String>,
}

impl PathCandidates {
    pub fn new(executable_path: &str) -> Self {
        let normalized = normalize(executable_path);
        let components: Vec<&str> = normalized.split('/').filter(|c| !c.is_empty()).collect();

        let mut suffixes: Vec<String> = (1..=components.len())
            .map(|n| components[components.len() - n..].join("/"))
            .collect();

        let stripped: Vec<String> = suffixes
            .iter()
            .flat_map(|s| {
                ARCH_MARKERS
                    .iter()
                    .filter(|marker| s.contains(*marker))
                    .map(move |marker| s.replacen(marker, "", 1))
            })
            .collect();
        suffixes.extend(stripped);

        Self {
            file_name: components.last().map(|c| c.to_string()).unwrap_or_default(),
            suffixes,
        }
    }
}

/// A known application and how to recognise it
#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationSignature {
    pub id: String,
    pub display_name: String,
    pub match_patterns: Vec<MatchPattern>,
    pub icon_assets: Option<ActivityAssets>,
    /// Application id reported in relayed activities
    pub rpc_client_id: String,
}

impl ApplicationSignature {
    pub fn new<'a>(
        id: impl Into<String>,
        display_name: impl Into<String>,
        patterns: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        let id = id.into();
        Self {
            rpc_client_id: id.clone(),
            id,
            display_name: display_name.into(),
            match_patterns: patterns.into_iter().filter_map(MatchPattern::parse).collect(),
            icon_assets: None,
        }
    }

    pub fn with_rpc_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.rpc_client_id = client_id.into();
        self
    }

    pub fn with_icon_assets(mut self, assets: ActivityAssets) -> Self {
        self.icon_assets = Some(assets);
        self
    }

    pub fn matches(&self, candidates: &PathCandidates) -> bool {
        self.match_patterns.iter().any(|p| p.matches(candidates))
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawPattern {
    Plain(String),
    Detailed {
        name: String,
        #[serde(default)]
        is_launcher: bool,
    },
}

#[derive(Debug, Deserialize)]
struct RawSignature {
    id: String,
    #[serde(default, alias = "name")]
    display_name: Option<String>,
    #[serde(default, alias = "executables")]
    match_patterns: Option<Vec<RawPattern>>,
    #[serde(default, alias = "assets")]
    icon_assets: Option<ActivityAssets>,
    #[serde(default, alias = "client_id")]
    rpc_client_id: Option<String>,
}

impl TryFrom<RawSignature> for ApplicationSignature {
    type Error = RelayError;

    fn try_from(raw: RawSignature) -> Result<Self> {
        if raw.id.trim().is_empty() {
            return Err(RelayError::InvalidCatalog("entry with empty id".to_string()));
        }

        // Launchers start the real game; matching them would report the
        // launcher window as the game itself.
        let patterns = raw
            .match_patterns
            .unwrap_or_default()
            .into_iter()
            .filter_map(|p| match p {
                RawPattern::Plain(name) => Some(name),
                RawPattern::Detailed { name, is_launcher } => (!is_launcher).then_some(name),
            })
            .collect::<Vec<_>>();

        let display_name = raw.display_name.unwrap_or_else(|| raw.id.clone());
        let mut signature =
            ApplicationSignature::new(raw.id, display_name, patterns.iter().map(String::as_str));
        if let Some(client_id) = raw.rpc_client_id {
            signature.rpc_client_id = client_id;
        }
        signature.icon_assets = raw.icon_assets;
        Ok(signature)
    }
}

/// Ordered, immutable set of application signatures
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    signatures: Vec<ApplicationSignature>,
}

impl Catalog {
    pub fn new(signatures: Vec<ApplicationSignature>) -> Self {
        Self { signatures }
    }

    /// Parse a JSON array of signatures, keeping their order
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: Vec<RawSignature> = serde_json::from_str(json)
            .map_err(|e| RelayError::InvalidCatalog(e.to_string()))?;
        let signatures = raw
            .into_iter()
            .map(ApplicationSignature::try_from)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(signatures))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)?;
        let catalog = Self::from_json(&json)?;
        info!("Loaded {} signatures from {}", catalog.len(), path.display());
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ApplicationSignature> {
        self.signatures.iter()
    }

    pub fn get(&self, id: &str) -> Option<&ApplicationSignature> {
        self.signatures.iter().find(|s| s.id == id)
    }

    /// First signature, in catalog order, matching the process
    pub fn find_match(&self, process: &ProcessRecord) -> Option<&ApplicationSignature> {
        let candidates = PathCandidates::new(&process.executable_path);
        self.signatures.iter().find(|s| s.matches(&candidates))
    }
}
