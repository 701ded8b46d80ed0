use serde::{Deserialize, Serialize};

/// Rendition as reported by the media engine when a manifest parses.
/// Its position in the reported list is the engine's level index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestLevel {
    pub height: u32,
    pub bitrate: u64,
}

impl ManifestLevel {
    #[must_use]
    pub const fn new(height: u32, bitrate: u64) -> Self {
        Self { height, bitrate }
    }
}

/// Selectable quality level for the active source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityLevel {
    pub height: u32,
    pub bitrate: u64,
    /// Engine level index
    pub index: usize,
}

impl QualityLevel {
    #[must_use]
    pub fn label(&self) -> String {
        format!("{}p", self.height)
    }
}

/// Quality choice: engine-driven or pinned to one engine level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualitySelection {
    #[default]
    Auto,
    Pinned(usize),
}
