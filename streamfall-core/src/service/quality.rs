//! Manifest quality selector
//!
//! Levels are meaningful only for the source whose manifest produced them,
//! so the selector is reset on every source swap.

use crate::error::{Error, Result};
use crate::models::{ManifestLevel, QualityLevel, QualitySelection};

/// Descending, height-deduplicated levels. For a repeated height the
/// highest bitrate wins; zero-height (audio-only) renditions are dropped.
#[must_use]
pub fn build_levels(manifest: &[ManifestLevel]) -> Vec<QualityLevel> {
    let mut levels: Vec<QualityLevel> = Vec::with_capacity(manifest.len());

    for (index, level) in manifest.iter().enumerate() {
        if level.height == 0 {
            continue;
        }
        match levels.iter_mut().find(|l| l.height == level.height) {
            Some(existing) if existing.bitrate >= level.bitrate => {}
            Some(existing) => {
                existing.bitrate = level.bitrate;
                existing.index = index;
            }
            None => levels.push(QualityLevel {
                height: level.height,
                bitrate: level.bitrate,
                index,
            }),
        }
    }

    levels.sort_by(|a, b| b.height.cmp(&a.height));
    levels
}

/// Quality levels and selection for the active source
#[derive(Debug, Clone, Default)]
pub struct QualitySelector {
    levels: Vec<QualityLevel>,
    selection: QualitySelection,
    current_level: Option<usize>,
}

impl QualitySelector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Back to empty/Auto. Returns true if there were levels to clear.
    pub fn reset(&mut self) -> bool {
        let had_levels = !self.levels.is_empty();
        self.levels.clear();
        self.selection = QualitySelection::Auto;
        self.current_level = None;
        had_levels
    }

    /// Replace the levels with those of a freshly parsed manifest
    pub fn populate(&mut self, manifest: &[ManifestLevel]) -> &[QualityLevel] {
        self.levels = build_levels(manifest);
        &self.levels
    }

    /// Change the selection. Returns the engine level to pin, or `None`
    /// for automatic selection.
    pub fn select(&mut self, selection: QualitySelection) -> Result<Option<usize>> {
        match selection {
            QualitySelection::Auto => {
                self.selection = QualitySelection::Auto;
                Ok(None)
            }
            QualitySelection::Pinned(index) => {
                if !self.levels.iter().any(|l| l.index == index) {
                    return Err(Error::InvalidSelection(format!("unknown quality level {index}")));
                }
                self.selection = selection;
                Ok(Some(index))
            }
        }
    }

    pub fn on_level_switched(&mut self, level: usize) {
        self.current_level = Some(level);
    }

    #[must_use]
    pub fn levels(&self) -> &[QualityLevel] {
        &self.levels
    }

    #[must_use]
    pub const fn selection(&self) -> QualitySelection {
        self.selection
    }

    /// Level the engine last reported switching to
    #[must_use]
    pub const fn current_level(&self) -> Option<usize> {
        self.current_level
    }
}
