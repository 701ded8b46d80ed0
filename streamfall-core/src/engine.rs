//! Media engine boundary
//!
//! The adaptive-bitrate engine (manifest parsing, segment download,
//! buffering) lives outside this crate. Core drives it through
//! [`MediaEngine`] and reacts to the [`EngineEvent`]s it reports.

use serde::{Deserialize, Serialize};

use crate::models::ManifestLevel;

/// What the engine should load for a newly activated source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadRequest {
    pub url: String,
    /// Seek here once loaded; carried over across automatic source swaps
    pub start_position: Option<f64>,
    /// Preferred subtitle/audio language carried across swaps
    pub language: Option<String>,
}

/// Commands core issues to the engine.
///
/// Implementations must not call back into the session controller
/// synchronously from these methods.
pub trait MediaEngine: Send + Sync {
    fn load(&self, request: &LoadRequest);
    fn play(&self);
    fn pause(&self);
    fn seek(&self, position: f64);
    fn current_time(&self) -> f64;
    fn duration(&self) -> Option<f64>;
    /// Engine-local self-heal for decode glitches
    fn recover_media_error(&self);
    /// Pin to an engine level, or `None` for automatic selection
    fn set_level(&self, level: Option<usize>);
}

/// Signals reported by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// Network/delivery failure the engine cannot recover from
    FatalTransportError { detail: String },
    /// Decode failure; handled by the engine's local recovery
    FatalMediaError { detail: String },
    ManifestParsed { levels: Vec<ManifestLevel> },
    LevelSwitched { level: usize },
    DurationKnown { duration: f64 },
    TimeUpdate { position: f64 },
}

impl EngineEvent {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::FatalTransportError { .. } => "fatal_transport_error",
            Self::FatalMediaError { .. } => "fatal_media_error",
            Self::ManifestParsed { .. } => "manifest_parsed",
            Self::LevelSwitched { .. } => "level_switched",
            Self::DurationKnown { .. } => "duration_known",
            Self::TimeUpdate { .. } => "time_update",
        }
    }
}
