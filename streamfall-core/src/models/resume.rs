use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ContentKey;

/// Persisted last-known playback position for a content key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeRecord {
    pub content_key: ContentKey,
    /// Seconds from the start
    pub position: f64,
    pub saved_at: DateTime<Utc>,
}

impl ResumeRecord {
    #[must_use]
    pub fn new(content_key: ContentKey, position: f64) -> Self {
        Self {
            content_key,
            position,
            saved_at: Utc::now(),
        }
    }
}

/// Resume offer shown to the user while playback is held
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResumePrompt {
    pub position: f64,
    pub duration: f64,
}

/// User's answer to a [`ResumePrompt`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResumeChoice {
    Resume,
    StartOver,
}
