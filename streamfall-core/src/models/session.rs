use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::{ContentKey, ProviderId, QualityLevel, QualitySelection, ResumePrompt};

/// Hint shown with the terminal failure
pub const EXHAUSTED_HINT: &str = "No working source found. Open the server list to pick one manually.";

/// Monotonic token identifying the current session epoch.
///
/// Bumped on content change and on manual source switches; async results
/// carrying an older generation are discarded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionGeneration(pub u64);

impl SessionGeneration {
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl std::fmt::Display for SessionGeneration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "gen-{}", self.0)
    }
}

/// Recovery state machine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CascadeState {
    /// Looking for a playable source (also the initial state)
    #[default]
    Recovering,
    Playing,
    /// Every source and provider failed; no automatic retries
    Exhausted,
}

impl CascadeState {
    /// `Playing → Recovering`. Returns false if a recovery is already
    /// running or the session is exhausted.
    pub fn begin_recovery(&mut self) -> bool {
        if *self == Self::Playing {
            *self = Self::Recovering;
            true
        } else {
            false
        }
    }

    /// `Recovering → Playing`
    pub fn settle(&mut self) -> bool {
        if *self == Self::Recovering {
            *self = Self::Playing;
            true
        } else {
            false
        }
    }

    /// `Recovering → Exhausted`
    pub fn exhaust(&mut self) -> bool {
        if *self == Self::Recovering {
            *self = Self::Exhausted;
            true
        } else {
            false
        }
    }

    /// Explicit user selection; allowed from any state
    pub fn manual_override(&mut self) {
        *self = Self::Playing;
    }
}

/// Read-only view of the current session for the user-facing layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub content_key: ContentKey,
    pub generation: SessionGeneration,
    pub state: CascadeState,
    pub provider: Option<ProviderId>,
    pub source_index: Option<usize>,
    pub active_url: Option<String>,
    pub tried_providers: BTreeSet<ProviderId>,
    pub quality_levels: Vec<QualityLevel>,
    pub quality_selection: QualitySelection,
    pub position: f64,
}

/// Notifications published by the session controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    SessionStarted {
        content_key: ContentKey,
        providers: Vec<ProviderId>,
    },
    SourceActivated {
        provider: ProviderId,
        index: usize,
        name: String,
        url: String,
        language: Option<String>,
        manual: bool,
    },
    Recovering {
        provider: ProviderId,
        index: usize,
        reason: String,
    },
    Exhausted {
        content_key: ContentKey,
        hint: String,
    },
    ResumePrompt(ResumePrompt),
    QualityLevelsChanged {
        levels: Vec<QualityLevel>,
    },
    QualityLevelSwitched {
        index: usize,
    },
    SessionEnded {
        content_key: ContentKey,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cascade_transitions() {
        let mut state = CascadeState::default();
        assert_eq!(state, CascadeState::Recovering);
        assert!(!state.begin_recovery());
        assert!(state.settle());
        assert!(state.begin_recovery());
        assert!(!state.begin_recovery());
        assert!(state.exhaust());
        assert!(!state.settle());
        assert!(!state.begin_recovery());

        state.manual_override();
        assert_eq!(state, CascadeState::Playing);
    }

    #[test]
    fn test_generation_ordering() {
        let g = SessionGeneration::default();
        assert!(g.next() > g);
        assert_eq!(g.next().to_string(), "gen-1");
    }
}
