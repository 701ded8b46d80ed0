use serde::{Deserialize, Serialize};

/// Health of one candidate source within the current session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    #[default]
    Unknown,
    Working,
    Down,
}

/// A source with a playable URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedSource {
    pub url: String,

    /// Playback must go through the proxy router
    #[serde(default)]
    pub requires_proxy: bool,

    /// Origin URL, when `url` is already a provider-side mirror
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direct_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referer: Option<String>,

    /// Audio language tag (e.g. "en", "hi")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl ResolvedSource {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            requires_proxy: false,
            direct_url: None,
            referer: None,
            language: None,
        }
    }

    #[must_use]
    pub const fn with_proxy(mut self, requires_proxy: bool) -> Self {
        self.requires_proxy = requires_proxy;
        self
    }

    #[must_use]
    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

/// Whether a candidate is ready to play or needs a targeted lookup first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceKind {
    Resolved(ResolvedSource),
    Deferred { display_name: String },
}

/// One playable option from a provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateSource {
    pub name: String,
    #[serde(flatten)]
    pub kind: SourceKind,
    #[serde(default)]
    pub status: SourceStatus,
}

/// Ordered candidate list for one (content key, provider) pair
pub type ProviderSourceList = Vec<CandidateSource>;

impl CandidateSource {
    #[must_use]
    pub fn resolved(name: impl Into<String>, source: ResolvedSource) -> Self {
        Self {
            name: name.into(),
            kind: SourceKind::Resolved(source),
            status: SourceStatus::Unknown,
        }
    }

    #[must_use]
    pub fn deferred(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            kind: SourceKind::Deferred {
                display_name: name.clone(),
            },
            name,
            status: SourceStatus::Unknown,
        }
    }

    #[must_use]
    pub const fn as_resolved(&self) -> Option<&ResolvedSource> {
        match &self.kind {
            SourceKind::Resolved(source) => Some(source),
            SourceKind::Deferred { .. } => None,
        }
    }

    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        matches!(self.kind, SourceKind::Resolved(_))
    }

    #[must_use]
    pub fn is_down(&self) -> bool {
        self.status == SourceStatus::Down
    }

    /// Record that the source played. Only `Unknown` can be promoted.
    pub fn mark_working(&mut self) -> bool {
        if self.status == SourceStatus::Unknown {
            self.status = SourceStatus::Working;
            true
        } else {
            false
        }
    }

    /// Record a failure. A confirmed `Working` source never goes `Down`
    /// automatically.
    pub fn mark_down(&mut self) -> bool {
        if self.status == SourceStatus::Unknown {
            self.status = SourceStatus::Down;
            true
        } else {
            false
        }
    }

    /// Clear health tracking after an explicit user pick.
    pub fn reset_status(&mut self) {
        self.status = SourceStatus::Unknown;
    }
}
