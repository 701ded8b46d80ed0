use thiserror::Error;

use crate::models::ContentKey;
use crate::provider::ProviderError;

#[derive(Error, Debug)]
pub enum Error {
    /// Terminal: automatic recovery has nothing left to try
    #[error("All sources exhausted for {content_key}")]
    ExhaustedAllSources { content_key: ContentKey },

    #[error("No active playback session")]
    NoSession,

    #[error("Invalid source selection: {0}")]
    InvalidSelection(String),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Resume store error: {0}")]
    ResumeStore(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the error should be surfaced to the user with a manual-recovery affordance
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::ExhaustedAllSources { .. })
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
