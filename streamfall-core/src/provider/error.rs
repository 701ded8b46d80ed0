// Provider Error Types

use streamfall_providers::ProviderClientError;

/// Provider-specific errors
///
/// `Clone` so a single in-flight fetch can hand the same failure to every
/// caller that joined it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Provider API error: {0}")]
    ApiError(String),

    #[error("Content not found")]
    NotFound,

    #[error("Provider returned no playable sources")]
    NoSources,

    #[error("Provider {0} does not support targeted resolution")]
    TargetedUnsupported(String),

    #[error("Source not found: {0}")]
    SourceNotFound(String),

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("In-flight fetch was abandoned")]
    Abandoned,
}

impl From<ProviderClientError> for ProviderError {
    fn from(err: ProviderClientError) -> Self {
        match err {
            ProviderClientError::Timeout(msg) => Self::Timeout(msg),
            ProviderClientError::Network(msg) => Self::NetworkError(msg),
            ProviderClientError::Http { status, .. } if status == 404 => Self::NotFound,
            ProviderClientError::InvalidConfig(msg) => Self::InvalidConfig(msg),
            other => Self::ApiError(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ProviderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_client_error() {
        assert_eq!(
            ProviderError::from(ProviderClientError::Timeout("15s".to_string())),
            ProviderError::Timeout("15s".to_string())
        );
        assert_eq!(
            ProviderError::from(ProviderClientError::Http {
                status: reqwest::StatusCode::NOT_FOUND,
                url: "http://upstream/api/sources/alpha".to_string(),
            }),
            ProviderError::NotFound
        );
        assert!(matches!(
            ProviderError::from(ProviderClientError::Parse("eof".to_string())),
            ProviderError::ApiError(_)
        ));
    }
}
