// Upstream Provider Adapter
//
// Implements SourceResolver and AvailabilitySource on top of the pure
// HTTP client from streamfall-providers.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use backon::BackoffBuilder;
use streamfall_providers::upstream::{SourceEntry, SourceQuery};
use streamfall_providers::UpstreamClient;
use tracing::{debug, warn};

use super::{AvailabilitySource, ProviderError, SourceResolver};
use crate::models::{CandidateSource, ContentKey, ProviderId, ResolvedSource, SourceKind, SourceStatus};
use crate::resilience::retry::{lookup_backoff, should_retry};

/// HTTP-backed provider adapter
#[derive(Debug, Clone)]
pub struct UpstreamProvider {
    client: UpstreamClient,
    availability_retries: usize,
}

impl UpstreamProvider {
    #[must_use]
    pub const fn new(client: UpstreamClient) -> Self {
        Self {
            client,
            availability_retries: 2,
        }
    }

    #[must_use]
    pub const fn with_availability_retries(mut self, retries: usize) -> Self {
        self.availability_retries = retries;
        self
    }
}

impl From<SourceEntry> for CandidateSource {
    fn from(entry: SourceEntry) -> Self {
        let kind = match entry.url {
            Some(url) if !url.is_empty() => SourceKind::Resolved(ResolvedSource {
                url,
                requires_proxy: entry.requires_proxy,
                direct_url: entry.direct_url,
                referer: entry.referer,
                language: entry.language,
            }),
            _ => SourceKind::Deferred {
                display_name: entry.name.clone(),
            },
        };
        Self {
            name: entry.name,
            kind,
            status: SourceStatus::Unknown,
        }
    }
}

#[async_trait]
impl SourceResolver for UpstreamProvider {
    async fn resolve_sources(
        &self,
        key: &ContentKey,
        provider: &ProviderId,
        targeted: Option<&str>,
    ) -> Result<Vec<CandidateSource>, ProviderError> {
        let query = SourceQuery {
            id: &key.content_id,
            media_type: key.media_type.as_str(),
            season: key.season,
            episode: key.episode,
            source: targeted,
        };

        let response = self.client.sources(provider.as_str(), &query).await?;
        debug!(
            provider = %provider,
            content = %key,
            count = response.sources.len(),
            "Upstream returned sources"
        );
        Ok(response.sources.into_iter().map(CandidateSource::from).collect())
    }
}

#[async_trait]
impl AvailabilitySource for UpstreamProvider {
    /// Retries transient failures with exponential backoff before giving up
    async fn provider_switches(&self) -> Result<HashMap<ProviderId, bool>, ProviderError> {
        let backoff = lookup_backoff(self.availability_retries).build();

        let mut last_err = None;
        for delay in std::iter::once(Duration::ZERO).chain(backoff) {
            if delay > Duration::ZERO {
                tokio::time::sleep(delay).await;
            }

            match self.client.providers().await {
                Ok(switches) => {
                    return Ok(switches
                        .into_iter()
                        .map(|(id, state)| (ProviderId::from(id), state.enabled))
                        .collect());
                }
                Err(e) => {
                    if !should_retry(&e) {
                        return Err(e.into());
                    }
                    warn!(error = %e, ?delay, "Provider availability lookup failed, retrying");
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.map_or(ProviderError::NetworkError("retry exhausted".to_string()), Into::into))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_without_url_becomes_deferred() {
        let entry = SourceEntry {
            name: "A".to_string(),
            url: None,
            requires_proxy: false,
            direct_url: None,
            referer: None,
            language: None,
        };
        let source = CandidateSource::from(entry);
        assert_eq!(
            source.kind,
            SourceKind::Deferred {
                display_name: "A".to_string()
            }
        );
    }

    #[test]
    fn test_entry_with_url_becomes_resolved() {
        let entry = SourceEntry {
            name: "B".to_string(),
            url: Some("u2".to_string()),
            requires_proxy: true,
            direct_url: None,
            referer: Some("https://site/".to_string()),
            language: Some("en".to_string()),
        };
        let source = CandidateSource::from(entry);
        let resolved = source.as_resolved().unwrap();
        assert_eq!(resolved.url, "u2");
        assert!(resolved.requires_proxy);
        assert_eq!(resolved.referer.as_deref(), Some("https://site/"));
        assert_eq!(source.status, SourceStatus::Unknown);
    }

    #[test]
    fn test_empty_url_is_deferred() {
        let entry = SourceEntry {
            name: "C".to_string(),
            url: Some(String::new()),
            requires_proxy: false,
            direct_url: None,
            referer: None,
            language: None,
        };
        assert!(!CandidateSource::from(entry).is_resolved());
    }
}
