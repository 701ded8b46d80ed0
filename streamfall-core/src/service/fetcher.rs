//! Source fetcher
//!
//! Retrieves and refreshes a provider's candidate list for the current
//! session. Results land in the session's [`SourceHealthCache`]; identical
//! in-flight requests are collapsed into one upstream call.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::cache::{SingleFlight, SourceHealthCache, SourceListKey};
use crate::models::{CandidateSource, ContentKey, ProviderId, ProviderSourceList, ResolvedSource};
use crate::provider::{ProviderError, ProviderRegistry, SourceResolver};
use crate::resilience::timeout::FETCH_TIMEOUT;

/// A fetch that produced nothing playable. Transport errors and empty
/// lists look the same to the cascade.
pub type FetchError = ProviderError;

/// Options for [`SourceFetcher::fetch_sources`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchOptions {
    /// Bypass the cache
    pub force_refresh: bool,
    /// Resolve only this deferred entry
    pub targeted_name: Option<String>,
}

impl FetchOptions {
    #[must_use]
    pub fn refresh() -> Self {
        Self {
            force_refresh: true,
            targeted_name: None,
        }
    }

    #[must_use]
    pub fn targeted(name: impl Into<String>) -> Self {
        Self {
            force_refresh: false,
            targeted_name: Some(name.into()),
        }
    }
}

/// In-flight request identity
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct InflightKey {
    list: SourceListKey,
    targeted: Option<String>,
}

/// Session-scoped source fetcher
#[derive(Clone)]
pub struct SourceFetcher {
    resolver: Arc<dyn SourceResolver>,
    registry: Arc<ProviderRegistry>,
    cache: SourceHealthCache,
    inflight: SingleFlight<InflightKey, ProviderSourceList, ProviderError>,
    timeout: Duration,
}

impl std::fmt::Debug for SourceFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceFetcher")
            .field("cached_lists", &self.cache.len())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl SourceFetcher {
    #[must_use]
    pub fn new(
        resolver: Arc<dyn SourceResolver>,
        registry: Arc<ProviderRegistry>,
        cache: SourceHealthCache,
    ) -> Self {
        Self {
            resolver,
            registry,
            cache,
            inflight: SingleFlight::new(),
            timeout: FETCH_TIMEOUT,
        }
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub const fn cache(&self) -> &SourceHealthCache {
        &self.cache
    }

    #[must_use]
    pub fn supports_targeted(&self, provider: &ProviderId) -> bool {
        self.registry.supports_targeted(provider)
    }

    /// Candidate list for `(key, provider)`.
    ///
    /// Served from cache unless `force_refresh` is set or nothing is cached.
    /// With `targeted_name`, only that deferred entry is resolved (in place)
    /// when the provider supports it; otherwise the whole list is refetched.
    pub async fn fetch_sources(
        &self,
        key: &ContentKey,
        provider: &ProviderId,
        options: FetchOptions,
    ) -> Result<ProviderSourceList, FetchError> {
        let list_key = SourceListKey::new(key, provider);

        if let Some(name) = options.targeted_name {
            if self.supports_targeted(provider) {
                if !self.cache.contains(&list_key) {
                    self.fetch_list(list_key.clone(), false).await?;
                }
                self.resolve_deferred(key, provider, &name).await?;
                return self.cache.get(&list_key).ok_or(ProviderError::NoSources);
            }
            debug!(
                provider = %provider,
                source = %name,
                "Provider has no targeted resolution, refetching whole list"
            );
            return self.fetch_list(list_key, true).await;
        }

        self.fetch_list(list_key, options.force_refresh).await
    }

    async fn fetch_list(
        &self,
        list_key: SourceListKey,
        force_refresh: bool,
    ) -> Result<ProviderSourceList, FetchError> {
        if !force_refresh {
            if let Some(cached) = self.cache.get(&list_key) {
                debug!(provider = %list_key.provider, content = %list_key.content_key, "Source list cache hit");
                return Ok(cached);
            }
        }

        let resolver = self.resolver.clone();
        let cache = self.cache.clone();
        let timeout = self.timeout;
        let targeted_capable = self.supports_targeted(&list_key.provider);
        let work_key = InflightKey {
            list: list_key.clone(),
            targeted: None,
        };

        let result = self
            .inflight
            .work(
                work_key,
                async move {
                    let list = tokio::time::timeout(
                        timeout,
                        resolver.resolve_sources(&list_key.content_key, &list_key.provider, None),
                    )
                    .await
                    .map_err(|_| ProviderError::Timeout(format!("source list from {}", list_key.provider)))??;

                    if !is_usable(&list, targeted_capable) {
                        return Err(ProviderError::NoSources);
                    }
                    info!(
                        provider = %list_key.provider,
                        content = %list_key.content_key,
                        count = list.len(),
                        "Fetched source list"
                    );
                    Ok(cache.store(list_key, list))
                },
                || ProviderError::Abandoned,
            )
            .await;

        if let Err(e) = &result {
            warn!(error = %e, "Source list fetch failed");
        }
        result
    }

    /// Resolve one deferred entry by name and replace it in place, marked
    /// `Working`. Returns the entry's current index and its playable form.
    ///
    /// Already-resolved entries are returned as-is. Failure leaves the entry
    /// untouched; marking it `Down` is the caller's decision.
    pub async fn resolve_deferred(
        &self,
        key: &ContentKey,
        provider: &ProviderId,
        name: &str,
    ) -> Result<(usize, ResolvedSource), FetchError> {
        let list_key = SourceListKey::new(key, provider);
        let index = self
            .cache
            .position(&list_key, name)
            .ok_or_else(|| ProviderError::SourceNotFound(name.to_string()))?;
        let entry = self
            .cache
            .entry(&list_key, index)
            .ok_or_else(|| ProviderError::SourceNotFound(name.to_string()))?;

        if let Some(resolved) = entry.as_resolved() {
            return Ok((index, resolved.clone()));
        }
        if !self.supports_targeted(provider) {
            return Err(ProviderError::TargetedUnsupported(provider.to_string()));
        }

        let resolver = self.resolver.clone();
        let timeout = self.timeout;
        let target = name.to_string();
        let work_key = InflightKey {
            list: list_key.clone(),
            targeted: Some(target.clone()),
        };

        let resolved = self
            .inflight
            .work(
                work_key,
                async move {
                    let list = tokio::time::timeout(
                        timeout,
                        resolver.resolve_sources(&list_key.content_key, &list_key.provider, Some(&target)),
                    )
                    .await
                    .map_err(|_| ProviderError::Timeout(format!("targeted lookup of {target}")))??;

                    pick_targeted(list, &target)
                        .map(|candidate| vec![candidate])
                        .ok_or(ProviderError::SourceNotFound(target))
                },
                || ProviderError::Abandoned,
            )
            .await?;

        let list_key = SourceListKey::new(key, provider);
        let mut candidate = resolved
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::SourceNotFound(name.to_string()))?;
        let source = candidate
            .as_resolved()
            .cloned()
            .ok_or_else(|| ProviderError::SourceNotFound(name.to_string()))?;

        // The list may have been refreshed while we waited
        let index = self.cache.position(&list_key, name).unwrap_or(index);
        candidate.name = name.to_string();
        candidate.reset_status();
        candidate.mark_working();
        self.cache.replace_entry(&list_key, index, candidate);

        info!(provider = %provider, source = %name, index, "Resolved deferred source");
        Ok((index, source))
    }
}

/// A list is a failure unless something in it can be played: a resolved
/// entry, or any entry at all if the provider can resolve deferred ones.
fn is_usable(list: &[CandidateSource], targeted_capable: bool) -> bool {
    if targeted_capable {
        !list.is_empty()
    } else {
        list.iter().any(CandidateSource::is_resolved)
    }
}

/// The resolved entry carrying the requested name. An unnamed match is only
/// accepted when the provider answered with a single entry.
fn pick_targeted(list: Vec<CandidateSource>, name: &str) -> Option<CandidateSource> {
    if let [only] = list.as_slice() {
        return only.is_resolved().then(|| only.clone());
    }
    list.into_iter()
        .find(|candidate| candidate.is_resolved() && candidate.name == name)
}
