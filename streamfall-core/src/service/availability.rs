//! Provider availability resolution
//!
//! Turns the upstream on/off switches plus the configured priority order into
//! the ordered provider list a session walks. Fails open: if the lookup
//! fails, playback still proceeds with the primary alone.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::models::Provider;
use crate::provider::{AvailabilitySource, ProviderError, ProviderRegistry};
use crate::resilience::timeout::AVAILABILITY_TIMEOUT;

const CACHE_KEY: &str = "providers";

/// Provider availability resolver
#[derive(Clone)]
pub struct ProviderAvailability {
    registry: Arc<ProviderRegistry>,
    source: Arc<dyn AvailabilitySource>,
    /// Successful lookups only; failures are retried on the next session
    cache: moka::future::Cache<&'static str, Vec<Provider>>,
    timeout: Duration,
}

impl std::fmt::Debug for ProviderAvailability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderAvailability")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl ProviderAvailability {
    /// Default time a successful lookup stays valid
    pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

    #[must_use]
    pub fn new(registry: Arc<ProviderRegistry>, source: Arc<dyn AvailabilitySource>) -> Self {
        Self::with_ttl(registry, source, Duration::from_secs(Self::DEFAULT_CACHE_TTL_SECS))
    }

    #[must_use]
    pub fn with_ttl(
        registry: Arc<ProviderRegistry>,
        source: Arc<dyn AvailabilitySource>,
        ttl: Duration,
    ) -> Self {
        Self {
            registry,
            source,
            cache: moka::future::CacheBuilder::new(1).time_to_live(ttl).build(),
            timeout: AVAILABILITY_TIMEOUT,
        }
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// Enabled providers in priority order, primary first.
    ///
    /// Never fails: a lookup error yields `[primary]`.
    pub async fn resolve(&self) -> Vec<Provider> {
        if let Some(cached) = self.cache.get(CACHE_KEY).await {
            return cached;
        }

        let lookup = tokio::time::timeout(self.timeout, self.source.provider_switches())
            .await
            .unwrap_or_else(|_| Err(ProviderError::Timeout("provider availability lookup".to_string())));

        match lookup {
            Ok(switches) => {
                let providers: Vec<Provider> = self
                    .registry
                    .ordered()
                    .into_iter()
                    .filter_map(|provider| {
                        let enabled =
                            provider.primary || switches.get(&provider.id).copied().unwrap_or(false);
                        enabled.then(|| provider.with_enabled(true))
                    })
                    .collect();

                info!(
                    providers = ?providers.iter().map(|p| p.id.as_str()).collect::<Vec<_>>(),
                    "Resolved provider availability"
                );
                self.cache.insert(CACHE_KEY, providers.clone()).await;
                providers
            }
            Err(e) => {
                warn!(error = %e, "Provider availability lookup failed, falling back to primary");
                self.primary_only()
            }
        }
    }

    fn primary_only(&self) -> Vec<Provider> {
        self.registry
            .primary()
            .cloned()
            .map(|p| vec![p.with_enabled(true)])
            .unwrap_or_default()
    }

    /// Drop the cached lookup so the next session queries again
    pub async fn invalidate(&self) {
        self.cache.invalidate(CACHE_KEY).await;
        debug!("Provider availability cache invalidated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProviderId;
    use crate::test_helpers::StaticAvailability;

    fn registry() -> Arc<ProviderRegistry> {
        Arc::new(
            ProviderRegistry::from_providers(vec![
                Provider::new("alpha").with_primary(true),
                Provider::new("beta"),
                Provider::new("gamma"),
            ])
            .unwrap(),
        )
    }

    fn ids(providers: &[Provider]) -> Vec<&str> {
        providers.iter().map(|p| p.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_filters_disabled_keeps_priority() {
        let source = StaticAvailability::with(&[("alpha", true), ("beta", false), ("gamma", true)]);
        let availability = ProviderAvailability::new(registry(), Arc::new(source));

        let providers = availability.resolve().await;
        assert_eq!(ids(&providers), vec!["alpha", "gamma"]);
        assert!(providers.iter().all(|p| p.enabled));
    }

    #[tokio::test]
    async fn test_primary_assumed_enabled() {
        let source = StaticAvailability::with(&[("alpha", false), ("beta", true)]);
        let availability = ProviderAvailability::new(registry(), Arc::new(source));

        assert_eq!(ids(&availability.resolve().await), vec!["alpha", "beta"]);
    }

    #[tokio::test]
    async fn test_lookup_failure_fails_open_to_primary() {
        let availability = ProviderAvailability::new(registry(), Arc::new(StaticAvailability::failing()));

        let providers = availability.resolve().await;
        assert_eq!(providers.len(), 1);
        assert_eq!(providers[0].id, ProviderId::from("alpha"));
    }

    #[tokio::test]
    async fn test_successful_lookup_is_cached() {
        let source = Arc::new(StaticAvailability::with(&[("beta", true)]));
        let availability = ProviderAvailability::new(registry(), source.clone());

        availability.resolve().await;
        availability.resolve().await;
        assert_eq!(source.calls(), 1);

        availability.invalidate().await;
        availability.resolve().await;
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let source = Arc::new(StaticAvailability::failing());
        let availability = ProviderAvailability::new(registry(), source.clone());

        availability.resolve().await;
        availability.resolve().await;
        assert_eq!(source.calls(), 2);
    }
}
