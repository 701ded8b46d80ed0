//! Fallback cascade
//!
//! Ordered walk through a provider's sources, then through the remaining
//! providers, until something playable turns up. Sources are tried in
//! ascending index order and providers in priority order; a provider once
//! exhausted is recorded in `tried` and never walked again.
//!
//! The walk is strictly sequential. A deferred entry blocks progress until
//! its targeted resolution settles, so lower-priority sources are never
//! fetched while a higher-priority one might still work.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::fetcher::{FetchOptions, SourceFetcher};
use crate::cache::SourceListKey;
use crate::models::{ContentKey, ProviderId, ResolvedSource, SessionGeneration};

/// A source the cascade settled on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Adoption {
    pub provider: ProviderId,
    pub index: usize,
    pub name: String,
    pub source: ResolvedSource,
}

/// Result of one cascade run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CascadeOutcome {
    Adopted(Adoption),
    /// Nothing left to try
    Exhausted,
    /// The session moved on while the walk was running
    Superseded,
}

/// One cascade run over the current session's providers
pub struct FallbackCascade {
    fetcher: SourceFetcher,
    content_key: ContentKey,
    providers: Vec<ProviderId>,
    generation: SessionGeneration,
    current: Arc<AtomicU64>,
}

impl FallbackCascade {
    /// `providers` must already be in priority order. The run stops early
    /// once `current` no longer holds `generation`.
    #[must_use]
    pub fn new(
        fetcher: SourceFetcher,
        content_key: ContentKey,
        providers: Vec<ProviderId>,
        generation: SessionGeneration,
        current: Arc<AtomicU64>,
    ) -> Self {
        Self {
            fetcher,
            content_key,
            providers,
            generation,
            current,
        }
    }

    fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.generation.0
    }

    fn list_key(&self, provider: &ProviderId) -> SourceListKey {
        SourceListKey::new(&self.content_key, provider)
    }

    /// Initial resolution: first provider from index 0, then the rest.
    ///
    /// The first provider only lands in `tried` once it is exhausted.
    pub async fn start(&self, tried: &mut BTreeSet<ProviderId>) -> CascadeOutcome {
        let Some(first) = self.providers.first() else {
            warn!(content = %self.content_key, "No providers available");
            return CascadeOutcome::Exhausted;
        };

        if !tried.contains(first) {
            match self.try_provider(first).await {
                Some(adoption) => return CascadeOutcome::Adopted(adoption),
                None if !self.is_current() => return CascadeOutcome::Superseded,
                None => {
                    tried.insert(first.clone());
                }
            }
        }
        self.walk_providers(tried).await
    }

    /// Recovery after a fatal transport error on `(failed_provider, failed_index)`
    pub async fn recover(
        &self,
        failed_provider: &ProviderId,
        failed_index: usize,
        tried: &mut BTreeSet<ProviderId>,
    ) -> CascadeOutcome {
        let list_key = self.list_key(failed_provider);
        if self.fetcher.cache().mark_down(&list_key, failed_index) {
            info!(provider = %failed_provider, index = failed_index, "Marked source down");
        }

        if let Some(adoption) = self.scan(failed_provider, failed_index + 1).await {
            return CascadeOutcome::Adopted(adoption);
        }
        if !self.is_current() {
            return CascadeOutcome::Superseded;
        }

        info!(provider = %failed_provider, "Provider exhausted");
        tried.insert(failed_provider.clone());
        self.walk_providers(tried).await
    }

    /// Next untried providers in priority order, each recorded as tried
    /// before it is fetched.
    async fn walk_providers(&self, tried: &mut BTreeSet<ProviderId>) -> CascadeOutcome {
        for provider in &self.providers {
            if tried.contains(provider) {
                continue;
            }
            tried.insert(provider.clone());
            debug!(provider = %provider, "Cascading to next provider");

            if let Some(adoption) = self.try_provider(provider).await {
                return CascadeOutcome::Adopted(adoption);
            }
            if !self.is_current() {
                return CascadeOutcome::Superseded;
            }
        }

        warn!(content = %self.content_key, tried = tried.len(), "All providers exhausted");
        CascadeOutcome::Exhausted
    }

    async fn try_provider(&self, provider: &ProviderId) -> Option<Adoption> {
        match self
            .fetcher
            .fetch_sources(&self.content_key, provider, FetchOptions::default())
            .await
        {
            Ok(_) => self.scan(provider, 0).await,
            Err(e) => {
                warn!(provider = %provider, error = %e, "Fetch failed");
                None
            }
        }
    }

    /// Scan `provider`'s cached list forward from `from`, skipping `Down`
    /// entries. Deferred entries are resolved on demand when the provider
    /// supports it; a failed resolution marks the entry `Down`.
    async fn scan(&self, provider: &ProviderId, from: usize) -> Option<Adoption> {
        let list_key = self.list_key(provider);
        let targeted = self.fetcher.supports_targeted(provider);
        let mut index = from;

        while let Some(candidate) = self.fetcher.cache().entry(&list_key, index) {
            if !self.is_current() {
                return None;
            }
            if candidate.is_down() {
                index += 1;
                continue;
            }

            if let Some(source) = candidate.as_resolved().cloned() {
                return Some(Adoption {
                    provider: provider.clone(),
                    index,
                    name: candidate.name,
                    source,
                });
            }

            if targeted {
                match self
                    .fetcher
                    .resolve_deferred(&self.content_key, provider, &candidate.name)
                    .await
                {
                    Ok((resolved_index, source)) => {
                        return Some(Adoption {
                            provider: provider.clone(),
                            index: resolved_index,
                            name: candidate.name,
                            source,
                        });
                    }
                    Err(e) => {
                        warn!(provider = %provider, source = %candidate.name, error = %e, "Targeted resolution failed");
                        self.fetcher.cache().mark_down(&list_key, index);
                    }
                }
            } else {
                debug!(provider = %provider, source = %candidate.name, "Skipping deferred source");
            }
            index += 1;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::SourceHealthCache;
    use crate::models::{Provider, SourceStatus};
    use crate::provider::ProviderRegistry;
    use crate::test_helpers::{deferred, resolved, ScriptedResolver};

    struct Fixture {
        resolver: Arc<ScriptedResolver>,
        cascade: FallbackCascade,
        current: Arc<AtomicU64>,
    }

    impl Fixture {
        fn new(resolver: ScriptedResolver, providers: Vec<Provider>) -> Self {
            let resolver = Arc::new(resolver);
            let ids = providers.iter().map(|p| p.id.clone()).collect();
            let registry = Arc::new(ProviderRegistry::from_providers(providers).unwrap());
            let fetcher = SourceFetcher::new(resolver.clone(), registry, SourceHealthCache::new());
            let current = Arc::new(AtomicU64::new(1));
            let cascade = FallbackCascade::new(
                fetcher,
                ContentKey::movie("603"),
                ids,
                SessionGeneration(1),
                current.clone(),
            );
            Self {
                resolver,
                cascade,
                current,
            }
        }

        fn status(&self, provider: &str, index: usize) -> Option<SourceStatus> {
            self.cascade
                .fetcher
                .cache()
                .status(&self.cascade.list_key(&provider.into()), index)
        }
    }

    fn adopted(outcome: CascadeOutcome) -> Adoption {
        match outcome {
            CascadeOutcome::Adopted(adoption) => adoption,
            other => panic!("expected adoption, got {other:?}"),
        }
    }

    fn two_providers() -> Vec<Provider> {
        vec![
            Provider::new("p1").with_primary(true).with_targeted_resolution(true),
            Provider::new("p2"),
        ]
    }

    #[tokio::test]
    async fn test_start_adopts_first_provider_index_zero() {
        let fx = Fixture::new(
            ScriptedResolver::new()
                .with_list("p1", vec![resolved("S0", "u0"), resolved("S1", "u1")])
                .with_list("p2", vec![resolved("T0", "t0")]),
            two_providers(),
        );
        let mut tried = BTreeSet::new();

        let adoption = adopted(fx.cascade.start(&mut tried).await);
        assert_eq!(adoption.provider, ProviderId::from("p1"));
        assert_eq!(adoption.index, 0);
        assert!(tried.is_empty());
        assert_eq!(fx.resolver.list_calls("p2"), 0);
    }

    #[tokio::test]
    async fn test_recover_takes_next_resolved_entry_not_later_ones() {
        let fx = Fixture::new(
            ScriptedResolver::new().with_list(
                "p1",
                vec![resolved("S0", "u0"), resolved("S1", "u1"), resolved("S2", "u2")],
            ),
            two_providers(),
        );
        let mut tried = BTreeSet::new();
        fx.cascade.start(&mut tried).await;

        let adoption = adopted(fx.cascade.recover(&"p1".into(), 0, &mut tried).await);
        assert_eq!(adoption.index, 1);
        assert_eq!(adoption.source.url, "u1");
        assert_eq!(fx.status("p1", 0), Some(SourceStatus::Down));
        assert_eq!(fx.status("p1", 2), Some(SourceStatus::Unknown));
        assert!(tried.is_empty());
    }

    #[tokio::test]
    async fn test_failed_targeted_resolution_moves_to_next_entry() {
        let fx = Fixture::new(
            ScriptedResolver::new()
                .with_list("p1", vec![deferred("A"), resolved("B", "u2")])
                .with_list("p2", vec![resolved("T0", "t0")]),
            two_providers(),
        );
        let mut tried = BTreeSet::new();

        let adoption = adopted(fx.cascade.start(&mut tried).await);
        assert_eq!(adoption.provider, ProviderId::from("p1"));
        assert_eq!(adoption.name, "B");
        assert_eq!(adoption.source.url, "u2");
        assert_eq!(fx.status("p1", 0), Some(SourceStatus::Down));
        assert!(tried.is_empty());
        assert_eq!(fx.resolver.targeted_calls("p1", "A"), 1);
    }

    #[tokio::test]
    async fn test_successful_targeted_resolution_is_adopted_working() {
        let fx = Fixture::new(
            ScriptedResolver::new()
                .with_list("p1", vec![deferred("A"), resolved("B", "u2")])
                .with_targeted("p1", "A", "u1"),
            two_providers(),
        );
        let mut tried = BTreeSet::new();

        let adoption = adopted(fx.cascade.start(&mut tried).await);
        assert_eq!(adoption.index, 0);
        assert_eq!(adoption.source.url, "u1");
        assert_eq!(fx.status("p1", 0), Some(SourceStatus::Working));
    }

    #[tokio::test]
    async fn test_deferred_entries_skipped_without_capability() {
        let fx = Fixture::new(
            ScriptedResolver::new()
                .with_list("p1", vec![resolved("S0", "u0")])
                .with_list("p2", vec![deferred("X"), resolved("Y", "uy")]),
            two_providers(),
        );
        let mut tried = BTreeSet::new();
        fx.cascade.start(&mut tried).await;

        let adoption = adopted(fx.cascade.recover(&"p1".into(), 0, &mut tried).await);
        assert_eq!(adoption.provider, ProviderId::from("p2"));
        assert_eq!(adoption.name, "Y");
        assert_eq!(fx.status("p2", 0), Some(SourceStatus::Unknown));
        assert_eq!(fx.resolver.targeted_calls("p2", "X"), 0);
    }

    #[tokio::test]
    async fn test_exhausted_provider_is_recorded_and_next_one_fetched() {
        let fx = Fixture::new(
            ScriptedResolver::new()
                .with_list("p1", vec![resolved("S0", "u0")])
                .with_list("p2", vec![resolved("T0", "t0")]),
            two_providers(),
        );
        let mut tried = BTreeSet::new();
        fx.cascade.start(&mut tried).await;

        let adoption = adopted(fx.cascade.recover(&"p1".into(), 0, &mut tried).await);
        assert_eq!(adoption.provider, ProviderId::from("p2"));
        assert_eq!(adoption.index, 0);
        assert_eq!(
            tried,
            BTreeSet::from([ProviderId::from("p1"), ProviderId::from("p2")])
        );
    }

    #[tokio::test]
    async fn test_everything_failing_is_exhausted() {
        let fx = Fixture::new(
            ScriptedResolver::new().with_list("p1", vec![]),
            two_providers(),
        );
        let mut tried = BTreeSet::new();

        assert_eq!(fx.cascade.start(&mut tried).await, CascadeOutcome::Exhausted);
        assert_eq!(tried.len(), 2);
    }

    #[tokio::test]
    async fn test_tried_providers_are_never_revisited() {
        let fx = Fixture::new(
            ScriptedResolver::new()
                .with_list("p1", vec![resolved("S0", "u0")])
                .with_list("p2", vec![resolved("T0", "t0")]),
            two_providers(),
        );
        let mut tried = BTreeSet::from([ProviderId::from("p1")]);
        fx.cascade.start(&mut tried).await;

        let outcome = fx.cascade.recover(&"p2".into(), 0, &mut tried).await;
        assert_eq!(outcome, CascadeOutcome::Exhausted);
        assert_eq!(fx.resolver.list_calls("p1"), 0);
    }

    #[tokio::test]
    async fn test_working_source_is_not_marked_down() {
        let fx = Fixture::new(
            ScriptedResolver::new().with_list("p1", vec![resolved("S0", "u0"), resolved("S1", "u1")]),
            two_providers(),
        );
        let mut tried = BTreeSet::new();
        fx.cascade.start(&mut tried).await;
        fx.cascade
            .fetcher
            .cache()
            .mark_working(&fx.cascade.list_key(&"p1".into()), 0);

        let adoption = adopted(fx.cascade.recover(&"p1".into(), 0, &mut tried).await);
        assert_eq!(adoption.index, 1);
        assert_eq!(fx.status("p1", 0), Some(SourceStatus::Working));
    }

    #[tokio::test]
    async fn test_recover_skips_down_entries() {
        let fx = Fixture::new(
            ScriptedResolver::new().with_list(
                "p1",
                vec![resolved("S0", "u0"), resolved("S1", "u1"), resolved("S2", "u2")],
            ),
            two_providers(),
        );
        let mut tried = BTreeSet::new();
        fx.cascade.start(&mut tried).await;
        fx.cascade
            .fetcher
            .cache()
            .mark_down(&fx.cascade.list_key(&"p1".into()), 1);

        let adoption = adopted(fx.cascade.recover(&"p1".into(), 0, &mut tried).await);
        assert_eq!(adoption.index, 2);
    }

    #[tokio::test]
    async fn test_stale_generation_stops_the_walk() {
        let fx = Fixture::new(
            ScriptedResolver::new().with_list("p1", vec![]),
            two_providers(),
        );
        fx.current.store(2, Ordering::SeqCst);
        let mut tried = BTreeSet::new();

        assert_eq!(fx.cascade.start(&mut tried).await, CascadeOutcome::Superseded);
        assert_eq!(fx.resolver.list_calls("p2"), 0);
    }
}
