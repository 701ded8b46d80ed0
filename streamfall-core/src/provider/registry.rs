// Provider Registry
//
// Ordered catalog of configured providers and their capabilities

use super::ProviderError;
use crate::models::{Provider, ProviderId};

/// Configured providers in priority order
///
/// Position is priority. Exactly one entry is primary; if none was flagged
/// the first registered provider is promoted.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<Provider>,
}

impl ProviderRegistry {
    /// Create new empty registry
    #[must_use]
    pub const fn new() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    /// Build from an ordered list
    pub fn from_providers(providers: Vec<Provider>) -> Result<Self, ProviderError> {
        let mut registry = Self::new();
        for provider in providers {
            registry.register(provider)?;
        }
        registry.ensure_primary();
        Ok(registry)
    }

    /// Append a provider at the lowest priority
    pub fn register(&mut self, provider: Provider) -> Result<(), ProviderError> {
        if self.get(&provider.id).is_some() {
            return Err(ProviderError::InvalidConfig(format!(
                "duplicate provider id: {}",
                provider.id
            )));
        }
        if provider.primary && self.providers.iter().any(|p| p.primary) {
            return Err(ProviderError::InvalidConfig(format!(
                "more than one primary provider: {}",
                provider.id
            )));
        }
        self.providers.push(provider);
        Ok(())
    }

    fn ensure_primary(&mut self) {
        if !self.providers.iter().any(|p| p.primary) {
            if let Some(first) = self.providers.first_mut() {
                first.primary = true;
            }
        }
    }

    /// Get provider by ID
    #[must_use]
    pub fn get(&self, id: &ProviderId) -> Option<&Provider> {
        self.providers.iter().find(|p| &p.id == id)
    }

    #[must_use]
    pub fn primary(&self) -> Option<&Provider> {
        self.providers.iter().find(|p| p.primary)
    }

    /// Whether `id` can resolve a single deferred source
    #[must_use]
    pub fn supports_targeted(&self, id: &ProviderId) -> bool {
        self.get(id).is_some_and(|p| p.targeted_resolution)
    }

    /// All providers, primary first, then configured order
    #[must_use]
    pub fn ordered(&self) -> Vec<Provider> {
        let mut ordered: Vec<Provider> = self.providers.iter().filter(|p| p.primary).cloned().collect();
        ordered.extend(self.providers.iter().filter(|p| !p.primary).cloned());
        ordered
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_provider_promoted_to_primary() {
        let registry =
            ProviderRegistry::from_providers(vec![Provider::new("alpha"), Provider::new("beta")])
                .unwrap();
        assert_eq!(registry.primary().unwrap().id, ProviderId::from("alpha"));
    }

    #[test]
    fn test_primary_sorted_first() {
        let registry = ProviderRegistry::from_providers(vec![
            Provider::new("alpha"),
            Provider::new("beta").with_primary(true),
            Provider::new("gamma"),
        ])
        .unwrap();
        let ids: Vec<_> = registry.ordered().into_iter().map(|p| p.id.0).collect();
        assert_eq!(ids, vec!["beta", "alpha", "gamma"]);
    }

    #[test]
    fn test_rejects_duplicates_and_second_primary() {
        assert!(ProviderRegistry::from_providers(vec![Provider::new("a"), Provider::new("a")]).is_err());
        assert!(ProviderRegistry::from_providers(vec![
            Provider::new("a").with_primary(true),
            Provider::new("b").with_primary(true),
        ])
        .is_err());
    }

    #[test]
    fn test_capability_lookup() {
        let registry = ProviderRegistry::from_providers(vec![
            Provider::new("alpha").with_targeted_resolution(true),
            Provider::new("beta"),
        ])
        .unwrap();
        assert!(registry.supports_targeted(&"alpha".into()));
        assert!(!registry.supports_targeted(&"beta".into()));
        assert!(!registry.supports_targeted(&"missing".into()));
    }
}
