// Provider Traits
//
// Boundaries to the upstream provider API and the availability endpoint

use super::ProviderError;
use crate::models::{CandidateSource, ContentKey, ProviderId};
use async_trait::async_trait;
use std::collections::HashMap;

/// Upstream provider API
///
/// Core consumes only this contract; authentication and geo-restriction
/// handling belong to the implementation.
#[async_trait]
pub trait SourceResolver: Send + Sync {
    /// Resolve candidate sources for `key` from `provider`.
    ///
    /// With `targeted` set, the provider resolves only the named entry. The
    /// returned list then normally holds a single `Resolved` candidate.
    async fn resolve_sources(
        &self,
        key: &ContentKey,
        provider: &ProviderId,
        targeted: Option<&str>,
    ) -> Result<Vec<CandidateSource>, ProviderError>;
}

/// Provider on/off switches
#[async_trait]
pub trait AvailabilitySource: Send + Sync {
    /// `enabled` flag per provider id. Providers absent from the map are
    /// treated as disabled by the caller.
    async fn provider_switches(&self) -> Result<HashMap<ProviderId, bool>, ProviderError>;
}
