// Streamfall Provider Clients
//
// Pure HTTP client for the upstream stream provider API. Independent of the
// resolution traits in streamfall-core, which wraps it in adapters.
//
// Architecture:
// - streamfall-providers: Pure HTTP client (this crate)
// - streamfall-core/provider: SourceResolver / AvailabilitySource adapters calling this client
// - streamfall-core/service: fetcher, cascade and session controller

// Shared error types
pub mod error;

// HTTP client
pub mod upstream;

// Re-export client types for convenience
pub use error::ProviderClientError;
pub use upstream::UpstreamClient;
