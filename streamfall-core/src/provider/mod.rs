// Provider System
//
// Three tiers:
//
// Tier 1: streamfall-providers (pure upstream HTTP client)
//   - UpstreamClient, independent of any trait defined here
//
// Tier 2: streamfall-core/provider (adapters and boundaries)
//   - SourceResolver / AvailabilitySource traits
//   - UpstreamProvider adapter over UpstreamClient
//   - ProviderRegistry: configured priority order and capabilities
//   - ProxyRouter: URL rewriting for sources that need a proxy
//
// Tier 3: streamfall-core/service
//   - availability resolver, fetcher, cascade, session controller

pub mod error;
pub mod proxy;
pub mod registry;
pub mod traits;
pub mod upstream;

pub use error::*;
pub use proxy::{playback_url, DirectRouter, ProxyRouter, QueryProxyRouter};
pub use registry::ProviderRegistry;
pub use traits::*;
pub use upstream::UpstreamProvider;
