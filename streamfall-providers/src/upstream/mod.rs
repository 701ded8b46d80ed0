//! Upstream stream provider API

pub mod client;
pub mod types;

pub use client::{UpstreamClient, DEFAULT_REQUEST_TIMEOUT};
pub use types::{ProviderState, ProvidersResponse, SourceEntry, SourceQuery, SourcesResponse};
