//! Upstream API wire types

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One candidate stream as reported by a provider.
///
/// Entries without a `url` still need a targeted follow-up request
/// (`source=<name>`) before they can be played.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceEntry {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default)]
    pub requires_proxy: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direct_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referer: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// `GET /api/sources/{provider}` response body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourcesResponse {
    #[serde(default)]
    pub sources: Vec<SourceEntry>,
}

/// Per-provider switch from `GET /api/providers`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderState {
    #[serde(default)]
    pub enabled: bool,
}

/// `GET /api/providers` response body, keyed by provider id
pub type ProvidersResponse = HashMap<String, ProviderState>;

/// Query string for a source lookup
#[derive(Debug, Clone, Serialize)]
pub struct SourceQuery<'a> {
    pub id: &'a str,

    #[serde(rename = "type")]
    pub media_type: &'a str,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub season: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode: Option<u32>,

    /// Targeted single-source lookup
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<&'a str>,
}
