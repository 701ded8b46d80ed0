//! Upstream HTTP Client
//!
//! Pure HTTP client for the stream provider API, no dependency on the core traits

use std::sync::LazyLock;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::Client;
use tracing::debug;

use super::types::{ProvidersResponse, SourceQuery, SourcesResponse};
use crate::error::{check_response, json_with_limit, ProviderClientError};

/// Default per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Shared HTTP client for all upstream requests (connection pooling)
static SHARED_CLIENT: LazyLock<Client> = LazyLock::new(|| {
    Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .pool_max_idle_per_host(10)
        .build()
        .expect("Failed to build upstream shared HTTP client")
});

/// Upstream HTTP Client
///
/// Provides:
/// - Source lookup (`/api/sources/{provider}`), whole list or targeted
/// - Provider availability (`/api/providers`)
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    base_url: String,
    timeout: Duration,
    client: Client,
}

impl UpstreamClient {
    /// Create a new client (reuses shared connection pool)
    pub fn new(base_url: impl Into<String>) -> Result<Self, ProviderClientError> {
        let base_url = base_url.into();
        url::Url::parse(&base_url)?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
            client: SHARED_CLIENT.clone(),
        })
    }

    /// Override the per-request timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("streamfall/", env!("CARGO_PKG_VERSION"))),
        );
        headers
    }

    /// Fetch candidate sources for one provider.
    ///
    /// With `query.source` set, the provider only resolves that named entry.
    pub async fn sources(
        &self,
        provider: &str,
        query: &SourceQuery<'_>,
    ) -> Result<SourcesResponse, ProviderClientError> {
        let url = format!("{}/api/sources/{provider}", self.base_url);
        debug!(provider, id = query.id, targeted = ?query.source, "Requesting upstream sources");

        let response = self
            .client
            .get(&url)
            .headers(Self::build_headers())
            .query(query)
            .timeout(self.timeout)
            .send()
            .await?;

        let response = check_response(response)?;
        json_with_limit(response).await
    }

    /// Fetch the provider on/off switches
    pub async fn providers(&self) -> Result<ProvidersResponse, ProviderClientError> {
        let url = format!("{}/api/providers", self.base_url);

        let response = self
            .client
            .get(&url)
            .headers(Self::build_headers())
            .timeout(self.timeout)
            .send()
            .await?;

        let response = check_response(response)?;
        json_with_limit(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn movie_query(source: Option<&str>) -> SourceQuery<'_> {
        SourceQuery {
            id: "603",
            media_type: "movie",
            season: None,
            episode: None,
            source,
        }
    }

    #[test]
    fn test_new_rejects_invalid_base_url() {
        assert!(matches!(
            UpstreamClient::new("not a url"),
            Err(ProviderClientError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_new_trims_trailing_slash() {
        let client = UpstreamClient::new("http://localhost:9000/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:9000");
    }

    #[tokio::test]
    async fn test_sources_sends_query_and_parses_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/sources/alpha"))
            .and(query_param("id", "603"))
            .and(query_param("type", "movie"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sources": [
                    {"name": "A"},
                    {"name": "B", "url": "https://cdn/b.m3u8", "requiresProxy": true}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = UpstreamClient::new(server.uri()).unwrap();
        let resp = client.sources("alpha", &movie_query(None)).await.unwrap();

        assert_eq!(resp.sources.len(), 2);
        assert!(resp.sources[0].url.is_none());
        assert_eq!(resp.sources[1].url.as_deref(), Some("https://cdn/b.m3u8"));
        assert!(resp.sources[1].requires_proxy);
    }

    #[tokio::test]
    async fn test_targeted_lookup_passes_source_name() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/sources/alpha"))
            .and(query_param("source", "A"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sources": [{"name": "A", "url": "https://cdn/a.m3u8"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = UpstreamClient::new(server.uri()).unwrap();
        let resp = client.sources("alpha", &movie_query(Some("A"))).await.unwrap();
        assert_eq!(resp.sources[0].url.as_deref(), Some("https://cdn/a.m3u8"));
    }

    #[tokio::test]
    async fn test_sources_http_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/sources/alpha"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = UpstreamClient::new(server.uri()).unwrap();
        let err = client.sources("alpha", &movie_query(None)).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_sources_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/sources/slow"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"sources": []}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let client = UpstreamClient::new(server.uri())
            .unwrap()
            .with_timeout(Duration::from_millis(50));
        let err = client.sources("slow", &movie_query(None)).await.unwrap_err();
        assert!(matches!(err, ProviderClientError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_providers_parses_switches() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/providers"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "alpha": {"enabled": true},
                "beta": {"enabled": false}
            })))
            .mount(&server)
            .await;

        let client = UpstreamClient::new(server.uri()).unwrap();
        let resp = client.providers().await.unwrap();
        assert!(resp["alpha"].enabled);
        assert!(!resp["beta"].enabled);
    }
}
