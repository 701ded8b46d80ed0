// Proxy Routing
//
// Core only decides whether a source needs the proxy; URL rewriting for
// cross-origin and referer constraints is delegated to a ProxyRouter.

use url::Url;

use super::ProviderError;
use crate::models::{ProviderId, ResolvedSource};

/// Rewrites a stream URL so it is fetched through a proxy
pub trait ProxyRouter: Send + Sync {
    fn route(&self, url: &str, provider: &ProviderId, referer: Option<&str>) -> String;
}

/// Returns URLs unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectRouter;

impl ProxyRouter for DirectRouter {
    fn route(&self, url: &str, _provider: &ProviderId, _referer: Option<&str>) -> String {
        url.to_string()
    }
}

/// Routes through `{base}?url=..&provider=..&referer=..`
#[derive(Debug, Clone)]
pub struct QueryProxyRouter {
    base: Url,
}

impl QueryProxyRouter {
    pub fn new(base: &str) -> Result<Self, ProviderError> {
        let base = Url::parse(base)
            .map_err(|e| ProviderError::InvalidConfig(format!("invalid proxy base URL {base}: {e}")))?;
        Ok(Self { base })
    }
}

impl ProxyRouter for QueryProxyRouter {
    fn route(&self, url: &str, provider: &ProviderId, referer: Option<&str>) -> String {
        let mut routed = self.base.clone();
        {
            let mut query = routed.query_pairs_mut();
            query.append_pair("url", url);
            query.append_pair("provider", provider.as_str());
            if let Some(referer) = referer {
                query.append_pair("referer", referer);
            }
        }
        routed.into()
    }
}

/// URL the engine should load for `source`
#[must_use]
pub fn playback_url(router: &dyn ProxyRouter, provider: &ProviderId, source: &ResolvedSource) -> String {
    if source.requires_proxy {
        router.route(&source.url, provider, source.referer.as_deref())
    } else {
        source.url.clone()
    }
}
