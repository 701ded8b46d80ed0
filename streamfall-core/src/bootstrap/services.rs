//! Service initialization and dependency injection

use std::sync::Arc;

use streamfall_providers::UpstreamClient;
use tracing::info;

use crate::engine::MediaEngine;
use crate::provider::{DirectRouter, ProviderRegistry, ProxyRouter, QueryProxyRouter, UpstreamProvider};
use crate::service::{
    InMemoryResumeStore, JsonFileResumeStore, ProviderAvailability, ResumeManager, ResumeStore,
    SessionController,
};
use crate::Config;

/// Container for all initialized services
#[derive(Clone)]
pub struct Services {
    /// Configured providers in priority order
    pub registry: Arc<ProviderRegistry>,
    /// HTTP adapter for the upstream provider API
    pub upstream: Arc<UpstreamProvider>,
    /// Availability resolver (shared so its cache outlives sessions)
    pub availability: ProviderAvailability,
    pub resume: ResumeManager,
    pub router: Arc<dyn ProxyRouter>,
    config: Config,
}

impl Services {
    /// Session controller driving `engine`
    #[must_use]
    pub fn controller(&self, engine: Arc<dyn MediaEngine>) -> SessionController {
        SessionController::new(self.availability.clone(), self.upstream.clone(), engine)
            .with_router(self.router.clone())
            .with_resume_manager(self.resume.clone())
            .with_fetch_timeout(self.config.request_timeout())
            .with_event_capacity(self.config.playback.event_capacity)
    }
}

/// Initialize all core services
pub fn init_services(config: &Config) -> Result<Services, anyhow::Error> {
    info!("Initializing services...");

    let registry = Arc::new(config.registry()?);
    info!(providers = registry.len(), "Provider registry loaded");

    let client = UpstreamClient::new(&config.upstream.base_url)?.with_timeout(config.request_timeout());
    let upstream = Arc::new(
        UpstreamProvider::new(client).with_availability_retries(config.upstream.availability_retries),
    );
    info!(base_url = %config.upstream.base_url, "Upstream client initialized");

    let availability = ProviderAvailability::with_ttl(
        registry.clone(),
        upstream.clone(),
        config.availability_ttl(),
    )
    .with_timeout(config.availability_timeout());

    let store: Arc<dyn ResumeStore> = match &config.playback.resume_store_path {
        Some(path) => {
            info!(path = %path, "Using JSON file resume store");
            Arc::new(JsonFileResumeStore::new(path))
        }
        None => Arc::new(InMemoryResumeStore::new()),
    };
    let resume = ResumeManager::new(store).with_threshold(config.playback.resume_threshold_secs);

    let router: Arc<dyn ProxyRouter> = match &config.playback.proxy_base_url {
        Some(base) => {
            info!(proxy = %base, "Proxy routing enabled");
            Arc::new(QueryProxyRouter::new(base)?)
        }
        None => Arc::new(DirectRouter),
    };

    info!("Services initialized");
    Ok(Services {
        registry,
        upstream,
        availability,
        resume,
        router,
        config: config.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;
    use crate::test_helpers::RecordingEngine;

    fn config() -> Config {
        Config {
            providers: vec![ProviderConfig {
                id: "vidlink".to_string(),
                primary: true,
                targeted_resolution: true,
            }],
            ..Config::default()
        }
    }

    #[test]
    fn test_init_services() {
        let mut config = config();
        config.playback.proxy_base_url = Some("http://proxy.test/stream".to_string());

        let services = init_services(&config).unwrap();
        assert_eq!(services.registry.len(), 1);

        let controller = services.controller(Arc::new(RecordingEngine::new()));
        assert!(controller.snapshot().is_none());
    }

    #[test]
    fn test_init_services_rejects_bad_upstream() {
        let mut config = config();
        config.upstream.base_url = "::nope".to_string();
        assert!(init_services(&config).is_err());
    }
}
