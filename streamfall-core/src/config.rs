use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use crate::models::Provider;
use crate::provider::{ProviderError, ProviderRegistry};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub upstream: UpstreamConfig,
    /// Priority order: earlier entries are tried first
    pub providers: Vec<ProviderConfig>,
    pub playback: PlaybackConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "pretty"
    pub file_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub availability_timeout_secs: u64,
    /// How long a successful availability lookup is reused
    pub availability_ttl_secs: u64,
    pub availability_retries: usize,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            request_timeout_secs: 15,
            availability_timeout_secs: 5,
            availability_ttl_secs: 300,
            availability_retries: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    #[serde(default)]
    pub primary: bool,
    /// Provider can resolve a single deferred source by name
    #[serde(default)]
    pub targeted_resolution: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub resume_threshold_secs: f64,
    /// JSON file for resume positions; in-memory when unset
    pub resume_store_path: Option<String>,
    /// Proxy for sources flagged `requires_proxy`; direct when unset
    pub proxy_base_url: Option<String>,
    pub event_capacity: usize,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            resume_threshold_secs: 30.0,
            resume_store_path: None,
            proxy_base_url: None,
            event_capacity: 64,
        }
    }
}

impl Config {
    /// Load configuration from multiple sources with priority:
    /// 1. Environment variables (highest priority)
    /// 2. Config file (if provided)
    /// 3. Defaults (lowest priority)
    pub fn load(config_file: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_file {
            if Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path));
            }
        }

        // STREAMFALL_UPSTREAM__BASE_URL, STREAMFALL_PLAYBACK__EVENT_CAPACITY, ...
        builder = builder.add_source(
            Environment::with_prefix("STREAMFALL")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Load from environment variables only
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Load from file path
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        Self::load(Some(path))
    }

    /// Check for misconfigurations, collecting every problem found
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.providers.is_empty() {
            errors.push("at least one provider must be configured".to_string());
        }
        let mut seen = HashSet::new();
        for provider in &self.providers {
            if provider.id.trim().is_empty() {
                errors.push("provider id must not be empty".to_string());
            } else if !seen.insert(provider.id.as_str()) {
                errors.push(format!("duplicate provider id: {}", provider.id));
            }
        }
        let primaries = self.providers.iter().filter(|p| p.primary).count();
        if !self.providers.is_empty() && primaries != 1 {
            errors.push(format!("exactly one provider must be primary, found {primaries}"));
        }

        if let Err(e) = url::Url::parse(&self.upstream.base_url) {
            errors.push(format!("invalid upstream.base_url {}: {e}", self.upstream.base_url));
        }
        if self.upstream.request_timeout_secs == 0 {
            errors.push("upstream.request_timeout_secs must be positive".to_string());
        }
        if self.upstream.availability_timeout_secs == 0 {
            errors.push("upstream.availability_timeout_secs must be positive".to_string());
        }

        let threshold = self.playback.resume_threshold_secs;
        if !threshold.is_finite() || threshold < 0.0 {
            errors.push(format!("playback.resume_threshold_secs must be >= 0, got {threshold}"));
        }
        if self.playback.event_capacity == 0 {
            errors.push("playback.event_capacity must be positive".to_string());
        }
        if let Some(proxy) = &self.playback.proxy_base_url {
            if let Err(e) = url::Url::parse(proxy) {
                errors.push(format!("invalid playback.proxy_base_url {proxy}: {e}"));
            }
        }

        if !matches!(self.logging.format.as_str(), "json" | "pretty") {
            errors.push(format!("logging.format must be json or pretty, got {}", self.logging.format));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Provider registry in configured priority order
    pub fn registry(&self) -> Result<ProviderRegistry, ProviderError> {
        ProviderRegistry::from_providers(
            self.providers
                .iter()
                .map(|p| {
                    Provider::new(p.id.as_str())
                        .with_primary(p.primary)
                        .with_targeted_resolution(p.targeted_resolution)
                })
                .collect(),
        )
    }

    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream.request_timeout_secs)
    }

    #[must_use]
    pub const fn availability_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream.availability_timeout_secs)
    }

    #[must_use]
    pub const fn availability_ttl(&self) -> Duration {
        Duration::from_secs(self.upstream.availability_ttl_secs)
    }
}
