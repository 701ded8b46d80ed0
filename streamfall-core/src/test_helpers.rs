//! Test helpers and fakes for streamfall-core tests
//!
//! Hand-written implementations of the collaborator traits so tests can
//! script upstream responses and inspect what the engine was told to do.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::engine::{LoadRequest, MediaEngine};
use crate::models::{CandidateSource, ContentKey, ProviderId, ResolvedSource};
use crate::provider::{AvailabilitySource, ProviderError, SourceResolver};

/// Resolved candidate with a bare URL
pub fn resolved(name: &str, url: &str) -> CandidateSource {
    CandidateSource::resolved(name, ResolvedSource::new(url))
}

/// Deferred candidate
pub fn deferred(name: &str) -> CandidateSource {
    CandidateSource::deferred(name)
}

/// Upstream resolver answering from a script.
///
/// Providers without a scripted list fail with a network error, and
/// targeted lookups without a scripted answer fail with `NotFound`.
#[derive(Default)]
pub struct ScriptedResolver {
    lists: HashMap<String, Vec<CandidateSource>>,
    targeted: HashMap<(String, String), Vec<CandidateSource>>,
    delay: Option<Duration>,
    list_calls: Mutex<HashMap<String, usize>>,
    targeted_calls: Mutex<HashMap<(String, String), usize>>,
}

impl ScriptedResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_list(mut self, provider: &str, list: Vec<CandidateSource>) -> Self {
        self.lists.insert(provider.to_string(), list);
        self
    }

    pub fn with_targeted(self, provider: &str, name: &str, url: &str) -> Self {
        self.with_targeted_list(provider, name, vec![resolved(name, url)])
    }

    /// Raw answer to a targeted lookup, whatever names it carries
    pub fn with_targeted_list(mut self, provider: &str, name: &str, list: Vec<CandidateSource>) -> Self {
        self.targeted
            .insert((provider.to_string(), name.to_string()), list);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn list_calls(&self, provider: &str) -> usize {
        self.list_calls.lock().get(provider).copied().unwrap_or(0)
    }

    pub fn targeted_calls(&self, provider: &str, name: &str) -> usize {
        self.targeted_calls
            .lock()
            .get(&(provider.to_string(), name.to_string()))
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl SourceResolver for ScriptedResolver {
    async fn resolve_sources(
        &self,
        _key: &ContentKey,
        provider: &ProviderId,
        targeted: Option<&str>,
    ) -> Result<Vec<CandidateSource>, ProviderError> {
        let provider = provider.as_str().to_string();
        match targeted {
            Some(name) => {
                *self
                    .targeted_calls
                    .lock()
                    .entry((provider.clone(), name.to_string()))
                    .or_default() += 1;
            }
            None => *self.list_calls.lock().entry(provider.clone()).or_default() += 1,
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match targeted {
            Some(name) => self
                .targeted
                .get(&(provider, name.to_string()))
                .cloned()
                .ok_or(ProviderError::NotFound),
            None => self
                .lists
                .get(&provider)
                .cloned()
                .ok_or_else(|| ProviderError::NetworkError(format!("{provider} unreachable"))),
        }
    }
}

/// Fixed availability switches, or a lookup that always fails
#[derive(Default)]
pub struct StaticAvailability {
    switches: Option<HashMap<ProviderId, bool>>,
    calls: AtomicUsize,
}

impl StaticAvailability {
    pub fn with(switches: &[(&str, bool)]) -> Self {
        Self {
            switches: Some(
                switches
                    .iter()
                    .map(|(id, enabled)| (ProviderId::from(*id), *enabled))
                    .collect(),
            ),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AvailabilitySource for StaticAvailability {
    async fn provider_switches(&self) -> Result<HashMap<ProviderId, bool>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.switches
            .clone()
            .ok_or_else(|| ProviderError::NetworkError("availability endpoint down".to_string()))
    }
}

#[derive(Default)]
struct EngineLog {
    loads: Vec<LoadRequest>,
    seeks: Vec<f64>,
    plays: usize,
    pauses: usize,
    levels: Vec<Option<usize>>,
    media_recoveries: usize,
    time: f64,
}

/// Media engine that records every command it receives
#[derive(Default)]
pub struct RecordingEngine {
    log: Mutex<EngineLog>,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_time(&self, time: f64) {
        self.log.lock().time = time;
    }

    pub fn loads(&self) -> Vec<LoadRequest> {
        self.log.lock().loads.clone()
    }

    pub fn seeks(&self) -> Vec<f64> {
        self.log.lock().seeks.clone()
    }

    pub fn plays(&self) -> usize {
        self.log.lock().plays
    }

    pub fn pauses(&self) -> usize {
        self.log.lock().pauses
    }

    pub fn levels(&self) -> Vec<Option<usize>> {
        self.log.lock().levels.clone()
    }

    pub fn media_recoveries(&self) -> usize {
        self.log.lock().media_recoveries
    }
}

impl MediaEngine for RecordingEngine {
    fn load(&self, request: &LoadRequest) {
        self.log.lock().loads.push(request.clone());
    }

    fn play(&self) {
        self.log.lock().plays += 1;
    }

    fn pause(&self) {
        self.log.lock().pauses += 1;
    }

    fn seek(&self, position: f64) {
        self.log.lock().seeks.push(position);
    }

    fn current_time(&self) -> f64 {
        self.log.lock().time
    }

    fn duration(&self) -> Option<f64> {
        None
    }

    fn recover_media_error(&self) {
        self.log.lock().media_recoveries += 1;
    }

    fn set_level(&self, level: Option<usize>) {
        self.log.lock().levels.push(level);
    }
}
