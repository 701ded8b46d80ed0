//! Playback session controller
//!
//! Owns the single active playback session and everything scoped to it:
//! the source cache arena, tried providers, cascade state, quality levels and
//! the resume latch. Loading a different content key throws all of it away.
//!
//! Session state sits behind a `parking_lot::Mutex` that is never held across
//! an `.await`. Work that has to wait (fetches, cascades, resume lookups)
//! captures the session generation first and applies its result only if the
//! generation still matches; anything older is dropped.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::availability::ProviderAvailability;
use super::cascade::{Adoption, CascadeOutcome, FallbackCascade};
use super::fetcher::{FetchOptions, SourceFetcher};
use super::quality::QualitySelector;
use super::resume::{InMemoryResumeStore, ResumeLatch, ResumeManager};
use crate::cache::{SourceHealthCache, SourceListKey};
use crate::engine::{EngineEvent, LoadRequest, MediaEngine};
use crate::error::{Error, Result};
use crate::models::{
    CascadeState, ContentKey, ManifestLevel, ProviderId, ProviderSourceList, QualitySelection,
    ResumeChoice, ResumePrompt, SessionEvent, SessionGeneration, SessionSnapshot, EXHAUSTED_HINT,
};
use crate::provider::{playback_url, DirectRouter, ProviderRegistry, ProxyRouter, SourceResolver};
use crate::resilience::timeout::FETCH_TIMEOUT;

/// Default capacity of the session event channel
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Everything that lives and dies with one content key
struct PlaybackSession {
    content_key: ContentKey,
    generation: SessionGeneration,
    providers: Vec<ProviderId>,
    fetcher: SourceFetcher,
    provider: Option<ProviderId>,
    source_index: Option<usize>,
    active_url: Option<String>,
    language: Option<String>,
    tried: BTreeSet<ProviderId>,
    state: CascadeState,
    quality: QualitySelector,
    resume_latch: ResumeLatch,
    pending_resume: Option<ResumePrompt>,
    position: f64,
}

impl PlaybackSession {
    fn new(content_key: ContentKey, generation: SessionGeneration, fetcher: SourceFetcher) -> Self {
        Self {
            content_key,
            generation,
            providers: Vec::new(),
            fetcher,
            provider: None,
            source_index: None,
            active_url: None,
            language: None,
            tried: BTreeSet::new(),
            state: CascadeState::Recovering,
            quality: QualitySelector::new(),
            resume_latch: ResumeLatch::default(),
            pending_resume: None,
            position: 0.0,
        }
    }

    fn active_list_key(&self) -> Option<(SourceListKey, usize)> {
        let provider = self.provider.as_ref()?;
        let index = self.source_index?;
        Some((SourceListKey::new(&self.content_key, provider), index))
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            content_key: self.content_key.clone(),
            generation: self.generation,
            state: self.state,
            provider: self.provider.clone(),
            source_index: self.source_index,
            active_url: self.active_url.clone(),
            tried_providers: self.tried.clone(),
            quality_levels: self.quality.levels().to_vec(),
            quality_selection: self.quality.selection(),
            position: self.position,
        }
    }
}

/// The session for `generation`, if it is still the current one
fn current_mut(
    slot: &mut Option<PlaybackSession>,
    generation: SessionGeneration,
) -> Option<&mut PlaybackSession> {
    slot.as_mut().filter(|session| session.generation == generation)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Activation {
    Automatic,
    Manual,
}

/// Playback session controller
#[derive(Clone)]
pub struct SessionController {
    availability: ProviderAvailability,
    registry: Arc<ProviderRegistry>,
    resolver: Arc<dyn SourceResolver>,
    engine: Arc<dyn MediaEngine>,
    router: Arc<dyn ProxyRouter>,
    resume: ResumeManager,
    fetch_timeout: Duration,
    session: Arc<Mutex<Option<PlaybackSession>>>,
    generation: Arc<AtomicU64>,
    events: broadcast::Sender<SessionEvent>,
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("generation", &self.generation.load(Ordering::SeqCst))
            .field("resume", &self.resume)
            .finish_non_exhaustive()
    }
}

impl SessionController {
    #[must_use]
    pub fn new(
        availability: ProviderAvailability,
        resolver: Arc<dyn SourceResolver>,
        engine: Arc<dyn MediaEngine>,
    ) -> Self {
        let (events, _) = broadcast::channel(DEFAULT_EVENT_CAPACITY);
        Self {
            registry: availability.registry().clone(),
            availability,
            resolver,
            engine,
            router: Arc::new(DirectRouter),
            resume: ResumeManager::new(Arc::new(InMemoryResumeStore::new())),
            fetch_timeout: FETCH_TIMEOUT,
            session: Arc::new(Mutex::new(None)),
            generation: Arc::new(AtomicU64::new(0)),
            events,
        }
    }

    #[must_use]
    pub fn with_router(mut self, router: Arc<dyn ProxyRouter>) -> Self {
        self.router = router;
        self
    }

    #[must_use]
    pub fn with_resume_manager(mut self, resume: ResumeManager) -> Self {
        self.resume = resume;
        self
    }

    #[must_use]
    pub const fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.events = broadcast::channel(capacity.max(1)).0;
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn advance_generation(&self) -> SessionGeneration {
        SessionGeneration(self.generation.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Start a session for `content_key`.
    ///
    /// Any previous session is torn down first. Loading the key that is
    /// already active is a no-op. Returns `ExhaustedAllSources` if nothing
    /// playable was found.
    pub async fn load(&self, content_key: ContentKey) -> Result<()> {
        let (generation, fetcher, previous) = {
            let mut slot = self.session.lock();
            if slot.as_ref().is_some_and(|s| s.content_key == content_key) {
                debug!(content = %content_key, "Content already loaded");
                return Ok(());
            }

            let generation = self.advance_generation();
            let fetcher = SourceFetcher::new(
                self.resolver.clone(),
                self.registry.clone(),
                SourceHealthCache::new(),
            )
            .with_timeout(self.fetch_timeout);
            let previous = slot.replace(PlaybackSession::new(
                content_key.clone(),
                generation,
                fetcher.clone(),
            ));
            (generation, fetcher, previous.map(|s| s.content_key))
        };

        if let Some(previous) = previous {
            info!(content = %previous, "Session ended");
            self.emit(SessionEvent::SessionEnded { content_key: previous });
        }
        info!(content = %content_key, %generation, "Loading content");

        let providers: Vec<ProviderId> = self
            .availability
            .resolve()
            .await
            .into_iter()
            .map(|provider| provider.id)
            .collect();

        match current_mut(&mut self.session.lock(), generation) {
            Some(session) => session.providers = providers.clone(),
            None => {
                debug!(content = %content_key, %generation, "Discarding stale provider list");
                return Ok(());
            }
        }
        self.emit(SessionEvent::SessionStarted {
            content_key: content_key.clone(),
            providers: providers.clone(),
        });

        let cascade = FallbackCascade::new(
            fetcher,
            content_key,
            providers,
            generation,
            self.generation.clone(),
        );
        let mut tried = BTreeSet::new();
        let outcome = cascade.start(&mut tried).await;
        self.apply_outcome(generation, outcome, tried, Activation::Automatic, None)
    }

    /// Start the current content over with a fresh session. This is how a
    /// user retries after exhaustion.
    pub async fn reload(&self) -> Result<()> {
        let content_key = self
            .session
            .lock()
            .as_ref()
            .map(|s| s.content_key.clone())
            .ok_or(Error::NoSession)?;

        self.unload();
        self.availability.invalidate().await;
        self.load(content_key).await
    }

    /// Drop the current session
    pub fn unload(&self) {
        let previous = self.session.lock().take();
        if let Some(previous) = previous {
            self.advance_generation();
            info!(content = %previous.content_key, "Session ended");
            self.emit(SessionEvent::SessionEnded {
                content_key: previous.content_key,
            });
        }
    }

    fn apply_outcome(
        &self,
        generation: SessionGeneration,
        outcome: CascadeOutcome,
        tried: BTreeSet<ProviderId>,
        activation: Activation,
        start_position: Option<f64>,
    ) -> Result<()> {
        let (request, awaiting_answer) = {
            let mut slot = self.session.lock();
            let Some(session) = current_mut(&mut slot, generation) else {
                debug!(%generation, "Discarding stale cascade result");
                return Ok(());
            };
            session.tried.extend(tried);

            match outcome {
                CascadeOutcome::Adopted(adoption) => (
                    self.activate(session, adoption, activation, start_position),
                    session.pending_resume.is_some(),
                ),
                CascadeOutcome::Exhausted => {
                    if !session.state.exhaust() {
                        return Ok(());
                    }
                    let content_key = session.content_key.clone();
                    warn!(content = %content_key, tried = ?session.tried, "Exhausted all sources");
                    self.emit(SessionEvent::Exhausted {
                        content_key: content_key.clone(),
                        hint: EXHAUSTED_HINT.to_string(),
                    });
                    return Err(Error::ExhaustedAllSources { content_key });
                }
                CascadeOutcome::Superseded => {
                    debug!(%generation, "Cascade superseded");
                    return Ok(());
                }
            }
        };

        self.engine.load(&request);
        if awaiting_answer {
            // The open resume prompt still gates playback on the new source
            debug!(url = %request.url, "Holding new source paused for resume answer");
            self.engine.pause();
        }
        Ok(())
    }

    /// Point the session at `adoption` and build the engine request
    fn activate(
        &self,
        session: &mut PlaybackSession,
        adoption: Adoption,
        activation: Activation,
        start_position: Option<f64>,
    ) -> LoadRequest {
        match activation {
            Activation::Automatic => {
                session.state.settle();
            }
            Activation::Manual => session.state.manual_override(),
        }

        if session.quality.reset() {
            self.emit(SessionEvent::QualityLevelsChanged { levels: Vec::new() });
        }

        let url = playback_url(self.router.as_ref(), &adoption.provider, &adoption.source);
        if session.language.is_none() {
            session.language.clone_from(&adoption.source.language);
        }
        session.provider = Some(adoption.provider.clone());
        session.source_index = Some(adoption.index);
        session.active_url = Some(url.clone());

        info!(
            content = %session.content_key,
            provider = %adoption.provider,
            index = adoption.index,
            source = %adoption.name,
            manual = activation == Activation::Manual,
            "Activated source"
        );
        self.emit(SessionEvent::SourceActivated {
            provider: adoption.provider,
            index: adoption.index,
            name: adoption.name,
            url: url.clone(),
            language: session.language.clone(),
            manual: activation == Activation::Manual,
        });

        LoadRequest {
            url,
            start_position,
            language: session.language.clone(),
        }
    }

    /// Explicit user pick. Health state is ignored, so a `Down` source can be
    /// chosen again. In-flight cascades for this session are invalidated.
    pub async fn switch_source(&self, provider: ProviderId, index: usize) -> Result<()> {
        if self.registry.get(&provider).is_none() {
            return Err(Error::InvalidSelection(format!("unknown provider {provider}")));
        }

        let engine_time = self.engine.current_time();
        let (generation, fetcher, content_key, position) = {
            let mut slot = self.session.lock();
            let session = slot.as_mut().ok_or(Error::NoSession)?;
            session.generation = self.advance_generation();
            (
                session.generation,
                session.fetcher.clone(),
                session.content_key.clone(),
                session.position.max(engine_time),
            )
        };
        info!(content = %content_key, provider = %provider, index, "Manual source switch");

        match Self::resolve_manual(&fetcher, &content_key, &provider, index).await {
            Ok(adoption) => self.apply_outcome(
                generation,
                CascadeOutcome::Adopted(adoption),
                BTreeSet::new(),
                Activation::Manual,
                (position > 0.0).then_some(position),
            ),
            Err(e) => {
                warn!(provider = %provider, index, error = %e, "Manual source switch failed");
                // A superseded cascade will never settle this session
                let mut slot = self.session.lock();
                if let Some(session) = current_mut(&mut slot, generation) {
                    if session.state.exhaust() {
                        self.emit(SessionEvent::Exhausted {
                            content_key: content_key.clone(),
                            hint: EXHAUSTED_HINT.to_string(),
                        });
                        return Err(Error::ExhaustedAllSources { content_key });
                    }
                }
                Err(e)
            }
        }
    }

    async fn resolve_manual(
        fetcher: &SourceFetcher,
        content_key: &ContentKey,
        provider: &ProviderId,
        index: usize,
    ) -> Result<Adoption> {
        let list = fetcher
            .fetch_sources(content_key, provider, FetchOptions::default())
            .await?;
        let candidate = list
            .get(index)
            .cloned()
            .ok_or_else(|| Error::InvalidSelection(format!("{provider} has no source {index}")))?;

        fetcher
            .cache()
            .reset_status(&SourceListKey::new(content_key, provider), index);

        if let Some(source) = candidate.as_resolved().cloned() {
            return Ok(Adoption {
                provider: provider.clone(),
                index,
                name: candidate.name,
                source,
            });
        }

        let list = fetcher
            .fetch_sources(content_key, provider, FetchOptions::targeted(candidate.name.clone()))
            .await?;
        let (index, source) = list
            .iter()
            .enumerate()
            .find(|(_, entry)| entry.name == candidate.name)
            .and_then(|(index, entry)| entry.as_resolved().cloned().map(|source| (index, source)))
            .ok_or_else(|| {
                Error::InvalidSelection(format!("source {} could not be resolved", candidate.name))
            })?;

        Ok(Adoption {
            provider: provider.clone(),
            index,
            name: candidate.name,
            source,
        })
    }

    /// React to a signal from the media engine
    pub async fn handle_engine_event(&self, event: EngineEvent) -> Result<()> {
        debug!(event = event.name(), "Engine event");
        match event {
            EngineEvent::FatalTransportError { detail } => self.recover(detail).await,
            EngineEvent::FatalMediaError { detail } => {
                warn!(detail = %detail, "Media error, handing to engine recovery");
                self.engine.recover_media_error();
                Ok(())
            }
            EngineEvent::ManifestParsed { levels } => {
                self.on_manifest_parsed(&levels);
                Ok(())
            }
            EngineEvent::LevelSwitched { level } => {
                if let Some(session) = self.session.lock().as_mut() {
                    session.quality.on_level_switched(level);
                    self.emit(SessionEvent::QualityLevelSwitched { index: level });
                }
                Ok(())
            }
            EngineEvent::DurationKnown { duration } => {
                self.on_duration_known(duration).await;
                Ok(())
            }
            EngineEvent::TimeUpdate { position } => {
                if let Some(session) = self.session.lock().as_mut() {
                    session.position = position;
                }
                Ok(())
            }
        }
    }

    async fn recover(&self, detail: String) -> Result<()> {
        let engine_time = self.engine.current_time();
        let (generation, cascade, provider, index, mut tried, position) = {
            let mut slot = self.session.lock();
            let Some(session) = slot.as_mut() else {
                debug!("Fatal error with no session");
                return Ok(());
            };
            let (Some(provider), Some(index)) = (session.provider.clone(), session.source_index) else {
                return Ok(());
            };
            if !session.state.begin_recovery() {
                debug!(state = ?session.state, "Fatal error ignored, not playing");
                return Ok(());
            }

            warn!(provider = %provider, index, detail = %detail, "Fatal transport error, recovering");
            self.emit(SessionEvent::Recovering {
                provider: provider.clone(),
                index,
                reason: detail,
            });
            let cascade = FallbackCascade::new(
                session.fetcher.clone(),
                session.content_key.clone(),
                session.providers.clone(),
                session.generation,
                self.generation.clone(),
            );
            (
                session.generation,
                cascade,
                provider,
                index,
                session.tried.clone(),
                session.position.max(engine_time),
            )
        };

        let outcome = cascade.recover(&provider, index, &mut tried).await;
        self.apply_outcome(
            generation,
            outcome,
            tried,
            Activation::Automatic,
            (position > 0.0).then_some(position),
        )
    }

    fn on_manifest_parsed(&self, manifest: &[ManifestLevel]) {
        let mut slot = self.session.lock();
        let Some(session) = slot.as_mut() else {
            return;
        };

        let levels = session.quality.populate(manifest).to_vec();
        if let Some((list_key, index)) = session.active_list_key() {
            if session.fetcher.cache().mark_working(&list_key, index) {
                debug!(provider = %list_key.provider, index, "Source confirmed working");
            }
        }
        self.emit(SessionEvent::QualityLevelsChanged { levels });
    }

    async fn on_duration_known(&self, duration: f64) {
        let (generation, content_key) = {
            let mut slot = self.session.lock();
            let Some(session) = slot.as_mut() else {
                return;
            };
            if !session.resume_latch.try_fire() {
                return;
            }
            (session.generation, session.content_key.clone())
        };

        let Some(prompt) = self.resume.evaluate(&content_key, duration).await else {
            return;
        };

        match current_mut(&mut self.session.lock(), generation) {
            Some(session) => session.pending_resume = Some(prompt),
            None => {
                debug!(%generation, "Discarding stale resume prompt");
                return;
            }
        }
        self.engine.pause();
        self.emit(SessionEvent::ResumePrompt(prompt));
    }

    /// Answer the pending resume prompt and let playback continue
    pub fn answer_resume(&self, choice: ResumeChoice) -> Result<()> {
        let prompt = {
            let mut slot = self.session.lock();
            let session = slot.as_mut().ok_or(Error::NoSession)?;
            session
                .pending_resume
                .take()
                .ok_or_else(|| Error::InvalidSelection("no resume prompt pending".to_string()))?
        };

        let target = match choice {
            ResumeChoice::Resume => prompt.position,
            ResumeChoice::StartOver => 0.0,
        };
        info!(?choice, position = target, "Resume answered");
        self.engine.seek(target);
        self.engine.play();
        Ok(())
    }

    /// Pin a quality level or return to automatic selection
    pub fn select_quality(&self, selection: QualitySelection) -> Result<()> {
        let level = {
            let mut slot = self.session.lock();
            let session = slot.as_mut().ok_or(Error::NoSession)?;
            session.quality.select(selection)?
        };
        self.engine.set_level(level);
        Ok(())
    }

    /// Subtitle/audio language preference carried across source swaps
    pub fn set_language(&self, language: Option<String>) -> Result<()> {
        let mut slot = self.session.lock();
        let session = slot.as_mut().ok_or(Error::NoSession)?;
        session.language = language;
        Ok(())
    }

    /// Persist the engine's current position for the active content
    pub async fn save_position(&self) -> Result<()> {
        let content_key = self
            .session
            .lock()
            .as_ref()
            .map(|s| s.content_key.clone())
            .ok_or(Error::NoSession)?;
        let position = self.engine.current_time();
        self.resume.save(&content_key, position).await
    }

    /// Warm the cache for every available provider, for a server list.
    /// Identical in-flight fetches (including the cascade's) are shared.
    pub async fn prefetch_providers(&self) -> Result<BTreeMap<ProviderId, ProviderSourceList>> {
        let (fetcher, content_key, providers) = {
            let slot = self.session.lock();
            let session = slot.as_ref().ok_or(Error::NoSession)?;
            (
                session.fetcher.clone(),
                session.content_key.clone(),
                session.providers.clone(),
            )
        };

        let fetches = providers.iter().map(|provider| {
            let fetcher = &fetcher;
            let content_key = &content_key;
            async move {
                let result = fetcher
                    .fetch_sources(content_key, provider, FetchOptions::default())
                    .await;
                (provider.clone(), result)
            }
        });

        let mut lists = BTreeMap::new();
        for (provider, result) in futures::future::join_all(fetches).await {
            match result {
                Ok(list) => {
                    lists.insert(provider, list);
                }
                Err(e) => debug!(provider = %provider, error = %e, "Prefetch failed"),
            }
        }
        Ok(lists)
    }

    /// Cached list for `provider` in the current session
    #[must_use]
    pub fn source_list(&self, provider: &ProviderId) -> Option<ProviderSourceList> {
        let slot = self.session.lock();
        let session = slot.as_ref()?;
        session
            .fetcher
            .cache()
            .get(&SourceListKey::new(&session.content_key, provider))
    }

    #[must_use]
    pub fn snapshot(&self) -> Option<SessionSnapshot> {
        self.session.lock().as_ref().map(PlaybackSession::snapshot)
    }

    /// Providers resolved for the current session, in walk order
    #[must_use]
    pub fn providers(&self) -> Vec<ProviderId> {
        self.session
            .lock()
            .as_ref()
            .map(|s| s.providers.clone())
            .unwrap_or_default()
    }
}
