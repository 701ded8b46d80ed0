//! Resume positions
//!
//! [`ResumeStore`] is the persistence boundary. [`ResumeManager`] decides
//! whether a saved position is worth offering, and [`ResumeLatch`] keeps the
//! offer to once per session.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::models::{ContentKey, ResumePrompt, ResumeRecord};

/// Default distance from the end below which a saved position is ignored
pub const DEFAULT_RESUME_THRESHOLD_SECS: f64 = 30.0;

/// Last playback position per content key
#[async_trait]
pub trait ResumeStore: Send + Sync {
    async fn get(&self, key: &ContentKey) -> Result<Option<f64>>;
    async fn set(&self, key: &ContentKey, position: f64) -> Result<()>;
}

/// Process-local store
#[derive(Debug, Default)]
pub struct InMemoryResumeStore {
    records: DashMap<ContentKey, ResumeRecord>,
}

impl InMemoryResumeStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResumeStore for InMemoryResumeStore {
    async fn get(&self, key: &ContentKey) -> Result<Option<f64>> {
        Ok(self.records.get(key).map(|record| record.position))
    }

    async fn set(&self, key: &ContentKey, position: f64) -> Result<()> {
        self.records
            .insert(key.clone(), ResumeRecord::new(key.clone(), position));
        Ok(())
    }
}

/// Store backed by one JSON file holding every record
#[derive(Debug)]
pub struct JsonFileResumeStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileResumeStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Vec<ResumeRecord>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(json) if json.trim().is_empty() => Ok(Vec::new()),
            Ok(json) => Ok(serde_json::from_str(&json)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl ResumeStore for JsonFileResumeStore {
    async fn get(&self, key: &ContentKey) -> Result<Option<f64>> {
        let records = self.load().await?;
        Ok(records
            .into_iter()
            .find(|record| &record.content_key == key)
            .map(|record| record.position))
    }

    async fn set(&self, key: &ContentKey, position: f64) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut records = self.load().await?;
        records.retain(|record| &record.content_key != key);
        records.push(ResumeRecord::new(key.clone(), position));

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(&records)?;
        tokio::fs::write(&self.path, json).await?;
        debug!(path = %self.path.display(), content = %key, position, "Saved resume position");
        Ok(())
    }
}

/// One-shot latch scoped to a playback session
#[derive(Debug, Clone, Copy, Default)]
pub struct ResumeLatch {
    fired: bool,
}

impl ResumeLatch {
    /// True exactly once
    pub fn try_fire(&mut self) -> bool {
        !std::mem::replace(&mut self.fired, true)
    }

    #[must_use]
    pub const fn has_fired(&self) -> bool {
        self.fired
    }
}

/// Decides whether a saved position should be offered
#[derive(Clone)]
pub struct ResumeManager {
    store: Arc<dyn ResumeStore>,
    threshold: f64,
}

impl std::fmt::Debug for ResumeManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResumeManager")
            .field("threshold", &self.threshold)
            .finish_non_exhaustive()
    }
}

impl ResumeManager {
    #[must_use]
    pub fn new(store: Arc<dyn ResumeStore>) -> Self {
        Self {
            store,
            threshold: DEFAULT_RESUME_THRESHOLD_SECS,
        }
    }

    #[must_use]
    pub const fn with_threshold(mut self, threshold_secs: f64) -> Self {
        self.threshold = threshold_secs;
        self
    }

    /// Prompt for `key` now that `duration` is known, if a saved position is
    /// positive and more than the threshold before the end. Lookup failures
    /// count as no saved position.
    pub async fn evaluate(&self, key: &ContentKey, duration: f64) -> Option<ResumePrompt> {
        let position = match self.store.get(key).await {
            Ok(position) => position?,
            Err(e) => {
                debug!(content = %key, error = %e, "Resume lookup failed, starting from zero");
                return None;
            }
        };

        if position > 0.0 && position < duration - self.threshold {
            info!(content = %key, position, duration, "Offering resume");
            Some(ResumePrompt { position, duration })
        } else {
            debug!(content = %key, position, duration, "Saved position not worth resuming");
            None
        }
    }

    pub async fn save(&self, key: &ContentKey, position: f64) -> Result<()> {
        if !position.is_finite() || position < 0.0 {
            return Err(Error::ResumeStore(format!("invalid position {position}")));
        }
        self.store.set(key, position).await
    }
}
