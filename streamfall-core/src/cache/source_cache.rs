//! Source health cache
//!
//! Candidate lists per (content key, provider) with mutable status. One cache
//! instance belongs to one playback session and is dropped with it, so
//! nothing leaks across content keys.
//!
//! Every mutation happens under the owning shard's lock and touches either a
//! single entry by index or swaps the whole list, so a reader cloning a list
//! never observes a partial update.

use std::sync::Arc;

use dashmap::DashMap;

use crate::models::{CandidateSource, ContentKey, ProviderId, ProviderSourceList, SourceStatus};

/// Cache key: one provider's list for one piece of content
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceListKey {
    pub content_key: ContentKey,
    pub provider: ProviderId,
}

impl SourceListKey {
    #[must_use]
    pub fn new(content_key: &ContentKey, provider: &ProviderId) -> Self {
        Self {
            content_key: content_key.clone(),
            provider: provider.clone(),
        }
    }
}

/// Session-scoped candidate source cache
#[derive(Debug, Clone, Default)]
pub struct SourceHealthCache {
    lists: Arc<DashMap<SourceListKey, ProviderSourceList>>,
}

impl SourceHealthCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a provider's list
    #[must_use]
    pub fn get(&self, key: &SourceListKey) -> Option<ProviderSourceList> {
        self.lists.get(key).map(|list| list.clone())
    }

    #[must_use]
    pub fn contains(&self, key: &SourceListKey) -> bool {
        self.lists.contains_key(key)
    }

    /// Single entry snapshot
    #[must_use]
    pub fn entry(&self, key: &SourceListKey, index: usize) -> Option<CandidateSource> {
        self.lists.get(key).and_then(|list| list.get(index).cloned())
    }

    /// Store a freshly fetched list.
    ///
    /// Health already learned this session is carried over to entries with
    /// the same name, so a refresh never forgets a `Down` or `Working` mark.
    pub fn store(&self, key: SourceListKey, mut list: ProviderSourceList) -> ProviderSourceList {
        if let Some(previous) = self.lists.get(&key) {
            for fresh in &mut list {
                if let Some(old) = previous.iter().find(|old| old.name == fresh.name) {
                    fresh.status = old.status;
                }
            }
        }
        self.lists.insert(key, list.clone());
        list
    }

    /// Replace one entry in place. Returns false if the slot does not exist.
    pub fn replace_entry(&self, key: &SourceListKey, index: usize, source: CandidateSource) -> bool {
        self.update_entry(key, index, |slot| {
            *slot = source;
            true
        })
    }

    /// Find the index of an entry by name
    #[must_use]
    pub fn position(&self, key: &SourceListKey, name: &str) -> Option<usize> {
        self.lists
            .get(key)
            .and_then(|list| list.iter().position(|s| s.name == name))
    }

    /// `Unknown → Down`. No-op for confirmed `Working` entries.
    pub fn mark_down(&self, key: &SourceListKey, index: usize) -> bool {
        self.update_entry(key, index, CandidateSource::mark_down)
    }

    /// `Unknown → Working`
    pub fn mark_working(&self, key: &SourceListKey, index: usize) -> bool {
        self.update_entry(key, index, CandidateSource::mark_working)
    }

    /// Clear health after an explicit user pick
    pub fn reset_status(&self, key: &SourceListKey, index: usize) -> bool {
        self.update_entry(key, index, |slot| {
            slot.reset_status();
            true
        })
    }

    #[must_use]
    pub fn status(&self, key: &SourceListKey, index: usize) -> Option<SourceStatus> {
        self.entry(key, index).map(|s| s.status)
    }

    fn update_entry<F>(&self, key: &SourceListKey, index: usize, f: F) -> bool
    where
        F: FnOnce(&mut CandidateSource) -> bool,
    {
        self.lists
            .get_mut(key)
            .and_then(|mut list| list.get_mut(index).map(f))
            .unwrap_or(false)
    }

    /// Number of cached provider lists
    #[must_use]
    pub fn len(&self) -> usize {
        self.lists.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }
}
