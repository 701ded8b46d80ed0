//! Singleflight for duplicate fetch suppression
//!
//! Wraps the `async_singleflight` crate so that concurrent requests for the
//! same key share one execution. Used by the source fetcher to keep a
//! re-entrant trigger (cascade plus server-list prefetch) from issuing the
//! same upstream request twice.

use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

/// Collapses concurrent executions by key.
///
/// The first caller for a key runs its future; callers arriving while it is
/// in flight wait and receive a clone of the same result.
#[derive(Clone)]
pub struct SingleFlight<K, V, E>
where
    K: Hash + Eq + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    group: Arc<async_singleflight::Group<K, V, E>>,
}

impl<K, V, E> SingleFlight<K, V, E>
where
    K: Hash + Eq + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            group: Arc::new(async_singleflight::Group::new()),
        }
    }

    /// Run `f` unless a call for `key` is already in flight, in which case
    /// wait for that call's result. `on_abandoned` supplies the error seen
    /// by waiters whose leader was dropped before finishing.
    pub async fn work<Fut, A>(&self, key: K, f: Fut, on_abandoned: A) -> Result<V, E>
    where
        Fut: std::future::Future<Output = Result<V, E>> + Send,
        A: FnOnce() -> E,
    {
        self.group
            .work(&key, f)
            .await
            .map_err(|inner| inner.unwrap_or_else(on_abandoned))
    }
}

impl<K, V, E> Default for SingleFlight<K, V, E>
where
    K: Hash + Eq + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
