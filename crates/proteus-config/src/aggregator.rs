//! Priority-ordered source aggregation.

use indexmap::IndexMap;
use tokio::sync::Mutex;
use tracing::{debug, info};

use proteus_bag::Bag;

use crate::error::{ConfigError, ConfigResult};
use crate::source::SourceHandle;

/// Merges every registered source into a single bag by ascending priority.
///
/// Sources are kept in registration order; the merge pass stable-sorts them
/// by priority, so between sources with equal priority the one registered
/// later wins. Later merges overwrite earlier ones at the scalar level,
/// which is what makes the higher numeric priority win.
///
/// All membership changes and the reload pass run under one lock, held for
/// the whole reload-then-remerge sequence, so a recomputed bag always
/// reflects one consistent set of source snapshots.
pub struct Aggregator {
    sources: Mutex<IndexMap<String, SourceHandle>>,
}

impl Aggregator {
    /// Create an aggregator with no sources.
    pub fn new() -> Self {
        Self {
            sources: Mutex::new(IndexMap::new()),
        }
    }

    /// Number of registered sources.
    pub async fn len(&self) -> usize {
        self.sources.lock().await.len()
    }

    /// Check whether no sources are registered.
    pub async fn is_empty(&self) -> bool {
        self.sources.lock().await.is_empty()
    }

    /// Check whether `id` names a registered source.
    pub async fn contains(&self, id: &str) -> bool {
        self.sources.lock().await.contains_key(id)
    }

    /// Register a source and recompute the merged bag.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DuplicateResource`] when `id` is already
    /// registered.
    pub async fn insert(&self, id: &str, handle: SourceHandle) -> ConfigResult<Bag> {
        let mut sources = self.sources.lock().await;
        if sources.contains_key(id) {
            return Err(ConfigError::duplicate_resource(id));
        }
        sources.insert(id.to_string(), handle);
        info!(source = id, "registered configuration source");
        Ok(Self::merge_locked(&sources))
    }

    /// Remove and close a source, then recompute the merged bag.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownResource`] when `id` is not registered.
    pub async fn remove(&self, id: &str) -> ConfigResult<Bag> {
        let mut sources = self.sources.lock().await;
        let Some(handle) = sources.shift_remove(id) else {
            return Err(ConfigError::unknown_resource(id));
        };
        handle.close();
        info!(source = id, "removed configuration source");
        Ok(Self::merge_locked(&sources))
    }

    /// Remove and close every source.
    pub async fn remove_all(&self) -> Bag {
        let mut sources = self.sources.lock().await;
        for handle in sources.values() {
            handle.close();
        }
        sources.clear();
        info!("removed all configuration sources");
        Bag::new()
    }

    /// Change a source's priority and recompute the merged bag.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownResource`] when `id` is not registered.
    pub async fn set_priority(&self, id: &str, priority: i64) -> ConfigResult<Bag> {
        let sources = self.sources.lock().await;
        let Some(handle) = sources.get(id) else {
            return Err(ConfigError::unknown_resource(id));
        };
        handle.set_priority(priority);
        debug!(source = id, priority, "changed source priority");
        Ok(Self::merge_locked(&sources))
    }

    /// Ask every observable source to re-check its backing data.
    ///
    /// The whole pass runs under the aggregator lock. Any source error
    /// aborts the pass without partial application. When at least one
    /// source reported a change the merged bag is recomputed and returned.
    pub async fn reload(&self) -> ConfigResult<Option<Bag>> {
        let sources = self.sources.lock().await;
        let mut changed = false;
        for (id, handle) in sources.iter() {
            if handle.reload().await? {
                debug!(source = id, "source reported new data");
                changed = true;
            }
        }
        if changed {
            Ok(Some(Self::merge_locked(&sources)))
        } else {
            Ok(None)
        }
    }

    /// Recompute the merged bag from the current source set.
    pub async fn merged(&self) -> Bag {
        Self::merge_locked(&*self.sources.lock().await)
    }

    fn merge_locked(sources: &IndexMap<String, SourceHandle>) -> Bag {
        let mut ordered: Vec<&SourceHandle> = sources.values().collect();
        ordered.sort_by_key(|handle| handle.priority());

        let mut merged = Bag::new();
        for handle in ordered {
            merged.merge(&handle.snapshot());
        }
        merged
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}
