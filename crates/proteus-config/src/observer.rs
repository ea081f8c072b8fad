//! Per-path change observation.

use std::collections::HashMap;
use std::sync::Arc;

use proteus_bag::{Bag, Value};

use crate::error::{ConfigError, ConfigResult};

/// A callback invoked with the old and new value of a watched path.
pub type ObserverCallback = Arc<dyn Fn(&Value, &Value) + Send + Sync>;

/// A change that must be delivered to a path's subscribers.
///
/// Firings are collected while the owning lock is held and dispatched after
/// it is released, so no callback ever runs under the config lock.
pub(crate) struct Firing {
    pub(crate) old: Value,
    pub(crate) new: Value,
    pub(crate) callbacks: Vec<ObserverCallback>,
}

impl Firing {
    /// Invoke every subscriber with the old and new value.
    pub(crate) fn dispatch(&self) {
        for callback in &self.callbacks {
            callback(&self.old, &self.new);
        }
    }
}

/// One watched path: its last observed value and its subscribers.
struct PathWatch {
    last: Value,
    subscribers: HashMap<String, ObserverCallback>,
}

/// Registry of watched paths keyed by dotted path.
#[derive(Default)]
pub(crate) struct ObserverRegistry {
    watches: HashMap<String, PathWatch>,
}

impl ObserverRegistry {
    /// Register `id` on `path`, seeding the cache with `current` when the
    /// path is newly watched.
    pub(crate) fn add(
        &mut self,
        id: &str,
        path: &str,
        current: Value,
        callback: ObserverCallback,
    ) -> ConfigResult<()> {
        let watch = self
            .watches
            .entry(path.to_string())
            .or_insert_with(|| PathWatch {
                last: current,
                subscribers: HashMap::new(),
            });
        if watch.subscribers.contains_key(id) {
            return Err(ConfigError::duplicate_observer(path, id));
        }
        watch.subscribers.insert(id.to_string(), callback);
        Ok(())
    }

    /// Remove `id` from every path's subscriber set, dropping paths with no
    /// subscribers left.
    pub(crate) fn remove(&mut self, id: &str) {
        for watch in self.watches.values_mut() {
            watch.subscribers.remove(id);
        }
        self.watches.retain(|_, watch| !watch.subscribers.is_empty());
    }

    /// Check whether `id` is subscribed to any path.
    pub(crate) fn contains(&self, id: &str) -> bool {
        self.watches
            .values()
            .any(|watch| watch.subscribers.contains_key(id))
    }

    /// Compare every watched path against `aggregate`, updating caches and
    /// collecting the firings to deliver.
    ///
    /// A path whose new value is absent or null never fires; deletions are
    /// not observable events.
    pub(crate) fn diff(&mut self, aggregate: &Bag) -> Vec<Firing> {
        let mut firings = Vec::new();
        for (path, watch) in &mut self.watches {
            let Some(new) = aggregate.get(path) else {
                continue;
            };
            if new.is_null() || new == watch.last {
                continue;
            }
            let old = std::mem::replace(&mut watch.last, new.clone());
            firings.push(Firing {
                old,
                new,
                callbacks: watch.subscribers.values().cloned().collect(),
            });
        }
        firings
    }
}
