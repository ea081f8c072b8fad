//! Configuration sources.
//!
//! A source is a read-only, priority-tagged provider of a configuration
//! bag. Each source keeps its bag (and mutable priority) behind its own
//! lock and moves through a fixed lifecycle: it is constructed with an
//! initial load that must succeed, may be reloaded any number of times if
//! observable, and is closed when removed from the aggregator.
//!
//! Reload is an explicit capability, not a runtime probe: a source enters
//! the aggregator as a [`SourceHandle`] tagged either `Static` or
//! `Observable`, and only the latter participates in reload passes.

mod env;
mod file;
mod rest;

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use proteus_bag::{Bag, Value};

use crate::error::ConfigResult;

pub use env::EnvSource;
pub use file::{FileSource, WatchedFileSource};
pub use rest::{RestSource, RestSourceBuilder, WatchedRestSource};

/// A read-only, priority-tagged configuration provider.
///
/// Higher numeric priority wins on overlapping keys during aggregation.
pub trait Source: Send + Sync {
    /// The source's merge priority.
    fn priority(&self) -> i64;

    /// Change the source's merge priority.
    fn set_priority(&self, priority: i64);

    /// Resolve a dotted path inside the source's current bag.
    fn get(&self, path: &str) -> Option<Value>;

    /// A deep copy of the source's current bag.
    fn snapshot(&self) -> Bag;

    /// Release anything the source owns. Called when the source is removed
    /// from the aggregator.
    fn close(&self) {}
}

/// A [`Source`] that can check whether its backing data changed.
#[async_trait]
pub trait ObservableSource: Source {
    /// Re-check the backing data, re-parsing only when it actually changed.
    ///
    /// Returns whether a re-parse occurred.
    async fn reload(&self) -> ConfigResult<bool>;
}

/// A source with its reload capability made explicit.
#[derive(Clone)]
pub enum SourceHandle {
    /// A source whose data never changes after the initial load.
    Static(Arc<dyn Source>),
    /// A source that participates in reload passes.
    Observable(Arc<dyn ObservableSource>),
}

impl SourceHandle {
    /// The source's merge priority.
    pub fn priority(&self) -> i64 {
        match self {
            Self::Static(s) => s.priority(),
            Self::Observable(s) => s.priority(),
        }
    }

    /// Change the source's merge priority.
    pub fn set_priority(&self, priority: i64) {
        match self {
            Self::Static(s) => s.set_priority(priority),
            Self::Observable(s) => s.set_priority(priority),
        }
    }

    /// Resolve a dotted path inside the source's current bag.
    pub fn get(&self, path: &str) -> Option<Value> {
        match self {
            Self::Static(s) => s.get(path),
            Self::Observable(s) => s.get(path),
        }
    }

    /// A deep copy of the source's current bag.
    pub fn snapshot(&self) -> Bag {
        match self {
            Self::Static(s) => s.snapshot(),
            Self::Observable(s) => s.snapshot(),
        }
    }

    /// Release anything the source owns.
    pub fn close(&self) {
        match self {
            Self::Static(s) => s.close(),
            Self::Observable(s) => s.close(),
        }
    }

    /// Whether the source participates in reload passes.
    pub fn is_observable(&self) -> bool {
        matches!(self, Self::Observable(_))
    }

    /// Reload the source if it is observable; a static source reports no
    /// change.
    pub async fn reload(&self) -> ConfigResult<bool> {
        match self {
            Self::Static(_) => Ok(false),
            Self::Observable(s) => s.reload().await,
        }
    }
}

/// Shared per-source state: the loaded bag behind the source's own lock and
/// an atomically mutable priority.
pub(crate) struct SourceState {
    priority: AtomicI64,
    bag: RwLock<Bag>,
}

impl SourceState {
    pub(crate) fn new(priority: i64, bag: Bag) -> Self {
        Self {
            priority: AtomicI64::new(priority),
            bag: RwLock::new(bag),
        }
    }

    pub(crate) fn priority(&self) -> i64 {
        self.priority.load(Ordering::Acquire)
    }

    pub(crate) fn set_priority(&self, priority: i64) {
        self.priority.store(priority, Ordering::Release);
    }

    pub(crate) fn get(&self, path: &str) -> Option<Value> {
        self.bag.read().get(path)
    }

    pub(crate) fn snapshot(&self) -> Bag {
        self.bag.read().clone()
    }

    pub(crate) fn replace(&self, bag: Bag) {
        *self.bag.write() = bag;
    }
}

/// An in-memory static source.
///
/// Useful for seeding defaults and as the test double every `Source`
/// consumer can exercise without touching the file system or network.
///
/// # Example
///
/// ```
/// use proteus_bag::Bag;
/// use proteus_config::MemorySource;
///
/// let mut bag = Bag::new();
/// bag.set("x", "low").unwrap();
/// let source = MemorySource::new(10, bag);
/// ```
pub struct MemorySource {
    state: SourceState,
}

impl MemorySource {
    /// Create a source over an already-built bag.
    pub fn new(priority: i64, bag: Bag) -> Self {
        Self {
            state: SourceState::new(priority, bag),
        }
    }
}

impl Source for MemorySource {
    fn priority(&self) -> i64 {
        self.state.priority()
    }

    fn set_priority(&self, priority: i64) {
        self.state.set_priority(priority);
    }

    fn get(&self, path: &str) -> Option<Value> {
        self.state.get(path)
    }

    fn snapshot(&self) -> Bag {
        self.state.snapshot()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ToggleSource;
    use super::*;

    fn bag_with(path: &str, value: &str) -> Bag {
        let mut bag = Bag::new();
        bag.set(path, value).unwrap();
        bag
    }

    #[test]
    fn test_memory_source_get_and_snapshot() {
        let source = MemorySource::new(5, bag_with("db.host", "a"));
        assert_eq!(source.priority(), 5);
        assert_eq!(source.get("db.host"), Some(Value::from("a")));
        assert!(source.get("db.port").is_none());
        assert_eq!(source.snapshot().get_string("db.host", ""), "a");
    }

    #[test]
    fn test_priority_is_mutable() {
        let source = MemorySource::new(5, Bag::new());
        source.set_priority(20);
        assert_eq!(source.priority(), 20);
    }

    #[test]
    fn test_static_handle_reports_no_change() {
        let handle = SourceHandle::Static(Arc::new(MemorySource::new(1, Bag::new())));
        assert!(!handle.is_observable());
        let changed = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(handle.reload())
            .unwrap();
        assert!(!changed);
    }

    #[tokio::test]
    async fn test_observable_handle_reload() {
        let source = Arc::new(ToggleSource::new(1, bag_with("x", "old")));
        let handle = SourceHandle::Observable(source.clone());
        assert!(handle.is_observable());

        assert!(!handle.reload().await.unwrap());

        source.stage(bag_with("x", "new"));
        assert!(handle.reload().await.unwrap());
        assert_eq!(handle.get("x"), Some(Value::from("new")));
    }
}
