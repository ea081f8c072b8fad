//! The thread-safe configuration façade.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use tracing::debug;

use proteus_bag::{Bag, BagResult, Value};

use crate::aggregator::Aggregator;
use crate::error::ConfigResult;
use crate::observer::{Firing, ObserverRegistry};
use crate::source::SourceHandle;

/// Aggregated, observable configuration.
///
/// `Config` owns three bags: the bag derived from all registered sources,
/// the manager bag holding programmatic overrides written through
/// [`Config::set`], and the aggregate bag every read goes through. The
/// aggregate is recomputed after every mutation, so a successful mutating
/// call is reflected in the very next read on any task. Manager overrides
/// always outrank every source regardless of source priority.
///
/// # Example
///
/// ```
/// use proteus_bag::Bag;
/// use proteus_config::{Config, MemorySource, SourceHandle};
/// use std::sync::Arc;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), proteus_config::ConfigError> {
/// let config = Config::new();
///
/// let mut bag = Bag::new();
/// bag.set("db.host", "from_source")?;
/// config
///     .add_source("defaults", SourceHandle::Static(Arc::new(MemorySource::new(1, bag))))
///     .await?;
///
/// config.set("db.host", "from_manager")?;
/// assert_eq!(config.get_string("db.host", ""), "from_manager");
/// # Ok(())
/// # }
/// ```
pub struct Config {
    aggregator: Arc<Aggregator>,
    state: Mutex<State>,
}

struct State {
    sources_bag: Bag,
    manager_bag: Bag,
    aggregate_bag: Bag,
    generation: u64,
    observers: ObserverRegistry,
}

impl State {
    /// Recompute the aggregate from the derived and manager bags, bump the
    /// generation, and collect observer firings. Runs under the state lock;
    /// the returned firings are dispatched after it is released.
    fn rebuild(&mut self) -> Vec<Firing> {
        let mut aggregate = self.sources_bag.clone();
        aggregate.merge(&self.manager_bag);
        self.aggregate_bag = aggregate;
        self.generation += 1;
        self.observers.diff(&self.aggregate_bag)
    }
}

impl Config {
    /// Create a config with no sources and no overrides.
    pub fn new() -> Self {
        Self {
            aggregator: Arc::new(Aggregator::new()),
            state: Mutex::new(State {
                sources_bag: Bag::new(),
                manager_bag: Bag::new(),
                aggregate_bag: Bag::new(),
                generation: 0,
                observers: ObserverRegistry::default(),
            }),
        }
    }

    // ---- read API -------------------------------------------------------

    /// Check whether `path` resolves in the aggregate.
    pub fn has(&self, path: &str) -> bool {
        self.state.lock().aggregate_bag.has(path)
    }

    /// Clone the aggregate value at `path`.
    pub fn get(&self, path: &str) -> Option<Value> {
        self.state.lock().aggregate_bag.get(path)
    }

    /// Clone the aggregate value at `path`, falling back to `default`.
    pub fn get_or(&self, path: &str, default: Value) -> Value {
        self.state.lock().aggregate_bag.get_or(path, default)
    }

    /// A boolean at `path`, or `default` on a miss or kind mismatch.
    pub fn get_bool(&self, path: &str, default: bool) -> bool {
        self.state.lock().aggregate_bag.get_bool(path, default)
    }

    /// An integer at `path`, or `default` on a miss or kind mismatch.
    pub fn get_int(&self, path: &str, default: i64) -> i64 {
        self.state.lock().aggregate_bag.get_int(path, default)
    }

    /// A float at `path`, or `default` on a miss or kind mismatch.
    pub fn get_float(&self, path: &str, default: f64) -> f64 {
        self.state.lock().aggregate_bag.get_float(path, default)
    }

    /// A string at `path`, or `default` on a miss or kind mismatch.
    pub fn get_string(&self, path: &str, default: &str) -> String {
        self.state.lock().aggregate_bag.get_string(path, default)
    }

    /// A duration at `path` (integer milliseconds), or `default`.
    pub fn get_duration(&self, path: &str, default: Duration) -> Duration {
        self.state.lock().aggregate_bag.get_duration(path, default)
    }

    /// The nested bag at `path`, if it resolves to a mapping.
    pub fn get_bag(&self, path: &str) -> Option<Bag> {
        self.state.lock().aggregate_bag.get_bag(path)
    }

    /// The sequence at `path`, if it resolves to one.
    pub fn get_sequence(&self, path: &str) -> Option<Vec<Value>> {
        self.state.lock().aggregate_bag.get_sequence(path)
    }

    /// Top-level keys of the aggregate, sorted.
    pub fn entries(&self) -> Vec<String> {
        self.state.lock().aggregate_bag.entries()
    }

    /// Structurally decode the aggregate sub-bag at `path` into `T`.
    ///
    /// # Errors
    ///
    /// Fails when `path` does not resolve or the shape does not fit `T`.
    pub fn populate<T: DeserializeOwned>(&self, path: &str) -> BagResult<T> {
        self.state.lock().aggregate_bag.populate(path)
    }

    /// The aggregate's generation, bumped on every successful rebuild.
    ///
    /// Lets callers check staleness cheaply without re-walking the bag.
    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    // ---- write API ------------------------------------------------------

    /// Write a programmatic override at `path`.
    ///
    /// The value lands in the manager bag, which always wins over every
    /// source. Observers on affected paths fire before this returns.
    ///
    /// # Errors
    ///
    /// Fails when `path` has no usable segments.
    pub fn set(&self, path: &str, value: impl Into<Value>) -> ConfigResult<()> {
        let firings = {
            let mut state = self.state.lock();
            state.manager_bag.set(path, value)?;
            state.rebuild()
        };
        dispatch(&firings);
        Ok(())
    }

    // ---- source management ----------------------------------------------

    /// Register a source and fold it into the aggregate.
    ///
    /// # Errors
    ///
    /// Returns a duplicate-resource error when `id` is already registered.
    pub async fn add_source(&self, id: &str, handle: SourceHandle) -> ConfigResult<()> {
        let sources_bag = self.aggregator.insert(id, handle).await?;
        self.adopt(sources_bag);
        Ok(())
    }

    /// Remove and close a source, recomputing the aggregate.
    ///
    /// # Errors
    ///
    /// Returns an unknown-resource error when `id` is not registered.
    pub async fn remove_source(&self, id: &str) -> ConfigResult<()> {
        let sources_bag = self.aggregator.remove(id).await?;
        self.adopt(sources_bag);
        Ok(())
    }

    /// Remove and close every source, recomputing the aggregate.
    pub async fn remove_all_sources(&self) {
        let sources_bag = self.aggregator.remove_all().await;
        self.adopt(sources_bag);
    }

    /// Change a source's priority, recomputing the aggregate.
    ///
    /// # Errors
    ///
    /// Returns an unknown-resource error when `id` is not registered.
    pub async fn set_source_priority(&self, id: &str, priority: i64) -> ConfigResult<()> {
        let sources_bag = self.aggregator.set_priority(id, priority).await?;
        self.adopt(sources_bag);
        Ok(())
    }

    /// Ask every observable source to re-check its backing data, adopting
    /// the recomputed bag when anything changed.
    ///
    /// Returns whether new data was applied.
    ///
    /// # Errors
    ///
    /// Any source reload error aborts the pass; nothing is applied.
    pub async fn reload(&self) -> ConfigResult<bool> {
        match self.aggregator.reload().await? {
            Some(sources_bag) => {
                self.adopt(sources_bag);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Adopt a freshly merged sources bag and rebuild the aggregate.
    fn adopt(&self, sources_bag: Bag) {
        let firings = {
            let mut state = self.state.lock();
            state.sources_bag = sources_bag;
            state.rebuild()
        };
        dispatch(&firings);
    }

    // ---- observers ------------------------------------------------------

    /// Register `callback` under `id` on `path`.
    ///
    /// The callback is invoked with `(old, new)` whenever a rebuild changes
    /// the aggregate value at `path` to a non-null value. Registration
    /// seeds the last-known value with the current one when the path is
    /// newly watched.
    ///
    /// # Errors
    ///
    /// Returns a duplicate-observer error when `(path, id)` is already
    /// registered.
    pub fn add_observer<F>(&self, id: &str, path: &str, callback: F) -> ConfigResult<()>
    where
        F: Fn(&Value, &Value) + Send + Sync + 'static,
    {
        let mut state = self.state.lock();
        let current = state.aggregate_bag.get_or(path, Value::Null);
        state.observers.add(id, path, current, Arc::new(callback))?;
        debug!(observer = id, path, "registered observer");
        Ok(())
    }

    /// Remove `id` from every watched path.
    pub fn remove_observer(&self, id: &str) {
        self.state.lock().observers.remove(id);
        debug!(observer = id, "removed observer");
    }

    /// Check whether `id` is subscribed to any path.
    pub fn has_observer(&self, id: &str) -> bool {
        self.state.lock().observers.contains(id)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

fn dispatch(firings: &[Firing]) {
    for firing in firings {
        firing.dispatch();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::testing::ToggleSource;
    use crate::source::MemorySource;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn static_source(priority: i64, path: &str, value: &str) -> SourceHandle {
        let mut bag = Bag::new();
        bag.set(path, value).unwrap();
        SourceHandle::Static(Arc::new(MemorySource::new(priority, bag)))
    }

    #[test]
    fn test_set_get_round_trip() {
        let config = Config::new();
        config.set("a.b.c", 42).unwrap();
        assert_eq!(config.get_int("a.b.c", 0), 42);
        assert!(config.has("a.b.c"));
    }

    #[test]
    fn test_set_empty_path_fails() {
        let config = Config::new();
        assert!(config.set("", 1).is_err());
    }

    #[test]
    fn test_readers_never_raise() {
        let config = Config::new();
        assert_eq!(config.get_string("missing", "fallback"), "fallback");
        assert_eq!(config.get_int("missing", -1), -1);
        assert!(!config.get_bool("missing", false));
        assert_eq!(
            config.get_duration("missing", Duration::from_secs(3)),
            Duration::from_secs(3)
        );
        assert!(config.get("missing").is_none());
    }

    #[tokio::test]
    async fn test_manager_overrides_any_source() {
        let config = Config::new();
        config
            .add_source("main", static_source(1000, "x", "from_source"))
            .await
            .unwrap();
        assert_eq!(config.get_string("x", ""), "from_source");

        config.set("x", "from_manager").unwrap();
        assert_eq!(config.get_string("x", ""), "from_manager");
    }

    #[tokio::test]
    async fn test_priority_ordering_across_sources() {
        let config = Config::new();
        config
            .add_source("ten", static_source(10, "x", "low"))
            .await
            .unwrap();
        config
            .add_source("five", static_source(5, "x", "mid"))
            .await
            .unwrap();
        config
            .add_source("twenty", static_source(20, "x", "high"))
            .await
            .unwrap();

        assert_eq!(config.get_string("x", ""), "high");
    }

    #[tokio::test]
    async fn test_remove_source_updates_aggregate() {
        let config = Config::new();
        config
            .add_source("main", static_source(1, "x", "a"))
            .await
            .unwrap();
        config.remove_source("main").await.unwrap();
        assert!(!config.has("x"));
    }

    #[tokio::test]
    async fn test_priority_change_updates_aggregate() {
        let config = Config::new();
        config
            .add_source("a", static_source(1, "x", "a"))
            .await
            .unwrap();
        config
            .add_source("b", static_source(2, "x", "b"))
            .await
            .unwrap();
        assert_eq!(config.get_string("x", ""), "b");

        config.set_source_priority("a", 5).await.unwrap();
        assert_eq!(config.get_string("x", ""), "a");
    }

    #[tokio::test]
    async fn test_generation_bumps_on_mutation() {
        let config = Config::new();
        let start = config.generation();
        config.set("a", 1).unwrap();
        assert_eq!(config.generation(), start + 1);
        config
            .add_source("main", static_source(1, "x", "a"))
            .await
            .unwrap();
        assert_eq!(config.generation(), start + 2);
    }

    #[test]
    fn test_observer_fires_once_per_change() {
        let config = Config::new();
        config.set("x", 1).unwrap();

        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        config
            .add_observer("sub", "x", move |old, new| {
                counter.fetch_add(1, Ordering::SeqCst);
                sink.lock().push((old.clone(), new.clone()));
            })
            .unwrap();

        config.set("x", 2).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(seen.lock()[0], (Value::Int(1), Value::Int(2)));

        // Same value again: no change, no firing.
        config.set("x", 2).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_duplicate_observer_fails() {
        let config = Config::new();
        config.add_observer("sub", "x", |_, _| {}).unwrap();
        let result = config.add_observer("sub", "x", |_, _| {});
        assert!(result.is_err());
        assert!(config.has_observer("sub"));
    }

    #[test]
    fn test_remove_observer_everywhere() {
        let config = Config::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c1 = count.clone();
        let c2 = count.clone();
        config
            .add_observer("sub", "x", move |_, _| {
                c1.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        config
            .add_observer("sub", "y", move |_, _| {
                c2.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        config.remove_observer("sub");
        assert!(!config.has_observer("sub"));

        config.set("x", 1).unwrap();
        config.set("y", 1).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_observer_fires_on_reload() {
        let config = Config::new();
        let toggle = Arc::new(ToggleSource::new(1, Bag::new()));
        config
            .add_source("toggle", SourceHandle::Observable(toggle.clone()))
            .await
            .unwrap();

        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        config
            .add_observer("sub", "feature.enabled", move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        let mut bag = Bag::new();
        bag.set("feature.enabled", true).unwrap();
        toggle.stage(bag);

        assert!(config.reload().await.unwrap());
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(config.get_bool("feature.enabled", false));

        // Nothing staged: no change, no firing.
        assert!(!config.reload().await.unwrap());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_value_removal_does_not_fire() {
        let config = Config::new();
        config
            .add_source("main", static_source(1, "x", "present"))
            .await
            .unwrap();

        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        config
            .add_observer("sub", "x", move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        config.remove_source("main").await.unwrap();
        assert!(!config.has("x"));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_populate_from_aggregate() {
        #[derive(serde::Deserialize)]
        struct Db {
            host: String,
            port: u16,
        }

        let config = Config::new();
        config
            .add_source("hosts", static_source(1, "db.host", "a"))
            .await
            .unwrap();
        config.set("db.port", 5432).unwrap();

        let db: Db = config.populate("db").unwrap();
        assert_eq!(db.host, "a");
        assert_eq!(db.port, 5432);
    }
}
