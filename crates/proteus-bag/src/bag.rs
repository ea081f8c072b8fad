//! The recursive key-value bag.
//!
//! A [`Bag`] maps string keys to [`Value`]s and is addressable with dotted
//! paths: `"db.pool.max"` walks nested mappings segment by segment. Empty
//! segments (consecutive dots) are skipped. Bags perform no locking; an
//! owner wraps them in whatever lock its concurrency model needs.

use std::collections::HashMap;
use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::error::{BagError, BagResult};
use crate::value::Value;

/// A nested string-keyed mapping of dynamic values.
///
/// # Example
///
/// ```
/// use proteus_bag::{Bag, Value};
///
/// let mut bag = Bag::new();
/// bag.set("db.host", "localhost").unwrap();
/// bag.set("db.port", 5432).unwrap();
///
/// assert!(bag.has("db.port"));
/// assert_eq!(bag.get_string("db.host", ""), "localhost");
/// assert_eq!(bag.get_int("db.port", 0), 5432);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bag {
    entries: HashMap<String, Value>,
}

impl Bag {
    /// Create an empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of top-level entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether the bag has no top-level entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Top-level keys, sorted for deterministic iteration.
    pub fn entries(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Insert a value directly under a top-level key, without path
    /// interpretation.
    ///
    /// Used by parsers while building normalized bags; `key` is stored as
    /// given.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Check whether `path` resolves to a value.
    pub fn has(&self, path: &str) -> bool {
        self.resolve(path).is_some()
    }

    /// Resolve `path` and clone the value it addresses.
    pub fn get(&self, path: &str) -> Option<Value> {
        self.resolve(path).cloned()
    }

    /// Resolve `path`, falling back to `default` when it does not resolve.
    pub fn get_or(&self, path: &str, default: Value) -> Value {
        self.get(path).unwrap_or(default)
    }

    /// A boolean at `path`, or `default` on a miss or kind mismatch.
    pub fn get_bool(&self, path: &str, default: bool) -> bool {
        match self.resolve(path) {
            Some(Value::Bool(b)) => *b,
            _ => default,
        }
    }

    /// An integer at `path`, or `default` on a miss or kind mismatch.
    pub fn get_int(&self, path: &str, default: i64) -> i64 {
        match self.resolve(path) {
            Some(Value::Int(i)) => *i,
            _ => default,
        }
    }

    /// A float at `path`, or `default` on a miss or kind mismatch.
    ///
    /// Integers are not coerced; a whole-number float parsed from a source
    /// was already collapsed to an integer at parse time, so a float read of
    /// it misses by design.
    pub fn get_float(&self, path: &str, default: f64) -> f64 {
        match self.resolve(path) {
            Some(Value::Float(f)) => *f,
            _ => default,
        }
    }

    /// A string at `path`, or `default` on a miss or kind mismatch.
    pub fn get_string(&self, path: &str, default: &str) -> String {
        match self.resolve(path) {
            Some(Value::String(s)) => s.clone(),
            _ => default.to_string(),
        }
    }

    /// A duration at `path`, or `default` on a miss.
    ///
    /// Durations are stored as a non-negative integer count of milliseconds;
    /// this is the only accessor with a coercion rule (see
    /// [`Value::as_duration`]).
    pub fn get_duration(&self, path: &str, default: Duration) -> Duration {
        self.resolve(path)
            .and_then(Value::as_duration)
            .unwrap_or(default)
    }

    /// The nested bag at `path`, if the path resolves to a mapping.
    pub fn get_bag(&self, path: &str) -> Option<Bag> {
        match self.resolve(path) {
            Some(Value::Mapping(bag)) => Some(bag.clone()),
            _ => None,
        }
    }

    /// The sequence at `path`, if the path resolves to one.
    pub fn get_sequence(&self, path: &str) -> Option<Vec<Value>> {
        match self.resolve(path) {
            Some(Value::Sequence(items)) => Some(items.clone()),
            _ => None,
        }
    }

    /// Write `value` at `path`, creating intermediate mappings as needed.
    ///
    /// An intermediate key holding a non-mapping value is destructively
    /// replaced by an empty mapping; callers accept that data loss on type
    /// conflict. A path with no usable segments is an error.
    ///
    /// # Errors
    ///
    /// Returns [`BagError::EmptyPath`] when `path` contains no non-empty
    /// segments.
    pub fn set(&mut self, path: &str, value: impl Into<Value>) -> BagResult<()> {
        let segments: Vec<&str> = split_path(path);
        let Some((last, intermediate)) = segments.split_last() else {
            return Err(BagError::EmptyPath);
        };

        let mut current = &mut self.entries;
        for segment in intermediate {
            let slot = current
                .entry((*segment).to_string())
                .or_insert_with(|| Value::Mapping(Bag::new()));
            if !matches!(slot, Value::Mapping(_)) {
                *slot = Value::Mapping(Bag::new());
            }
            let Value::Mapping(bag) = slot else {
                unreachable!("intermediate slot was just made a mapping");
            };
            current = &mut bag.entries;
        }
        current.insert((*last).to_string(), value.into());
        Ok(())
    }

    /// Recursively merge `other` into this bag.
    ///
    /// For every key in `other`: two mappings merge recursively; a mapping
    /// wins structurally over a non-mapping on either side; otherwise the
    /// incoming scalar overwrites.
    pub fn merge(&mut self, other: &Bag) {
        for (key, incoming) in &other.entries {
            match (self.entries.get_mut(key), incoming) {
                (Some(Value::Mapping(mine)), Value::Mapping(theirs)) => mine.merge(theirs),
                // Existing mapping survives an incoming scalar.
                (Some(Value::Mapping(_)), _) => {}
                (Some(slot), theirs) => *slot = theirs.clone(),
                (None, theirs) => {
                    self.entries.insert(key.clone(), theirs.clone());
                }
            }
        }
    }

    /// Structurally decode the sub-bag at `path` into `T`.
    ///
    /// A path with no usable segments decodes the whole bag.
    ///
    /// # Errors
    ///
    /// Returns [`BagError::InvalidPath`] when `path` does not resolve and
    /// [`BagError::Decode`] when the resolved shape does not fit `T`.
    ///
    /// # Example
    ///
    /// ```
    /// use proteus_bag::Bag;
    /// use serde::Deserialize;
    ///
    /// #[derive(Deserialize)]
    /// struct Db {
    ///     host: String,
    ///     port: u16,
    /// }
    ///
    /// let mut bag = Bag::new();
    /// bag.set("db.host", "localhost").unwrap();
    /// bag.set("db.port", 5432).unwrap();
    ///
    /// let db: Db = bag.populate("db").unwrap();
    /// assert_eq!(db.host, "localhost");
    /// assert_eq!(db.port, 5432);
    /// ```
    pub fn populate<T: DeserializeOwned>(&self, path: &str) -> BagResult<T> {
        let json = if split_path(path).is_empty() {
            Value::Mapping(self.clone()).to_json()
        } else {
            match self.resolve(path) {
                Some(value) => value.to_json(),
                None => return Err(BagError::invalid_path(path)),
            }
        };
        serde_json::from_value(json).map_err(|e| BagError::decode(path, e.to_string()))
    }

    /// Walk `path` segment by segment through nested mappings.
    fn resolve(&self, path: &str) -> Option<&Value> {
        let segments = split_path(path);
        let (first, rest) = segments.split_first()?;
        let mut current = self.entries.get(*first)?;
        for segment in rest {
            match current {
                Value::Mapping(bag) => current = bag.entries.get(*segment)?,
                _ => return None,
            }
        }
        Some(current)
    }
}

impl FromIterator<(String, Value)> for Bag {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Split a dotted path into its non-empty segments.
fn split_path(path: &str) -> Vec<&str> {
    path.split('.').filter(|s| !s.is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    fn sample() -> Bag {
        let mut bag = Bag::new();
        bag.set("db.host", "localhost").unwrap();
        bag.set("db.port", 5432).unwrap();
        bag.set("db.pool.max", 10).unwrap();
        bag.set("debug", true).unwrap();
        bag
    }

    #[test]
    fn test_set_get_round_trip() {
        let mut bag = Bag::new();
        bag.set("a.b.c", 42).unwrap();
        assert_eq!(bag.get("a.b.c"), Some(Value::Int(42)));
        assert!(bag.has("a.b.c"));
        assert!(bag.has("a.b"));
        assert!(!bag.has("a.b.c.d"));
    }

    #[test]
    fn test_empty_segments_skipped() {
        let mut bag = Bag::new();
        bag.set("a..b", 1).unwrap();
        assert_eq!(bag.get("a.b"), Some(Value::Int(1)));
        assert_eq!(bag.get(".a..b."), Some(Value::Int(1)));
    }

    #[test]
    fn test_set_empty_path_fails() {
        let mut bag = Bag::new();
        assert!(matches!(bag.set("", 1), Err(BagError::EmptyPath)));
        assert!(matches!(bag.set("...", 1), Err(BagError::EmptyPath)));
    }

    #[test]
    fn test_set_replaces_scalar_intermediate() {
        let mut bag = Bag::new();
        bag.set("a", "scalar").unwrap();
        bag.set("a.b", 1).unwrap();
        // The scalar at "a" was destructively replaced by a mapping.
        assert_eq!(bag.get("a.b"), Some(Value::Int(1)));
        assert!(bag.get("a").unwrap().as_mapping().is_some());
    }

    #[test]
    fn test_typed_getters_defaults() {
        let bag = sample();
        assert_eq!(bag.get_string("db.host", "x"), "localhost");
        assert_eq!(bag.get_int("db.port", 0), 5432);
        assert!(bag.get_bool("debug", false));
        // Wrong kind falls back to the default, no coercion.
        assert_eq!(bag.get_string("db.port", "x"), "x");
        assert_eq!(bag.get_int("db.host", -1), -1);
        assert_eq!(bag.get_float("db.port", 0.25), 0.25);
        // Missing path falls back too.
        assert_eq!(bag.get_int("db.missing", 7), 7);
    }

    #[test]
    fn test_get_duration() {
        let mut bag = Bag::new();
        bag.set("poll", Duration::from_millis(250)).unwrap();
        bag.set("label", "fast").unwrap();
        assert_eq!(
            bag.get_duration("poll", Duration::ZERO),
            Duration::from_millis(250)
        );
        assert_eq!(
            bag.get_duration("label", Duration::from_secs(1)),
            Duration::from_secs(1)
        );
    }

    #[test]
    fn test_get_bag_and_sequence() {
        let mut bag = sample();
        bag.set("hosts", vec![Value::from("a"), Value::from("b")])
            .unwrap();

        let db = bag.get_bag("db").unwrap();
        assert_eq!(db.get_int("port", 0), 5432);
        assert!(bag.get_bag("debug").is_none());

        let hosts = bag.get_sequence("hosts").unwrap();
        assert_eq!(hosts.len(), 2);
        assert!(bag.get_sequence("db").is_none());
    }

    #[test]
    fn test_entries_top_level_only() {
        let bag = sample();
        assert_eq!(bag.entries(), vec!["db".to_string(), "debug".to_string()]);
    }

    #[test]
    fn test_clone_is_independent() {
        let original = sample();
        let mut copy = original.clone();
        copy.set("db.pool.max", 99).unwrap();
        copy.set("new", 1).unwrap();

        assert_eq!(original.get_int("db.pool.max", 0), 10);
        assert!(!original.has("new"));
        assert_eq!(copy.get_int("db.pool.max", 0), 99);
    }

    #[test]
    fn test_merge_right_biased_scalars() {
        let mut left = Bag::new();
        left.set("a", 1).unwrap();
        let mut right = Bag::new();
        right.set("a", 2).unwrap();

        left.merge(&right);
        assert_eq!(left.get("a"), Some(Value::Int(2)));
    }

    #[test]
    fn test_merge_idempotent() {
        let mut bag = sample();
        let snapshot = bag.clone();
        bag.merge(&snapshot);
        assert_eq!(bag, snapshot);
    }

    #[test]
    fn test_merge_recursive_across_bags() {
        let mut left = Bag::new();
        left.set("db.host", "a").unwrap();
        let mut right = Bag::new();
        right.set("db.port", 5432).unwrap();

        left.merge(&right);
        assert_eq!(left.get_string("db.host", ""), "a");
        assert_eq!(left.get_int("db.port", 0), 5432);
    }

    #[test]
    fn test_merge_mapping_wins_structurally() {
        // Incoming mapping replaces an existing scalar.
        let mut left = Bag::new();
        left.set("db", "off").unwrap();
        let mut right = Bag::new();
        right.set("db.port", 5432).unwrap();
        left.merge(&right);
        assert_eq!(left.get_int("db.port", 0), 5432);

        // An existing mapping survives an incoming scalar.
        let mut left = Bag::new();
        left.set("db.port", 5432).unwrap();
        let mut right = Bag::new();
        right.set("db", "off").unwrap();
        left.merge(&right);
        assert_eq!(left.get_int("db.port", 0), 5432);
    }

    #[test]
    fn test_populate() {
        #[derive(Deserialize)]
        struct Pool {
            max: u32,
        }

        #[derive(Deserialize)]
        struct Db {
            host: String,
            port: u16,
            pool: Pool,
        }

        let bag = sample();
        let db: Db = bag.populate("db").unwrap();
        assert_eq!(db.host, "localhost");
        assert_eq!(db.port, 5432);
        assert_eq!(db.pool.max, 10);
    }

    #[test]
    fn test_populate_whole_bag() {
        #[derive(Deserialize)]
        struct Root {
            debug: bool,
        }

        let root: Root = sample().populate("").unwrap();
        assert!(root.debug);
    }

    #[test]
    fn test_populate_invalid_path() {
        let bag = sample();
        let result: BagResult<String> = bag.populate("db.missing");
        assert!(matches!(result, Err(BagError::InvalidPath { .. })));
    }

    #[test]
    fn test_populate_shape_mismatch() {
        #[derive(Deserialize)]
        #[allow(dead_code)]
        struct Wrong {
            host: u64,
        }

        let bag = sample();
        let result: BagResult<Wrong> = bag.populate("db");
        assert!(matches!(result, Err(BagError::Decode { .. })));
    }
}
