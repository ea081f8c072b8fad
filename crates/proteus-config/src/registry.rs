//! Id-keyed driver registry.
//!
//! Concrete drivers (parsers today, any pluggable strategy tomorrow) are
//! looked up by the string id that configuration names them with. The
//! registry is the seam the on-demand resource factory plugs into; the
//! factory's construction and caching policy lives outside this engine.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{ConfigError, ConfigResult};
use crate::parser::{JsonParser, Parser, YamlParser};

/// A thread-safe map from string id to a shared driver instance.
///
/// # Example
///
/// ```
/// use proteus_config::{Parser, Registry};
/// use std::sync::Arc;
///
/// let registry = Registry::with_default_parsers();
/// let parser = registry.resolve("json").unwrap();
/// assert_eq!(parser.format(), "json");
/// ```
pub struct Registry<T: ?Sized> {
    entries: RwLock<HashMap<String, Arc<T>>>,
}

impl<T: ?Sized + Send + Sync> Registry<T> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Register a driver under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DuplicateResource`] when `id` is already
    /// registered.
    pub fn register(&self, id: &str, driver: Arc<T>) -> ConfigResult<()> {
        let mut entries = self.entries.write();
        if entries.contains_key(id) {
            return Err(ConfigError::duplicate_resource(id));
        }
        entries.insert(id.to_string(), driver);
        Ok(())
    }

    /// Look up the driver registered under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownResource`] when `id` is not registered.
    pub fn resolve(&self, id: &str) -> ConfigResult<Arc<T>> {
        self.entries
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| ConfigError::unknown_resource(id))
    }

    /// Check whether `id` is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.entries.read().contains_key(id)
    }

    /// Registered ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.entries.read().keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl<T: ?Sized + Send + Sync> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry<dyn Parser> {
    /// A parser registry with the built-in formats pre-registered under
    /// `"json"` and `"yaml"`.
    pub fn with_default_parsers() -> Self {
        let registry = Self::new();
        // Fresh registry, the built-in ids cannot collide.
        let _ = registry.register("json", Arc::new(JsonParser));
        let _ = registry.register("yaml", Arc::new(YamlParser));
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_resolve() {
        let registry: Registry<dyn Parser> = Registry::new();
        registry.register("json", Arc::new(JsonParser)).unwrap();

        let parser = registry.resolve("json").unwrap();
        assert_eq!(parser.format(), "json");
        assert!(registry.contains("json"));
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let registry: Registry<dyn Parser> = Registry::new();
        registry.register("json", Arc::new(JsonParser)).unwrap();

        let result = registry.register("json", Arc::new(JsonParser));
        assert!(matches!(result, Err(ConfigError::DuplicateResource { .. })));
    }

    #[test]
    fn test_unknown_resource() {
        let registry: Registry<dyn Parser> = Registry::new();
        let result = registry.resolve("toml");
        assert!(matches!(result, Err(ConfigError::UnknownResource { .. })));
    }

    #[test]
    fn test_default_parsers() {
        let registry = Registry::with_default_parsers();
        assert_eq!(registry.ids(), vec!["json".to_string(), "yaml".to_string()]);
        assert_eq!(registry.resolve("yaml").unwrap().format(), "yaml");
    }
}
