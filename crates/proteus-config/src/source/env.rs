//! Environment variable backed source.

use std::collections::HashMap;
use std::env;
use std::path::Path;

use proteus_bag::{Bag, Value};
use tracing::debug;

use crate::error::ConfigResult;
use crate::source::{Source, SourceState};

/// A static source mapping environment variables onto bag paths.
///
/// The mapping table is fixed at construction: each entry names an
/// environment variable and the dotted path its value lands on. Values are
/// read once — a live process variable first, then the optional dotenv file
/// — and normalized with the same scalar rules the document parsers use.
/// The source never reloads.
///
/// # Example
///
/// ```no_run
/// use proteus_config::EnvSource;
///
/// # fn main() -> Result<(), proteus_config::ConfigError> {
/// let source = EnvSource::new(
///     100,
///     &[("APP_DB_HOST", "db.host"), ("APP_DB_PORT", "db.port")],
/// )?;
/// # Ok(())
/// # }
/// ```
pub struct EnvSource {
    state: SourceState,
}

impl EnvSource {
    /// Build from the process environment alone.
    ///
    /// # Errors
    ///
    /// Fails when a target path in `mappings` is empty.
    pub fn new(priority: i64, mappings: &[(&str, &str)]) -> ConfigResult<Self> {
        Self::build(priority, None, mappings)
    }

    /// Build from the process environment plus a dotenv-style file.
    ///
    /// The file is read once, at construction, without mutating the process
    /// environment; live process variables override file entries.
    ///
    /// # Errors
    ///
    /// Fails when the dotenv file cannot be read or a target path in
    /// `mappings` is empty.
    pub fn with_dotenv(
        priority: i64,
        dotenv_path: impl AsRef<Path>,
        mappings: &[(&str, &str)],
    ) -> ConfigResult<Self> {
        Self::build(priority, Some(dotenv_path.as_ref()), mappings)
    }

    fn build(
        priority: i64,
        dotenv_path: Option<&Path>,
        mappings: &[(&str, &str)],
    ) -> ConfigResult<Self> {
        let mut file_vars: HashMap<String, String> = HashMap::new();
        if let Some(path) = dotenv_path {
            for item in dotenvy::from_path_iter(path)? {
                let (name, value) = item?;
                file_vars.insert(name, value);
            }
            debug!(path = %path.display(), vars = file_vars.len(), "read dotenv file");
        }

        let mut bag = Bag::new();
        for (name, path) in mappings {
            let value = env::var(name)
                .ok()
                .or_else(|| file_vars.get(*name).cloned());
            if let Some(raw) = value {
                bag.set(path, Value::parse_scalar(&raw))?;
            }
        }

        Ok(Self {
            state: SourceState::new(priority, bag),
        })
    }
}

impl Source for EnvSource {
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
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_dotenv_file_mapped_onto_paths() {
        let dir = TempDir::new().unwrap();
        let dotenv = dir.path().join(".env");
        fs::write(&dotenv, "APP_DB_HOST=localhost\nAPP_DB_PORT=5432\nAPP_DEBUG=true\n").unwrap();

        let source = EnvSource::with_dotenv(
            100,
            &dotenv,
            &[
                ("APP_DB_HOST", "db.host"),
                ("APP_DB_PORT", "db.port"),
                ("APP_DEBUG", "debug"),
                ("APP_UNSET", "unset"),
            ],
        )
        .unwrap();

        assert_eq!(source.get("db.host"), Some(Value::from("localhost")));
        // Scalars are normalized like parsed documents.
        assert_eq!(source.get("db.port"), Some(Value::Int(5432)));
        assert_eq!(source.get("debug"), Some(Value::Bool(true)));
        // Unset variables simply do not land in the bag.
        assert!(source.get("unset").is_none());
    }

    #[test]
    fn test_process_env_overrides_dotenv() {
        let dir = TempDir::new().unwrap();
        let dotenv = dir.path().join(".env");
        fs::write(&dotenv, "PROTEUS_ENV_TEST_OVERRIDE=from_file\n").unwrap();

        env::set_var("PROTEUS_ENV_TEST_OVERRIDE", "from_process");
        let source = EnvSource::with_dotenv(
            100,
            &dotenv,
            &[("PROTEUS_ENV_TEST_OVERRIDE", "origin")],
        )
        .unwrap();
        env::remove_var("PROTEUS_ENV_TEST_OVERRIDE");

        assert_eq!(source.get("origin"), Some(Value::from("from_process")));
    }

    #[test]
    fn test_missing_dotenv_file_fails() {
        let result =
            EnvSource::with_dotenv(100, "/nonexistent/.env", &[("A", "a")]);
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_target_path_fails() {
        let dir = TempDir::new().unwrap();
        let dotenv = dir.path().join(".env");
        fs::write(&dotenv, "APP_X=1\n").unwrap();

        let result = EnvSource::with_dotenv(100, &dotenv, &[("APP_X", "")]);
        assert!(result.is_err());
    }
}
