//! Layered, observable runtime configuration.
//!
//! Configuration is assembled from prioritized [`Source`]s (files,
//! directories, environment variables, REST endpoints) into one aggregate
//! bag behind the [`Config`] façade. Programmatic overrides written with
//! [`Config::set`] always win over sources. Observable sources can be
//! re-checked with [`Config::reload`], either on demand or on a cadence
//! driven by a [`Poller`] whose frequency is itself a configuration value.
//! Callbacks registered with [`Config::add_observer`] fire whenever a
//! watched path changes.
//!
//! # Example
//!
//! ```no_run
//! use proteus_config::{Config, FileSource, JsonParser, SourceHandle};
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), proteus_config::ConfigError> {
//! let config = Arc::new(Config::new());
//!
//! let file = FileSource::new("config/app.json", 10, Arc::new(JsonParser))?;
//! config
//!     .add_source("app", SourceHandle::Static(Arc::new(file)))
//!     .await?;
//!
//! config.add_observer("log-level", "log.level", |old, new| {
//!     println!("log level changed: {old:?} -> {new:?}");
//! })?;
//!
//! let host = config.get_string("db.host", "localhost");
//! # let _ = host;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod aggregator;
mod config;
mod error;
mod observer;
mod parser;
mod poller;
mod registry;
mod source;
mod task;

pub use aggregator::Aggregator;
pub use config::Config;
pub use error::{ConfigError, ConfigResult};
pub use observer::ObserverCallback;
pub use parser::{JsonParser, Parser, YamlParser};
pub use poller::{Poller, DEFAULT_FREQUENCY_PATH};
pub use registry::Registry;
pub use source::{
    EnvSource, FileSource, MemorySource, ObservableSource, RestSource, RestSourceBuilder, Source,
    SourceHandle, WatchedFileSource, WatchedRestSource,
};
pub use task::Timer;
