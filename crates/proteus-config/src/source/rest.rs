//! HTTP backed sources.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use proteus_bag::{Bag, Value};
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::source::{ObservableSource, Source, SourceState};

/// Builder for [`RestSource`] and [`WatchedRestSource`].
///
/// # Example
///
/// ```no_run
/// use proteus_config::RestSource;
///
/// # async fn example() -> Result<(), proteus_config::ConfigError> {
/// let source = RestSource::builder()
///     .url("https://config.example.com/v1/app")
///     .config_path("data.config")
///     .timestamp_path("data.updated_at")
///     .priority(50)
///     .build_watched()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct RestSourceBuilder {
    url: Option<String>,
    config_path: String,
    timestamp_path: Option<String>,
    priority: i64,
    client: Option<reqwest::Client>,
}

impl RestSourceBuilder {
    /// The endpoint to GET.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Dotted path of the configuration sub-document inside the response
    /// body. An empty path uses the whole body.
    pub fn config_path(mut self, path: impl Into<String>) -> Self {
        self.config_path = path.into();
        self
    }

    /// Dotted path of the RFC3339 timestamp inside the response body.
    /// Required for the watched variant.
    pub fn timestamp_path(mut self, path: impl Into<String>) -> Self {
        self.timestamp_path = Some(path.into());
        self
    }

    /// The source's merge priority.
    pub fn priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    /// Use a pre-built HTTP client instead of a fresh one.
    pub fn client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Perform the initial fetch and build a static source.
    ///
    /// # Errors
    ///
    /// Fails without a URL, and on any fetch or extraction failure — a
    /// source that cannot load is never registered.
    pub async fn build(self) -> ConfigResult<RestSource> {
        let (shared, _root) = self.into_shared().await?;
        Ok(RestSource { shared })
    }

    /// Perform the initial fetch and build an observable source.
    ///
    /// # Errors
    ///
    /// As [`RestSourceBuilder::build`], plus the timestamp path must be
    /// supplied and resolve to a valid RFC3339 string.
    pub async fn build_watched(self) -> ConfigResult<WatchedRestSource> {
        let Some(timestamp_path) = self.timestamp_path.clone() else {
            return Err(ConfigError::missing_collaborator("timestamp_path"));
        };
        let (shared, root) = self.into_shared().await?;
        let last_seen = extract_timestamp(&root, &timestamp_path)?;
        Ok(WatchedRestSource {
            shared,
            timestamp_path,
            last_seen: Mutex::new(Some(last_seen)),
        })
    }

    /// Validate the builder, perform the initial fetch, and return the
    /// shared source core along with the full response bag.
    async fn into_shared(self) -> ConfigResult<(RestShared, Bag)> {
        let Some(url) = self.url else {
            return Err(ConfigError::missing_collaborator("url"));
        };
        let client = self.client.unwrap_or_default();

        let root = fetch_root(&client, &url).await?;
        let document = extract_document(&root, &self.config_path)?;
        debug!(url = %url, "loaded REST source");

        let shared = RestShared {
            url,
            config_path: self.config_path,
            client,
            state: SourceState::new(self.priority, document),
        };
        Ok((shared, root))
    }
}

/// State common to the static and watched REST variants.
struct RestShared {
    url: String,
    config_path: String,
    client: reqwest::Client,
    state: SourceState,
}

impl RestShared {
    async fn fetch(&self) -> ConfigResult<Bag> {
        fetch_root(&self.client, &self.url).await
    }
}

/// A static source loaded from an HTTP endpoint once, at construction.
pub struct RestSource {
    shared: RestShared,
}

impl RestSource {
    /// Start building a REST source.
    pub fn builder() -> RestSourceBuilder {
        RestSourceBuilder::default()
    }
}

impl Source for RestSource {
    fn priority(&self) -> i64 {
        self.shared.state.priority()
    }

    fn set_priority(&self, priority: i64) {
        self.shared.state.set_priority(priority);
    }

    fn get(&self, path: &str) -> Option<Value> {
        self.shared.state.get(path)
    }

    fn snapshot(&self) -> Bag {
        self.shared.state.snapshot()
    }
}

/// An observable REST source that re-fetches and applies the configuration
/// sub-document only when the response timestamp moves strictly forward.
pub struct WatchedRestSource {
    shared: RestShared,
    timestamp_path: String,
    last_seen: Mutex<Option<DateTime<Utc>>>,
}

impl WatchedRestSource {
    /// Start building a REST source.
    pub fn builder() -> RestSourceBuilder {
        RestSourceBuilder::default()
    }
}

impl Source for WatchedRestSource {
    fn priority(&self) -> i64 {
        self.shared.state.priority()
    }

    fn set_priority(&self, priority: i64) {
        self.shared.state.set_priority(priority);
    }

    fn get(&self, path: &str) -> Option<Value> {
        self.shared.state.get(path)
    }

    fn snapshot(&self) -> Bag {
        self.shared.state.snapshot()
    }
}

#[async_trait]
impl ObservableSource for WatchedRestSource {
    async fn reload(&self) -> ConfigResult<bool> {
        let root = self.shared.fetch().await?;
        let timestamp = extract_timestamp(&root, &self.timestamp_path)?;

        {
            let last = self.last_seen.lock();
            // None is the never-loaded sentinel; anything beats it.
            let newer = last.map_or(true, |prev| timestamp > prev);
            if !newer {
                return Ok(false);
            }
        }

        let document = extract_document(&root, &self.shared.config_path)?;
        self.shared.state.replace(document);
        *self.last_seen.lock() = Some(timestamp);
        debug!(url = %self.shared.url, %timestamp, "applied newer REST document");
        Ok(true)
    }
}

/// GET the endpoint and parse the body as a normalized JSON bag.
async fn fetch_root(client: &reqwest::Client, url: &str) -> ConfigResult<Bag> {
    let body = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .bytes()
        .await?;
    let raw: serde_json::Value =
        serde_json::from_slice(&body).map_err(|e| ConfigError::parse("json", e.to_string()))?;
    match Value::from_json(raw) {
        Value::Mapping(bag) => Ok(bag),
        other => Err(ConfigError::invalid_document(
            "",
            format!("expected a top-level mapping, got {}", other.kind()),
        )),
    }
}

/// Extract the configuration sub-document at `path`; an empty path means
/// the whole response.
fn extract_document(root: &Bag, path: &str) -> ConfigResult<Bag> {
    if path.split('.').all(str::is_empty) {
        return Ok(root.clone());
    }
    match root.get(path) {
        None => Err(ConfigError::document_not_found(path)),
        Some(Value::Mapping(bag)) => Ok(bag),
        Some(other) => Err(ConfigError::invalid_document(
            path,
            format!("expected a mapping, got {}", other.kind()),
        )),
    }
}

/// Extract the RFC3339 timestamp at `path`.
fn extract_timestamp(root: &Bag, path: &str) -> ConfigResult<DateTime<Utc>> {
    match root.get(path) {
        None => Err(ConfigError::timestamp_not_found(path)),
        Some(Value::String(raw)) => DateTime::parse_from_rfc3339(&raw)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| ConfigError::invalid_timestamp(path, e.to_string())),
        Some(other) => Err(ConfigError::invalid_timestamp(
            path,
            format!("expected an RFC3339 string, got {}", other.kind()),
        )),
    }
}
