//! File and directory backed sources.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use parking_lot::Mutex;
use proteus_bag::{Bag, Value};
use tracing::debug;

use crate::error::ConfigResult;
use crate::parser::Parser;
use crate::source::{ObservableSource, Source, SourceState};

/// A source backed by one file or a directory tree.
///
/// A single file is parsed with the supplied [`Parser`]. A directory is
/// walked recursively and every file merged in sorted-by-name order, so the
/// merge result is deterministic across platforms; callers that need a
/// deterministic precedence *between* files should still register distinct
/// per-file sources with explicit priorities.
///
/// # Example
///
/// ```no_run
/// use proteus_config::{FileSource, JsonParser};
/// use std::sync::Arc;
///
/// # fn main() -> Result<(), proteus_config::ConfigError> {
/// let source = FileSource::new("config.json", 10, Arc::new(JsonParser))?;
/// # Ok(())
/// # }
/// ```
pub struct FileSource {
    path: PathBuf,
    parser: Arc<dyn Parser>,
    state: SourceState,
}

impl FileSource {
    /// Load a file or directory source.
    ///
    /// # Errors
    ///
    /// Construction fails when the path cannot be read or any document in
    /// it fails to parse; a source that cannot load is never registered.
    pub fn new(
        path: impl Into<PathBuf>,
        priority: i64,
        parser: Arc<dyn Parser>,
    ) -> ConfigResult<Self> {
        let path = path.into();
        let bag = load_path(&path, parser.as_ref())?;
        debug!(path = %path.display(), format = parser.format(), "loaded file source");
        Ok(Self {
            path,
            parser,
            state: SourceState::new(priority, bag),
        })
    }

    /// The path this source reads from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Source for FileSource {
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

    fn close(&self) {
        debug!(path = %self.path.display(), "closed file source");
    }
}

/// An observable file source that re-parses when the file's modification
/// time moves strictly forward.
pub struct WatchedFileSource {
    file: FileSource,
    last_modified: Mutex<Option<SystemTime>>,
}

impl WatchedFileSource {
    /// Load the file and record its modification time.
    ///
    /// # Errors
    ///
    /// Fails when the initial load fails; see [`FileSource::new`].
    pub fn new(
        path: impl Into<PathBuf>,
        priority: i64,
        parser: Arc<dyn Parser>,
    ) -> ConfigResult<Self> {
        let file = FileSource::new(path, priority, parser)?;
        let last_modified = fs::metadata(&file.path)?.modified().ok();
        Ok(Self {
            file,
            last_modified: Mutex::new(last_modified),
        })
    }

    /// The path this source watches.
    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

impl Source for WatchedFileSource {
    fn priority(&self) -> i64 {
        self.file.priority()
    }

    fn set_priority(&self, priority: i64) {
        self.file.set_priority(priority);
    }

    fn get(&self, path: &str) -> Option<Value> {
        self.file.get(path)
    }

    fn snapshot(&self) -> Bag {
        self.file.snapshot()
    }

    fn close(&self) {
        self.file.close();
    }
}

#[async_trait]
impl ObservableSource for WatchedFileSource {
    async fn reload(&self) -> ConfigResult<bool> {
        let modified = fs::metadata(&self.file.path)?.modified()?;
        let mut last = self.last_modified.lock();
        // None is the never-loaded sentinel; anything beats it.
        let newer = last.map_or(true, |prev| modified > prev);
        if !newer {
            return Ok(false);
        }

        let bag = load_path(&self.file.path, self.file.parser.as_ref())?;
        self.file.state.replace(bag);
        *last = Some(modified);
        debug!(path = %self.file.path.display(), "re-parsed watched file");
        Ok(true)
    }
}

/// Parse a single file, or recursively merge every file under a directory.
fn load_path(path: &Path, parser: &dyn Parser) -> ConfigResult<Bag> {
    let metadata = fs::metadata(path)?;
    if metadata.is_dir() {
        load_dir(path, parser)
    } else {
        parser.parse(&fs::read(path)?)
    }
}

fn load_dir(dir: &Path, parser: &dyn Parser) -> ConfigResult<Bag> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)?
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .map(|e| e.path())
        .collect();
    // Sorted by name so the merge order does not depend on filesystem
    // enumeration order.
    entries.sort();

    let mut merged = Bag::new();
    for entry in entries {
        if entry.is_dir() {
            merged.merge(&load_dir(&entry, parser)?);
        } else {
            merged.merge(&parser.parse(&fs::read(&entry)?)?);
        }
    }
    Ok(merged)
}
