//! File-dependency tracing.
//!
//! A [`Tracer`] turns a set of entry files into a [`TraceGraph`]: every file
//! that would be loaded at runtime, mapped to the files that load it. The
//! emit pipeline only consumes the graph, so any tracer can be plugged in.
//!
//! Two tracers ship with the crate:
//! - [`StaticTracer`] scans sources for `import`/`require` and resolves them
//!   with Node's lookup rules.
//! - [`JsonTraceFile`] loads a graph previously written as JSON.

pub mod adapter;
pub mod cache;
pub mod exports;
pub mod file;
pub mod resolve;
pub mod scan;
pub mod static_tracer;

pub use adapter::{run_trace, TraceOutput};
pub use cache::{CacheError, CacheKind, CacheMap, CacheStore, CacheValue, TraceCache};
pub use file::JsonTraceFile;
pub use static_tracer::StaticTracer;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Everything the trace knows about one file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceRecord {
    /// Files that load this one, in discovery order.
    pub parents: IndexSet<PathBuf>,
    /// Set when the file matched an ignore rule.
    pub ignored: bool,
}

/// Trace result: file path to [`TraceRecord`], in discovery order.
///
/// JSON form: `{"<path>": {"parents": ["<path>", ...], "ignored": false}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TraceGraph {
    files: IndexMap<PathBuf, TraceRecord>,
}

impl TraceGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `path` (once), returning its record.
    pub fn record(&mut self, path: impl Into<PathBuf>) -> &mut TraceRecord {
        self.files.entry(path.into()).or_default()
    }

    /// Record `path` with `parent` as one of its parents.
    pub fn add_parent(&mut self, path: impl Into<PathBuf>, parent: impl Into<PathBuf>) {
        self.record(path).parents.insert(parent.into());
    }

    #[must_use]
    pub fn get(&self, path: &Path) -> Option<&TraceRecord> {
        self.files.get(path)
    }

    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PathBuf, &TraceRecord)> {
        self.files.iter()
    }

    /// Serialize as pretty JSON.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse the JSON form.
    ///
    /// # Errors
    /// Returns an error if the input is not a valid trace graph.
    pub fn from_json(input: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(input)
    }
}

impl<'a> IntoIterator for &'a TraceGraph {
    type Item = (&'a PathBuf, &'a TraceRecord);
    type IntoIter = indexmap::map::Iter<'a, PathBuf, TraceRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.iter()
    }
}

/// Input to a [`Tracer`].
#[derive(Debug, Clone, Default)]
pub struct TraceRequest {
    /// Absolute entry files.
    pub entries: Vec<PathBuf>,
    /// Base that relative paths in the graph are resolved against.
    pub base: PathBuf,
    /// Working directory of the traced process.
    pub cwd: PathBuf,
    /// Directories the tracer must never resolve into.
    pub exclude: Vec<PathBuf>,
}

impl TraceRequest {
    #[must_use]
    pub fn new(entries: Vec<PathBuf>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            entries,
            base: PathBuf::from("/"),
            cwd: cwd.into(),
            exclude: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_exclude(mut self, dir: impl Into<PathBuf>) -> Self {
        self.exclude.push(dir.into());
        self
    }

    /// Whether `path` lies in an excluded directory.
    #[must_use]
    pub fn is_excluded(&self, path: &Path) -> bool {
        self.exclude.iter().any(|dir| path.starts_with(dir))
    }
}

/// Tracing failure.
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("entry file not found: {}", path.display())]
    EntryNotFound { path: PathBuf },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid trace file {}: {source}", path.display())]
    InvalidTraceFile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Produces a [`TraceGraph`] from entry files.
///
/// Implementations may read from and add to the caches in `cache`; the
/// caller persists them afterwards.
pub trait Tracer: Send + Sync {
    /// Trace `request.entries`.
    ///
    /// # Errors
    /// Returns an error if tracing cannot complete.
    fn trace(&self, request: &TraceRequest, cache: &mut TraceCache)
        -> Result<TraceGraph, TraceError>;
}
