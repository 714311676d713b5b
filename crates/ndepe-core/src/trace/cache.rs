//! Persistent tracer caches.
//!
//! Three independent caches speed up repeated traces: file contents,
//! per-file import analysis and real-path resolutions. Each is a keyed map
//! whose values may nest maps and sets, so values use an explicit tagged
//! encoding:
//!
//! ```json
//! {"dataType":"Map","value":[["/a/node_modules/x/i.js",{"dataType":"Set","value":["y"]}]]}
//! ```
//!
//! Only entries keyed by a path inside a `node_modules` directory are
//! persisted; project files change between runs and are never cached.

use crate::config::CacheOptions;
use indexmap::IndexMap;
use ndepe_util::fs::atomic_write;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Number, Value};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

const DATA_TYPE: &str = "dataType";
const MAP_TAG: &str = "Map";
const SET_TAG: &str = "Set";

/// A cached value.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheValue {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<CacheValue>),
    /// Plain JSON object.
    Object(IndexMap<String, CacheValue>),
    /// Keyed map, encoded as `{"dataType":"Map","value":[[k, v], ...]}`.
    Map(IndexMap<String, CacheValue>),
    /// Ordered set, encoded as `{"dataType":"Set","value":[...]}`.
    Set(Vec<CacheValue>),
}

impl CacheValue {
    /// Build a set from values, dropping duplicates and keeping first-seen order.
    pub fn set<I: IntoIterator<Item = CacheValue>>(items: I) -> Self {
        let mut out: Vec<CacheValue> = Vec::new();
        for item in items {
            if !out.contains(&item) {
                out.push(item);
            }
        }
        Self::Set(out)
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Members of a `Set` or elements of an `Array`.
    #[must_use]
    pub fn as_members(&self) -> Option<&[CacheValue]> {
        match self {
            Self::Set(items) | Self::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Entry of a `Map` or field of an `Object`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&CacheValue> {
        match self {
            Self::Map(m) | Self::Object(m) => m.get(key),
            _ => None,
        }
    }

    /// Encode into plain JSON.
    #[must_use]
    pub fn encode(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Number(n) => Value::Number(n.clone()),
            Self::String(s) => Value::String(s.clone()),
            Self::Array(items) => Value::Array(items.iter().map(Self::encode).collect()),
            Self::Object(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.encode()))
                    .collect(),
            ),
            Self::Map(entries) => tagged(
                MAP_TAG,
                entries
                    .iter()
                    .map(|(k, v)| Value::Array(vec![Value::String(k.clone()), v.encode()]))
                    .collect(),
            ),
            Self::Set(items) => tagged(SET_TAG, items.iter().map(Self::encode).collect()),
        }
    }

    /// Decode from plain JSON, turning tagged objects back into maps and sets.
    #[must_use]
    pub fn decode(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => Self::Number(n.clone()),
            Value::String(s) => Self::String(s.clone()),
            Value::Array(items) => Self::Array(items.iter().map(Self::decode).collect()),
            Value::Object(fields) => match (fields.get(DATA_TYPE), fields.get("value")) {
                (Some(Value::String(tag)), Some(Value::Array(items))) if tag == MAP_TAG => {
                    Self::Map(items.iter().filter_map(decode_map_entry).collect())
                }
                (Some(Value::String(tag)), Some(Value::Array(items))) if tag == SET_TAG => {
                    Self::Set(items.iter().map(Self::decode).collect())
                }
                _ => Self::Object(
                    fields
                        .iter()
                        .map(|(k, v)| (k.clone(), Self::decode(v)))
                        .collect(),
                ),
            },
        }
    }
}

fn tagged(tag: &str, items: Vec<Value>) -> Value {
    let mut obj = Map::new();
    obj.insert(DATA_TYPE.to_string(), Value::String(tag.to_string()));
    obj.insert("value".to_string(), Value::Array(items));
    Value::Object(obj)
}

fn decode_map_entry(entry: &Value) -> Option<(String, CacheValue)> {
    let pair = entry.as_array()?;
    let key = match pair.first()? {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let value = pair.get(1).map_or(CacheValue::Null, CacheValue::decode);
    Some((key, value))
}

impl From<&str> for CacheValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for CacheValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl Serialize for CacheValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.encode().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for CacheValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(|v| Self::decode(&v))
    }
}

/// One cache: key (usually an absolute path) to value.
pub type CacheMap = IndexMap<String, CacheValue>;

/// The three cache kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKind {
    Analysis,
    File,
    Symlink,
}

impl CacheKind {
    pub const ALL: [CacheKind; 3] = [Self::Analysis, Self::File, Self::Symlink];

    /// File name inside the cache directory.
    #[must_use]
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Analysis => "analysis-cache.json",
            Self::File => "file-cache.json",
            Self::Symlink => "symlink-cache.json",
        }
    }

    fn enabled(self, options: &CacheOptions) -> bool {
        match self {
            Self::Analysis => options.analysis,
            Self::File => options.file,
            Self::Symlink => options.symlink,
        }
    }
}

/// Caches handed to a tracer. `None` means the cache kind is disabled.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TraceCache {
    pub analysis: Option<CacheMap>,
    pub file: Option<CacheMap>,
    pub symlink: Option<CacheMap>,
}

impl TraceCache {
    #[must_use]
    pub fn slot(&self, kind: CacheKind) -> Option<&CacheMap> {
        match kind {
            CacheKind::Analysis => self.analysis.as_ref(),
            CacheKind::File => self.file.as_ref(),
            CacheKind::Symlink => self.symlink.as_ref(),
        }
    }

    fn slot_mut(&mut self, kind: CacheKind) -> &mut Option<CacheMap> {
        match kind {
            CacheKind::Analysis => &mut self.analysis,
            CacheKind::File => &mut self.file,
            CacheKind::Symlink => &mut self.symlink,
        }
    }
}

/// Cache load/save failure.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to read cache {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid cache {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cache {} is not an encoded map", path.display())]
    NotAMap { path: PathBuf },

    #[error("failed to write cache {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Loads and saves the caches in one directory.
#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
    options: CacheOptions,
}

impl CacheStore {
    /// `dir` must already be resolved (see [`CacheOptions::resolved_dir`]).
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, options: CacheOptions) -> Self {
        Self {
            dir: dir.into(),
            options,
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn path(&self, kind: CacheKind) -> PathBuf {
        self.dir.join(kind.file_name())
    }

    /// Load every enabled cache. A missing file gives an empty cache.
    ///
    /// # Errors
    /// Returns an error if a cache file exists but cannot be read or decoded.
    pub fn load(&self) -> Result<TraceCache, CacheError> {
        let mut cache = TraceCache::default();
        for kind in CacheKind::ALL {
            if kind.enabled(&self.options) {
                *cache.slot_mut(kind) = Some(self.load_one(kind)?);
            }
        }
        Ok(cache)
    }

    fn load_one(&self, kind: CacheKind) -> Result<CacheMap, CacheError> {
        let path = self.path(kind);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(CacheMap::new()),
            Err(source) => return Err(CacheError::Read { path, source }),
        };
        let value: Value = serde_json::from_str(&content).map_err(|source| CacheError::Parse {
            path: path.clone(),
            source,
        })?;
        match CacheValue::decode(&value) {
            CacheValue::Map(map) => Ok(map),
            _ => Err(CacheError::NotAMap { path }),
        }
    }

    /// Write every enabled cache, keeping only `node_modules` entries.
    ///
    /// Returns the paths written.
    ///
    /// # Errors
    /// Returns an error if a cache file cannot be written.
    pub fn save(&self, cache: &TraceCache) -> Result<Vec<PathBuf>, CacheError> {
        let mut written = Vec::new();
        for kind in CacheKind::ALL {
            if !kind.enabled(&self.options) {
                continue;
            }
            let Some(map) = cache.slot(kind) else {
                continue;
            };
            let path = self.path(kind);
            let encoded = CacheValue::Map(retain_store_entries(map)).encode();
            atomic_write(&path, encoded.to_string().as_bytes())
                .map_err(|source| CacheError::Write {
                    path: path.clone(),
                    source,
                })?;
            written.push(path);
        }
        Ok(written)
    }
}

/// Copy of `map` without entries whose key is outside a `node_modules` directory.
#[must_use]
pub fn retain_store_entries(map: &CacheMap) -> CacheMap {
    map.iter()
        .filter(|(key, _)| key.contains("node_modules/") || key.contains("node_modules\\"))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}
