//! Configuration file discovery and parsing.
//!
//! Loads `ndepe.config.json` from the application directory:
//!
//! ```json
//! {
//!   "sourceDir": "dist",
//!   "includeEntries": ["scripts/worker.js"],
//!   "excludeEntries": ["**/*.test.js"],
//!   "copyWholePackages": ["@prisma/*"],
//!   "ignore": ["**/*.d.ts"],
//!   "cache": { "dir": ".ndepe/cache", "analysis": true, "file": true, "symlink": true },
//!   "manifest": { "engines": { "node": ">=18" } }
//! }
//! ```

use crate::error::Error;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Config file name looked up in the application directory.
pub const CONFIG_FILE: &str = "ndepe.config.json";

/// Default cache directory, relative to the application directory.
pub const DEFAULT_CACHE_DIR: &str = ".ndepe/cache";

/// Configuration loaded from `ndepe.config.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NdepeConfig {
    /// Directory whose scripts are the entries; `node_modules/` and
    /// `package.json` are generated inside it. Relative to the app directory.
    pub source_dir: Option<PathBuf>,
    /// Extra entry files not found by scanning the source directory.
    pub include_entries: Vec<PathBuf>,
    /// Glob patterns excluding discovered entry files.
    pub exclude_entries: Vec<String>,
    /// Glob patterns on package names whose whole directory is copied.
    pub copy_whole_packages: Vec<String>,
    /// Glob patterns for files the tracer records as ignored.
    pub ignore: Vec<String>,
    /// Tracer cache settings.
    pub cache: CacheOptions,
    /// Fields merged into the synthesized production manifest.
    pub manifest: Map<String, Value>,
}

/// Tracer cache settings. Each cache kind is enabled separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheOptions {
    /// Cache directory (relative paths resolve against the app directory).
    pub dir: PathBuf,
    /// Persist per-file import analysis.
    pub analysis: bool,
    /// Persist file contents.
    pub file: bool,
    /// Persist real-path resolutions.
    pub symlink: bool,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_CACHE_DIR),
            analysis: false,
            file: false,
            symlink: false,
        }
    }
}

impl CacheOptions {
    /// Enable every cache kind in the given directory.
    #[must_use]
    pub fn all(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            analysis: true,
            file: true,
            symlink: true,
        }
    }

    /// Whether any cache kind is enabled.
    #[must_use]
    pub fn any_enabled(&self) -> bool {
        self.analysis || self.file || self.symlink
    }

    /// The cache directory resolved against `app_dir`.
    #[must_use]
    pub fn resolved_dir(&self, app_dir: &Path) -> PathBuf {
        if self.dir.is_absolute() {
            self.dir.clone()
        } else {
            app_dir.join(&self.dir)
        }
    }
}

/// Compile a list of glob patterns.
///
/// # Errors
/// Returns an error naming the first invalid pattern.
pub fn compile_patterns(patterns: &[String]) -> Result<Vec<glob::Pattern>, Error> {
    patterns
        .iter()
        .map(|p| {
            glob::Pattern::new(p).map_err(|source| Error::InvalidPattern {
                pattern: p.clone(),
                source,
            })
        })
        .collect()
}

/// Find the config file in the given root directory.
#[must_use]
pub fn find_config_file(root: &Path) -> Option<PathBuf> {
    let path = root.join(CONFIG_FILE);
    path.is_file().then_some(path)
}

/// Load configuration from the given root directory.
///
/// If `config_path` is `Some`, that file must exist. Otherwise the default
/// file is auto-discovered and `Ok(None)` is returned when it is absent.
///
/// # Errors
/// Returns an error if the file cannot be read or parsed.
pub fn load_config(
    root: &Path,
    config_path: Option<&Path>,
) -> Result<Option<(PathBuf, NdepeConfig)>, Error> {
    let path = match config_path {
        Some(p) => {
            let abs = if p.is_absolute() {
                p.to_path_buf()
            } else {
                root.join(p)
            };
            if !abs.is_file() {
                return Err(Error::ConfigNotFound { path: abs });
            }
            abs
        }
        None => match find_config_file(root) {
            Some(p) => p,
            None => return Ok(None),
        },
    };

    let content = std::fs::read_to_string(&path).map_err(|source| Error::ConfigRead {
        path: path.clone(),
        source,
    })?;
    let config: NdepeConfig =
        serde_json::from_str(&content).map_err(|source| Error::ConfigParse {
            path: path.clone(),
            source,
        })?;

    Ok(Some((path, config)))
}
