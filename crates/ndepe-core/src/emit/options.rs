//! Emit options and hooks.

use crate::config::{compile_patterns, CacheOptions, NdepeConfig, CONFIG_FILE};
use crate::error::Error;
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Decides whether a discovered script is an entry.
pub type EntryFilter = Arc<dyn Fn(&Path) -> bool + Send + Sync>;

/// Rewrites the synthesized production manifest before it is written.
pub type ManifestHook = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Decides, from a package name and manifest, whether the whole package
/// directory is copied instead of only traced files.
pub type CopyWholePackage = Arc<dyn Fn(&str, &Map<String, Value>) -> bool + Send + Sync>;

/// Inputs of one emit run.
#[derive(Clone)]
pub struct EmitOptions {
    /// Project root; its `node_modules` is the dependency store read from.
    pub app_dir: PathBuf,
    /// Directory scanned for entries; `node_modules/` and `package.json`
    /// are generated inside it.
    pub source_dir: PathBuf,
    /// Extra entries (relative paths resolve against `app_dir`).
    pub include_entries: Vec<PathBuf>,
    pub entry_filter: Option<EntryFilter>,
    pub modify_package_json: Option<ManifestHook>,
    pub copy_whole_package: Option<CopyWholePackage>,
    /// Tracer caches.
    pub cache: CacheOptions,
}

impl EmitOptions {
    #[must_use]
    pub fn new(app_dir: impl Into<PathBuf>, source_dir: impl Into<PathBuf>) -> Self {
        Self {
            app_dir: app_dir.into(),
            source_dir: source_dir.into(),
            include_entries: Vec::new(),
            entry_filter: None,
            modify_package_json: None,
            copy_whole_package: None,
            cache: CacheOptions::default(),
        }
    }

    #[must_use]
    pub fn include_entries(mut self, entries: Vec<PathBuf>) -> Self {
        self.include_entries = entries;
        self
    }

    #[must_use]
    pub fn entry_filter(mut self, filter: impl Fn(&Path) -> bool + Send + Sync + 'static) -> Self {
        self.entry_filter = Some(Arc::new(filter));
        self
    }

    #[must_use]
    pub fn modify_package_json(
        mut self,
        hook: impl Fn(Value) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.modify_package_json = Some(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn copy_whole_package(
        mut self,
        predicate: impl Fn(&str, &Map<String, Value>) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.copy_whole_package = Some(Arc::new(predicate));
        self
    }

    #[must_use]
    pub fn cache(mut self, cache: CacheOptions) -> Self {
        self.cache = cache;
        self
    }

    /// Build options from a loaded config file.
    ///
    /// Entry excludes become the entry filter, `copyWholePackages` globs
    /// become the copy predicate and `manifest` fields are merged into the
    /// synthesized manifest.
    ///
    /// # Errors
    /// Returns an error if `sourceDir` is missing or a glob is invalid.
    pub fn from_config(app_dir: &Path, config: &NdepeConfig) -> Result<Self, Error> {
        let source_dir = config.source_dir.as_ref().ok_or(Error::MissingSourceDir {
            config_file: CONFIG_FILE,
        })?;

        let mut options = Self::new(app_dir, app_dir.join(source_dir))
            .include_entries(config.include_entries.clone())
            .cache(config.cache.clone());

        let excludes = compile_patterns(&config.exclude_entries)?;
        if !excludes.is_empty() {
            options = options.entry_filter(move |path| !excludes.iter().any(|p| p.matches_path(path)));
        }

        let whole = compile_patterns(&config.copy_whole_packages)?;
        if !whole.is_empty() {
            options = options.copy_whole_package(move |name, _| whole.iter().any(|p| p.matches(name)));
        }

        if !config.manifest.is_empty() {
            let extra = config.manifest.clone();
            options = options.modify_package_json(move |mut manifest| {
                if let Value::Object(map) = &mut manifest {
                    for (key, value) in &extra {
                        map.insert(key.clone(), value.clone());
                    }
                }
                manifest
            });
        }

        Ok(options)
    }
}

impl fmt::Debug for EmitOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmitOptions")
            .field("app_dir", &self.app_dir)
            .field("source_dir", &self.source_dir)
            .field("include_entries", &self.include_entries)
            .field("entry_filter", &self.entry_filter.is_some())
            .field("modify_package_json", &self.modify_package_json.is_some())
            .field("copy_whole_package", &self.copy_whole_package.is_some())
            .field("cache", &self.cache)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_config_requires_source_dir() {
        let err = EmitOptions::from_config(Path::new("/app"), &NdepeConfig::default()).unwrap_err();
        assert!(matches!(err, Error::MissingSourceDir { .. }));
    }

    #[test]
    fn test_from_config_hooks() {
        let config: NdepeConfig = serde_json::from_value(json!({
            "sourceDir": "dist",
            "excludeEntries": ["**/*.test.js"],
            "copyWholePackages": ["@prisma/*"],
            "manifest": { "engines": { "node": ">=18" } }
        }))
        .unwrap();

        let options = EmitOptions::from_config(Path::new("/app"), &config).unwrap();
        assert_eq!(options.source_dir, PathBuf::from("/app/dist"));

        let filter = options.entry_filter.as_ref().unwrap();
        assert!(filter(Path::new("/app/dist/index.js")));
        assert!(!filter(Path::new("/app/dist/a.test.js")));

        let whole = options.copy_whole_package.as_ref().unwrap();
        assert!(whole("@prisma/client", &Map::new()));
        assert!(!whole("prisma", &Map::new()));

        let hook = options.modify_package_json.as_ref().unwrap();
        let out = hook(json!({ "name": "x-prod" }));
        assert_eq!(out["engines"]["node"], ">=18");
        assert_eq!(out["name"], "x-prod");
    }

    #[test]
    fn test_debug_hides_closures() {
        let options = EmitOptions::new("/app", "/app/dist").entry_filter(|_| true);
        let debug = format!("{options:?}");
        assert!(debug.contains("entry_filter: true"));
        assert!(debug.contains("copy_whole_package: false"));
    }
}
