//! Breadth-first static tracer.

use super::cache::{CacheMap, CacheValue, TraceCache};
use super::resolve::{Resolution, Resolver};
use super::scan::{scan_imports, ImportKind, ImportRef, SCANNABLE_EXTENSIONS};
use super::{TraceError, TraceGraph, TraceRequest, Tracer};
use indexmap::IndexMap;
use ndepe_util::fs::{is_file, read_to_string_lossy};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

const IMPORTS_KEY: &str = "imports";
const REQUIRES_KEY: &str = "requires";

/// Follows `import`/`require` specifiers from the entries until no new
/// files are found.
///
/// Every resolved file is recorded under its real path. When a specifier
/// enters a package through `node_modules`, the package's `package.json` is
/// recorded as well, with the importing file as parent.
#[derive(Debug, Clone, Default)]
pub struct StaticTracer {
    ignore: Vec<glob::Pattern>,
}

impl StaticTracer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Files matching any pattern are recorded as ignored and not scanned.
    #[must_use]
    pub fn with_ignore(mut self, patterns: Vec<glob::Pattern>) -> Self {
        self.ignore = patterns;
        self
    }

    fn is_ignored(&self, path: &Path) -> bool {
        self.ignore.iter().any(|p| p.matches_path(path))
    }

    fn analyze(&self, file: &Path, cache: &mut TraceCache) -> Result<Vec<ImportRef>, TraceError> {
        let key = cache_key(file);

        if let Some(hit) = cache
            .analysis
            .as_ref()
            .and_then(|a| a.get(&key))
            .and_then(decode_analysis)
        {
            return Ok(hit);
        }

        let cached_source = cache
            .file
            .as_ref()
            .and_then(|f| f.get(&key))
            .and_then(CacheValue::as_str)
            .map(str::to_string);
        let source = match cached_source {
            Some(s) => s,
            None => {
                let s = read_to_string_lossy(file).map_err(|source| TraceError::Io {
                    path: file.to_path_buf(),
                    source,
                })?;
                if let Some(files) = cache.file.as_mut() {
                    files.insert(key.clone(), CacheValue::String(s.clone()));
                }
                s
            }
        };

        let imports = scan_imports(&source);
        if let Some(analysis) = cache.analysis.as_mut() {
            analysis.insert(key, encode_analysis(&imports));
        }
        Ok(imports)
    }
}

impl Tracer for StaticTracer {
    fn trace(
        &self,
        request: &TraceRequest,
        cache: &mut TraceCache,
    ) -> Result<TraceGraph, TraceError> {
        let mut graph = TraceGraph::new();
        let mut resolver = Resolver::new(request.exclude.clone());
        let mut queue: VecDeque<PathBuf> = VecDeque::new();

        for entry in &request.entries {
            let abs = request.cwd.join(entry);
            if !is_file(&abs).unwrap_or(false) {
                return Err(TraceError::EntryNotFound { path: abs });
            }
            let real = real_path_cached(&abs, cache.symlink.as_mut());
            if !graph.contains(&real) {
                graph.record(real.clone());
                queue.push_back(real);
            }
        }

        while let Some(file) = queue.pop_front() {
            if self.is_ignored(&file) {
                graph.record(file).ignored = true;
                continue;
            }
            if !is_scannable(&file) {
                continue;
            }

            let from_dir = file.parent().unwrap_or(Path::new("/")).to_path_buf();
            for import in self.analyze(&file, cache)? {
                let Resolution::Resolved(resolved) =
                    resolver.resolve(&import.specifier, &from_dir, import.kind)
                else {
                    continue;
                };

                if let Some(manifest) = resolved.package_json {
                    let real = real_path_cached(&manifest, cache.symlink.as_mut());
                    graph.add_parent(real, file.clone());
                }

                let real = real_path_cached(&resolved.path, cache.symlink.as_mut());
                let first_visit = !graph.contains(&real);
                graph.add_parent(real.clone(), file.clone());
                if first_visit {
                    queue.push_back(real);
                }
            }
        }

        Ok(graph)
    }
}

fn is_scannable(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| SCANNABLE_EXTENSIONS.contains(&e))
}

fn cache_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Canonicalize `path`, consulting and filling the symlink cache.
/// Paths that cannot be resolved are returned unchanged.
fn real_path_cached(path: &Path, cache: Option<&mut CacheMap>) -> PathBuf {
    let key = cache_key(path);
    match cache {
        Some(map) => {
            if let Some(real) = map.get(&key).and_then(CacheValue::as_str) {
                return PathBuf::from(real);
            }
            match dunce::canonicalize(path) {
                Ok(real) => {
                    map.insert(key, CacheValue::String(cache_key(&real)));
                    real
                }
                Err(_) => path.to_path_buf(),
            }
        }
        None => dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf()),
    }
}

fn encode_analysis(imports: &[ImportRef]) -> CacheValue {
    let specs = |kind: ImportKind| {
        CacheValue::set(
            imports
                .iter()
                .filter(|r| r.kind == kind)
                .map(|r| CacheValue::from(r.specifier.as_str())),
        )
    };
    let mut entry = IndexMap::new();
    entry.insert(IMPORTS_KEY.to_string(), specs(ImportKind::Import));
    entry.insert(REQUIRES_KEY.to_string(), specs(ImportKind::Require));
    CacheValue::Map(entry)
}

fn decode_analysis(value: &CacheValue) -> Option<Vec<ImportRef>> {
    let mut out = Vec::new();
    for (key, kind) in [(IMPORTS_KEY, ImportKind::Import), (REQUIRES_KEY, ImportKind::Require)] {
        let Some(members) = value.get(key).and_then(CacheValue::as_members) else {
            continue;
        };
        out.extend(
            members
                .iter()
                .filter_map(CacheValue::as_str)
                .map(|s| ImportRef::new(s, kind)),
        );
    }
    // An entry with neither key is not ours
    (value.get(IMPORTS_KEY).is_some() || value.get(REQUIRES_KEY).is_some()).then_some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn fixture() -> (tempfile::TempDir, PathBuf) {
        let dir = tempdir().unwrap();
        let root = dunce::canonicalize(dir.path()).unwrap();
        write(
            &root.join("src/index.js"),
            "const a = require('a');\nimport('./lazy.js');\nconst fs = require('fs');",
        );
        write(&root.join("src/lazy.js"), "");
        write(&root.join("node_modules/a/package.json"), r#"{"name":"a","version":"1.0.0"}"#);
        write(&root.join("node_modules/a/index.js"), "module.exports = require('./lib/x');");
        write(&root.join("node_modules/a/lib/x.js"), "");
        write(&root.join("node_modules/a/index.d.ts"), "");
        (dir, root)
    }

    #[test]
    fn test_trace_follows_imports() {
        let (_dir, root) = fixture();
        let request = TraceRequest::new(vec![root.join("src/index.js")], root.join("src"));
        let graph = StaticTracer::new()
            .trace(&request, &mut TraceCache::default())
            .unwrap();

        let entry = root.join("src/index.js");
        let a_index = root.join("node_modules/a/index.js");
        let a_manifest = root.join("node_modules/a/package.json");
        let a_x = root.join("node_modules/a/lib/x.js");

        assert!(graph.get(&entry).unwrap().parents.is_empty());
        assert!(graph.get(&a_index).unwrap().parents.contains(&entry));
        assert!(graph.get(&a_manifest).unwrap().parents.contains(&entry));
        assert!(graph.get(&a_x).unwrap().parents.contains(&a_index));
        assert!(graph.contains(&root.join("src/lazy.js")));
        assert_eq!(graph.len(), 5);
    }

    #[test]
    fn test_trace_ignore_patterns() {
        let (_dir, root) = fixture();
        let request = TraceRequest::new(vec![root.join("src/index.js")], root.join("src"));
        let tracer = StaticTracer::new()
            .with_ignore(vec![glob::Pattern::new("**/lib/*.js").unwrap()]);
        let graph = tracer.trace(&request, &mut TraceCache::default()).unwrap();

        assert!(graph.get(&root.join("node_modules/a/lib/x.js")).unwrap().ignored);
        assert!(!graph.get(&root.join("node_modules/a/index.js")).unwrap().ignored);
    }

    #[test]
    fn test_trace_missing_entry() {
        let (_dir, root) = fixture();
        let request = TraceRequest::new(vec![root.join("src/missing.js")], root.join("src"));
        let err = StaticTracer::new()
            .trace(&request, &mut TraceCache::default())
            .unwrap_err();
        assert!(matches!(err, TraceError::EntryNotFound { .. }));
    }

    #[test]
    fn test_trace_fills_and_uses_caches() {
        let (_dir, root) = fixture();
        let request = TraceRequest::new(vec![root.join("src/index.js")], root.join("src"));
        let mut cache = TraceCache {
            analysis: Some(CacheMap::new()),
            file: Some(CacheMap::new()),
            symlink: Some(CacheMap::new()),
        };
        let first = StaticTracer::new().trace(&request, &mut cache).unwrap();

        let a_index = cache_key(&root.join("node_modules/a/index.js"));
        let analysis = cache.analysis.as_ref().unwrap();
        assert_eq!(
            decode_analysis(&analysis[&a_index]).unwrap(),
            vec![ImportRef::new("./lib/x", ImportKind::Require)]
        );
        assert!(cache.file.as_ref().unwrap().contains_key(&a_index));

        // Cached analysis wins over the file on disk
        fs::write(root.join("node_modules/a/index.js"), "").unwrap();
        let second = StaticTracer::new().trace(&request, &mut cache).unwrap();
        assert_eq!(first, second);
    }
}
