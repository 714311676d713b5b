//! Node-style module resolution for the static tracer.
//!
//! Resolves relative, absolute, `#`-imports and bare specifiers the way
//! Node's CommonJS/ESM loaders would find them on disk. Excluded directories
//! (the emit output) are never entered.

use super::exports::{conditions_for, resolve_exports, resolve_imports};
use super::scan::ImportKind;
use crate::pkg::location::NODE_MODULES;
use crate::pkg::manifest::PACKAGE_JSON;
use ndepe_util::fs::is_file;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Extensions probed after the exact path.
pub const PROBE_EXTENSIONS: &[&str] = &["js", "json", "node", "mjs", "cjs"];

/// Node builtin modules (also reachable with the `node:` prefix).
pub const NODE_BUILTINS: &[&str] = &[
    "assert", "async_hooks", "buffer", "child_process", "cluster", "console", "constants",
    "crypto", "dgram", "diagnostics_channel", "dns", "domain", "events", "fs", "http", "http2",
    "https", "inspector", "module", "net", "os", "path", "perf_hooks", "process", "punycode",
    "querystring", "readline", "repl", "stream", "string_decoder", "sys", "timers", "tls",
    "trace_events", "tty", "url", "util", "v8", "vm", "wasi", "worker_threads", "zlib",
];

/// A successfully resolved module file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// The module file (not yet real-path resolved).
    pub path: PathBuf,
    /// Manifest of the package entered through `node_modules`, if any.
    pub package_json: Option<PathBuf>,
}

/// Outcome of resolving one specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(Resolved),
    /// A Node builtin; not followed.
    Builtin,
    /// URL-like or data specifiers; not followed.
    Unsupported,
    NotFound,
}

/// Whether `specifier` names a Node builtin.
#[must_use]
pub fn is_builtin(specifier: &str) -> bool {
    if specifier.starts_with("node:") {
        return true;
    }
    let head = specifier.split('/').next().unwrap_or(specifier);
    NODE_BUILTINS.contains(&head)
}

/// Split a bare specifier into package name and subpath (`"."` or `"./x"`).
#[must_use]
pub fn split_bare(specifier: &str) -> Option<(&str, String)> {
    let name_end = if specifier.starts_with('@') {
        let first = specifier.find('/')?;
        specifier[first + 1..]
            .find('/')
            .map_or(specifier.len(), |second| first + 1 + second)
    } else {
        specifier.find('/').unwrap_or(specifier.len())
    };

    let name = &specifier[..name_end];
    if name.is_empty() || name.ends_with('/') {
        return None;
    }
    let rest = &specifier[name_end..];
    let subpath = if rest.is_empty() {
        ".".to_string()
    } else {
        format!(".{rest}")
    };
    Some((name, subpath))
}

/// Module resolver with a per-run `package.json` cache.
#[derive(Debug, Default)]
pub struct Resolver {
    exclude: Vec<PathBuf>,
    manifests: HashMap<PathBuf, Option<Arc<Value>>>,
}

impl Resolver {
    #[must_use]
    pub fn new(exclude: Vec<PathBuf>) -> Self {
        Self {
            exclude,
            manifests: HashMap::new(),
        }
    }

    /// Resolve `specifier` as imported from a file in `from_dir`.
    pub fn resolve(&mut self, specifier: &str, from_dir: &Path, kind: ImportKind) -> Resolution {
        if specifier.is_empty() {
            return Resolution::NotFound;
        }
        if specifier.contains("://") || specifier.starts_with("data:") {
            return Resolution::Unsupported;
        }
        if is_builtin(specifier) {
            return Resolution::Builtin;
        }

        if specifier.starts_with('#') {
            return self.resolve_hash_import(specifier, from_dir, kind);
        }

        if is_path_specifier(specifier) {
            let base = from_dir.join(specifier);
            return match self.load_file_or_directory(&base) {
                Some(path) => Resolution::Resolved(Resolved {
                    path,
                    package_json: None,
                }),
                None => Resolution::NotFound,
            };
        }

        self.resolve_bare(specifier, from_dir, kind)
    }

    fn resolve_hash_import(&mut self, specifier: &str, from_dir: &Path, kind: ImportKind) -> Resolution {
        let Some(pkg_json_path) = ndepe_util::path::find_up(from_dir, PACKAGE_JSON) else {
            return Resolution::NotFound;
        };
        let Some(pkg_dir) = pkg_json_path.parent().map(Path::to_path_buf) else {
            return Resolution::NotFound;
        };
        let Some(manifest) = self.manifest(&pkg_dir) else {
            return Resolution::NotFound;
        };
        let Some(imports) = manifest.get("imports") else {
            return Resolution::NotFound;
        };

        match resolve_imports(imports, specifier, conditions_for(kind)) {
            Some(target) if target.starts_with("./") => {
                let path = pkg_dir.join(&target[2..]);
                if file_exists(&path) {
                    Resolution::Resolved(Resolved {
                        path,
                        package_json: None,
                    })
                } else {
                    Resolution::NotFound
                }
            }
            Some(bare) => self.resolve(&bare, &pkg_dir, kind),
            None => Resolution::NotFound,
        }
    }

    fn resolve_bare(&mut self, specifier: &str, from_dir: &Path, kind: ImportKind) -> Resolution {
        let Some((name, subpath)) = split_bare(specifier) else {
            return Resolution::NotFound;
        };

        for dir in from_dir.ancestors() {
            if dir.file_name().is_some_and(|n| n == NODE_MODULES) {
                continue;
            }
            let pkg_dir = dir.join(NODE_MODULES).join(name);
            if self.is_excluded(&pkg_dir) || !pkg_dir.is_dir() {
                continue;
            }

            let manifest_path = pkg_dir.join(PACKAGE_JSON);
            let package_json = file_exists(&manifest_path).then_some(manifest_path);
            let manifest = self.manifest(&pkg_dir);

            let found = match manifest.as_ref().and_then(|m| m.get("exports")) {
                Some(exports) => resolve_exports(exports, &subpath, conditions_for(kind))
                    .map(|target| pkg_dir.join(target.trim_start_matches("./")))
                    .filter(|path| file_exists(path)),
                None if subpath == "." => self.load_directory(&pkg_dir),
                None => self.load_file_or_directory(&pkg_dir.join(&subpath[2..])),
            };

            // The nearest package directory decides; Node does not keep looking
            return match found {
                Some(path) => Resolution::Resolved(Resolved { path, package_json }),
                None => Resolution::NotFound,
            };
        }

        Resolution::NotFound
    }

    fn load_file_or_directory(&mut self, base: &Path) -> Option<PathBuf> {
        if self.is_excluded(base) {
            return None;
        }
        load_file(base).or_else(|| self.load_directory(base))
    }

    fn load_directory(&mut self, dir: &Path) -> Option<PathBuf> {
        if !dir.is_dir() {
            return None;
        }
        let main = self
            .manifest(dir)
            .and_then(|m| m.get("main").and_then(Value::as_str).map(str::to_string))
            .filter(|m| !m.is_empty());

        if let Some(main) = main {
            let main_path = dir.join(main);
            if let Some(found) = load_file(&main_path).or_else(|| load_index(&main_path)) {
                return Some(found);
            }
        }
        load_index(dir)
    }

    fn manifest(&mut self, pkg_dir: &Path) -> Option<Arc<Value>> {
        self.manifests
            .entry(pkg_dir.to_path_buf())
            .or_insert_with(|| {
                let content = std::fs::read_to_string(pkg_dir.join(PACKAGE_JSON)).ok()?;
                serde_json::from_str::<Value>(&content).ok().map(Arc::new)
            })
            .clone()
    }

    fn is_excluded(&self, path: &Path) -> bool {
        self.exclude.iter().any(|dir| path.starts_with(dir))
    }
}

fn is_path_specifier(specifier: &str) -> bool {
    specifier == "."
        || specifier == ".."
        || specifier.starts_with("./")
        || specifier.starts_with("../")
        || Path::new(specifier).is_absolute()
}

fn file_exists(path: &Path) -> bool {
    is_file(path).unwrap_or(false)
}

fn with_extension_appended(base: &Path, ext: &str) -> PathBuf {
    let mut os = base.as_os_str().to_owned();
    os.push(".");
    os.push(ext);
    PathBuf::from(os)
}

fn load_file(base: &Path) -> Option<PathBuf> {
    if file_exists(base) {
        return Some(base.to_path_buf());
    }
    PROBE_EXTENSIONS
        .iter()
        .map(|ext| with_extension_appended(base, ext))
        .find(|candidate| file_exists(candidate))
}

fn load_index(dir: &Path) -> Option<PathBuf> {
    load_file(&dir.join("index"))
}
