//! `package.json` reading and rewriting.

use super::location::{is_path_segment, is_valid_package_name};
use serde_json::{Map, Value};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Manifest file name.
pub const PACKAGE_JSON: &str = "package.json";

/// Version used when a manifest has none.
pub const FALLBACK_VERSION: &str = "0.0.0";

/// Failure to read a package manifest. Callers usually substitute a
/// stand-in manifest instead of failing.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("package.json not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid JSON in {}: {source}", path.display())]
    Invalid {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{} is not a JSON object", path.display())]
    NotAnObject { path: PathBuf },
}

/// Read and parse `<dir>/package.json`.
///
/// # Errors
/// Returns an error if the file is missing, unreadable, or not a JSON object.
pub fn read_manifest(dir: &Path) -> Result<Map<String, Value>, ManifestError> {
    let path = dir.join(PACKAGE_JSON);
    let content = std::fs::read_to_string(&path).map_err(|source| read_error(path.clone(), source))?;
    parse_manifest(path, &content)
}

/// Async variant of [`read_manifest`].
///
/// # Errors
/// Same as [`read_manifest`].
pub async fn read_manifest_async(dir: &Path) -> Result<Map<String, Value>, ManifestError> {
    let path = dir.join(PACKAGE_JSON);
    let content = tokio::fs::read_to_string(&path)
        .await
        .map_err(|source| read_error(path.clone(), source))?;
    parse_manifest(path, &content)
}

fn read_error(path: PathBuf, source: io::Error) -> ManifestError {
    if source.kind() == io::ErrorKind::NotFound {
        ManifestError::NotFound { path }
    } else {
        ManifestError::Read { path, source }
    }
}

fn parse_manifest(path: PathBuf, content: &str) -> Result<Map<String, Value>, ManifestError> {
    match serde_json::from_str::<Value>(content) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ManifestError::NotAnObject { path }),
        Err(source) => Err(ManifestError::Invalid { path, source }),
    }
}

/// `{ "name": <name>, "version": "0.0.0" }`, used when a package's manifest
/// cannot be read.
#[must_use]
pub fn stand_in_manifest(name: &str) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("name".to_string(), Value::String(name.to_string()));
    map.insert(
        "version".to_string(),
        Value::String(FALLBACK_VERSION.to_string()),
    );
    map
}

/// The `name` field, if it can be laid out under `node_modules`.
#[must_use]
pub fn manifest_name(manifest: &Map<String, Value>) -> Option<&str> {
    manifest
        .get("name")
        .and_then(Value::as_str)
        .filter(|n| is_valid_package_name(n))
}

/// The `version` field, or `"0.0.0"` when absent, not a string, or not
/// usable as a single directory name.
#[must_use]
pub fn manifest_version(manifest: &Map<String, Value>) -> &str {
    manifest
        .get("version")
        .and_then(Value::as_str)
        .filter(|v| is_path_segment(v))
        .unwrap_or(FALLBACK_VERSION)
}

/// Replace `exports` with `publishConfig.exports` when the latter exists.
pub fn apply_publish_exports(manifest: &mut Map<String, Value>) {
    let publish_exports = manifest
        .get("publishConfig")
        .and_then(|pc| pc.get("exports"))
        .filter(|e| !e.is_null())
        .cloned();

    if let Some(exports) = publish_exports {
        manifest.insert("exports".to_string(), exports);
    }
}

/// Serialize a manifest as 2-space indented JSON.
///
/// # Errors
/// Returns an error if serialization fails.
pub fn to_pretty_json(manifest: &Map<String, Value>) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(manifest)
}
