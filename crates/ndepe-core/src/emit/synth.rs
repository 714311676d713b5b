//! Production manifest synthesis.

use super::hoist::PackagePlan;
use crate::pkg::manifest::{read_manifest, FALLBACK_VERSION};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

/// Project name used when the project manifest has none.
pub const DEFAULT_PROJECT_NAME: &str = "ndepe-project";

const PROD_SUFFIX: &str = "-prod";

/// The project's own manifest, as found on disk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectManifest {
    pub fields: Map<String, Value>,
    /// Read from the output directory, i.e. written by an earlier run.
    pub from_output: bool,
}

/// Read the project manifest from `app_dir`, then from `source_dir`.
///
/// Falls back to an empty manifest.
#[must_use]
pub fn read_project_manifest(app_dir: &Path, source_dir: &Path) -> ProjectManifest {
    if let Ok(fields) = read_manifest(app_dir) {
        return ProjectManifest {
            fields,
            from_output: false,
        };
    }
    read_manifest(source_dir)
        .map(|fields| ProjectManifest {
            fields,
            from_output: true,
        })
        .unwrap_or_default()
}

/// Build the production manifest.
///
/// `dependencies` holds one entry per package, at its canonical version,
/// sorted by name. The `-prod` suffix is always appended, except to a name
/// read back from a manifest this tool wrote.
#[must_use]
pub fn synthesize_manifest(project: &ProjectManifest, plans: &[PackagePlan]) -> Value {
    let name = non_empty_str(&project.fields, "name").unwrap_or(DEFAULT_PROJECT_NAME);
    let name = if project.from_output {
        name.strip_suffix(PROD_SUFFIX).unwrap_or(name)
    } else {
        name
    };
    let version = non_empty_str(&project.fields, "version").unwrap_or(FALLBACK_VERSION);

    let dependencies: BTreeMap<&str, &str> = plans
        .iter()
        .filter_map(|plan| Some((plan.name(), plan.canonical_version()?)))
        .collect();

    json!({
        "name": format!("{name}{PROD_SUFFIX}"),
        "version": version,
        "private": true,
        "dependencies": dependencies,
    })
}

fn non_empty_str<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    map.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}
