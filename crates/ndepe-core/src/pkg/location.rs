//! Package identities and install locations.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Name of the managed dependency store directory.
pub const NODE_MODULES: &str = "node_modules";

/// Directory (inside the output `node_modules`) holding isolated installs.
pub const ISOLATED_DIR: &str = ".ndepe";

/// A package name at a version, written `name@version`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackageId {
    pub name: String,
    pub version: String,
}

impl PackageId {
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// Where a file sits inside the package that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageLocation {
    /// Absolute directory of the package (the one holding its `package.json`).
    pub install_root: PathBuf,
    /// Package name, `@scope/name` for scoped packages.
    pub name: String,
    /// Path of the file relative to `install_root`.
    pub sub_path: PathBuf,
}

impl PackageLocation {
    /// Parse a path inside a `node_modules` tree.
    ///
    /// The path is split at its last `node_modules` segment:
    /// `/a/node_modules/.pnpm/x@1/node_modules/@s/x/lib/i.js` gives
    /// install root `/a/node_modules/.pnpm/x@1/node_modules/@s/x`, name `@s/x`
    /// and sub-path `lib/i.js`. Returns `None` when the path has no store
    /// segment, names a dot-directory, or ends at the package directory itself.
    #[must_use]
    pub fn from_store_path(path: &Path) -> Option<Self> {
        let components: Vec<Component<'_>> = path.components().collect();
        let store_idx = components
            .iter()
            .rposition(|c| c.as_os_str() == NODE_MODULES)?;

        let first = normal_str(components.get(store_idx + 1)?)?;
        if first.starts_with('.') {
            return None;
        }

        let (name, name_len) = if first.starts_with('@') {
            let second = normal_str(components.get(store_idx + 2)?)?;
            (format!("{first}/{second}"), 2)
        } else {
            (first.to_string(), 1)
        };

        let root_end = store_idx + 1 + name_len;
        if root_end >= components.len() {
            return None;
        }

        let install_root: PathBuf = components[..root_end].iter().collect();
        let sub_path: PathBuf = components[root_end..].iter().collect();

        Some(Self {
            install_root,
            name,
            sub_path,
        })
    }

    /// Build a location from a package directory found by manifest lookup.
    ///
    /// Returns `None` if `file` is not inside `install_root`.
    #[must_use]
    pub fn from_package_dir(install_root: &Path, name: &str, file: &Path) -> Option<Self> {
        let sub_path = file.strip_prefix(install_root).ok()?;
        if sub_path.as_os_str().is_empty() {
            return None;
        }
        Some(Self {
            install_root: install_root.to_path_buf(),
            name: name.to_string(),
            sub_path: sub_path.to_path_buf(),
        })
    }
}

fn normal_str<'a>(component: &Component<'a>) -> Option<&'a str> {
    match component {
        Component::Normal(s) => s.to_str(),
        _ => None,
    }
}

/// Exactly one normal path component: no separators, `.` or `..`.
#[must_use]
pub fn is_path_segment(s: &str) -> bool {
    if s.contains(['/', '\\']) {
        return false;
    }
    let mut components = Path::new(s).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// A package name that maps to `<name>` or `@scope/<name>` under `node_modules`.
#[must_use]
pub fn is_valid_package_name(name: &str) -> bool {
    match name.split_once('/') {
        Some((scope, rest)) => {
            scope.len() > 1
                && scope.starts_with('@')
                && is_path_segment(scope)
                && is_path_segment(rest)
                && !rest.starts_with('.')
        }
        None => is_path_segment(name) && !name.starts_with(['.', '@']),
    }
}

/// Whether `path` goes through a `node_modules` directory.
#[must_use]
pub fn has_store_segment(path: &Path) -> bool {
    path.components().any(|c| c.as_os_str() == NODE_MODULES)
}

/// `.ndepe/<name>@<version>/node_modules`, relative to the output `node_modules`.
#[must_use]
pub fn isolated_node_modules(id: &PackageId) -> PathBuf {
    Path::new(ISOLATED_DIR).join(id.to_string()).join(NODE_MODULES)
}

/// `.ndepe/<name>@<version>/node_modules/<name>`, relative to the output `node_modules`.
#[must_use]
pub fn isolated_package_dir(id: &PackageId) -> PathBuf {
    isolated_node_modules(id).join(&id.name)
}
