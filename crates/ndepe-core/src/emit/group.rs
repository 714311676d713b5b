//! Grouping classified files into package versions.

use super::classify::ClassifiedFile;
use super::options::CopyWholePackage;
use super::MAX_CONCURRENT_IO;
use crate::pkg::error::PkgError;
use crate::pkg::location::PackageId;
use crate::pkg::manifest::{manifest_version, read_manifest_async, stand_in_manifest};
use futures::stream::{self, StreamExt};
use indexmap::{IndexMap, IndexSet};
use ndepe_util::fs::read_dir_recursive;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// One version of one package.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageVersionEntry {
    pub manifest: Map<String, Value>,
    /// First install location seen for this version.
    pub install_root: PathBuf,
    /// Absolute source path to path relative to the file's own install root.
    pub files: IndexMap<PathBuf, PathBuf>,
    /// Any contributing file was loaded from project code.
    pub is_direct_dependency: bool,
}

/// A package and every version of it found in the trace.
#[derive(Debug, Clone, PartialEq)]
pub struct TracedPackage {
    pub name: String,
    /// Version to entry, in first-seen order. Never empty.
    pub versions: IndexMap<String, PackageVersionEntry>,
}

impl TracedPackage {
    /// More than one version must coexist.
    #[must_use]
    pub fn is_conflicted(&self) -> bool {
        self.versions.len() > 1
    }
}

/// Package and version of a classified file, plus the files loading it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOwner {
    pub id: PackageId,
    pub parents: Vec<PathBuf>,
}

/// Every traced package, plus the owner of every classified file.
#[derive(Debug, Clone, Default)]
pub struct PackageSet {
    pub packages: IndexMap<String, TracedPackage>,
    pub owners: HashMap<PathBuf, FileOwner>,
    /// Destinations already taken, per version: at most one source per sub-path.
    claimed: HashSet<(PackageId, PathBuf)>,
}

impl PackageSet {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&TracedPackage> {
        self.packages.get(name)
    }

    #[must_use]
    pub fn is_conflicted(&self, name: &str) -> bool {
        self.get(name).is_some_and(TracedPackage::is_conflicted)
    }

    /// Number of (package, version) pairs.
    #[must_use]
    pub fn version_count(&self) -> usize {
        self.packages.values().map(|p| p.versions.len()).sum()
    }

    /// Fold classified files, in order, into packages.
    ///
    /// `manifests` maps install roots to their parsed manifest; roots
    /// missing from it get a stand-in `{name, version: "0.0.0"}`. Returns
    /// the set and the (name, version, install root) triples whose whole
    /// directory is requested by `copy_whole`.
    #[must_use]
    pub fn fold(
        files: Vec<ClassifiedFile>,
        manifests: &HashMap<PathBuf, Map<String, Value>>,
        copy_whole: Option<&CopyWholePackage>,
    ) -> (Self, IndexSet<(String, String, PathBuf)>) {
        let mut set = Self::default();
        let mut whole = IndexSet::new();

        for file in files {
            let ClassifiedFile {
                path,
                parents,
                is_direct_dependency,
                location,
            } = file;

            let manifest = manifests
                .get(&location.install_root)
                .cloned()
                .unwrap_or_else(|| stand_in_manifest(&location.name));
            let version = manifest_version(&manifest).to_string();

            let package = set
                .packages
                .entry(location.name.clone())
                .or_insert_with(|| TracedPackage {
                    name: location.name.clone(),
                    versions: IndexMap::new(),
                });
            let entry = package
                .versions
                .entry(version.clone())
                .or_insert_with(|| PackageVersionEntry {
                    manifest: manifest.clone(),
                    install_root: location.install_root.clone(),
                    files: IndexMap::new(),
                    is_direct_dependency: false,
                });
            entry.is_direct_dependency |= is_direct_dependency;

            if copy_whole.is_some_and(|f| f(&location.name, &manifest)) {
                whole.insert((
                    location.name.clone(),
                    version.clone(),
                    location.install_root.clone(),
                ));
            }

            let id = PackageId::new(location.name, version);

            // Files merge by version, not by install location; the first
            // source seen for a sub-path wins
            if path.starts_with(&location.install_root)
                && manifest_version(&entry.manifest) == id.version
                && set.claimed.insert((id.clone(), location.sub_path.clone()))
            {
                entry.files.insert(path.clone(), location.sub_path);
            }

            set.owners.insert(path, FileOwner { id, parents });
        }

        (set, whole)
    }

    /// Add every regular file under `root` to the given version.
    pub fn add_whole_directory(&mut self, name: &str, version: &str, root: &Path, files: Vec<PathBuf>) {
        let Some(entry) = self
            .packages
            .get_mut(name)
            .and_then(|p| p.versions.get_mut(version))
        else {
            return;
        };
        let id = PackageId::new(name, version);
        for file in files {
            if let Ok(sub_path) = file.strip_prefix(root) {
                let sub_path = sub_path.to_path_buf();
                if self.claimed.insert((id.clone(), sub_path.clone())) {
                    entry.files.insert(file, sub_path);
                }
            }
        }
    }
}

/// Group classified files into packages.
///
/// Manifests are read once per install root, concurrently. Whole-package
/// expansion walks each requested install root once.
///
/// # Errors
/// Returns `PKG_CLASSIFY_FAILED` if a whole-package directory cannot be read.
pub async fn group_packages(
    files: Vec<ClassifiedFile>,
    copy_whole: Option<&CopyWholePackage>,
) -> Result<PackageSet, PkgError> {
    let roots: IndexSet<PathBuf> = files
        .iter()
        .map(|f| f.location.install_root.clone())
        .collect();

    let manifests: HashMap<PathBuf, Map<String, Value>> = stream::iter(roots)
        .map(|root| async move {
            let manifest = read_manifest_async(&root).await.ok();
            (root, manifest)
        })
        .buffer_unordered(MAX_CONCURRENT_IO)
        .filter_map(|(root, manifest)| async move { manifest.map(|m| (root, m)) })
        .collect()
        .await;

    let (mut set, whole) = PackageSet::fold(files, &manifests, copy_whole);

    for (name, version, root) in whole {
        let walk_root = root.clone();
        let listed = tokio::task::spawn_blocking(move || read_dir_recursive(&walk_root, None))
            .await?
            .map_err(|e| {
                PkgError::classify_failed(format!(
                    "Failed to read package directory {}: {e}",
                    root.display()
                ))
            })?;
        set.add_whole_directory(&name, &version, &root, listed);
    }

    Ok(set)
}
