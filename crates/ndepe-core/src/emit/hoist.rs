//! Version resolution and hoisting.
//!
//! A package traced at one version is *simple* and lands directly in
//! `node_modules/<name>`. A package traced at several versions is
//! *conflicted*: every version gets an isolated directory and the versions
//! are ordered by hoisting priority. The first one is canonical and takes
//! the top-level slot.

use super::group::{PackageSet, TracedPackage};
use crate::pkg::location::PackageId;
use crate::pkg::version::compare_loose;
use indexmap::IndexSet;
use std::cmp::Ordering;

/// One version of a conflicted package with the packages consuming it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionPlan {
    pub version: String,
    pub is_direct_dependency: bool,
    /// Consuming packages, in discovery order.
    pub parents: Vec<PackageId>,
}

/// Placement decision for one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackagePlan {
    Simple {
        name: String,
        version: String,
    },
    /// Versions in hoisting order; the first is canonical.
    Conflicted {
        name: String,
        versions: Vec<VersionPlan>,
    },
}

impl PackagePlan {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Simple { name, .. } | Self::Conflicted { name, .. } => name,
        }
    }

    /// Version that answers for the package at the top level.
    #[must_use]
    pub fn canonical_version(&self) -> Option<&str> {
        match self {
            Self::Simple { version, .. } => Some(version),
            Self::Conflicted { versions, .. } => versions.first().map(|v| v.version.as_str()),
        }
    }

    #[must_use]
    pub fn is_conflicted(&self) -> bool {
        matches!(self, Self::Conflicted { .. })
    }
}

/// Packages consuming `version` of `package`.
///
/// Each file of the version is mapped through its parents back to the
/// package owning the parent. Parents that are not package files (entries,
/// project source, files only added by whole-package copies) contribute
/// nothing, and neither does the version itself.
#[must_use]
pub fn find_package_parents(set: &PackageSet, package: &TracedPackage, version: &str) -> Vec<PackageId> {
    let Some(entry) = package.versions.get(version) else {
        return Vec::new();
    };

    let mut parents = IndexSet::new();
    for file in entry.files.keys() {
        let Some(owner) = set.owners.get(file) else {
            continue;
        };
        for parent in &owner.parents {
            let Some(parent_owner) = set.owners.get(parent) else {
                continue;
            };
            let id = &parent_owner.id;
            if id.name == package.name && id.version == version {
                continue;
            }
            parents.insert(id.clone());
        }
    }
    parents.into_iter().collect()
}

/// Hoisting order: direct dependencies first, then versions nobody else
/// consumes, then the higher version.
///
/// When both sides tie on the first two rules the higher version wins, so
/// the order stays total.
#[must_use]
pub fn compare_versions(a: &VersionPlan, b: &VersionPlan) -> Ordering {
    b.is_direct_dependency
        .cmp(&a.is_direct_dependency)
        .then_with(|| b.parents.is_empty().cmp(&a.parents.is_empty()))
        .then_with(|| compare_loose(&b.version, &a.version))
}

/// Plan every package of `set`, in first-seen order.
#[must_use]
pub fn plan_packages(set: &PackageSet) -> Vec<PackagePlan> {
    set.packages
        .values()
        .filter_map(|package| {
            if !package.is_conflicted() {
                let version = package.versions.keys().next()?;
                return Some(PackagePlan::Simple {
                    name: package.name.clone(),
                    version: version.clone(),
                });
            }

            let mut versions: Vec<VersionPlan> = package
                .versions
                .iter()
                .map(|(version, entry)| VersionPlan {
                    version: version.clone(),
                    is_direct_dependency: entry.is_direct_dependency,
                    parents: find_package_parents(set, package, version),
                })
                .collect();
            versions.sort_by(compare_versions);

            Some(PackagePlan::Conflicted {
                name: package.name.clone(),
                versions,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emit::classify::ClassifiedFile;
    use crate::pkg::location::PackageLocation;
    use serde_json::{json, Map, Value};
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn plan(version: &str, direct: bool, parents: &[&str]) -> VersionPlan {
        VersionPlan {
            version: version.to_string(),
            is_direct_dependency: direct,
            parents: parents
                .iter()
                .map(|p| {
                    let (name, version) = p.rsplit_once('@').unwrap();
                    PackageId::new(name, version)
                })
                .collect(),
        }
    }

    fn sorted(mut versions: Vec<VersionPlan>) -> Vec<String> {
        versions.sort_by(compare_versions);
        versions.into_iter().map(|v| v.version).collect()
    }

    #[test]
    fn test_direct_dependency_hoists_first() {
        let order = sorted(vec![
            plan("3.0.0", false, &[]),
            plan("1.0.0", true, &["x@1.0.0"]),
            plan("2.0.0", false, &["y@1.0.0"]),
        ]);
        assert_eq!(order, vec!["1.0.0", "3.0.0", "2.0.0"]);
    }

    #[test]
    fn test_unconsumed_before_consumed() {
        let order = sorted(vec![plan("2.0.0", false, &["a@1.0.0"]), plan("1.0.0", false, &[])]);
        assert_eq!(order, vec!["1.0.0", "2.0.0"]);
    }

    #[test]
    fn test_higher_version_breaks_ties() {
        let order = sorted(vec![
            plan("1.2.0", false, &["a@1.0.0"]),
            plan("1.10.0", false, &["b@1.0.0"]),
        ]);
        assert_eq!(order, vec!["1.10.0", "1.2.0"]);

        // Two unconsumed versions still order deterministically
        let order = sorted(vec![plan("1.0.0", false, &[]), plan("2.0.0", false, &[])]);
        assert_eq!(order, vec!["2.0.0", "1.0.0"]);
    }

    fn file(root: &str, name: &str, sub: &str, parents: &[PathBuf]) -> ClassifiedFile {
        let install_root = PathBuf::from(root).join("node_modules").join(name);
        ClassifiedFile {
            path: install_root.join(sub),
            parents: parents.to_vec(),
            is_direct_dependency: parents.iter().any(|p| p.starts_with("/app/dist")),
            location: PackageLocation {
                install_root,
                name: name.to_string(),
                sub_path: PathBuf::from(sub),
            },
        }
    }

    fn manifest(name: &str, version: &str) -> Map<String, Value> {
        match json!({ "name": name, "version": version }) {
            Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    /// `a.js` -> dep@1.0.0 -> dep@2.0.0, plus other@1.0.0 -> dep@2.0.0.
    fn chained_set() -> PackageSet {
        let entry = PathBuf::from("/app/dist/a.js");
        let dep1 = PathBuf::from("/app/node_modules/dep/index.js");
        let other = PathBuf::from("/app/node_modules/other/index.js");
        let files = vec![
            file("/app", "dep", "index.js", &[entry.clone()]),
            file("/app/node_modules/dep", "dep", "index.js", &[dep1.clone(), other.clone()]),
            file("/app", "other", "index.js", &[entry]),
            file("/app", "dep", "package.json", &[dep1]),
        ];

        let mut manifests = HashMap::new();
        manifests.insert(PathBuf::from("/app/node_modules/dep"), manifest("dep", "1.0.0"));
        manifests.insert(
            PathBuf::from("/app/node_modules/dep/node_modules/dep"),
            manifest("dep", "2.0.0"),
        );
        manifests.insert(PathBuf::from("/app/node_modules/other"), manifest("other", "1.0.0"));
        PackageSet::fold(files, &manifests, None).0
    }

    #[test]
    fn test_find_package_parents() {
        let set = chained_set();
        let dep = set.get("dep").unwrap();

        assert_eq!(
            find_package_parents(&set, dep, "2.0.0"),
            vec![PackageId::new("dep", "1.0.0"), PackageId::new("other", "1.0.0")]
        );
        // Its own files and the entry file are not consumers
        assert!(find_package_parents(&set, dep, "1.0.0").is_empty());
        assert!(find_package_parents(&set, dep, "9.9.9").is_empty());
    }

    #[test]
    fn test_plan_packages() {
        let set = chained_set();
        let plans = plan_packages(&set);
        assert_eq!(plans.len(), 2);

        assert_eq!(plans[0].name(), "dep");
        assert!(plans[0].is_conflicted());
        assert_eq!(plans[0].canonical_version(), Some("1.0.0"));
        let PackagePlan::Conflicted { versions, .. } = &plans[0] else {
            panic!("expected conflicted");
        };
        assert_eq!(versions[1].version, "2.0.0");
        assert_eq!(versions[1].parents.len(), 2);

        assert_eq!(
            plans[1],
            PackagePlan::Simple {
                name: "other".to_string(),
                version: "1.0.0".to_string()
            }
        );
    }
}
