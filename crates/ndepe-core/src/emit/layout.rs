//! Output layout: where package versions are written and which links
//! connect them to their consumers.
//!
//! All paths are relative to the output `node_modules`.

use super::hoist::PackagePlan;
use crate::pkg::location::{isolated_node_modules, isolated_package_dir, PackageId, NODE_MODULES};
use std::path::{Path, PathBuf};

/// A version to materialize and its destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteTarget {
    pub id: PackageId,
    pub dest: PathBuf,
}

/// A link at `to` pointing at the package directory `from`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRequest {
    pub from: PathBuf,
    pub to: PathBuf,
}

/// Destinations for every version of a plan.
///
/// Simple packages go to `<name>`; each version of a conflicted package
/// goes to its isolated directory.
#[must_use]
pub fn write_targets(plan: &PackagePlan) -> Vec<WriteTarget> {
    match plan {
        PackagePlan::Simple { name, version } => vec![WriteTarget {
            id: PackageId::new(name.clone(), version.clone()),
            dest: PathBuf::from(name),
        }],
        PackagePlan::Conflicted { name, versions } => versions
            .iter()
            .map(|v| {
                let id = PackageId::new(name.clone(), v.version.clone());
                let dest = isolated_package_dir(&id);
                WriteTarget { id, dest }
            })
            .collect(),
    }
}

/// Where `consumer` expects to find `name`.
///
/// A conflicted consumer resolves from its isolated `node_modules`, a
/// simple one from its own nested `node_modules`. A consumer that is
/// another version of the same package would collide with its own
/// directory, so the link goes one level deeper, inside it.
#[must_use]
pub fn consumer_link_path(consumer: &PackageId, consumer_conflicted: bool, name: &str) -> PathBuf {
    if consumer.name == name {
        return isolated_package_dir(consumer).join(NODE_MODULES).join(name);
    }
    if consumer_conflicted {
        isolated_node_modules(consumer).join(name)
    } else {
        Path::new(&consumer.name).join(NODE_MODULES).join(name)
    }
}

/// Links needed by a plan, in hoisting order.
///
/// The canonical version takes the top-level slot; every version is then
/// linked into each of its consumers. Simple packages need none.
#[must_use]
pub fn link_requests(plan: &PackagePlan, is_conflicted: impl Fn(&str) -> bool) -> Vec<LinkRequest> {
    let PackagePlan::Conflicted { name, versions } = plan else {
        return Vec::new();
    };

    let mut links = Vec::new();
    for (idx, version) in versions.iter().enumerate() {
        let from = isolated_package_dir(&PackageId::new(name.clone(), version.version.clone()));
        if idx == 0 {
            links.push(LinkRequest {
                from: from.clone(),
                to: PathBuf::from(name),
            });
        }
        for consumer in &version.parents {
            links.push(LinkRequest {
                from: from.clone(),
                to: consumer_link_path(consumer, is_conflicted(&consumer.name), name),
            });
        }
    }
    links
}
