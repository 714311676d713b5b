//! Summary of one emit run.

use super::classify::SkipReason;
use crate::pkg::link::LinkRecord;
use crate::pkg::location::PackageId;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A materialized package version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WrittenPackage {
    pub id: PackageId,
    /// Package directory, relative to the output `node_modules`.
    pub dest: PathBuf,
    pub files: usize,
}

/// Package counts by placement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PackageCounts {
    pub simple: usize,
    pub conflicted: usize,
    /// Distinct (package, version) pairs across both kinds.
    pub versions: usize,
}

/// What an emit run did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EmitReport {
    /// Entry files handed to the tracer.
    pub entries: usize,
    /// Files in the trace graph.
    pub traced: usize,
    /// Files attributed to a package.
    pub classified: usize,
    /// Files left out, by reason.
    pub skipped: BTreeMap<SkipReason, usize>,
    pub packages: PackageCounts,
    pub written: Vec<WrittenPackage>,
    pub links: Vec<LinkRecord>,
    pub caches_written: Vec<PathBuf>,
    /// The generated `package.json`.
    pub manifest_path: PathBuf,
}

impl EmitReport {
    pub fn record_skip(&mut self, reason: SkipReason) {
        *self.skipped.entry(reason).or_default() += 1;
    }

    #[must_use]
    pub fn skipped_total(&self) -> usize {
        self.skipped.values().sum()
    }

    /// Links that could not be created.
    pub fn failed_links(&self) -> impl Iterator<Item = &LinkRecord> {
        self.links.iter().filter(|l| l.status == "failed")
    }

    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failed_links().next().is_some()
    }
}
