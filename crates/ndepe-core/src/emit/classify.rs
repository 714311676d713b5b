//! Traced file classification.
//!
//! Decides, for every file in the trace, whether it is a dependency file to
//! package, and if so which package owns it.

use super::MAX_CONCURRENT_IO;
use crate::pkg::error::PkgError;
use crate::pkg::location::{has_store_segment, PackageLocation, NODE_MODULES};
use crate::pkg::manifest::{manifest_name, read_manifest, PACKAGE_JSON};
use crate::trace::{TraceGraph, TraceRecord};
use futures::stream::{self, StreamExt};
use ndepe_util::fs::is_file;
use ndepe_util::path::{find_up, is_sub_path, real_path};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Levels above the app directory that manifest lookup may reach.
const SEARCH_ROOT_DEPTH: usize = 6;

/// Paths shared by every classification in a run.
#[derive(Debug, Clone)]
pub struct ClassifyContext {
    /// Base for relative trace paths.
    pub base: PathBuf,
    pub app_dir: PathBuf,
    pub source_dir: PathBuf,
    /// `app_dir/node_modules`.
    pub store_root: PathBuf,
    /// Upper bound for manifest lookup outside `node_modules`.
    pub search_root: PathBuf,
}

impl ClassifyContext {
    /// Canonicalizes both directories.
    ///
    /// # Errors
    /// Returns an error if either directory does not exist.
    pub fn new(base: &Path, app_dir: &Path, source_dir: &Path) -> io::Result<Self> {
        let app_dir = dunce::canonicalize(app_dir)?;
        let source_dir = dunce::canonicalize(source_dir)?;
        let search_root = app_dir
            .ancestors()
            .nth(SEARCH_ROOT_DEPTH)
            .or_else(|| app_dir.ancestors().last())
            .unwrap_or(&app_dir)
            .to_path_buf();

        Ok(Self {
            base: base.to_path_buf(),
            store_root: app_dir.join(NODE_MODULES),
            app_dir,
            source_dir,
            search_root,
        })
    }

    /// Inside the project but outside its dependency store.
    fn is_project_path(&self, path: &Path) -> bool {
        is_sub_path(&self.app_dir, path) && !is_sub_path(&self.store_root, path)
    }
}

/// A dependency file with its owning package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedFile {
    /// Real path.
    pub path: PathBuf,
    /// Real paths of the files that load this one.
    pub parents: Vec<PathBuf>,
    /// Loaded directly from project code.
    pub is_direct_dependency: bool,
    pub location: PackageLocation,
}

/// Why a traced file is not packaged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    /// Marked ignored by the tracer.
    Ignored,
    /// Part of the project's own code.
    ProjectSource,
    /// The path no longer resolves.
    Stale,
    /// Exists, but is not a regular file.
    NotAFile,
    /// Its nearest `package.json` lies above the search root.
    OutsideSearchRoot,
    /// No package could be determined.
    NoOwner,
}

impl SkipReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ignored => "ignored",
            Self::ProjectSource => "project-source",
            Self::Stale => "stale",
            Self::NotAFile => "not-a-file",
            Self::OutsideSearchRoot => "outside-search-root",
            Self::NoOwner => "no-owner",
        }
    }
}

/// Outcome for one trace record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Classified(ClassifiedFile),
    Skipped { path: PathBuf, reason: SkipReason },
}

/// Classify one trace record.
///
/// # Errors
/// Returns an error only for I/O failures other than missing files.
pub fn classify_file(
    ctx: &ClassifyContext,
    path: &Path,
    record: &TraceRecord,
) -> io::Result<Classification> {
    let skip = |reason| {
        Ok(Classification::Skipped {
            path: path.to_path_buf(),
            reason,
        })
    };

    if record.ignored {
        return skip(SkipReason::Ignored);
    }

    let Ok(real) = real_path(&ctx.base, path) else {
        return skip(SkipReason::Stale);
    };

    if is_sub_path(&ctx.source_dir, &real) || ctx.is_project_path(&real) {
        return skip(SkipReason::ProjectSource);
    }

    if !is_file(&real)? {
        return skip(SkipReason::NotAFile);
    }

    let location = if has_store_segment(&real) {
        match PackageLocation::from_store_path(&real) {
            Some(location) => location,
            None => return skip(SkipReason::NoOwner),
        }
    } else {
        match locate_by_manifest(ctx, &real) {
            Ok(location) => location,
            Err(reason) => return skip(reason),
        }
    };

    let parents: Vec<PathBuf> = record
        .parents
        .iter()
        .map(|p| real_path(&ctx.base, p).unwrap_or_else(|_| ctx.base.join(p)))
        .collect();
    let is_direct_dependency = parents.iter().any(|p| ctx.is_project_path(p));

    Ok(Classification::Classified(ClassifiedFile {
        path: real,
        parents,
        is_direct_dependency,
        location,
    }))
}

/// Owner of a file outside any `node_modules` (e.g. a linked workspace package).
///
/// Nested manifests without a usable `name` (such as `{"type": "module"}`
/// in a build subdirectory) are passed over; the walk stops at the search root.
fn locate_by_manifest(ctx: &ClassifyContext, file: &Path) -> Result<PackageLocation, SkipReason> {
    let mut dir: PathBuf = file.parent().ok_or(SkipReason::NoOwner)?.to_path_buf();
    loop {
        let manifest_path = find_up(&dir, PACKAGE_JSON).ok_or(SkipReason::NoOwner)?;
        if !is_sub_path(&ctx.search_root, &manifest_path) {
            return Err(SkipReason::OutsideSearchRoot);
        }
        let pkg_dir = manifest_path.parent().ok_or(SkipReason::NoOwner)?;
        if let Ok(manifest) = read_manifest(pkg_dir) {
            if let Some(name) = manifest_name(&manifest) {
                return PackageLocation::from_package_dir(pkg_dir, name, file)
                    .ok_or(SkipReason::NoOwner);
            }
        }
        dir = pkg_dir.parent().ok_or(SkipReason::NoOwner)?.to_path_buf();
    }
}

/// Classify every record of `graph`, in trace order.
///
/// # Errors
/// Returns `PKG_CLASSIFY_FAILED` on the first I/O failure.
pub async fn classify_trace(
    ctx: Arc<ClassifyContext>,
    graph: &TraceGraph,
) -> Result<Vec<Classification>, PkgError> {
    let records: Vec<(PathBuf, TraceRecord)> = graph
        .iter()
        .map(|(path, record)| (path.clone(), record.clone()))
        .collect();

    let results: Vec<Result<io::Result<Classification>, tokio::task::JoinError>> =
        stream::iter(records)
            .map(|(path, record)| {
                let ctx = Arc::clone(&ctx);
                tokio::task::spawn_blocking(move || classify_file(&ctx, &path, &record))
            })
            .buffered(MAX_CONCURRENT_IO)
            .collect()
            .await;

    results
        .into_iter()
        .map(|joined| -> Result<Classification, PkgError> {
            joined?.map_err(|e| PkgError::classify_failed(e.to_string()))
        })
        .collect()
}
