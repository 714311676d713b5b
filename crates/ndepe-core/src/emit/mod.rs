//! Trace-to-package materialization.
//!
//! [`emit_dependencies`] turns the trace of a built project into a pruned,
//! deployable `node_modules` next to the build output:
//!
//! 1. find entry scripts in `source_dir`
//! 2. trace them (with optional persistent caches)
//! 3. classify traced files and group them into package versions
//! 4. plan placement: simple packages go to `node_modules/<name>`, every
//!    version of a conflicted package to `node_modules/.ndepe/<name>@<version>`
//! 5. write all versions, then link each conflicted version into the
//!    top-level slot (canonical version only) and into its consumers
//! 6. write a production `package.json`
//!
//! Phases run one after the other; I/O inside a phase fans out with bounded
//! concurrency.

pub mod classify;
pub mod group;
pub mod hoist;
pub mod layout;
pub mod options;
pub mod report;
pub mod synth;
pub mod write;

pub use classify::{classify_trace, Classification, ClassifiedFile, ClassifyContext, SkipReason};
pub use group::{group_packages, PackageSet, PackageVersionEntry, TracedPackage};
pub use hoist::{compare_versions, find_package_parents, plan_packages, PackagePlan, VersionPlan};
pub use layout::{consumer_link_path, link_requests, write_targets, LinkRequest, WriteTarget};
pub use options::{CopyWholePackage, EmitOptions, EntryFilter, ManifestHook};
pub use report::{EmitReport, PackageCounts, WrittenPackage};
pub use synth::{read_project_manifest, synthesize_manifest, ProjectManifest};
pub use write::write_package;

use crate::pkg::error::PkgError;
use crate::pkg::link::{link_package, LinkRecord};
use crate::pkg::location::NODE_MODULES;
use crate::pkg::manifest::PACKAGE_JSON;
use crate::trace::{run_trace, CacheStore, TraceRequest, Tracer};
use futures::stream::{self, StreamExt, TryStreamExt};
use indexmap::IndexSet;
use ndepe_util::fs::atomic_write;
use ndepe_util::path::is_sub_path;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

/// Maximum number of concurrent file operations per phase.
pub const MAX_CONCURRENT_IO: usize = 64;

/// Maximum number of package versions written at once.
const MAX_CONCURRENT_PACKAGES: usize = 8;

/// File extensions treated as entry scripts.
pub const ENTRY_EXTENSIONS: &[&str] = &["js", "mjs", "cjs"];

/// Every script under `source_dir`, in sorted walk order.
///
/// `source_dir/node_modules` (the output of a previous run) is not walked.
///
/// # Errors
/// Returns `PKG_ENTRY_SCAN_FAILED` if a directory cannot be read.
pub fn find_entry_files(
    source_dir: &Path,
    filter: Option<&EntryFilter>,
) -> Result<Vec<PathBuf>, PkgError> {
    let output = source_dir.join(NODE_MODULES);
    let mut entries = Vec::new();

    let walker = WalkDir::new(source_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.path() != output);

    for entry in walker {
        let entry = entry.map_err(|e| {
            PkgError::entry_scan_failed(format!(
                "Failed to scan {}: {e}",
                source_dir.display()
            ))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let is_script = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| ENTRY_EXTENSIONS.contains(&ext));
        if is_script && filter.map_or(true, |f| f(path)) {
            entries.push(entry.into_path());
        }
    }

    Ok(entries)
}

/// Run the whole pipeline.
///
/// Per-file problems (stale paths, unknown owners) and link failures do
/// not stop the run; they are listed in the returned report.
///
/// # Errors
/// - `PKG_ARGS_INVALID` if a directory is missing or the output would land
///   inside the dependency store being read
/// - `PKG_ENTRY_SCAN_FAILED`, `PKG_TRACE_FAILED`, `PKG_CACHE_ERROR` and
///   `PKG_CLASSIFY_FAILED` from the matching phase
/// - `NODE_MODULES_WRITE_FAILED` if a package version cannot be written
/// - `PKG_PACKAGE_JSON_WRITE_FAILED` if the final manifest cannot be written
pub async fn emit_dependencies(
    options: &EmitOptions,
    tracer: Arc<dyn Tracer>,
) -> Result<EmitReport, PkgError> {
    let ctx = ClassifyContext::new(Path::new("/"), &options.app_dir, &options.source_dir)
        .map_err(|e| {
            PkgError::args_invalid(format!(
                "Cannot resolve {} or {}: {e}",
                options.app_dir.display(),
                options.source_dir.display()
            ))
        })?;
    let app_dir = ctx.app_dir.clone();
    let source_dir = ctx.source_dir.clone();
    let output = source_dir.join(NODE_MODULES);

    if source_dir == ctx.store_root
        || is_sub_path(&source_dir, &ctx.store_root)
        || is_sub_path(&ctx.store_root, &source_dir)
    {
        return Err(PkgError::args_invalid(format!(
            "Output directory {} would overwrite the dependency store {}",
            output.display(),
            ctx.store_root.display()
        )));
    }

    let mut report = EmitReport::default();

    // Entries
    let scan_dir = source_dir.clone();
    let filter = options.entry_filter.clone();
    let discovered =
        tokio::task::spawn_blocking(move || find_entry_files(&scan_dir, filter.as_ref())).await??;
    let mut entries: IndexSet<PathBuf> = discovered.into_iter().collect();
    for extra in &options.include_entries {
        entries.insert(if extra.is_absolute() {
            extra.clone()
        } else {
            app_dir.join(extra)
        });
    }
    let entries: Vec<PathBuf> = entries.into_iter().collect();
    report.entries = entries.len();

    // Trace
    let request = TraceRequest::new(entries, &app_dir).with_exclude(&output);
    let store = options
        .cache
        .any_enabled()
        .then(|| CacheStore::new(options.cache.resolved_dir(&app_dir), options.cache.clone()));
    let traced = run_trace(tracer, request, store).await?;
    report.traced = traced.graph.len();
    report.caches_written = traced.caches_written;

    // Classify
    let mut files = Vec::new();
    for outcome in classify_trace(Arc::new(ctx), &traced.graph).await? {
        match outcome {
            Classification::Classified(file) => files.push(file),
            Classification::Skipped { reason, .. } => report.record_skip(reason),
        }
    }
    report.classified = files.len();

    // Group and plan
    let set = group_packages(files, options.copy_whole_package.as_ref()).await?;
    let plans = plan_packages(&set);
    report.packages.versions = set.version_count();
    for plan in &plans {
        if plan.is_conflicted() {
            report.packages.conflicted += 1;
        } else {
            report.packages.simple += 1;
        }
    }

    // Write every version before linking any
    let targets: Vec<(WriteTarget, &PackageVersionEntry)> = plans
        .iter()
        .flat_map(write_targets)
        .filter_map(|target| {
            let entry = set.get(&target.id.name)?.versions.get(&target.id.version)?;
            Some((target, entry))
        })
        .collect();
    report.written = stream::iter(targets)
        .map(|(target, entry)| {
            let output = &output;
            async move {
                write_package(output, &target.dest, entry).await?;
                Ok::<_, PkgError>(WrittenPackage {
                    id: target.id,
                    dest: target.dest,
                    files: entry.files.len(),
                })
            }
        })
        .buffered(MAX_CONCURRENT_PACKAGES)
        .try_collect()
        .await?;

    // Links: sequential within a package, concurrent across packages
    let link_batches: Vec<Vec<LinkRequest>> = plans
        .iter()
        .map(|plan| link_requests(plan, |name| set.is_conflicted(name)))
        .filter(|links| !links.is_empty())
        .collect();
    let batches: Vec<Vec<LinkRecord>> = stream::iter(link_batches)
        .map(|links| {
            let output = output.clone();
            tokio::task::spawn_blocking(move || {
                links
                    .into_iter()
                    .map(|link| {
                        let outcome = link_package(&output, &link.from, &link.to);
                        LinkRecord::new(link.from, link.to, &outcome)
                    })
                    .collect::<Vec<_>>()
            })
        })
        .buffered(MAX_CONCURRENT_IO)
        .try_collect()
        .await?;
    report.links = batches.into_iter().flatten().collect();

    // Production manifest
    let project = read_project_manifest(&app_dir, &source_dir);
    let mut manifest = synthesize_manifest(&project, &plans);
    if let Some(hook) = &options.modify_package_json {
        manifest = hook(manifest);
    }
    let manifest_path = source_dir.join(PACKAGE_JSON);
    let json = serde_json::to_string_pretty(&manifest).map_err(|e| {
        PkgError::package_json_write_failed(format!("Failed to serialize manifest: {e}"))
    })?;
    let write_path = manifest_path.clone();
    tokio::task::spawn_blocking(move || atomic_write(&write_path, json.as_bytes()))
        .await?
        .map_err(|e| {
            PkgError::package_json_write_failed(format!(
                "Failed to write {}: {e}",
                manifest_path.display()
            ))
        })?;
    report.manifest_path = manifest_path;

    Ok(report)
}
