//! `ndepe trace` command implementation.

use ndepe_core::config::{compile_patterns, load_config};
use ndepe_core::emit::find_entry_files;
use ndepe_core::pkg::NODE_MODULES;
use ndepe_core::trace::{StaticTracer, TraceCache, TraceRequest, Tracer};
use miette::{miette, IntoDiagnostic, Result};
use std::path::PathBuf;

/// Trace command action.
#[derive(Debug, Clone)]
pub struct TraceAction {
    pub cwd: PathBuf,
    pub entries: Vec<PathBuf>,
    pub source_dir: Option<PathBuf>,
    pub ignore: Vec<String>,
}

/// Trace the entries and print the graph as JSON on stdout.
pub fn run(action: TraceAction) -> Result<()> {
    let config = load_config(&action.cwd, None)
        .into_diagnostic()?
        .map(|(_, config)| config)
        .unwrap_or_default();

    let source_dir = action
        .source_dir
        .or(config.source_dir)
        .map(|dir| action.cwd.join(dir));

    let entries = if action.entries.is_empty() {
        let dir = source_dir
            .as_ref()
            .ok_or_else(|| miette!("No entries given; pass entry files or --source-dir"))?;
        find_entry_files(dir, None).into_diagnostic()?
    } else {
        action.entries
    };

    let mut patterns = config.ignore;
    patterns.extend(action.ignore);
    let tracer = StaticTracer::new().with_ignore(compile_patterns(&patterns).into_diagnostic()?);

    let mut request = TraceRequest::new(entries, &action.cwd);
    if let Some(dir) = &source_dir {
        request = request.with_exclude(dir.join(NODE_MODULES));
    }

    tracing::debug!(entries = request.entries.len(), "Tracing");
    let graph = tracer
        .trace(&request, &mut TraceCache::default())
        .into_diagnostic()?;
    tracing::debug!(files = graph.len(), "Trace finished");

    println!("{}", graph.to_json().into_diagnostic()?);
    Ok(())
}
