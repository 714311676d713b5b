//! `ndepe emit` command implementation.

use ndepe_core::config::{compile_patterns, load_config, NdepeConfig};
use ndepe_core::emit::{emit_dependencies, EmitOptions, EmitReport};
use ndepe_core::trace::{JsonTraceFile, StaticTracer, Tracer};
use ndepe_core::{PkgError, SCHEMA_VERSION};
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Emit command action.
#[derive(Debug, Clone, Default)]
pub struct EmitAction {
    pub cwd: PathBuf,
    pub source_dir: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub include: Vec<PathBuf>,
    pub exclude: Vec<String>,
    pub copy_whole: Vec<String>,
    pub ignore: Vec<String>,
    pub cache: bool,
    pub cache_dir: Option<PathBuf>,
    pub trace_file: Option<PathBuf>,
}

/// Emit result for JSON output.
#[derive(Serialize)]
struct EmitResultJson<'a> {
    schema_version: u32,
    ok: bool,
    report: &'a EmitReport,
}

#[derive(Serialize)]
struct ErrorJson {
    code: String,
    message: String,
}

/// Emit error result for JSON output.
#[derive(Serialize)]
struct EmitErrorResult {
    schema_version: u32,
    ok: bool,
    error: ErrorJson,
}

/// Run the emit command.
pub fn run(action: EmitAction, json: bool) -> Result<()> {
    let config = merged_config(&action)?;
    let options = EmitOptions::from_config(&action.cwd, &config).into_diagnostic()?;

    let tracer: Arc<dyn Tracer> = match &action.trace_file {
        Some(path) => Arc::new(JsonTraceFile::new(absolute(&action.cwd, path))),
        None => {
            let ignore = compile_patterns(&config.ignore).into_diagnostic()?;
            Arc::new(StaticTracer::new().with_ignore(ignore))
        }
    };

    tracing::debug!(
        app_dir = %options.app_dir.display(),
        source_dir = %options.source_dir.display(),
        "Starting emit"
    );

    let runtime = tokio::runtime::Runtime::new().into_diagnostic()?;
    match runtime.block_on(emit_dependencies(&options, tracer)) {
        Ok(report) => {
            log_report(&report);
            if json {
                let result = EmitResultJson {
                    schema_version: SCHEMA_VERSION,
                    ok: true,
                    report: &report,
                };
                println!("{}", serde_json::to_string(&result).into_diagnostic()?);
            } else {
                print_human_output(&report);
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!(code = e.code(), "{}", e.message());
            if json {
                print_error_json(&e)?;
            } else {
                eprintln!("error: {}", e.message());
                eprintln!("code: {}", e.code());
            }
            std::process::exit(1);
        }
    }
}

/// Config file values with command-line flags layered on top.
fn merged_config(action: &EmitAction) -> Result<NdepeConfig> {
    let mut config = load_config(&action.cwd, action.config.as_deref())
        .into_diagnostic()?
        .map(|(path, config)| {
            tracing::debug!(path = %path.display(), "Loaded config");
            config
        })
        .unwrap_or_default();

    if let Some(source_dir) = &action.source_dir {
        config.source_dir = Some(source_dir.clone());
    }
    config.include_entries.extend(action.include.iter().cloned());
    config.exclude_entries.extend(action.exclude.iter().cloned());
    config.copy_whole_packages.extend(action.copy_whole.iter().cloned());
    config.ignore.extend(action.ignore.iter().cloned());
    if action.cache {
        config.cache.analysis = true;
        config.cache.file = true;
        config.cache.symlink = true;
    }
    if let Some(dir) = &action.cache_dir {
        config.cache.dir.clone_from(dir);
    }

    Ok(config)
}

fn absolute(cwd: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

fn log_report(report: &EmitReport) {
    tracing::info!(
        entries = report.entries,
        traced = report.traced,
        classified = report.classified,
        "Trace classified"
    );
    for (reason, count) in &report.skipped {
        tracing::debug!(reason = reason.as_str(), count, "Skipped traced files");
    }
    for link in report.failed_links() {
        tracing::warn!(
            from = %link.from.display(),
            to = %link.to.display(),
            error = link.error.as_deref().unwrap_or_default(),
            "Failed to link package"
        );
    }
    tracing::info!(
        simple = report.packages.simple,
        conflicted = report.packages.conflicted,
        versions = report.packages.versions,
        written = report.written.len(),
        links = report.links.len(),
        "Emit finished"
    );
}

fn print_human_output(report: &EmitReport) {
    println!(
        "Traced {} files from {} entries",
        report.traced, report.entries
    );
    println!(
        "Packaged {} packages ({} simple, {} conflicted), {} versions written",
        report.packages.simple + report.packages.conflicted,
        report.packages.simple,
        report.packages.conflicted,
        report.written.len()
    );

    if !report.skipped.is_empty() {
        let parts: Vec<String> = report
            .skipped
            .iter()
            .map(|(reason, count)| format!("{} {count}", reason.as_str()))
            .collect();
        println!("Skipped: {}", parts.join(", "));
    }

    if !report.links.is_empty() {
        let failed = report.failed_links().count();
        let created = report.links.iter().filter(|l| l.status == "created").count();
        println!(
            "Links: {created} created, {} already linked, {failed} failed",
            report.links.len() - created - failed
        );
        for link in report.failed_links() {
            println!(
                "  failed: {} -> {}: {}",
                link.to.display(),
                link.from.display(),
                link.error.as_deref().unwrap_or_default()
            );
        }
    }

    println!("Wrote {}", report.manifest_path.display());
}

fn print_error_json(e: &PkgError) -> Result<()> {
    let result = EmitErrorResult {
        schema_version: SCHEMA_VERSION,
        ok: false,
        error: ErrorJson {
            code: e.code().to_string(),
            message: e.message().to_string(),
        },
    };
    println!("{}", serde_json::to_string(&result).into_diagnostic()?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("ndepe.config.json"),
            r#"{"sourceDir": "build", "excludeEntries": ["**/*.map.js"], "cache": {"file": true}}"#,
        )
        .unwrap();

        let action = EmitAction {
            cwd: dir.path().to_path_buf(),
            source_dir: Some(PathBuf::from("dist")),
            exclude: vec!["**/*.test.js".to_string()],
            cache_dir: Some(PathBuf::from("/tmp/ndepe-cache")),
            ..EmitAction::default()
        };
        let config = merged_config(&action).unwrap();

        assert_eq!(config.source_dir, Some(PathBuf::from("dist")));
        assert_eq!(config.exclude_entries, vec!["**/*.map.js", "**/*.test.js"]);
        assert!(config.cache.file);
        assert!(!config.cache.analysis);
        assert_eq!(config.cache.dir, PathBuf::from("/tmp/ndepe-cache"));
    }

    #[test]
    fn test_cache_flag_enables_all() {
        let dir = tempdir().unwrap();
        let action = EmitAction {
            cwd: dir.path().to_path_buf(),
            cache: true,
            ..EmitAction::default()
        };
        let config = merged_config(&action).unwrap();
        assert!(config.cache.analysis && config.cache.file && config.cache.symlink);
    }

    #[test]
    fn test_missing_explicit_config_fails() {
        let dir = tempdir().unwrap();
        let action = EmitAction {
            cwd: dir.path().to_path_buf(),
            config: Some(PathBuf::from("missing.json")),
            ..EmitAction::default()
        };
        assert!(merged_config(&action).is_err());
    }
}
