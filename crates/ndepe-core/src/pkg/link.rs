//! Symlink/junction creation inside the output `node_modules`.

use super::error::PkgError;
use ndepe_util::path::relative_path;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Result of one link request.
#[derive(Debug, Clone)]
pub enum LinkOutcome {
    /// A new link was created.
    Created,
    /// The destination already was a link; nothing was touched.
    AlreadyLinked,
    /// The link could not be created. The run continues.
    Failed(PkgError),
}

impl LinkOutcome {
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// A link request and its outcome, as reported after a run.
#[derive(Debug, Clone, Serialize)]
pub struct LinkRecord {
    /// Canonical location, relative to the output `node_modules`.
    pub from: PathBuf,
    /// Link path, relative to the output `node_modules`.
    pub to: PathBuf,
    /// `created`, `already-linked` or `failed`.
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LinkRecord {
    #[must_use]
    pub fn new(from: PathBuf, to: PathBuf, outcome: &LinkOutcome) -> Self {
        let (status, error) = match outcome {
            LinkOutcome::Created => ("created", None),
            LinkOutcome::AlreadyLinked => ("already-linked", None),
            LinkOutcome::Failed(e) => ("failed", Some(e.to_string())),
        };
        Self {
            from,
            to,
            status,
            error,
        }
    }
}

/// Link `to` to the package directory at `from`.
///
/// Both paths are relative to `node_modules`. The link target is written
/// relative to the link's parent directory so the tree can be moved as a
/// whole. Never returns an error: failures come back as
/// [`LinkOutcome::Failed`].
#[must_use]
pub fn link_package(node_modules: &Path, from: &Path, to: &Path) -> LinkOutcome {
    match try_link_package(node_modules, from, to) {
        Ok(outcome) => outcome,
        Err(e) => LinkOutcome::Failed(e),
    }
}

fn try_link_package(node_modules: &Path, from: &Path, to: &Path) -> Result<LinkOutcome, PkgError> {
    let dest = node_modules.join(to);

    if is_link(&dest) {
        return Ok(LinkOutcome::AlreadyLinked);
    }

    let parent = dest.parent().ok_or_else(|| {
        PkgError::link_failed(format!("Link path has no parent: {}", dest.display()))
    })?;
    fs::create_dir_all(parent).map_err(|e| {
        PkgError::link_failed(format!(
            "Failed to create directory {}: {e}",
            parent.display()
        ))
    })?;

    // A leftover real directory from an earlier layout is replaced
    if dest.symlink_metadata().is_ok() {
        remove_dir_or_file(&dest)?;
    }

    let to_parent = to.parent().unwrap_or(Path::new(""));
    let target = relative_path(to_parent, from);
    create_dir_link(&target, &node_modules.join(from), &dest)?;

    Ok(LinkOutcome::Created)
}

/// Whether `path` is a symlink (Unix) or a reparse point (Windows junction).
#[must_use]
pub fn is_link(path: &Path) -> bool {
    let Ok(metadata) = fs::symlink_metadata(path) else {
        return false;
    };

    if metadata.file_type().is_symlink() {
        return true;
    }

    #[cfg(windows)]
    {
        use std::os::windows::fs::MetadataExt;
        // FILE_ATTRIBUTE_REPARSE_POINT
        if metadata.file_attributes() & 0x400 != 0 {
            return true;
        }
    }

    false
}

fn remove_dir_or_file(path: &Path) -> Result<(), PkgError> {
    if path.is_dir() {
        fs::remove_dir_all(path).map_err(|e| {
            PkgError::link_failed(format!("Failed to remove existing directory: {e}"))
        })
    } else {
        fs::remove_file(path)
            .map_err(|e| PkgError::link_failed(format!("Failed to remove existing file: {e}")))
    }
}

/// Create a directory link (symlink on Unix, junction on Windows).
///
/// Junctions cannot hold relative targets, so Windows uses `absolute_target`.
#[allow(unused_variables)]
fn create_dir_link(relative_target: &Path, absolute_target: &Path, dst: &Path) -> Result<(), PkgError> {
    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(relative_target, dst).map_err(|e| {
            PkgError::link_failed(format!(
                "Failed to create symlink from {} to {}: {e}",
                dst.display(),
                relative_target.display()
            ))
        })?;
    }

    #[cfg(windows)]
    {
        junction::create(absolute_target, dst).map_err(|e| {
            PkgError::link_failed(format!(
                "Failed to create junction from {} to {}: {e}",
                dst.display(),
                absolute_target.display()
            ))
        })?;
    }

    #[cfg(not(any(unix, windows)))]
    {
        return Err(PkgError::link_failed(format!(
            "Directory links are not supported on this platform: {}",
            dst.display()
        )));
    }

    Ok(())
}
