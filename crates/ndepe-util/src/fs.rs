use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Read a file to string, replacing invalid UTF-8 sequences with the replacement character.
///
/// # Errors
/// Returns an error if the file cannot be read.
pub fn read_to_string_lossy(path: &Path) -> io::Result<String> {
    let bytes = fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Atomically write bytes to a file by writing to a temp file then renaming.
///
/// The file will either have the old contents or the new contents, never a
/// partial write. Missing parent directories are created.
///
/// # Errors
/// Returns an error if the write or rename fails.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let parent = path.parent().unwrap_or(Path::new("."));
    fs::create_dir_all(parent)?;

    // Same directory as the target so the rename stays on one filesystem
    let mut temp_path = parent.to_path_buf();
    temp_path.push(format!(
        ".{}.tmp.{}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("file"),
        std::process::id()
    ));

    {
        let mut file = File::create(&temp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }

    match fs::rename(&temp_path, path) {
        Ok(()) => Ok(()),
        Err(e) => {
            // On Windows, rename can fail if target exists. Try copy + remove as fallback.
            if cfg!(windows) {
                fs::copy(&temp_path, path)?;
                let _ = fs::remove_file(&temp_path);
                Ok(())
            } else {
                let _ = fs::remove_file(&temp_path);
                Err(e)
            }
        }
    }
}

/// `ENOTDIR` ("not a directory") on Linux, macOS and the BSDs.
#[cfg(unix)]
const ENOTDIR: i32 = 20;

/// Check whether `path` is an existing regular file.
///
/// A missing path (or a path through a non-directory) is `Ok(false)`;
/// any other I/O failure is returned.
///
/// # Errors
/// Returns an error if the metadata lookup fails for a reason other than absence.
pub fn is_file(path: &Path) -> io::Result<bool> {
    match fs::metadata(path) {
        Ok(meta) => Ok(meta.is_file()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        // a path component is a regular file
        #[cfg(unix)]
        Err(e) if e.raw_os_error() == Some(ENOTDIR) => Ok(false),
        Err(e) => Err(e),
    }
}

/// List every regular file under `dir`, recursively, in file-name order.
///
/// Symlinks are followed. When `filter` is given, only files for which it
/// returns `true` are kept.
///
/// # Errors
/// Returns an error if a directory cannot be read.
pub fn read_dir_recursive(
    dir: &Path,
    filter: Option<&dyn Fn(&Path) -> bool>,
) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.into_path();
        if filter.map_or(true, |f| f(&path)) {
            files.push(path);
        }
    }

    Ok(files)
}
