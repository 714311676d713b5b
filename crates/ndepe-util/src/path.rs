//! Path helpers: containment checks, relative paths, real-path resolution.

use std::io;
use std::path::{Component, Path, PathBuf};

/// Check whether `child` lies strictly inside `parent`.
///
/// Purely lexical: both paths are expected to be absolute and normalized.
/// A path is not a sub-path of itself.
#[must_use]
pub fn is_sub_path(parent: &Path, child: &Path) -> bool {
    if parent.as_os_str().is_empty() || child.as_os_str().is_empty() {
        return false;
    }
    child
        .strip_prefix(parent)
        .is_ok_and(|rest| !rest.as_os_str().is_empty())
}

/// Compute the path that leads from directory `from` to `to`.
///
/// Both paths must be of the same kind (both absolute or both relative to a
/// common base). `.` components are ignored; `..` is not interpreted.
#[must_use]
pub fn relative_path(from: &Path, to: &Path) -> PathBuf {
    let from: Vec<Component<'_>> = from
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();
    let to: Vec<Component<'_>> = to
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();

    let common = from
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut result = PathBuf::new();
    for _ in common..from.len() {
        result.push("..");
    }
    for component in &to[common..] {
        result.push(component.as_os_str());
    }

    if result.as_os_str().is_empty() {
        result.push(".");
    }
    result
}

/// Resolve `path` against `base` and canonicalize it (symlinks resolved).
///
/// Uses `dunce` so Windows results avoid the `\\?\` prefix.
///
/// # Errors
/// Returns an error if the path does not exist or cannot be resolved.
pub fn real_path(base: &Path, path: &Path) -> io::Result<PathBuf> {
    dunce::canonicalize(base.join(path))
}

/// Walk up from `start` to find the nearest directory containing `file_name`.
///
/// Returns the path of the found file, or `None` when the filesystem root is
/// reached.
#[must_use]
pub fn find_up(start: &Path, file_name: &str) -> Option<PathBuf> {
    let mut current = Some(start);

    while let Some(dir) = current {
        let candidate = dir.join(file_name);
        if candidate.is_file() {
            return Some(candidate);
        }
        current = dir.parent();
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_is_sub_path() {
        assert!(is_sub_path(Path::new("/parent"), Path::new("/parent/child")));
        assert!(!is_sub_path(Path::new("/parent"), Path::new("/parent2/sibling")));
        assert!(!is_sub_path(Path::new("/parent"), Path::new("/parent")));
        assert!(!is_sub_path(Path::new(""), Path::new("/parent")));
    }

    #[test]
    fn test_relative_path_sibling_dirs() {
        let rel = relative_path(
            Path::new("node_modules/.ndepe/a@1.0.0/node_modules"),
            Path::new("node_modules/.ndepe/b@2.0.0/node_modules/b"),
        );
        assert_eq!(
            rel,
            PathBuf::from("../../b@2.0.0/node_modules/b")
        );
    }

    #[test]
    fn test_relative_path_scoped_top_level() {
        let rel = relative_path(
            Path::new("/out/node_modules/@scope"),
            Path::new("/out/node_modules/.ndepe/@scope/pkg@1.0.0/node_modules/@scope/pkg"),
        );
        assert_eq!(
            rel,
            PathBuf::from("../.ndepe/@scope/pkg@1.0.0/node_modules/@scope/pkg")
        );
    }

    #[test]
    fn test_relative_path_same_dir() {
        assert_eq!(relative_path(Path::new("/a/b"), Path::new("/a/b")), PathBuf::from("."));
    }

    #[test]
    fn test_real_path_resolves_symlinks() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("target.js");
        fs::write(&target, "").unwrap();

        let resolved = real_path(Path::new("/"), &target).unwrap();
        assert_eq!(resolved, dunce::canonicalize(&target).unwrap());

        #[cfg(unix)]
        {
            let link = dir.path().join("link.js");
            std::os::unix::fs::symlink(&target, &link).unwrap();
            assert_eq!(real_path(Path::new("/"), &link).unwrap(), resolved);
        }

        assert!(real_path(dir.path(), Path::new("missing.js")).is_err());
    }

    #[test]
    fn test_find_up() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("lib").join("deep");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join("package.json"), "{}").unwrap();

        assert_eq!(
            find_up(&nested, "package.json"),
            Some(dir.path().join("package.json"))
        );
    }
}
