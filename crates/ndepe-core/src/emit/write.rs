//! Materializing package versions into the output `node_modules`.

use super::group::PackageVersionEntry;
use super::MAX_CONCURRENT_IO;
use crate::pkg::error::PkgError;
use crate::pkg::link::is_link;
use crate::pkg::manifest::{apply_publish_exports, to_pretty_json, PACKAGE_JSON};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::path::{Path, PathBuf};

/// Write one package version to `node_modules/<dest>`.
///
/// Every traced file is copied to `<dest>/<sub_path>`, then the manifest is
/// written to `<dest>/package.json` with `publishConfig.exports` promoted.
/// A link left at `dest` by an earlier layout is removed first so files are
/// never written through it. Returns the absolute package directory.
///
/// # Errors
/// Returns `NODE_MODULES_WRITE_FAILED` on the first failed copy or write.
/// Files already written stay in place.
pub async fn write_package(
    node_modules: &Path,
    dest: &Path,
    entry: &PackageVersionEntry,
) -> Result<PathBuf, PkgError> {
    let pkg_dir = node_modules.join(dest);

    if is_link(&pkg_dir) {
        remove_link(&pkg_dir).await?;
    }
    tokio::fs::create_dir_all(&pkg_dir).await.map_err(|e| {
        PkgError::node_modules_write_failed(format!(
            "Failed to create {}: {e}",
            pkg_dir.display()
        ))
    })?;

    stream::iter(entry.files.iter())
        .map(|(src, sub_path)| {
            let target = pkg_dir.join(sub_path);
            async move { copy_file(src, &target).await }
        })
        .buffer_unordered(MAX_CONCURRENT_IO)
        .try_collect::<Vec<()>>()
        .await?;

    let mut manifest = entry.manifest.clone();
    apply_publish_exports(&mut manifest);
    let json = to_pretty_json(&manifest).map_err(|e| {
        PkgError::node_modules_write_failed(format!("Failed to serialize manifest: {e}"))
    })?;
    let manifest_path = pkg_dir.join(PACKAGE_JSON);
    tokio::fs::write(&manifest_path, json).await.map_err(|e| {
        PkgError::node_modules_write_failed(format!(
            "Failed to write {}: {e}",
            manifest_path.display()
        ))
    })?;

    Ok(pkg_dir)
}

async fn copy_file(src: &Path, dst: &Path) -> Result<(), PkgError> {
    if let Some(parent) = dst.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            PkgError::node_modules_write_failed(format!(
                "Failed to create {}: {e}",
                parent.display()
            ))
        })?;
    }
    tokio::fs::copy(src, dst).await.map_err(|e| {
        PkgError::node_modules_write_failed(format!(
            "Failed to copy {} to {}: {e}",
            src.display(),
            dst.display()
        ))
    })?;
    Ok(())
}

async fn remove_link(path: &Path) -> Result<(), PkgError> {
    // Junctions are directories to the Windows API; symlinks are files
    let removed = if cfg!(windows) {
        tokio::fs::remove_dir(path).await
    } else {
        tokio::fs::remove_file(path).await
    };
    removed.map_err(|e| {
        PkgError::node_modules_write_failed(format!(
            "Failed to remove stale link {}: {e}",
            path.display()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pkg::error::codes;
    use indexmap::IndexMap;
    use serde_json::{json, Map, Value};
    use std::fs;
    use tempfile::tempdir;

    fn entry(src_root: &Path, files: &[&str], manifest: Value) -> PackageVersionEntry {
        let Value::Object(manifest) = manifest else {
            panic!("manifest must be an object");
        };
        PackageVersionEntry {
            manifest,
            install_root: src_root.to_path_buf(),
            files: files
                .iter()
                .map(|f| (src_root.join(f), PathBuf::from(f)))
                .collect::<IndexMap<_, _>>(),
            is_direct_dependency: true,
        }
    }

    #[tokio::test]
    async fn test_write_package_copies_files_and_manifest() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("store/dep");
        fs::create_dir_all(src.join("lib")).unwrap();
        fs::write(src.join("index.js"), "module.exports = 1;").unwrap();
        fs::write(src.join("lib/util.js"), "exports.x = 2;").unwrap();
        fs::write(src.join("unused.js"), "").unwrap();

        let entry = entry(
            &src,
            &["index.js", "lib/util.js"],
            json!({
                "name": "dep",
                "version": "1.0.0",
                "exports": "./src/index.ts",
                "publishConfig": { "exports": "./index.js" }
            }),
        );
        let out = dir.path().join("out/node_modules");
        let pkg_dir = write_package(&out, Path::new("dep"), &entry).await.unwrap();

        assert_eq!(pkg_dir, out.join("dep"));
        assert_eq!(fs::read_to_string(pkg_dir.join("index.js")).unwrap(), "module.exports = 1;");
        assert!(pkg_dir.join("lib/util.js").is_file());
        assert!(!pkg_dir.join("unused.js").exists());

        let written: Map<String, Value> =
            serde_json::from_str(&fs::read_to_string(pkg_dir.join("package.json")).unwrap()).unwrap();
        assert_eq!(written["exports"], "./index.js");
        let keys: Vec<&str> = written.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["name", "version", "exports", "publishConfig"]);
    }

    #[tokio::test]
    async fn test_write_package_twice_is_stable() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("store/dep");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("index.js"), "a").unwrap();
        let entry = entry(&src, &["index.js"], json!({ "name": "dep", "version": "1.0.0" }));
        let out = dir.path().join("out/node_modules");

        write_package(&out, Path::new("dep"), &entry).await.unwrap();
        let first = fs::read(out.join("dep/package.json")).unwrap();
        write_package(&out, Path::new("dep"), &entry).await.unwrap();
        assert_eq!(fs::read(out.join("dep/package.json")).unwrap(), first);
    }

    #[tokio::test]
    async fn test_write_package_missing_source() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("store/dep");
        let entry = entry(&src, &["gone.js"], json!({ "name": "dep", "version": "1.0.0" }));

        let err = write_package(&dir.path().join("out"), Path::new("dep"), &entry)
            .await
            .unwrap_err();
        assert_eq!(err.code(), codes::NODE_MODULES_WRITE_FAILED);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_write_package_replaces_stale_link() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("out/node_modules");
        let isolated = out.join(".ndepe/dep@1.0.0/node_modules/dep");
        fs::create_dir_all(&isolated).unwrap();
        std::os::unix::fs::symlink(".ndepe/dep@1.0.0/node_modules/dep", out.join("dep")).unwrap();

        let src = dir.path().join("store/dep");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("index.js"), "a").unwrap();
        let entry = entry(&src, &["index.js"], json!({ "name": "dep", "version": "2.0.0" }));

        write_package(&out, Path::new("dep"), &entry).await.unwrap();
        assert!(!is_link(&out.join("dep")));
        assert!(out.join("dep/index.js").is_file());
        assert!(!isolated.join("index.js").exists());
    }
}
