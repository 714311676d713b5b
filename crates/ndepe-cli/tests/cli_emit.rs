//! Integration tests for `ndepe emit` and `ndepe trace`.

use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::tempdir;

fn ndepe() -> Command {
    Command::new(env!("CARGO_BIN_EXE_ndepe"))
}

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// App with `dist/index.js` requiring `left-pad`.
fn create_app(root: &Path) {
    write(&root.join("package.json"), r#"{"name": "svc", "version": "0.3.0"}"#);
    write(&root.join("dist/index.js"), "const pad = require('left-pad');\n");
    write(
        &root.join("node_modules/left-pad/package.json"),
        r#"{"name": "left-pad", "version": "1.3.0", "main": "index.js"}"#,
    );
    write(&root.join("node_modules/left-pad/index.js"), "module.exports = s => s;\n");
    write(&root.join("node_modules/left-pad/test.js"), "");
}

#[test]
fn test_emit_json_report() {
    let dir = tempdir().unwrap();
    create_app(dir.path());

    let output = ndepe()
        .args(["--json", "emit", "--source-dir", "dist", "--cwd"])
        .arg(dir.path())
        .output()
        .expect("Failed to run ndepe emit");

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "emit failed. stderr: {stderr}");

    let json: serde_json::Value = serde_json::from_str(&stdout)
        .unwrap_or_else(|_| panic!("stdout should be valid JSON: {stdout}"));
    assert_eq!(json["ok"], true);
    assert_eq!(json["schema_version"], 1);
    assert_eq!(json["report"]["entries"], 1);
    assert_eq!(json["report"]["packages"]["simple"], 1);
    assert_eq!(json["report"]["written"][0]["id"]["name"], "left-pad");

    let out = dir.path().join("dist/node_modules/left-pad");
    assert!(out.join("index.js").is_file());
    assert!(!out.join("test.js").exists());

    let manifest: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("dist/package.json")).unwrap())
            .unwrap();
    assert_eq!(manifest["name"], "svc-prod");
    assert_eq!(manifest["dependencies"]["left-pad"], "1.3.0");
}

#[test]
fn test_emit_reads_config_file() {
    let dir = tempdir().unwrap();
    create_app(dir.path());
    write(
        &dir.path().join("ndepe.config.json"),
        r#"{"sourceDir": "dist", "manifest": {"type": "commonjs"}}"#,
    );

    let output = ndepe()
        .arg("emit")
        .arg("--cwd")
        .arg(dir.path())
        .output()
        .expect("Failed to run ndepe emit");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "emit failed: {stdout}");
    assert!(stdout.contains("1 simple"), "unexpected output: {stdout}");

    let manifest: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("dist/package.json")).unwrap())
            .unwrap();
    assert_eq!(manifest["type"], "commonjs");
}

#[test]
fn test_emit_without_source_dir_fails() {
    let dir = tempdir().unwrap();
    create_app(dir.path());

    let output = ndepe()
        .args(["emit", "--cwd"])
        .arg(dir.path())
        .output()
        .expect("Failed to run ndepe emit");

    assert!(!output.status.success());
    assert!(!dir.path().join("dist/node_modules").exists());
}

#[test]
fn test_emit_json_error_code() {
    let dir = tempdir().unwrap();
    create_app(dir.path());

    let output = ndepe()
        .args(["--json", "emit", "--source-dir", ".", "--cwd"])
        .arg(dir.path())
        .output()
        .expect("Failed to run ndepe emit");

    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let json: serde_json::Value = serde_json::from_str(&stdout)
        .unwrap_or_else(|_| panic!("stdout should be valid JSON: {stdout}"));
    assert_eq!(json["ok"], false);
    assert_eq!(json["error"]["code"], "PKG_ARGS_INVALID");
}

#[test]
fn test_trace_prints_graph() {
    let dir = tempdir().unwrap();
    create_app(dir.path());

    let output = ndepe()
        .args(["trace", "--source-dir", "dist", "--cwd"])
        .arg(dir.path())
        .output()
        .expect("Failed to run ndepe trace");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "trace failed: {stdout}");

    let graph: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let files: Vec<&String> = graph.as_object().unwrap().keys().collect();
    assert!(files.iter().any(|f| f.ends_with("index.js") && f.contains("left-pad")));
    assert!(files.iter().any(|f| f.ends_with("package.json")));
    assert!(!files.iter().any(|f| f.ends_with("test.js")));
}

#[test]
fn test_version_json() {
    let output = ndepe()
        .args(["--json", "version"])
        .output()
        .expect("Failed to run ndepe version");

    let json: serde_json::Value =
        serde_json::from_str(&String::from_utf8_lossy(&output.stdout)).unwrap();
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}
