#![allow(dead_code)]

use std::{
    fs,
    path::{Path, PathBuf},
};

use assert_cmd::{assert::Assert, cargo::cargo_bin_cmd, Command};
use serde_json::Value;
use tempfile::TempDir;

pub fn workspace_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .and_then(|p| p.parent())
        .expect("workspace root")
        .to_path_buf()
}

pub fn fixture(relative: &str) -> PathBuf {
    workspace_root().join("fixtures").join(relative)
}

/// The binary with no `LOCKFIT_*` variables leaking in from the caller.
pub fn lockfit() -> Command {
    let mut cmd = cargo_bin_cmd!("lockfit");
    cmd.env_remove("LOCKFIT_LOCK")
        .env_remove("LOCKFIT_ENV")
        .env_remove("LOCKFIT_PYTHON")
        .env("NO_COLOR", "1");
    cmd
}

/// A temporary project directory holding `filename` with `contents`.
pub fn project_with_lock(prefix: &str, filename: &str, contents: &str) -> (TempDir, PathBuf) {
    let temp = tempfile::Builder::new()
        .prefix(prefix)
        .tempdir()
        .expect("tempdir");
    let project = temp.path().join("project");
    fs::create_dir_all(&project).expect("create project");
    write_file(&project.join(filename), contents);
    (temp, project)
}

pub fn write_file(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent");
    }
    fs::write(path, contents).expect("write file");
}

pub fn parse_json(assert: &Assert) -> Value {
    serde_json::from_slice(&assert.get_output().stdout).expect("valid json")
}

pub fn resolved_names(payload: &Value) -> Vec<String> {
    payload["details"]["resolved"]
        .as_array()
        .expect("resolved array")
        .iter()
        .map(|entry| entry["name"].as_str().expect("name").to_string())
        .collect()
}
