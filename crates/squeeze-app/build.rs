use std::env;
use std::fs;
use std::path::{Path, PathBuf};

fn main() {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").expect("manifest dir"));
    let version_path = find_version_file(&manifest_dir);
    println!("cargo:rerun-if-changed={}", version_path.display());
    println!("cargo:rerun-if-env-changed=SQUEEZE_VERSION_OVERRIDE");

    let version = match env::var("SQUEEZE_VERSION_OVERRIDE") {
        Ok(value) if !value.trim().is_empty() => value.trim().to_string(),
        _ => fs::read_to_string(&version_path)
            .expect("read VERSION file")
            .trim()
            .to_string(),
    };

    if let Err(problem) = check_release_version(&version) {
        panic!("invalid app version {version:?}: {problem}");
    }

    println!("cargo:rustc-env=SQUEEZE_VERSION={version}");
}

/// Walks up from the crate to the first directory holding `VERSION`.
fn find_version_file(start: &Path) -> PathBuf {
    start
        .ancestors()
        .map(|dir| dir.join("VERSION"))
        .find(|candidate| candidate.is_file())
        .expect("VERSION file in an ancestor of the crate")
}

/// Accepts `MAJOR.MINOR.PATCH` with an optional `-label` suffix.
fn check_release_version(version: &str) -> Result<(), String> {
    let (core, label) = match version.split_once('-') {
        Some((core, label)) => (core, Some(label)),
        None => (version, None),
    };

    let parts: Vec<&str> = core.split('.').collect();
    if parts.len() != 3 {
        return Err(format!("expected three numeric parts, found {}", parts.len()));
    }
    for part in parts {
        if part.is_empty() || !part.bytes().all(|byte| byte.is_ascii_digit()) {
            return Err(format!("part {part:?} is not numeric"));
        }
    }

    if let Some(label) = label {
        if label.is_empty() || !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '.') {
            return Err(format!("label {label:?} is not alphanumeric"));
        }
    }
    Ok(())
}
