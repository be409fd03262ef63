//! Atomic file persistence: write-to-`.tmp`, `rename` into place (§4.3, §6.2).

use std::path::{Path, PathBuf};

use serde::Serialize;
use syncoor_domain::Report;

use crate::error::ReportError;

fn io_err(path: &Path, source: std::io::Error) -> ReportError {
    ReportError::Io { path: path.display().to_string(), source }
}

/// Serializes `value` and atomically replaces `path` with the result.
///
/// Writes to `<path>.tmp` in the same directory, then renames — rename within
/// one filesystem is atomic, so readers never observe a partially written file.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), ReportError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    let tmp_path = tmp_path_for(path);
    let bytes = serde_json::to_vec_pretty(value)?;
    std::fs::write(&tmp_path, &bytes).map_err(|e| io_err(&tmp_path, e))?;
    std::fs::rename(&tmp_path, path).map_err(|e| io_err(path, e))?;
    Ok(())
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

/// Sanitizes a path component: only ASCII alphanumerics, `-`, `_`, `.` survive,
/// everything else becomes `_` (used for the fingerprint recovery key as well
/// as the on-disk report base name).
pub fn sanitize_component(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
        .collect()
}

/// Recovery-directory path for the temp report keyed by `(network, EL, CL)`.
pub fn temp_report_path(recovery_dir: &Path, network: &str, el: &str, cl: &str) -> PathBuf {
    let key = format!(
        "{}_{}_{}",
        sanitize_component(network),
        sanitize_component(el),
        sanitize_component(cl)
    );
    recovery_dir.join(format!("{key}.temp.json"))
}

/// Base path (without extension) for a finalized report's main/progress pair.
pub fn report_base_path(reports_dir: &Path, report: &Report, el: &str, cl: &str) -> PathBuf {
    let name = format!(
        "{}-{}_{}_{}",
        report.run_id,
        sanitize_component(&report.network),
        sanitize_component(el),
        sanitize_component(cl)
    );
    reports_dir.join(name)
}

pub fn main_file_path(base: &Path) -> PathBuf {
    let mut p = base.as_os_str().to_owned();
    p.push(".main.json");
    PathBuf::from(p)
}

pub fn progress_file_path(base: &Path) -> PathBuf {
    let mut p = base.as_os_str().to_owned();
    p.push(".progress.json");
    PathBuf::from(p)
}

/// Loads a JSON file if present; returns `Ok(None)` if it does not exist.
pub fn read_json_if_present<T: serde::de::DeserializeOwned>(
    path: &Path,
) -> Result<Option<T>, ReportError> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(io_err(path, e)),
    }
}

pub fn remove_if_present(path: &Path) -> Result<(), ReportError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(io_err(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_unsafe_characters() {
        assert_eq!(sanitize_component("my/network:1"), "my_network_1");
        assert_eq!(sanitize_component("geth-v1.2"), "geth-v1.2");
    }

    #[test]
    fn write_json_atomic_leaves_no_tmp_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        write_json_atomic(&path, &serde_json::json!({"a": 1})).unwrap();
        assert!(path.exists());
        assert!(!tmp_path_for(&path).exists());
    }

    #[test]
    fn read_json_if_present_returns_none_for_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        let got: Option<serde_json::Value> = read_json_if_present(&path).unwrap();
        assert!(got.is_none());
    }
}
