use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use syncoor_domain::{
    ClientInfo, Labels, Report, RunId, SyncProgressEntry, SystemInfo, TerminalStatus,
};

use crate::error::ReportError;
use crate::fs::{
    main_file_path, progress_file_path, read_json_if_present, remove_if_present,
    report_base_path, temp_report_path, write_json_atomic,
};

#[derive(Debug, Clone)]
struct Inner {
    report: Report,
}

/// Single-run, single-writer accumulator (§4.3). Structurally identical to
/// the concurrency shape elsewhere in this workspace — one `RwLock`-guarded
/// inner value, deep-copy reads — just holding one [`Report`] instead of a
/// keyed map.
#[derive(Debug, Clone)]
pub struct ReportStore {
    inner: Arc<RwLock<Inner>>,
}

impl ReportStore {
    pub fn new(run_id: RunId, timestamp: i64, network: impl Into<String>) -> Self {
        ReportStore {
            inner: Arc::new(RwLock::new(Inner { report: Report::new(run_id, timestamp, network) })),
        }
    }

    pub async fn set_network(&self, network: impl Into<String>) {
        let mut guard = self.inner.write().await;
        guard.report.network = network.into();
    }

    pub async fn set_labels(&self, labels: Labels) {
        let mut guard = self.inner.write().await;
        guard.report.labels = labels;
    }

    pub async fn set_system_info(&self, info: SystemInfo) {
        let mut guard = self.inner.write().await;
        guard.report.system_info = Some(info);
    }

    pub async fn set_execution_client_info(&self, partial: &ClientInfo) {
        let mut guard = self.inner.write().await;
        guard.report.exec.merge_non_empty(partial);
    }

    pub async fn set_consensus_client_info(&self, partial: &ClientInfo) {
        let mut guard = self.inner.write().await;
        guard.report.cons.merge_non_empty(partial);
    }

    pub async fn set_block_number(&self, block: u64) {
        let mut guard = self.inner.write().await;
        guard.report.sync_status.final_block = block;
    }

    pub async fn set_slot_number(&self, slot: u64) {
        let mut guard = self.inner.write().await;
        guard.report.sync_status.final_slot = slot;
    }

    pub async fn set_sync_status(&self, status: TerminalStatus, message: impl Into<String>, end: i64) {
        let mut guard = self.inner.write().await;
        guard.report.sync_status.set_terminal(status, message, end);
    }

    /// No-op (not an error) once the run is terminal — see
    /// [`syncoor_domain::types::SyncStatus::add_progress`].
    pub async fn add_sync_progress_entry(&self, entry: SyncProgressEntry) -> Result<(), ReportError> {
        let mut guard = self.inner.write().await;
        guard.report.sync_status.add_progress(entry).map_err(ReportError::from)
    }

    pub async fn get_current_report(&self) -> Report {
        let guard = self.inner.read().await;
        guard.report.clone()
    }

    pub async fn restore_report_state(&self, loaded: Report) {
        let mut guard = self.inner.write().await;
        guard.report = loaded;
    }

    /// Atomically persists the in-memory report to the recovery directory,
    /// keyed by `(network, EL, CL)` (§4.3).
    pub async fn save_temp_report(
        &self,
        recovery_dir: &Path,
        el: &str,
        cl: &str,
    ) -> Result<(), ReportError> {
        let report = self.get_current_report().await;
        let path = temp_report_path(recovery_dir, &report.network, el, cl);
        debug!(path = %path.display(), "saving temp report");
        write_json_atomic(&path, &report)
    }

    /// Returns `Ok(None)` (not an error) if no temp report exists for the key.
    pub fn load_temp_report(
        recovery_dir: &Path,
        network: &str,
        el: &str,
        cl: &str,
    ) -> Result<Option<Report>, ReportError> {
        let path = temp_report_path(recovery_dir, network, el, cl);
        read_json_if_present(&path)
    }

    pub fn remove_temp_report(recovery_dir: &Path, network: &str, el: &str, cl: &str) -> Result<(), ReportError> {
        let path = temp_report_path(recovery_dir, network, el, cl);
        remove_if_present(&path)
    }

    /// Writes `<base>.progress.json` and `<base>.main.json` atomically, with
    /// `main.sync_status.progress = []` and a `progress_file` sibling
    /// reference (§6.2). Returns the written paths.
    pub async fn save_report_to_files(
        &self,
        reports_dir: &Path,
        el: &str,
        cl: &str,
    ) -> Result<(PathBuf, PathBuf), ReportError> {
        let report = self.get_current_report().await;
        let base = report_base_path(reports_dir, &report, el, cl);
        let progress_path = progress_file_path(&base);
        let main_path = main_file_path(&base);

        let progress_file_name = progress_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let (main, progress) = report.split_for_persistence(&progress_file_name);

        write_json_atomic(&progress_path, &progress)?;
        write_json_atomic(&main_path, &main)?;
        Ok((main_path, progress_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syncoor_domain::RunId;

    fn entry(t: i64, b: u64) -> SyncProgressEntry {
        SyncProgressEntry { t, b, s: 0, de: 0, dc: 0, pe: 0, pc: 0 }
    }

    #[tokio::test]
    async fn execution_client_info_merges_non_empty_fields() {
        let store = ReportStore::new(RunId::new("run-1"), 1000, "hoodi");
        store
            .set_execution_client_info(&ClientInfo { image: "geth:v1".into(), ..Default::default() })
            .await;
        store
            .set_execution_client_info(&ClientInfo { version: "1.14.0".into(), ..Default::default() })
            .await;
        let report = store.get_current_report().await;
        assert_eq!(report.exec.image, "geth:v1");
        assert_eq!(report.exec.version, "1.14.0");
    }

    #[tokio::test]
    async fn progress_is_rejected_after_terminal_status() {
        let store = ReportStore::new(RunId::new("run-1"), 1000, "hoodi");
        store.add_sync_progress_entry(entry(1000, 1)).await.unwrap();
        store.set_sync_status(TerminalStatus::Success, "done", 1005).await;
        store.add_sync_progress_entry(entry(1010, 2)).await.unwrap();
        let report = store.get_current_report().await;
        assert_eq!(report.sync_status.progress.len(), 1);
    }

    #[tokio::test]
    async fn temp_report_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReportStore::new(RunId::new("run-1"), 1000, "hoodi");
        store.add_sync_progress_entry(entry(1000, 1)).await.unwrap();
        store.save_temp_report(dir.path(), "geth", "teku").await.unwrap();

        let loaded = ReportStore::load_temp_report(dir.path(), "hoodi", "geth", "teku")
            .unwrap()
            .expect("temp report should exist");
        assert_eq!(loaded.sync_status.progress.len(), 1);

        ReportStore::remove_temp_report(dir.path(), "hoodi", "geth", "teku").unwrap();
        let gone = ReportStore::load_temp_report(dir.path(), "hoodi", "geth", "teku").unwrap();
        assert!(gone.is_none());
    }

    #[tokio::test]
    async fn missing_temp_report_loads_as_none_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = ReportStore::load_temp_report(dir.path(), "hoodi", "geth", "teku");
        assert!(result.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_report_to_files_strips_progress_from_main_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReportStore::new(RunId::new("run-1"), 1000, "hoodi");
        store.add_sync_progress_entry(entry(1000, 1)).await.unwrap();
        store.add_sync_progress_entry(entry(1001, 2)).await.unwrap();
        store.set_sync_status(TerminalStatus::Success, "done", 1002).await;

        let (main_path, progress_path) = store.save_report_to_files(dir.path(), "geth", "teku").await.unwrap();
        assert!(main_path.exists());
        assert!(progress_path.exists());

        let main: Report = serde_json::from_slice(&std::fs::read(&main_path).unwrap()).unwrap();
        assert!(main.sync_status.progress.is_empty());
        assert_eq!(
            main.sync_status.progress_file.as_deref(),
            progress_path.file_name().and_then(|n| n.to_str())
        );

        let progress: Vec<SyncProgressEntry> =
            serde_json::from_slice(&std::fs::read(&progress_path).unwrap()).unwrap();
        assert_eq!(progress.len(), 2);
    }
}
