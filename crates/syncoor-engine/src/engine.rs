use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use syncoor_config::EngineConfig;
use syncoor_domain::{ClientInfo, ClientType, Fingerprint, Report, RunId, SyncProgressEntry, TerminalStatus};
use syncoor_enclave::{EnclaveController, RunConfig, ServiceInfo};
use syncoor_report::ReportStore;
use syncoor_recovery::RecoveryEngine;
use syncoor_reporting::{ClientWireInfo, CompleteRequest, KeepaliveRequest, ProgressMetrics, ReportingClient};

use crate::error::EngineError;
use crate::probe_factory::ProbeFactory;
use crate::system_info::SystemInfoCollector;

/// Every tenth progress entry triggers a temp-report snapshot when recovery
/// is enabled, bounding the write amplification of a long-running sync.
const TEMP_REPORT_SNAPSHOT_INTERVAL: usize = 10;
const METRICS_SERVICE_NAME: &str = "metrics";
const DEFAULT_METRICS_URL: &str = "http://127.0.0.1:9090/metrics";
const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";
const DEFAULT_BEACON_URL: &str = "http://127.0.0.1:5052";

/// What one completed run produced: its terminal classification plus where
/// the report documents were written.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: RunId,
    pub status: TerminalStatus,
    pub status_message: String,
    pub final_block: u64,
    pub final_slot: u64,
    pub main_report_path: PathBuf,
    pub progress_report_path: PathBuf,
}

/// Orchestrates one sync test end to end: launch (or resume) an enclave,
/// poll its execution/consensus clients until they report fully synced (or
/// the run times out, crashes, or is cancelled), and persist the result.
///
/// Each capability it depends on — enclave lifecycle, client probing, host
/// metadata — is injected as a trait object so the same engine drives both
/// a real container runtime and an in-memory test double.
pub struct SyncTestEngine {
    config: EngineConfig,
    controller: Arc<dyn EnclaveController>,
    probe_factory: Arc<dyn ProbeFactory>,
    system_info: Arc<dyn SystemInfoCollector>,
    reporting: Option<Arc<ReportingClient>>,
    cancel: CancellationToken,
}

impl SyncTestEngine {
    pub fn new(
        config: EngineConfig,
        controller: Arc<dyn EnclaveController>,
        probe_factory: Arc<dyn ProbeFactory>,
        system_info: Arc<dyn SystemInfoCollector>,
        reporting: Option<Arc<ReportingClient>>,
    ) -> Self {
        SyncTestEngine {
            config,
            controller,
            probe_factory,
            system_info,
            reporting,
            cancel: CancellationToken::new(),
        }
    }

    /// A clone of the token that cancels this run. A signal handler should
    /// only ever call `.cancel()` on it — all report mutation and teardown
    /// happens on the poll loop itself to avoid racing the report store.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn recovery_dir(&self) -> PathBuf {
        Path::new(&self.config.report_dir).join(".recovery")
    }

    fn expected_fingerprint(&self) -> Fingerprint {
        Fingerprint {
            network: self.config.network.clone(),
            el_type: self.config.el_client,
            cl_type: self.config.cl_client,
            el_image: self.config.el_image.clone(),
            cl_image: self.config.cl_image.clone(),
            el_extra_args: self.config.el_extra_args.clone(),
            cl_extra_args: self.config.cl_extra_args.clone(),
            el_env: self.config.el_env_vars.clone(),
            cl_env: self.config.cl_env_vars.clone(),
            enclave_name: self.config.enclave_name.clone(),
        }
    }

    fn run_config(&self) -> RunConfig {
        RunConfig {
            enclave_name: self.config.enclave_name.clone(),
            el_image: self.config.el_image.clone(),
            el_extra_args: self.config.el_extra_args.clone(),
            el_env: self.config.el_env_vars.clone().into_iter().collect(),
            cl_image: self.config.cl_image.clone(),
            cl_extra_args: self.config.cl_extra_args.clone(),
            cl_env: self.config.cl_env_vars.clone().into_iter().collect(),
            network: self.config.network.clone(),
            checkpoint_sync_url: self.config.checkpoint_sync_url.clone(),
            public: self.config.public,
            public_port_el: self.config.public_port_el,
            public_port_cl: self.config.public_port_cl,
            public_ip: self.config.public_ip.clone(),
        }
    }

    /// Drives the full lifecycle of a sync test. Returns `Ok(RunOutcome)` for
    /// every terminal state that reaches the polling phase (success, timeout,
    /// cancellation, in-run error) — only startup failures that leave no
    /// report to persist (launch or recovery I/O errors) surface as `Err`.
    pub async fn run(&self) -> Result<RunOutcome, EngineError> {
        let recovery_dir = self.recovery_dir();
        let expected = self.expected_fingerprint();

        let recovered = if self.config.enable_recovery {
            let recovery = RecoveryEngine::new(self.controller.clone(), recovery_dir.clone());
            recovery.check_recoverable(&expected).await?
        } else {
            None
        };

        let now = Utc::now().timestamp();
        let run_id = match &recovered {
            Some(state) => state.report.run_id.clone(),
            None => RunId::generate(now, &self.config.network, &self.config.el_client, &self.config.cl_client),
        };

        if recovered.is_some() {
            info!(run_id = %run_id, "resuming a recoverable run");
        } else {
            let startup = self.controller.run(&self.run_config());
            match tokio::time::timeout(self.config.startup_timeout, startup).await {
                Ok(Ok(_handle)) => {}
                Ok(Err(e)) => return Err(EngineError::Enclave(e)),
                Err(_) => return Err(EngineError::StartupTimedOut),
            }
        }

        let report_store = ReportStore::new(run_id.clone(), now, self.config.network.clone());
        report_store.set_labels(self.config.labels.clone()).await;

        if let Some(state) = &recovered {
            let mut resumed: Report = state.report.clone();
            resumed.sync_status.status = syncoor_domain::RunState::Running;
            resumed.sync_status.end = None;
            report_store.restore_report_state(resumed).await;
        }

        if let Some(info) = self.system_info.collect() {
            report_store.set_system_info(info).await;
        }

        let el = self.config.el_client.to_string();
        let cl = self.config.cl_client.to_string();

        let el_info = match self.controller.inspect(&self.config.enclave_name, "el").await {
            Ok(info) => info,
            Err(e) => {
                return self
                    .finalize(
                        &report_store,
                        TerminalStatus::Error,
                        format!("failed to inspect execution client: {e}"),
                        0,
                        0,
                        &run_id,
                        &el,
                        &cl,
                        &recovery_dir,
                    )
                    .await;
            }
        };
        let cl_info = match self.controller.inspect(&self.config.enclave_name, "cl").await {
            Ok(info) => info,
            Err(e) => {
                return self
                    .finalize(
                        &report_store,
                        TerminalStatus::Error,
                        format!("failed to inspect consensus client: {e}"),
                        0,
                        0,
                        &run_id,
                        &el,
                        &cl,
                        &recovery_dir,
                    )
                    .await;
            }
        };

        report_store
            .set_execution_client_info(&client_info_from_service(self.config.el_client, &el_info))
            .await;
        report_store
            .set_consensus_client_info(&client_info_from_service(self.config.cl_client, &cl_info))
            .await;

        let metrics_url = match self.controller.inspect(&self.config.enclave_name, METRICS_SERVICE_NAME).await {
            Ok(info) => resolve_url(&info, &["metrics"], "http", "/metrics", self.config.public, self.config.public_ip.as_deref())
                .unwrap_or_else(|| DEFAULT_METRICS_URL.to_string()),
            Err(e) => {
                warn!(error = %e, "metrics aggregator service not found, falling back to default endpoint");
                DEFAULT_METRICS_URL.to_string()
            }
        };

        let rpc_url = resolve_url(&el_info, &["rpc"], "http", "", self.config.public, self.config.public_ip.as_deref())
            .unwrap_or_else(|| DEFAULT_RPC_URL.to_string());
        let beacon_url = resolve_url(&cl_info, &["beacon", "http"], "http", "", self.config.public, self.config.public_ip.as_deref())
            .unwrap_or_else(|| DEFAULT_BEACON_URL.to_string());

        let execution_probe = self.probe_factory.execution_probe(&rpc_url);
        let consensus_probe = self.probe_factory.consensus_probe(&beacon_url);
        let metrics_probe = self.probe_factory.metrics_probe(&metrics_url);

        if let Some(reporting) = &self.reporting {
            reporting.send_keepalive(KeepaliveRequest {
                run_id: run_id.as_str().to_string(),
                timestamp: now,
                network: self.config.network.clone(),
                labels: self.config.labels.clone(),
                el_client: client_wire_info(self.config.el_client, &self.config.el_image, &self.config.el_extra_args, &self.config.el_env_vars),
                cl_client: client_wire_info(self.config.cl_client, &self.config.cl_image, &self.config.cl_extra_args, &self.config.cl_env_vars),
                enclave_name: self.config.enclave_name.clone(),
                system_info: None,
                run_timeout: Some(self.config.run_timeout.as_secs()),
            });
        }

        self.poll(&report_store, execution_probe, consensus_probe, metrics_probe, &run_id, &el, &cl, &recovery_dir)
            .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn poll(
        &self,
        report_store: &ReportStore,
        execution_probe: Box<dyn syncoor_probes::ExecutionProbe>,
        consensus_probe: Box<dyn syncoor_probes::ConsensusProbe>,
        metrics_probe: Box<dyn syncoor_probes::MetricsProbe>,
        run_id: &RunId,
        el: &str,
        cl: &str,
        recovery_dir: &Path,
    ) -> Result<RunOutcome, EngineError> {
        let deadline = tokio::time::Instant::now() + self.config.run_timeout;
        let mut progress_count = 0usize;

        loop {
            if self.cancel.is_cancelled() {
                if self.config.enable_recovery {
                    report_store.save_temp_report(recovery_dir, el, cl).await?;
                }
                return self
                    .finalize(report_store, TerminalStatus::Cancelled, "run cancelled".to_string(), 0, 0, run_id, el, cl, recovery_dir)
                    .await;
            }

            if tokio::time::Instant::now() >= deadline {
                let msg = format!("sync did not complete within {}s", self.config.run_timeout.as_secs());
                return self.finalize(report_store, TerminalStatus::Timeout, msg, 0, 0, run_id, el, cl, recovery_dir).await;
            }

            let el_status = self.controller.service_status(&self.config.enclave_name, "el").await;
            let cl_status = self.controller.service_status(&self.config.enclave_name, "cl").await;

            match (el_status, cl_status) {
                (Ok(el_status), Ok(cl_status)) if !el_status.running => {
                    let msg = format!("execution client container crashed: {}", el_status.crash_reason());
                    return self.finalize(report_store, TerminalStatus::Error, msg, 0, 0, run_id, el, cl, recovery_dir).await;
                }
                (Ok(el_status), Ok(cl_status)) if !cl_status.running => {
                    let msg = format!("consensus client container crashed: {}", cl_status.crash_reason());
                    return self.finalize(report_store, TerminalStatus::Error, msg, 0, 0, run_id, el, cl, recovery_dir).await;
                }
                (Err(e), _) | (_, Err(e)) => {
                    let msg = format!("failed to check container health: {e}");
                    return self.finalize(report_store, TerminalStatus::Error, msg, 0, 0, run_id, el, cl, recovery_dir).await;
                }
                _ => {}
            }

            let exec_snapshot = execution_probe.snapshot().await;
            let cons_snapshot = consensus_probe.snapshot().await;
            let metrics_snapshot = metrics_probe.snapshot().await;

            if let (Ok(exec), Ok(cons), Ok(metrics)) = (&exec_snapshot, &cons_snapshot, &metrics_snapshot) {
                let effective_block = exec.progress.as_ref().map(|p| p.current).unwrap_or(0).max(exec.block_number);
                let effective_slot = cons.head_slot_u64();

                report_store.set_block_number(effective_block).await;
                report_store.set_slot_number(effective_slot).await;
                report_store
                    .set_execution_client_info(&ClientInfo { version: metrics.exec_version.clone().unwrap_or_default(), ..Default::default() })
                    .await;
                report_store
                    .set_consensus_client_info(&ClientInfo { version: metrics.cons_version.clone().unwrap_or_default(), ..Default::default() })
                    .await;

                let entry = SyncProgressEntry {
                    t: Utc::now().timestamp(),
                    b: effective_block,
                    s: effective_slot,
                    de: metrics.exec_disk_usage_bytes,
                    dc: metrics.cons_disk_usage_bytes,
                    pe: exec.peer_count,
                    pc: metrics.cons_peer_count,
                };
                report_store.add_sync_progress_entry(entry).await?;
                progress_count += 1;

                if self.config.enable_recovery && progress_count % TEMP_REPORT_SNAPSHOT_INTERVAL == 0 {
                    report_store.save_temp_report(recovery_dir, el, cl).await?;
                }

                if let Some(reporting) = &self.reporting {
                    reporting.send_progress(
                        run_id.as_str(),
                        ProgressMetrics {
                            block: effective_block,
                            slot: effective_slot,
                            exec_disk_usage: metrics.exec_disk_usage_bytes,
                            cons_disk_usage: metrics.cons_disk_usage_bytes,
                            exec_peers: exec.peer_count,
                            cons_peers: metrics.cons_peer_count,
                            exec_sync_percent: metrics.exec_sync_percent,
                            cons_sync_percent: metrics.cons_sync_percent,
                            exec_version: metrics.exec_version.clone(),
                            cons_version: metrics.cons_version.clone(),
                        },
                    );
                }

                if !exec.is_syncing && !cons.is_syncing && !cons.is_optimistic && effective_block > 0 {
                    return self
                        .finalize(report_store, TerminalStatus::Success, "sync complete".to_string(), effective_block, effective_slot, run_id, el, cl, recovery_dir)
                        .await;
                }
            } else {
                for (name, result) in [
                    ("execution", exec_snapshot.as_ref().err()),
                    ("consensus", cons_snapshot.as_ref().err()),
                    ("metrics", metrics_snapshot.as_ref().err()),
                ] {
                    if let Some(e) = result {
                        warn!(probe = name, error = %e, "probe snapshot failed this tick, will retry");
                    }
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.check_interval) => {}
                _ = self.cancel.cancelled() => {}
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn finalize(
        &self,
        report_store: &ReportStore,
        status: TerminalStatus,
        message: String,
        final_block: u64,
        final_slot: u64,
        run_id: &RunId,
        el: &str,
        cl: &str,
        recovery_dir: &Path,
    ) -> Result<RunOutcome, EngineError> {
        let now = Utc::now().timestamp();
        if final_block > 0 {
            report_store.set_block_number(final_block).await;
        }
        if final_slot > 0 {
            report_store.set_slot_number(final_slot).await;
        }
        report_store.set_sync_status(status, message.clone(), now).await;

        if let Some(reporting) = &self.reporting {
            reporting.send_complete(
                run_id.as_str(),
                CompleteRequest {
                    timestamp: now,
                    final_block,
                    final_slot,
                    success: status == TerminalStatus::Success,
                    error: (status != TerminalStatus::Success).then(|| message.clone()),
                },
            );
        }

        let (main_report_path, progress_report_path) =
            report_store.save_report_to_files(Path::new(&self.config.report_dir), el, cl).await?;

        if self.config.enable_recovery && status == TerminalStatus::Success {
            ReportStore::remove_temp_report(recovery_dir, &self.config.network, el, cl)?;
        }

        Ok(RunOutcome {
            run_id: run_id.clone(),
            status,
            status_message: message,
            final_block,
            final_slot,
            main_report_path,
            progress_report_path,
        })
    }
}

fn client_info_from_service(client_type: ClientType, info: &ServiceInfo) -> ClientInfo {
    ClientInfo {
        name: client_type.to_string(),
        client_type: Some(client_type),
        image: info.image.clone(),
        version: String::new(),
        entrypoint: info.entrypoint.clone(),
        cmd: info.cmd.clone(),
        env: info.env.clone().into_iter().collect(),
    }
}

fn client_wire_info(
    client_type: ClientType,
    image: &str,
    extra_args: &[String],
    env_vars: &std::collections::BTreeMap<String, String>,
) -> ClientWireInfo {
    ClientWireInfo {
        client_type: client_type.to_string(),
        image: image.to_string(),
        extra_args: extra_args.to_vec(),
        env_vars: env_vars.clone(),
    }
}

/// Picks the first matching port by key (falling back to any exposed port)
/// and renders it as a URL against the public or private host as configured.
fn resolve_url(
    info: &ServiceInfo,
    preferred_keys: &[&str],
    scheme: &str,
    path: &str,
    public: bool,
    public_ip: Option<&str>,
) -> Option<String> {
    let ports = if public { &info.public_ports } else { &info.ports };
    let port = preferred_keys
        .iter()
        .find_map(|k| ports.get(*k))
        .or_else(|| ports.values().next())?;
    let host = if public { public_ip.unwrap_or("127.0.0.1") } else { "127.0.0.1" };
    Some(format!("{scheme}://{host}:{}{path}", port.number))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, VecDeque};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use syncoor_enclave::LocalEnclaveController;
    use syncoor_probes::{ConsensusSnapshot, ExecutionSnapshot, ParsedMetrics, ProbeError, SyncingProgress};

    /// Pops one scripted snapshot per call; once the script is exhausted it
    /// keeps repeating the last value rather than falling back to a default
    /// (which would otherwise look deceptively like a freshly-synced node).
    struct ScriptedExecutionProbe(Mutex<(VecDeque<ExecutionSnapshot>, ExecutionSnapshot)>);
    #[async_trait]
    impl syncoor_probes::ExecutionProbe for ScriptedExecutionProbe {
        async fn snapshot(&self) -> Result<ExecutionSnapshot, ProbeError> {
            let mut guard = self.0.lock().unwrap();
            if let Some(next) = guard.0.pop_front() {
                guard.1 = next.clone();
                Ok(next)
            } else {
                Ok(guard.1.clone())
            }
        }
    }

    struct ScriptedConsensusProbe(Mutex<(VecDeque<ConsensusSnapshot>, ConsensusSnapshot)>);
    #[async_trait]
    impl syncoor_probes::ConsensusProbe for ScriptedConsensusProbe {
        async fn snapshot(&self) -> Result<ConsensusSnapshot, ProbeError> {
            let mut guard = self.0.lock().unwrap();
            if let Some(next) = guard.0.pop_front() {
                guard.1 = next.clone();
                Ok(next)
            } else {
                Ok(guard.1.clone())
            }
        }
    }

    struct StaticMetricsProbe(ParsedMetrics);
    #[async_trait]
    impl syncoor_probes::MetricsProbe for StaticMetricsProbe {
        async fn snapshot(&self) -> Result<ParsedMetrics, ProbeError> {
            Ok(self.0.clone())
        }
    }

    struct FakeProbeFactory {
        exec: Mutex<Option<VecDeque<ExecutionSnapshot>>>,
        cons: Mutex<Option<VecDeque<ConsensusSnapshot>>>,
        metrics: ParsedMetrics,
    }

    impl ProbeFactory for FakeProbeFactory {
        fn execution_probe(&self, _rpc_url: &str) -> Box<dyn syncoor_probes::ExecutionProbe> {
            let queue = self.exec.lock().unwrap().take().unwrap_or_default();
            Box::new(ScriptedExecutionProbe(Mutex::new((queue, ExecutionSnapshot::default()))))
        }
        fn consensus_probe(&self, _beacon_url: &str) -> Box<dyn syncoor_probes::ConsensusProbe> {
            let queue = self.cons.lock().unwrap().take().unwrap_or_default();
            Box::new(ScriptedConsensusProbe(Mutex::new((queue, ConsensusSnapshot::default()))))
        }
        fn metrics_probe(&self, _metrics_url: &str) -> Box<dyn syncoor_probes::MetricsProbe> {
            Box::new(StaticMetricsProbe(self.metrics.clone()))
        }
    }

    struct NoopSystemInfo;
    impl SystemInfoCollector for NoopSystemInfo {
        fn collect(&self) -> Option<syncoor_domain::SystemInfo> {
            None
        }
    }

    fn test_config(report_dir: &Path) -> EngineConfig {
        EngineConfig {
            network: "hoodi".to_string(),
            el_client: ClientType::Geth,
            cl_client: ClientType::Teku,
            el_image: "geth:latest".to_string(),
            cl_image: "teku:latest".to_string(),
            el_extra_args: vec![],
            cl_extra_args: vec![],
            el_env_vars: BTreeMap::new(),
            cl_env_vars: BTreeMap::new(),
            enclave_name: "test-enc".to_string(),
            report_dir: report_dir.to_string_lossy().to_string(),
            labels: BTreeMap::new(),
            server_url: None,
            server_auth: None,
            enable_recovery: false,
            client_logs: false,
            checkpoint_sync_enabled: false,
            checkpoint_sync_url: None,
            public: false,
            public_port_el: None,
            public_port_cl: None,
            public_ip: None,
            log_level_el: "info".to_string(),
            log_level_cl: "info".to_string(),
            check_interval: Duration::from_millis(5),
            run_timeout: Duration::from_secs(5),
            startup_timeout: Duration::from_secs(5),
        }
    }

    fn synced_exec() -> ExecutionSnapshot {
        ExecutionSnapshot { block_number: 100, is_syncing: false, peer_count: 5, progress: None }
    }

    fn synced_cons() -> ConsensusSnapshot {
        ConsensusSnapshot { head_slot: "200".to_string(), sync_distance: 0, is_syncing: false, is_optimistic: false, el_offline: false }
    }

    #[tokio::test]
    async fn happy_path_run_reaches_success() {
        let dir = tempfile::tempdir().unwrap();
        let controller = Arc::new(LocalEnclaveController::new());
        let probe_factory = Arc::new(FakeProbeFactory {
            exec: Mutex::new(Some(VecDeque::from(vec![
                ExecutionSnapshot { block_number: 10, is_syncing: true, peer_count: 3, progress: Some(SyncingProgress { current: 10, highest: 100, starting: 0 }) },
                synced_exec(),
            ]))),
            cons: Mutex::new(Some(VecDeque::from(vec![synced_cons()]))),
            metrics: ParsedMetrics::default(),
        });

        let engine = SyncTestEngine::new(
            test_config(dir.path()),
            controller,
            probe_factory,
            Arc::new(NoopSystemInfo),
            None,
        );

        let outcome = engine.run().await.unwrap();
        assert_eq!(outcome.status, TerminalStatus::Success);
        assert!(outcome.main_report_path.exists());
    }

    #[tokio::test]
    async fn crashed_container_finalizes_as_error() {
        let dir = tempfile::tempdir().unwrap();
        let controller = Arc::new(LocalEnclaveController::new());
        controller
            .run(&RunConfig {
                enclave_name: "test-enc".to_string(),
                el_image: "geth:latest".to_string(),
                el_extra_args: vec![],
                el_env: Default::default(),
                cl_image: "teku:latest".to_string(),
                cl_extra_args: vec![],
                cl_env: Default::default(),
                network: "hoodi".to_string(),
                checkpoint_sync_url: None,
                public: false,
                public_port_el: None,
                public_port_cl: None,
                public_ip: None,
            })
            .await
            .unwrap();
        controller
            .inject_crash(
                "test-enc",
                "el",
                syncoor_enclave::ServiceStatus { running: false, state: "OOMKilled".to_string(), exit_code: 137, error_message: String::new() },
            )
            .await;

        let probe_factory = Arc::new(FakeProbeFactory {
            exec: Mutex::new(Some(VecDeque::new())),
            cons: Mutex::new(Some(VecDeque::new())),
            metrics: ParsedMetrics::default(),
        });

        let engine = SyncTestEngine::new(test_config(dir.path()), controller, probe_factory, Arc::new(NoopSystemInfo), None);
        let outcome = engine.run().await.unwrap();
        assert_eq!(outcome.status, TerminalStatus::Error);
        assert!(outcome.status_message.contains("OOM"));
        assert!(outcome.status_message.contains("137"));
    }

    #[tokio::test]
    async fn cancellation_finalizes_as_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let controller = Arc::new(LocalEnclaveController::new());
        let probe_factory = Arc::new(FakeProbeFactory {
            exec: Mutex::new(Some(VecDeque::from(vec![ExecutionSnapshot { block_number: 1, is_syncing: true, peer_count: 1, progress: None }]))),
            cons: Mutex::new(Some(VecDeque::from(vec![ConsensusSnapshot { head_slot: "1".to_string(), sync_distance: 10, is_syncing: true, is_optimistic: false, el_offline: false }]))),
            metrics: ParsedMetrics::default(),
        });

        let mut cfg = test_config(dir.path());
        cfg.run_timeout = Duration::from_secs(30);
        let engine = SyncTestEngine::new(cfg, controller, probe_factory, Arc::new(NoopSystemInfo), None);
        let token = engine.cancellation_token();

        let run = tokio::spawn(async move { engine.run().await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();

        let outcome = run.await.unwrap().unwrap();
        assert_eq!(outcome.status, TerminalStatus::Cancelled);
    }

    #[tokio::test]
    async fn cancellation_with_recovery_enabled_leaves_a_temp_report() {
        let dir = tempfile::tempdir().unwrap();
        let controller = Arc::new(LocalEnclaveController::new());
        let probe_factory = Arc::new(FakeProbeFactory {
            exec: Mutex::new(Some(VecDeque::from(vec![ExecutionSnapshot { block_number: 1, is_syncing: true, peer_count: 1, progress: None }]))),
            cons: Mutex::new(Some(VecDeque::from(vec![ConsensusSnapshot { head_slot: "1".to_string(), sync_distance: 10, is_syncing: true, is_optimistic: false, el_offline: false }]))),
            metrics: ParsedMetrics::default(),
        });

        let mut cfg = test_config(dir.path());
        cfg.run_timeout = Duration::from_secs(30);
        cfg.enable_recovery = true;
        let engine = SyncTestEngine::new(cfg, controller, probe_factory, Arc::new(NoopSystemInfo), None);
        let token = engine.cancellation_token();

        let run = tokio::spawn(async move { engine.run().await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();

        let outcome = run.await.unwrap().unwrap();
        assert_eq!(outcome.status, TerminalStatus::Cancelled);
        let temp = syncoor_report::ReportStore::load_temp_report(&dir.path().join(".recovery"), "hoodi", "geth", "teku").unwrap();
        assert!(temp.is_some());
    }

    #[tokio::test]
    async fn run_timeout_finalizes_as_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let controller = Arc::new(LocalEnclaveController::new());
        let probe_factory = Arc::new(FakeProbeFactory {
            exec: Mutex::new(Some(VecDeque::from(vec![ExecutionSnapshot { block_number: 1, is_syncing: true, peer_count: 1, progress: None }]))),
            cons: Mutex::new(Some(VecDeque::from(vec![ConsensusSnapshot { head_slot: "1".to_string(), sync_distance: 10, is_syncing: true, is_optimistic: false, el_offline: false }]))),
            metrics: ParsedMetrics::default(),
        });

        let mut cfg = test_config(dir.path());
        cfg.run_timeout = Duration::from_millis(30);
        let engine = SyncTestEngine::new(cfg, controller, probe_factory, Arc::new(NoopSystemInfo), None);
        let outcome = engine.run().await.unwrap();
        assert_eq!(outcome.status, TerminalStatus::Timeout);
        assert_eq!(outcome.status.exit_code(), 124);
        assert!(outcome.status_message.contains('s'));
    }

    /// S2: a 2s `RunTimeout` that never completes must report a timeout
    /// message mentioning `"2s"`.
    #[tokio::test]
    async fn timeout_message_includes_configured_duration() {
        let dir = tempfile::tempdir().unwrap();
        let controller = Arc::new(LocalEnclaveController::new());
        let probe_factory = Arc::new(FakeProbeFactory {
            exec: Mutex::new(Some(VecDeque::from(vec![ExecutionSnapshot { block_number: 1, is_syncing: true, peer_count: 1, progress: None }]))),
            cons: Mutex::new(Some(VecDeque::from(vec![ConsensusSnapshot { head_slot: "1".to_string(), sync_distance: 10, is_syncing: true, is_optimistic: false, el_offline: false }]))),
            metrics: ParsedMetrics::default(),
        });

        let mut cfg = test_config(dir.path());
        cfg.check_interval = Duration::from_millis(100);
        cfg.run_timeout = Duration::from_secs(2);
        let engine = SyncTestEngine::new(cfg, controller, probe_factory, Arc::new(NoopSystemInfo), None);
        let outcome = engine.run().await.unwrap();
        assert_eq!(outcome.status, TerminalStatus::Timeout);
        assert!(outcome.status_message.contains("2s"), "message was: {}", outcome.status_message);
    }

    #[tokio::test]
    async fn optimistic_head_blocks_success_despite_not_syncing() {
        let dir = tempfile::tempdir().unwrap();
        let controller = Arc::new(LocalEnclaveController::new());
        let probe_factory = Arc::new(FakeProbeFactory {
            exec: Mutex::new(Some(VecDeque::from(vec![synced_exec()]))),
            cons: Mutex::new(Some(VecDeque::from(vec![ConsensusSnapshot { head_slot: "200".to_string(), sync_distance: 0, is_syncing: false, is_optimistic: true, el_offline: false }]))),
            metrics: ParsedMetrics::default(),
        });

        let mut cfg = test_config(dir.path());
        cfg.run_timeout = Duration::from_millis(40);
        let engine = SyncTestEngine::new(cfg, controller, probe_factory, Arc::new(NoopSystemInfo), None);
        let outcome = engine.run().await.unwrap();
        assert_eq!(outcome.status, TerminalStatus::Timeout);
    }
}
