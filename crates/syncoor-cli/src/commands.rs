use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{info, warn};

use syncoor_config::RawEngineConfig;
use syncoor_enclave::{EnclaveController, KurtosisEnclaveController, LocalEnclaveController};
use syncoor_engine::{HostSystemInfoCollector, HttpProbeFactory, SyncTestEngine, SystemInfoCollector};
use syncoor_reporting::ReportingClient;
use syncoor_server::{build_app, cors_layer, AppState};
use syncoor_store::{SSEHub, TestStore};

use crate::cli::{ReportIndexArgs, ReportToMdArgs, ServerArgs, SyncArgs};
use crate::output;

const INDEX_FILE_SUFFIX: &str = ".main.json";
const INDEX_DEBOUNCE: Duration = Duration::from_secs(2);
const INDEX_POLL_INTERVAL: Duration = Duration::from_millis(500);

// ── sync ──────────────────────────────────────────────────────────────────────

/// Runs one sync test end to end and returns the process exit code for its
/// terminal status (§6.4).
pub async fn sync(args: SyncArgs) -> Result<i32> {
    let el_env_vars: BTreeMap<String, String> = args.el_env_vars.into_iter().collect();
    let cl_env_vars: BTreeMap<String, String> = args.cl_env_vars.into_iter().collect();
    let labels: BTreeMap<String, String> = args.labels.into_iter().collect();

    let raw = RawEngineConfig {
        network: args.network,
        el_client: args.el_client,
        cl_client: args.cl_client,
        el_image: args.el_image,
        cl_image: args.cl_image,
        el_extra_args: args.el_extra_args,
        cl_extra_args: args.cl_extra_args,
        el_env_vars,
        cl_env_vars,
        enclave_name: args.enclave,
        report_dir: args.report_dir,
        labels,
        server_url: args.server,
        server_auth: args.server_auth,
        enable_recovery: args.enable_recovery,
        client_logs: args.client_logs,
        checkpoint_sync_enabled: args.checkpoint_sync_enabled,
        checkpoint_sync_url: args.checkpoint_sync_url,
        public: args.public,
        public_port_el: args.public_port_el,
        public_port_cl: args.public_port_cl,
        public_ip: args.public_ip,
        log_level_el: args.log_level_el,
        log_level_cl: args.log_level_cl,
        check_interval: Some(args.check_interval),
        run_timeout: Some(args.run_timeout),
    };

    let config = raw.validate().context("invalid sync configuration")?;

    let controller: Arc<dyn EnclaveController> = if args.local_enclave {
        Arc::new(LocalEnclaveController::new())
    } else {
        Arc::new(KurtosisEnclaveController::default())
    };

    let reporting = config
        .server_url
        .clone()
        .map(|url| Arc::new(ReportingClient::new(url, config.server_auth.clone())));

    let engine = SyncTestEngine::new(
        config,
        controller,
        Arc::new(HttpProbeFactory),
        Arc::new(HostSystemInfoCollector),
        reporting.clone(),
    );

    let cancel = engine.cancellation_token();
    tokio::spawn(async move {
        // Only requests shutdown; teardown and report persistence happen on
        // the engine's own poll loop so we never race the report store.
        let Ok(mut sigterm) = signal(SignalKind::terminate()) else {
            warn!("failed to install SIGTERM handler");
            return;
        };
        let Ok(mut sigint) = signal(SignalKind::interrupt()) else {
            warn!("failed to install SIGINT handler");
            return;
        };
        tokio::select! {
            _ = sigterm.recv() => info!("received SIGTERM, cancelling run"),
            _ = sigint.recv() => info!("received SIGINT, cancelling run"),
        }
        cancel.cancel();
    });

    let outcome = engine.run().await.context("sync run failed")?;

    if let Some(reporting) = &reporting {
        reporting.shutdown();
    }

    info!(
        run_id = %outcome.run_id,
        status = %outcome.status,
        final_block = outcome.final_block,
        final_slot = outcome.final_slot,
        main_report = %outcome.main_report_path.display(),
        "sync run finished: {}",
        outcome.status_message
    );

    Ok(outcome.status.exit_code())
}

// ── server ────────────────────────────────────────────────────────────────────

pub async fn server(args: ServerArgs) -> Result<()> {
    let hub = Arc::new(SSEHub::new());
    let store = Arc::new(TestStore::new(hub.clone()));
    let janitor = store.start();

    let state = AppState { store: store.clone(), hub, auth_token: args.auth_token.map(Arc::new) };
    let app = build_app(state, cors_layer(&args.cors_origins));

    let listener = tokio::net::TcpListener::bind(&args.listen)
        .await
        .with_context(|| format!("failed to bind {}", args.listen))?;
    info!(listen = %args.listen, "ingestion server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    store.stop();
    let _ = janitor.await;
    Ok(())
}

async fn shutdown_signal() {
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
    info!("shutdown signal received");
}

// ── report-index ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
struct IndexEntry {
    run_id: String,
    timestamp: i64,
    network: String,
    labels: BTreeMap<String, String>,
    status: String,
    status_message: String,
    final_block: u64,
    final_slot: u64,
    main_file: String,
    progress_file: Option<String>,
}

pub async fn report_index(args: ReportIndexArgs) -> Result<()> {
    if !args.watch {
        let count = generate_index(&args.report_dir)?;
        info!(count, dir = %args.report_dir.display(), "wrote report index");
        return Ok(());
    }

    info!(dir = %args.report_dir.display(), "watching reports directory for index regeneration");
    let mut last_signature = None;
    let mut last_run = Instant::now() - INDEX_DEBOUNCE;
    loop {
        let signature = directory_signature(&args.report_dir)?;
        let due = last_run.elapsed() >= INDEX_DEBOUNCE;
        if due && Some(&signature) != last_signature.as_ref() {
            let count = generate_index(&args.report_dir)?;
            info!(count, "regenerated report index");
            last_signature = Some(signature);
            last_run = Instant::now();
        }
        tokio::time::sleep(INDEX_POLL_INTERVAL).await;
    }
}

/// `(file count, latest mtime)` over `*.main.json` files — cheap enough to
/// poll without a filesystem-watcher dependency.
fn directory_signature(dir: &Path) -> Result<(usize, i64)> {
    let mut count = 0usize;
    let mut latest = 0i64;
    if dir.exists() {
        for entry in std::fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
            let entry = entry?;
            if !entry.file_name().to_string_lossy().ends_with(INDEX_FILE_SUFFIX) {
                continue;
            }
            count += 1;
            if let Ok(modified) = entry.metadata().and_then(|m| m.modified()) {
                if let Ok(since_epoch) = modified.duration_since(std::time::UNIX_EPOCH) {
                    latest = latest.max(since_epoch.as_secs() as i64);
                }
            }
        }
    }
    Ok((count, latest))
}

fn generate_index(dir: &Path) -> Result<usize> {
    let mut entries = Vec::new();

    if dir.exists() {
        for entry in std::fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
            let entry = entry?;
            let path = entry.path();
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default().to_string();
            if !name.ends_with(INDEX_FILE_SUFFIX) {
                continue;
            }

            let bytes = std::fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
            let report: syncoor_domain::Report = match serde_json::from_slice(&bytes) {
                Ok(report) => report,
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "skipping unparseable report");
                    continue;
                }
            };

            entries.push(IndexEntry {
                run_id: report.run_id.as_str().to_string(),
                timestamp: report.timestamp,
                network: report.network,
                labels: report.labels,
                status: report.sync_status.status.as_str().to_string(),
                status_message: report.sync_status.status_message,
                final_block: report.sync_status.final_block,
                final_slot: report.sync_status.final_slot,
                main_file: name,
                progress_file: report.sync_status.progress_file,
            });
        }
    }

    entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    let count = entries.len();
    syncoor_report::fs::write_json_atomic(&dir.join("index.json"), &entries)
        .context("failed to write report index")?;
    Ok(count)
}

// ── report-to-md ──────────────────────────────────────────────────────────────

pub async fn report_to_md(args: ReportToMdArgs) -> Result<()> {
    let bytes = std::fs::read(&args.report_path)
        .with_context(|| format!("reading {}", args.report_path.display()))?;
    let report: syncoor_domain::Report = serde_json::from_slice(&bytes)
        .with_context(|| format!("parsing {}", args.report_path.display()))?;

    let progress = load_sibling_progress(&args.report_path, &report);
    let markdown = output::render_report_markdown(&report, progress.as_deref());

    match args.output {
        Some(path) => std::fs::write(&path, &markdown)
            .with_context(|| format!("writing {}", path.display()))?,
        None => println!("{markdown}"),
    }
    Ok(())
}

fn load_sibling_progress(
    report_path: &Path,
    report: &syncoor_domain::Report,
) -> Option<Vec<syncoor_domain::SyncProgressEntry>> {
    let file_name = report.sync_status.progress_file.as_ref()?;
    let progress_path = report_path.parent().unwrap_or_else(|| Path::new(".")).join(file_name);
    let bytes = std::fs::read(progress_path).ok()?;
    serde_json::from_slice(&bytes).ok()
}

// ── sysinfo ───────────────────────────────────────────────────────────────────

pub fn sysinfo() -> Result<()> {
    let info = HostSystemInfoCollector.collect().context("failed to collect host system info")?;
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

#[allow(dead_code)]
fn default_report_dir() -> PathBuf {
    PathBuf::from("./reports")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_signature_counts_only_main_reports() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.main.json"), b"{}").unwrap();
        std::fs::write(dir.path().join("a.progress.json"), b"[]").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        let (count, _) = directory_signature(dir.path()).unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn generate_index_writes_entries_sorted_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let older = syncoor_domain::Report::new(syncoor_domain::RunId::new("run-1"), 1000, "hoodi");
        let newer = syncoor_domain::Report::new(syncoor_domain::RunId::new("run-2"), 2000, "hoodi");
        std::fs::write(
            dir.path().join("run-1.main.json"),
            serde_json::to_vec(&older).unwrap(),
        )
        .unwrap();
        std::fs::write(
            dir.path().join("run-2.main.json"),
            serde_json::to_vec(&newer).unwrap(),
        )
        .unwrap();

        let count = generate_index(dir.path()).unwrap();
        assert_eq!(count, 2);

        let bytes = std::fs::read(dir.path().join("index.json")).unwrap();
        let entries: Vec<IndexEntry> = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(entries[0].run_id, "run-2");
        assert_eq!(entries[1].run_id, "run-1");
    }

    #[test]
    fn generate_index_skips_unparseable_files_without_failing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.main.json"), b"not json").unwrap();
        let count = generate_index(dir.path()).unwrap();
        assert_eq!(count, 0);
    }
}
