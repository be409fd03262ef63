use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Notify, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::hub::{Event, EventData, SSEHub};
use crate::types::{CompleteRequest, KeepaliveRequest, ProgressPoint, TestData, TestDetail, TestSummary};

const DEFAULT_MAX_HISTORY: usize = 1000;
const DEFAULT_MAX_AGE_SECS: i64 = 24 * 60 * 60;
const JANITOR_TICK: std::time::Duration = std::time::Duration::from_secs(60 * 60);

struct StopFlag {
    notify: Notify,
    stopped: AtomicBool,
}

/// In-memory concurrent test registry (§4.8). A single `RwLock` serializes
/// all mutations and snapshots; reads return deep copies. Bounded `History`
/// (ring-buffer trim past `MaxHistory`) and a background janitor evicting
/// entries older than `MaxAge`, same concurrency shape used elsewhere in
/// this workspace (`Arc<RwLock<Inner>>`, deep-copy reads).
#[derive(Clone)]
pub struct TestStore {
    inner: Arc<RwLock<HashMap<String, TestData>>>,
    hub: Arc<SSEHub>,
    max_history: usize,
    max_age_secs: i64,
    stop: Arc<StopFlag>,
}

impl TestStore {
    pub fn new(hub: Arc<SSEHub>) -> Self {
        TestStore {
            inner: Arc::new(RwLock::new(HashMap::new())),
            hub,
            max_history: DEFAULT_MAX_HISTORY,
            max_age_secs: DEFAULT_MAX_AGE_SECS,
            stop: Arc::new(StopFlag { notify: Notify::new(), stopped: AtomicBool::new(false) }),
        }
    }

    #[cfg(test)]
    pub fn with_limits(hub: Arc<SSEHub>, max_history: usize, max_age_secs: i64) -> Self {
        TestStore {
            inner: Arc::new(RwLock::new(HashMap::new())),
            hub,
            max_history,
            max_age_secs,
            stop: Arc::new(StopFlag { notify: Notify::new(), stopped: AtomicBool::new(false) }),
        }
    }

    /// Create-or-touch a test. Returns `(summary, created)`.
    pub async fn keepalive(&self, req: KeepaliveRequest) -> Result<(TestSummary, bool), StoreError> {
        if req.run_id.trim().is_empty() {
            return Err(StoreError::MissingRunId);
        }

        let mut guard = self.inner.write().await;
        let created = !guard.contains_key(&req.run_id);

        let summary = if created {
            let data = TestData::from_keepalive(&req);
            let summary = data.summary();
            guard.insert(req.run_id.clone(), data);
            summary
        } else {
            let data = guard.get_mut(&req.run_id).expect("checked contains_key above");
            data.last_update = req.timestamp;
            data.labels = req.labels.clone();
            data.el = req.el_client.clone();
            data.cl = req.cl_client.clone();
            data.enclave_name = req.enclave_name.clone();
            if req.system_info.is_some() {
                data.system_info = req.system_info.clone();
            }
            data.run_timeout = req.run_timeout;
            data.summary()
        };
        drop(guard);

        if created {
            self.hub.publish(Event {
                run_id: req.run_id.clone(),
                timestamp: req.timestamp,
                data: EventData::Start {
                    network: req.network.clone(),
                    el_client: req.el_client,
                    cl_client: req.cl_client,
                    labels: req.labels,
                },
            });
        }

        Ok((summary, created))
    }

    /// Appends a progress point; rejects updates for tests already complete.
    pub async fn update_progress(&self, run_id: &str, point: ProgressPoint) -> Result<(), StoreError> {
        let mut guard = self.inner.write().await;
        let data = guard.get_mut(run_id).ok_or_else(|| StoreError::NotFound(run_id.to_string()))?;
        if data.is_complete {
            return Err(StoreError::Conflict(run_id.to_string()));
        }

        data.last_update = point.timestamp;
        data.current_metrics = Some(point.clone());
        data.history.push_back(point.clone());
        if data.history.len() > self.max_history {
            data.history.pop_front();
        }
        drop(guard);

        self.hub.publish(Event {
            run_id: run_id.to_string(),
            timestamp: point.timestamp,
            data: EventData::Progress(point),
        });
        Ok(())
    }

    /// Finalizes a test. Idempotent: a second call on an already-complete
    /// test is a no-op success, not an error.
    pub async fn complete_test(&self, run_id: &str, req: CompleteRequest) -> Result<(), StoreError> {
        let mut guard = self.inner.write().await;
        let data = guard.get_mut(run_id).ok_or_else(|| StoreError::NotFound(run_id.to_string()))?;
        if data.is_complete {
            return Ok(());
        }

        data.is_running = false;
        data.is_complete = true;
        data.end_time = Some(req.timestamp);
        data.error = req.error.clone();
        drop(guard);

        self.hub.publish(Event {
            run_id: run_id.to_string(),
            timestamp: req.timestamp,
            data: EventData::Complete { success: req.success, error: req.error },
        });
        Ok(())
    }

    pub async fn get_detail(&self, run_id: &str) -> Option<TestDetail> {
        let guard = self.inner.read().await;
        guard.get(run_id).map(TestData::detail)
    }

    pub async fn list_summaries(&self, active_only: bool) -> Vec<TestSummary> {
        let guard = self.inner.read().await;
        guard
            .values()
            .filter(|d| !active_only || d.is_running)
            .map(TestData::summary)
            .collect()
    }

    async fn evict_expired(&self) {
        let now = Utc::now().timestamp();
        let mut guard = self.inner.write().await;
        let before = guard.len();
        guard.retain(|_, data| now - data.last_update < self.max_age_secs);
        let evicted = before - guard.len();
        if evicted > 0 {
            info!(evicted, "janitor evicted expired tests");
        }
    }

    /// Launches the background janitor. Safe to call once per store instance.
    pub fn start(&self) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(JANITOR_TICK);
            interval.tick().await; // first tick fires immediately; skip it
            loop {
                if store.stop.stopped.load(Ordering::SeqCst) {
                    debug!("test store janitor stopping");
                    return;
                }
                tokio::select! {
                    _ = interval.tick() => {
                        store.evict_expired().await;
                    }
                    _ = store.stop.notify.notified() => {
                        debug!("test store janitor stopping");
                        return;
                    }
                }
            }
        })
    }

    /// Halts the janitor. Idempotent — safe to call more than once. Uses
    /// `notify_one`, which stores a wake-up permit for the next `notified()`
    /// call even if no task is parked on it yet — `notify_waiters` would
    /// drop the signal if `stop()` races ahead of the janitor task parking.
    pub fn stop(&self) {
        if self.stop.stopped.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_ok() {
            self.stop.notify.notify_one();
        }
    }
}
