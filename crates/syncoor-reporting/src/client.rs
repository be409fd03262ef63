use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::ReportingError;
use crate::messages::{CompleteRequest, KeepaliveRequest, ProgressMetrics};

const QUEUE_CAPACITY: usize = 256;
const BACKOFF_INITIAL: Duration = Duration::from_millis(500);
const BACKOFF_FACTOR: u32 = 2;
const BACKOFF_CAP: Duration = Duration::from_secs(10);
const PROGRESS_MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone)]
enum OutboundEvent {
    Keepalive(KeepaliveRequest),
    Progress { run_id: String, metrics: ProgressMetrics },
    Complete { run_id: String, body: CompleteRequest },
}

/// Shared bounded buffer drained by the one background worker task. A plain
/// `VecDeque` behind a `Mutex` rather than `tokio::sync::mpsc` — the spec's
/// drop-oldest-on-full rule for progress needs the producer to reach into the
/// queue and evict, which an mpsc sender cannot do.
struct Queue {
    items: Mutex<VecDeque<OutboundEvent>>,
    notify: Notify,
}

impl Queue {
    fn new() -> Self {
        Queue { items: Mutex::new(VecDeque::with_capacity(QUEUE_CAPACITY)), notify: Notify::new() }
    }

    /// Drop-oldest-on-full enqueue, used for progress updates (lossy by design).
    fn push_progress_dropping_oldest(&self, event: OutboundEvent) {
        let mut items = self.items.lock().expect("queue mutex poisoned");
        if items.len() >= QUEUE_CAPACITY {
            items.pop_front();
            debug!("reporting queue full, dropped oldest progress entry");
        }
        items.push_back(event);
        drop(items);
        self.notify.notify_one();
    }

    /// Must-not-drop enqueue for keepalive/complete. Logs a warning the first
    /// time it finds the queue saturated, then pushes anyway so the caller
    /// never blocks indefinitely.
    fn push_guaranteed(&self, event: OutboundEvent) {
        let mut items = self.items.lock().expect("queue mutex poisoned");
        if items.len() >= QUEUE_CAPACITY {
            warn!("reporting queue saturated, outbound worker is falling behind");
        }
        items.push_back(event);
        drop(items);
        self.notify.notify_one();
    }

    fn pop(&self) -> Option<OutboundEvent> {
        self.items.lock().expect("queue mutex poisoned").pop_front()
    }
}

/// Non-blocking outbound client to the ingestion server (§4.4). `Report*`
/// calls enqueue and return immediately; one background task drains the
/// queue, applying retry/backoff per event kind.
#[derive(Clone)]
pub struct ReportingClient {
    queue: Arc<Queue>,
    stopped: Arc<AtomicBool>,
}

struct Worker {
    client: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
}

impl Worker {
    fn auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn post_json<T: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<(), ReportingError> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .auth(self.client.post(&url))
            .json(body)
            .send()
            .await
            .map_err(|source| ReportingError::Request { url: url.clone(), source })?;

        if !resp.status().is_success() {
            return Err(ReportingError::Status { url, status: resp.status().as_u16() });
        }
        Ok(())
    }

    /// Retries with exponential backoff. `max_attempts = None` retries forever
    /// (completion events), `Some(n)` caps at `n` attempts (progress/keepalive).
    async fn send_with_retry(&self, event: &OutboundEvent, max_attempts: Option<u32>) {
        let mut attempt = 0u32;
        let mut backoff = BACKOFF_INITIAL;
        loop {
            attempt += 1;
            let result = match event {
                OutboundEvent::Keepalive(req) => {
                    self.post_json("/api/v1/tests/keepalive", req).await
                }
                OutboundEvent::Progress { run_id, metrics } => {
                    self.post_json(&format!("/api/v1/tests/{run_id}/progress"), metrics).await
                }
                OutboundEvent::Complete { run_id, body } => {
                    self.post_json(&format!("/api/v1/tests/{run_id}/complete"), body).await
                }
            };

            match result {
                Ok(()) => return,
                Err(e) => {
                    let exhausted = max_attempts.is_some_and(|n| attempt >= n);
                    if exhausted {
                        warn!(error = %e, attempt, "giving up on outbound report event");
                        return;
                    }
                    warn!(error = %e, attempt, "outbound report event failed, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff = std::cmp::min(backoff * BACKOFF_FACTOR, BACKOFF_CAP);
                }
            }
        }
    }
}

impl ReportingClient {
    pub fn new(base_url: impl Into<String>, auth_token: Option<String>) -> Self {
        let queue = Arc::new(Queue::new());
        let stopped = Arc::new(AtomicBool::new(false));
        let worker = Worker {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .expect("reqwest client build"),
            base_url: base_url.into(),
            auth_token,
        };
        spawn_worker(worker, queue.clone(), stopped.clone());
        ReportingClient { queue, stopped }
    }

    pub fn send_keepalive(&self, req: KeepaliveRequest) {
        self.queue.push_guaranteed(OutboundEvent::Keepalive(req));
    }

    pub fn send_progress(&self, run_id: impl Into<String>, metrics: ProgressMetrics) {
        self.queue
            .push_progress_dropping_oldest(OutboundEvent::Progress { run_id: run_id.into(), metrics });
    }

    pub fn send_complete(&self, run_id: impl Into<String>, body: CompleteRequest) {
        self.queue.push_guaranteed(OutboundEvent::Complete { run_id: run_id.into(), body });
    }

    /// Signals the background worker to stop after draining what is queued.
    pub fn shutdown(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.queue.notify.notify_one();
    }
}

fn spawn_worker(worker: Worker, queue: Arc<Queue>, stopped: Arc<AtomicBool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let event = queue.pop();
            match event {
                Some(event) => {
                    let max_attempts = match &event {
                        OutboundEvent::Complete { .. } => None,
                        _ => Some(PROGRESS_MAX_ATTEMPTS),
                    };
                    worker.send_with_retry(&event, max_attempts).await;
                }
                None => {
                    if stopped.load(Ordering::SeqCst) {
                        return;
                    }
                    queue.notify.notified().await;
                }
            }
        }
    })
}
