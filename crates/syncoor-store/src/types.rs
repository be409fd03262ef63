use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Server-side projection of a runner's client pair — an independent wire
/// DTO, not the runner's richer `syncoor_domain::ClientInfo`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(rename = "type")]
    pub client_type: String,
    pub image: String,
    pub extra_args: Vec<String>,
    pub env_vars: BTreeMap<String, String>,
}

/// One sampled progress point, as received from `POST .../progress` (§6.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressPoint {
    pub timestamp: i64,
    pub block: u64,
    pub slot: u64,
    pub exec_disk_usage: u64,
    pub cons_disk_usage: u64,
    pub exec_peers: u32,
    pub cons_peers: u32,
    pub exec_sync_percent: f64,
    pub cons_sync_percent: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exec_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cons_version: Option<String>,
}

/// Request body accepted by `POST /api/v1/tests/keepalive` (§6.1).
#[derive(Debug, Clone, Deserialize)]
pub struct KeepaliveRequest {
    pub run_id: String,
    pub timestamp: i64,
    pub network: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    pub el_client: ClientConfig,
    pub cl_client: ClientConfig,
    pub enclave_name: String,
    #[serde(default)]
    pub system_info: Option<serde_json::Value>,
    #[serde(default)]
    pub run_timeout: Option<u64>,
}

/// Request body accepted by `POST /api/v1/tests/{runId}/complete` (§6.1).
#[derive(Debug, Clone, Deserialize)]
pub struct CompleteRequest {
    pub timestamp: i64,
    pub final_block: u64,
    pub final_slot: u64,
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// Per-run server-side entity (§4.6 "Server-side TestData").
#[derive(Debug, Clone, Serialize)]
pub struct TestData {
    pub run_id: String,
    pub network: String,
    pub labels: BTreeMap<String, String>,
    pub start_time: i64,
    pub last_update: i64,
    pub end_time: Option<i64>,
    pub is_running: bool,
    pub is_complete: bool,
    pub error: Option<String>,
    pub el: ClientConfig,
    pub cl: ClientConfig,
    pub enclave_name: String,
    pub system_info: Option<serde_json::Value>,
    pub current_metrics: Option<ProgressPoint>,
    pub history: std::collections::VecDeque<ProgressPoint>,
    pub run_timeout: Option<u64>,
}

impl TestData {
    pub fn from_keepalive(req: &KeepaliveRequest) -> Self {
        TestData {
            run_id: req.run_id.clone(),
            network: req.network.clone(),
            labels: req.labels.clone(),
            start_time: req.timestamp,
            last_update: req.timestamp,
            end_time: None,
            is_running: true,
            is_complete: false,
            error: None,
            el: req.el_client.clone(),
            cl: req.cl_client.clone(),
            enclave_name: req.enclave_name.clone(),
            system_info: req.system_info.clone(),
            current_metrics: None,
            history: std::collections::VecDeque::new(),
            run_timeout: req.run_timeout,
        }
    }

    pub fn summary(&self) -> TestSummary {
        TestSummary {
            run_id: self.run_id.clone(),
            network: self.network.clone(),
            el_client: self.el.client_type.clone(),
            cl_client: self.cl.client_type.clone(),
            labels: self.labels.clone(),
            is_running: self.is_running,
            is_complete: self.is_complete,
            start_time: self.start_time,
            last_update: self.last_update,
        }
    }

    pub fn detail(&self) -> TestDetail {
        TestDetail { data: self.clone() }
    }
}

/// Lightweight list projection, returned by `GET /api/v1/tests`.
#[derive(Debug, Clone, Serialize)]
pub struct TestSummary {
    pub run_id: String,
    pub network: String,
    pub el_client: String,
    pub cl_client: String,
    pub labels: BTreeMap<String, String>,
    pub is_running: bool,
    pub is_complete: bool,
    pub start_time: i64,
    pub last_update: i64,
}

/// Full projection including bounded history, returned by `GET /api/v1/tests/{runId}`.
#[derive(Debug, Clone, Serialize)]
pub struct TestDetail {
    #[serde(flatten)]
    pub data: TestData,
}
