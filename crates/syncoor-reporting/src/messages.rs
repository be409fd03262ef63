//! Wire shapes sent to the ingestion server (§6.1). Kept independent of
//! [`syncoor_domain::Report`] — the wire format is a deliberately thinner
//! projection of the in-memory report.

use std::collections::BTreeMap;

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ClientWireInfo {
    #[serde(rename = "type")]
    pub client_type: String,
    pub image: String,
    pub extra_args: Vec<String>,
    pub env_vars: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct KeepaliveRequest {
    pub run_id: String,
    pub timestamp: i64,
    pub network: String,
    pub labels: BTreeMap<String, String>,
    pub el_client: ClientWireInfo,
    pub cl_client: ClientWireInfo,
    pub enclave_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_info: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_timeout: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressMetrics {
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

#[derive(Debug, Clone, Serialize)]
pub struct CompleteRequest {
    pub timestamp: i64,
    pub final_block: u64,
    pub final_slot: u64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
