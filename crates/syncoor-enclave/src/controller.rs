use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::EnclaveError;

/// One exposed port on an inspected service: `portKey -> {number, transport}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortInfo {
    pub number: u16,
    pub transport: String,
}

/// Result of inspecting a single service within an enclave (§4.1).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub image: String,
    pub ports: HashMap<String, PortInfo>,
    pub public_ports: HashMap<String, PortInfo>,
    pub entrypoint: Vec<String>,
    pub cmd: Vec<String>,
    pub env: HashMap<String, String>,
    pub labels: HashMap<String, String>,
}

/// Structured, non-running reason classification (§4.1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub running: bool,
    pub state: String,
    pub exit_code: i32,
    pub error_message: String,
}

impl ServiceStatus {
    pub fn running() -> Self {
        ServiceStatus {
            running: true,
            state: "running".to_string(),
            exit_code: 0,
            error_message: String::new(),
        }
    }

    /// Human-readable crash reason, e.g. "OOMKilled" or "exited (exit=137)".
    pub fn crash_reason(&self) -> String {
        if self.running {
            return String::new();
        }
        if !self.error_message.is_empty() {
            return self.error_message.clone();
        }
        if self.state.eq_ignore_ascii_case("oomkilled") {
            return format!("OOMKilled (exit={})", self.exit_code);
        }
        if self.exit_code != 0 {
            return format!("exited (exit={})", self.exit_code);
        }
        format!("not-found ({})", self.state)
    }
}

/// Participant configuration for launching a new enclave (§4.1 `Run`).
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub enclave_name: String,
    pub el_image: String,
    pub el_extra_args: Vec<String>,
    pub el_env: HashMap<String, String>,
    pub cl_image: String,
    pub cl_extra_args: Vec<String>,
    pub cl_env: HashMap<String, String>,
    pub network: String,
    pub checkpoint_sync_url: Option<String>,
    pub public: bool,
    pub public_port_el: Option<u16>,
    pub public_port_cl: Option<u16>,
    pub public_ip: Option<String>,
}

/// Opaque handle to a running enclave, returned by `Run`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkHandle {
    pub enclave_name: String,
}

/// Capability contract over the container/enclave engine (§4.1). Treated as
/// opaque by the runner — any implementation must provide at-most-once
/// semantics for `run` given an identical enclave name (orphan-on-exit,
/// reuse-by-name).
#[async_trait]
pub trait EnclaveController: Send + Sync {
    async fn inspect(&self, enclave: &str, service: &str) -> Result<ServiceInfo, EnclaveError>;

    async fn enclave_exists(&self, enclave: &str) -> Result<bool, EnclaveError>;

    async fn service_status(
        &self,
        enclave: &str,
        service: &str,
    ) -> Result<ServiceStatus, EnclaveError>;

    async fn run(&self, config: &RunConfig) -> Result<NetworkHandle, EnclaveError>;

    async fn destroy(&self, enclave: &str) -> Result<(), EnclaveError>;
}
