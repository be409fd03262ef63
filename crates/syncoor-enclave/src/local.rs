use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::controller::{EnclaveController, NetworkHandle, PortInfo, RunConfig, ServiceInfo, ServiceStatus};
use crate::error::EnclaveError;

#[derive(Debug, Default)]
struct Inner {
    enclaves: HashMap<String, RunConfig>,
    crashed: HashMap<(String, String), ServiceStatus>,
}

/// An in-memory stub enclave controller that simulates a cluster locally.
///
/// Performs no real container I/O; produces synthetic service info so the
/// engine and tests can exercise the poll loop without a container runtime.
#[derive(Clone)]
pub struct LocalEnclaveController {
    inner: Arc<RwLock<Inner>>,
}

impl Default for LocalEnclaveController {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalEnclaveController {
    pub fn new() -> Self {
        LocalEnclaveController { inner: Arc::new(RwLock::new(Inner::default())) }
    }

    /// Test hook: mark a service as crashed with a specific status.
    pub async fn inject_crash(&self, enclave: &str, service: &str, status: ServiceStatus) {
        let mut guard = self.inner.write().await;
        guard.crashed.insert((enclave.to_string(), service.to_string()), status);
    }
}

#[async_trait]
impl EnclaveController for LocalEnclaveController {
    async fn inspect(&self, enclave: &str, service: &str) -> Result<ServiceInfo, EnclaveError> {
        debug!(enclave, service, "LocalEnclaveController: inspect");
        let guard = self.inner.read().await;
        let cfg = guard
            .enclaves
            .get(enclave)
            .ok_or_else(|| EnclaveError::NotFound(enclave.to_string()))?;

        let (image, extra_args, env) = match service {
            "el" => (cfg.el_image.clone(), cfg.el_extra_args.clone(), cfg.el_env.clone()),
            "cl" => (cfg.cl_image.clone(), cfg.cl_extra_args.clone(), cfg.cl_env.clone()),
            other => {
                return Err(EnclaveError::ServiceNotFound {
                    enclave: enclave.to_string(),
                    service: other.to_string(),
                })
            }
        };

        let mut ports = HashMap::new();
        ports.insert("rpc".to_string(), PortInfo { number: 8545, transport: "tcp".to_string() });

        Ok(ServiceInfo {
            image,
            ports: ports.clone(),
            public_ports: ports,
            entrypoint: vec![],
            cmd: extra_args,
            env,
            labels: HashMap::new(),
        })
    }

    async fn enclave_exists(&self, enclave: &str) -> Result<bool, EnclaveError> {
        let guard = self.inner.read().await;
        Ok(guard.enclaves.contains_key(enclave))
    }

    async fn service_status(
        &self,
        enclave: &str,
        service: &str,
    ) -> Result<ServiceStatus, EnclaveError> {
        let guard = self.inner.read().await;
        if !guard.enclaves.contains_key(enclave) {
            return Err(EnclaveError::NotFound(enclave.to_string()));
        }
        if let Some(status) = guard.crashed.get(&(enclave.to_string(), service.to_string())) {
            return Ok(status.clone());
        }
        Ok(ServiceStatus::running())
    }

    async fn run(&self, config: &RunConfig) -> Result<NetworkHandle, EnclaveError> {
        debug!(enclave = %config.enclave_name, "LocalEnclaveController: run");
        let mut guard = self.inner.write().await;
        guard
            .enclaves
            .entry(config.enclave_name.clone())
            .or_insert_with(|| config.clone());
        Ok(NetworkHandle { enclave_name: config.enclave_name.clone() })
    }

    async fn destroy(&self, enclave: &str) -> Result<(), EnclaveError> {
        debug!(enclave, "LocalEnclaveController: destroy");
        let mut guard = self.inner.write().await;
        guard.enclaves.remove(enclave);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(name: &str) -> RunConfig {
        RunConfig {
            enclave_name: name.to_string(),
            el_image: "geth:latest".to_string(),
            el_extra_args: vec![],
            el_env: HashMap::new(),
            cl_image: "teku:latest".to_string(),
            cl_extra_args: vec![],
            cl_env: HashMap::new(),
            network: "hoodi".to_string(),
            checkpoint_sync_url: None,
            public: false,
            public_port_el: None,
            public_port_cl: None,
            public_ip: None,
        }
    }

    #[tokio::test]
    async fn run_is_idempotent_by_name() {
        let controller = LocalEnclaveController::new();
        controller.run(&cfg("test")).await.unwrap();
        controller.run(&cfg("test")).await.unwrap();
        assert!(controller.enclave_exists("test").await.unwrap());
    }

    #[tokio::test]
    async fn inspect_unknown_enclave_errors() {
        let controller = LocalEnclaveController::new();
        assert!(controller.inspect("nope", "el").await.is_err());
    }

    #[tokio::test]
    async fn injected_crash_is_reported() {
        let controller = LocalEnclaveController::new();
        controller.run(&cfg("test")).await.unwrap();
        controller
            .inject_crash(
                "test",
                "el",
                ServiceStatus {
                    running: false,
                    state: "OOMKilled".to_string(),
                    exit_code: 137,
                    error_message: String::new(),
                },
            )
            .await;
        let status = controller.service_status("test", "el").await.unwrap();
        assert!(!status.running);
        assert!(status.crash_reason().contains("OOM"));
        assert!(status.crash_reason().contains("137"));
    }

    #[tokio::test]
    async fn destroy_removes_enclave() {
        let controller = LocalEnclaveController::new();
        controller.run(&cfg("test")).await.unwrap();
        controller.destroy("test").await.unwrap();
        assert!(!controller.enclave_exists("test").await.unwrap());
    }
}
