use std::collections::HashMap;
use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::controller::{EnclaveController, NetworkHandle, PortInfo, RunConfig, ServiceInfo, ServiceStatus};
use crate::error::EnclaveError;

/// Drives a Kurtosis-style enclave engine by invoking its CLI as a subprocess
/// and parsing the JSON it prints with `--output json`.
///
/// Mirrors the subprocess-invocation shape used for IaC tooling elsewhere in
/// this workspace: build argv, spawn, capture stdout/stderr, parse.
pub struct KurtosisEnclaveController {
    binary: String,
}

impl Default for KurtosisEnclaveController {
    fn default() -> Self {
        Self::new("kurtosis")
    }
}

impl KurtosisEnclaveController {
    pub fn new(binary: impl Into<String>) -> Self {
        KurtosisEnclaveController { binary: binary.into() }
    }

    async fn run_json(&self, args: &[&str]) -> Result<Value, EnclaveError> {
        let output = Command::new(&self.binary)
            .args(args)
            .arg("--output")
            .arg("json")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| EnclaveError::Subprocess {
                command: format!("{} {}", self.binary, args.join(" ")),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            return Err(EnclaveError::Subprocess {
                command: format!("{} {}", self.binary, args.join(" ")),
                message: stderr,
            });
        }

        serde_json::from_slice(&output.stdout).map_err(|e| EnclaveError::Parse(e.to_string()))
    }
}

#[derive(Deserialize)]
struct RawServiceInfo {
    image: String,
    #[serde(default)]
    ports: HashMap<String, RawPort>,
    #[serde(default)]
    public_ports: HashMap<String, RawPort>,
    #[serde(default)]
    entrypoint: Vec<String>,
    #[serde(default)]
    cmd: Vec<String>,
    #[serde(default)]
    env: HashMap<String, String>,
    #[serde(default)]
    labels: HashMap<String, String>,
}

#[derive(Deserialize)]
struct RawPort {
    number: u16,
    transport: String,
}

fn convert_ports(raw: HashMap<String, RawPort>) -> HashMap<String, PortInfo> {
    raw.into_iter()
        .map(|(k, v)| (k, PortInfo { number: v.number, transport: v.transport }))
        .collect()
}

#[async_trait]
impl EnclaveController for KurtosisEnclaveController {
    async fn inspect(&self, enclave: &str, service: &str) -> Result<ServiceInfo, EnclaveError> {
        debug!(enclave, service, "kurtosis: inspect");
        let value = self.run_json(&["enclave", "inspect", enclave, "--service", service]).await?;
        if value.is_null() {
            return Err(EnclaveError::ServiceNotFound {
                enclave: enclave.to_string(),
                service: service.to_string(),
            });
        }
        let raw: RawServiceInfo =
            serde_json::from_value(value).map_err(|e| EnclaveError::Parse(e.to_string()))?;

        Ok(ServiceInfo {
            image: raw.image,
            ports: convert_ports(raw.ports),
            public_ports: convert_ports(raw.public_ports),
            entrypoint: raw.entrypoint,
            cmd: raw.cmd,
            env: raw.env,
            labels: raw.labels,
        })
    }

    async fn enclave_exists(&self, enclave: &str) -> Result<bool, EnclaveError> {
        match self.run_json(&["enclave", "inspect", enclave]).await {
            Ok(_) => Ok(true),
            Err(EnclaveError::Subprocess { message, .. }) if message.contains("not found") => {
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn service_status(
        &self,
        enclave: &str,
        service: &str,
    ) -> Result<ServiceStatus, EnclaveError> {
        let value = self
            .run_json(&["enclave", "inspect", enclave, "--service", service, "--status"])
            .await?;

        let running = value.get("running").and_then(Value::as_bool).unwrap_or(false);
        let state = value.get("state").and_then(Value::as_str).unwrap_or("unknown").to_string();
        let exit_code = value.get("exit_code").and_then(Value::as_i64).unwrap_or(0) as i32;
        let error_message =
            value.get("error_message").and_then(Value::as_str).unwrap_or_default().to_string();

        if !running {
            warn!(enclave, service, state, exit_code, "service not running");
        }

        Ok(ServiceStatus { running, state, exit_code, error_message })
    }

    async fn run(&self, config: &RunConfig) -> Result<NetworkHandle, EnclaveError> {
        debug!(enclave = %config.enclave_name, "kurtosis: run");
        // `kurtosis run` is idempotent by enclave name: an existing live enclave
        // with this name is reused rather than recreated (orphan-on-exit /
        // reuse-by-name semantics required by §4.1).
        if self.enclave_exists(&config.enclave_name).await? {
            return Ok(NetworkHandle { enclave_name: config.enclave_name.clone() });
        }

        let mut args = vec![
            "run".to_string(),
            "--enclave".to_string(),
            config.enclave_name.clone(),
        ];
        if config.public {
            args.push("--args".to_string());
            args.push(format!(
                "{{\"public\":true,\"public_ip\":\"{}\"}}",
                config.public_ip.clone().unwrap_or_default()
            ));
        }

        let status = Command::new(&self.binary)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .status()
            .await
            .map_err(|e| EnclaveError::StartupFailed(e.to_string()))?;

        if !status.success() {
            return Err(EnclaveError::StartupFailed(format!(
                "kurtosis run exited with {status}"
            )));
        }

        Ok(NetworkHandle { enclave_name: config.enclave_name.clone() })
    }

    async fn destroy(&self, enclave: &str) -> Result<(), EnclaveError> {
        debug!(enclave, "kurtosis: destroy");
        let status = Command::new(&self.binary)
            .args(["enclave", "rm", "-f", enclave])
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .status()
            .await
            .map_err(|e| EnclaveError::Internal(e.to_string()))?;
        if !status.success() {
            return Err(EnclaveError::Internal(format!("kurtosis enclave rm exited with {status}")));
        }
        Ok(())
    }
}
