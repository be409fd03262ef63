use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, warn};

use syncoor_domain::{Fingerprint, Report};
use syncoor_enclave::EnclaveController;
use syncoor_report::ReportStore;

use crate::error::RecoveryError;

/// What a successful recovery check hands back to the engine: the recovered
/// in-memory report (to seed `ReportStore::restore_report_state`) and the
/// enclave name to reuse rather than recreate.
#[derive(Debug, Clone)]
pub struct RecoveryState {
    pub report: Report,
    pub enclave_name: String,
}

/// Computes and compares [`Fingerprint`]s and asks an [`EnclaveController`]
/// whether the named enclave still exists with matching inspected services
/// (§4.5). Pure validation functions returning a typed error on mismatch —
/// the engine decides policy (log and fall back to a fresh run) on failure.
pub struct RecoveryEngine {
    controller: Arc<dyn EnclaveController>,
    recovery_dir: PathBuf,
}

impl RecoveryEngine {
    pub fn new(controller: Arc<dyn EnclaveController>, recovery_dir: PathBuf) -> Self {
        RecoveryEngine { controller, recovery_dir }
    }

    /// Non-nil iff a temp report exists for `(network, EL, CL)` AND the
    /// fingerprint's named enclave exists AND its inspected services match
    /// `expected` field-wise.
    pub async fn check_recoverable(
        &self,
        expected: &Fingerprint,
    ) -> Result<Option<RecoveryState>, RecoveryError> {
        let el = expected.el_type.to_string();
        let cl = expected.cl_type.to_string();

        let Some(report) =
            ReportStore::load_temp_report(&self.recovery_dir, &expected.network, &el, &cl)?
        else {
            debug!("no temp report found, nothing to recover");
            return Ok(None);
        };

        if !self.controller.enclave_exists(&expected.enclave_name).await? {
            debug!(enclave = %expected.enclave_name, "recorded enclave no longer exists");
            return Ok(None);
        }

        match self.validate_enclave(expected).await {
            Ok(()) => Ok(Some(RecoveryState { report, enclave_name: expected.enclave_name.clone() })),
            Err(e) => {
                warn!(error = %e, "recovery validation failed, falling back to a fresh run");
                Ok(None)
            }
        }
    }

    /// Compares the currently inspected `el`/`cl` services of `expected.enclave_name`
    /// against `expected`, field by field.
    pub async fn validate_enclave(&self, expected: &Fingerprint) -> Result<(), RecoveryError> {
        let el_info = self.controller.inspect(&expected.enclave_name, "el").await?;
        let cl_info = self.controller.inspect(&expected.enclave_name, "cl").await?;

        let observed = Fingerprint {
            network: expected.network.clone(),
            el_type: expected.el_type,
            cl_type: expected.cl_type,
            el_image: el_info.image,
            cl_image: cl_info.image,
            el_extra_args: el_info.cmd,
            cl_extra_args: cl_info.cmd,
            el_env: el_info.env.into_iter().collect(),
            cl_env: cl_info.env.into_iter().collect(),
            enclave_name: expected.enclave_name.clone(),
        };

        let mismatches = expected.diff(&observed);
        if mismatches.is_empty() {
            Ok(())
        } else {
            Err(RecoveryError::FingerprintMismatch(mismatches))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use syncoor_domain::ClientType;
    use syncoor_enclave::{LocalEnclaveController, RunConfig};

    fn fingerprint(enclave_name: &str) -> Fingerprint {
        Fingerprint {
            network: "hoodi".to_string(),
            el_type: ClientType::Geth,
            cl_type: ClientType::Teku,
            el_image: "geth:latest".to_string(),
            cl_image: "teku:latest".to_string(),
            el_extra_args: vec![],
            cl_extra_args: vec![],
            el_env: Default::default(),
            cl_env: Default::default(),
            enclave_name: enclave_name.to_string(),
        }
    }

    fn run_config(enclave_name: &str) -> RunConfig {
        RunConfig {
            enclave_name: enclave_name.to_string(),
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
    async fn no_temp_report_is_not_recoverable() {
        let dir = tempfile::tempdir().unwrap();
        let controller = Arc::new(LocalEnclaveController::new());
        let engine = RecoveryEngine::new(controller, dir.path().to_path_buf());
        let result = engine.check_recoverable(&fingerprint("enc-1")).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn missing_enclave_is_not_recoverable() {
        let dir = tempfile::tempdir().unwrap();
        let report_store = ReportStore::new(syncoor_domain::RunId::new("run-1"), 1000, "hoodi");
        report_store.save_temp_report(dir.path(), "geth", "teku").await.unwrap();

        let controller = Arc::new(LocalEnclaveController::new());
        let engine = RecoveryEngine::new(controller, dir.path().to_path_buf());
        let result = engine.check_recoverable(&fingerprint("missing-enclave")).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn matching_fingerprint_is_recoverable() {
        let dir = tempfile::tempdir().unwrap();
        let report_store = ReportStore::new(syncoor_domain::RunId::new("run-1"), 1000, "hoodi");
        report_store.save_temp_report(dir.path(), "geth", "teku").await.unwrap();

        let controller = Arc::new(LocalEnclaveController::new());
        controller.run(&run_config("enc-1")).await.unwrap();

        let engine = RecoveryEngine::new(controller, dir.path().to_path_buf());
        let result = engine.check_recoverable(&fingerprint("enc-1")).await.unwrap();
        assert!(result.is_some());
    }

    #[tokio::test]
    async fn image_mismatch_is_not_recoverable() {
        let dir = tempfile::tempdir().unwrap();
        let report_store = ReportStore::new(syncoor_domain::RunId::new("run-1"), 1000, "hoodi");
        report_store.save_temp_report(dir.path(), "geth", "teku").await.unwrap();

        let controller = Arc::new(LocalEnclaveController::new());
        let mut cfg = run_config("enc-1");
        cfg.el_image = "geth:v2".to_string();
        controller.run(&cfg).await.unwrap();

        let engine = RecoveryEngine::new(controller, dir.path().to_path_buf());
        let result = engine.check_recoverable(&fingerprint("enc-1")).await.unwrap();
        assert!(result.is_none());
    }
}
