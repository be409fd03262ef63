use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnclaveError {
    #[error("enclave '{0}' not found")]
    NotFound(String),

    #[error("service '{service}' not found in enclave '{enclave}'")]
    ServiceNotFound { enclave: String, service: String },

    #[error("failed to start enclave: {0}")]
    StartupFailed(String),

    #[error("failed to inspect enclave: {0}")]
    InspectFailed(String),

    #[error("subprocess '{command}' failed: {message}")]
    Subprocess { command: String, message: String },

    #[error("failed to parse enclave engine output: {0}")]
    Parse(String),

    #[error("internal error: {0}")]
    Internal(String),
}
