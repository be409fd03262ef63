use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error("fingerprint mismatch on fields: {0:?}")]
    FingerprintMismatch(Vec<&'static str>),

    #[error("enclave controller error: {0}")]
    Enclave(#[from] syncoor_enclave::EnclaveError),

    #[error("temp report io error: {0}")]
    Report(#[from] syncoor_report::ReportError),
}
