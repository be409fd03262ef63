use thiserror::Error;

/// Errors that abort a run before any report can be written. Anything
/// surfaced by the poll loop itself (container crash, probe failure, sync
/// timeout) is instead recorded as a terminal status on the report — see
/// [`crate::engine::SyncTestEngine::run`].
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("config error: {0}")]
    Config(#[from] syncoor_config::ConfigError),

    #[error("enclave controller error: {0}")]
    Enclave(#[from] syncoor_enclave::EnclaveError),

    #[error("report error: {0}")]
    Report(#[from] syncoor_report::ReportError),

    #[error("recovery error: {0}")]
    Recovery(#[from] syncoor_recovery::RecoveryError),

    #[error("enclave did not become ready within the startup timeout")]
    StartupTimedOut,
}
