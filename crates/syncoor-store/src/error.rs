use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("test '{0}' not found")]
    NotFound(String),

    #[error("test '{0}' is already complete")]
    Conflict(String),

    #[error("run_id is required")]
    MissingRunId,
}
