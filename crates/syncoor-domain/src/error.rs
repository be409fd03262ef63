use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("invalid client type: {0}")]
    InvalidClientType(String),

    #[error("invalid log level: {0}")]
    InvalidLogLevel(String),

    #[error("sync status is frozen: no further progress can be appended after status '{0}'")]
    StatusFrozen(String),

    #[error("progress entry timestamp {new} precedes last entry timestamp {last}")]
    NonMonotonicTimestamp { last: i64, new: i64 },

    #[error("invalid run id: {0}")]
    InvalidRunId(String),
}
