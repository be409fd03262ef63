use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("domain error: {0}")]
    Domain(#[from] syncoor_domain::DomainError),

    #[error("internal report store error: {0}")]
    Internal(String),
}
