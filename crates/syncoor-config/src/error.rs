use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid check interval: must be positive, got {0:?}")]
    NonPositiveCheckInterval(std::time::Duration),

    #[error("invalid run timeout: must be positive, got {0:?}")]
    NonPositiveRunTimeout(std::time::Duration),

    #[error("invalid log level '{0}': must be one of trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("network is required")]
    MissingNetwork,

    #[error("domain error: {0}")]
    Domain(#[from] syncoor_domain::DomainError),
}
