use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportingError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("server returned {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("reporting queue closed")]
    QueueClosed,
}
