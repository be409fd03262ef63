use thiserror::Error;

/// Probe failures are soft by design (§4.2, §7): the poll loop skips one
/// cycle's snapshot for the failing probe and retries next tick. Callers
/// should never treat `ProbeError` as fatal to the run.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("http request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected status {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("failed to parse response from {url}: {message}")]
    Parse { url: String, message: String },
}
