mod client;
mod error;
mod messages;

pub use client::ReportingClient;
pub use error::ReportingError;
pub use messages::{ClientWireInfo, CompleteRequest, KeepaliveRequest, ProgressMetrics};
