mod error;
mod fingerprint;
mod types;

pub use error::DomainError;
pub use fingerprint::Fingerprint;
pub use types::{
    ClientInfo, ClientType, Labels, Report, RunId, RunState, SyncProgressEntry, SyncStatus,
    SystemInfo, TerminalStatus,
};
