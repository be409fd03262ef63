mod engine;
mod error;

pub use engine::{RecoveryEngine, RecoveryState};
pub use error::RecoveryError;
