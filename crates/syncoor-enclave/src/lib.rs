pub mod controller;
pub mod error;
pub mod kurtosis;
pub mod local;

pub use controller::{
    EnclaveController, NetworkHandle, PortInfo, RunConfig, ServiceInfo, ServiceStatus,
};
pub use error::EnclaveError;
pub use kurtosis::KurtosisEnclaveController;
pub use local::LocalEnclaveController;
