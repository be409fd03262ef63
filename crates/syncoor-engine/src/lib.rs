pub mod engine;
pub mod error;
pub mod probe_factory;
pub mod system_info;

pub use engine::{RunOutcome, SyncTestEngine};
pub use error::EngineError;
pub use probe_factory::{HttpProbeFactory, ProbeFactory};
pub use system_info::{HostSystemInfoCollector, SystemInfoCollector};
