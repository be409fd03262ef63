mod consensus;
mod error;
mod execution;
mod metrics;

pub use consensus::{BeaconConsensusProbe, ConsensusProbe, ConsensusSnapshot};
pub use error::ProbeError;
pub use execution::{ExecutionProbe, ExecutionSnapshot, JsonRpcExecutionProbe, SyncingProgress};
pub use metrics::{HttpMetricsProbe, MetricsProbe, ParsedMetrics};
