use syncoor_probes::{
    BeaconConsensusProbe, ConsensusProbe, ExecutionProbe, HttpMetricsProbe, JsonRpcExecutionProbe,
    MetricsProbe,
};

/// Builds the three probe trait objects from URLs resolved out of enclave
/// inspection. Exists as a seam so tests can substitute scripted probes
/// without starting real HTTP servers for every scenario.
pub trait ProbeFactory: Send + Sync {
    fn execution_probe(&self, rpc_url: &str) -> Box<dyn ExecutionProbe>;
    fn consensus_probe(&self, beacon_url: &str) -> Box<dyn ConsensusProbe>;
    fn metrics_probe(&self, metrics_url: &str) -> Box<dyn MetricsProbe>;
}

/// Production factory: wires up the real HTTP-backed probes from syncoor-probes.
#[derive(Default)]
pub struct HttpProbeFactory;

impl ProbeFactory for HttpProbeFactory {
    fn execution_probe(&self, rpc_url: &str) -> Box<dyn ExecutionProbe> {
        Box::new(JsonRpcExecutionProbe::new(rpc_url))
    }

    fn consensus_probe(&self, beacon_url: &str) -> Box<dyn ConsensusProbe> {
        Box::new(BeaconConsensusProbe::new(beacon_url))
    }

    fn metrics_probe(&self, metrics_url: &str) -> Box<dyn MetricsProbe> {
        Box::new(HttpMetricsProbe::new(metrics_url))
    }
}
