use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::ProbeError;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsensusSnapshot {
    /// Decimal string per Beacon API, parsed to u64 by callers (§4.6 step c).
    pub head_slot: String,
    pub sync_distance: u64,
    pub is_syncing: bool,
    pub is_optimistic: bool,
    pub el_offline: bool,
}

impl ConsensusSnapshot {
    /// Parses `head_slot` to a plain integer; 0 on parse failure (§4.6).
    pub fn head_slot_u64(&self) -> u64 {
        self.head_slot.parse().unwrap_or(0)
    }
}

#[async_trait]
pub trait ConsensusProbe: Send + Sync {
    async fn snapshot(&self) -> Result<ConsensusSnapshot, ProbeError>;
}

#[derive(Deserialize)]
struct BeaconSyncingResponse {
    data: BeaconSyncingData,
}

#[derive(Deserialize)]
struct BeaconSyncingData {
    head_slot: String,
    sync_distance: String,
    is_syncing: bool,
    #[serde(default)]
    is_optimistic: bool,
    #[serde(default)]
    el_offline: bool,
}

/// Beacon API `/eth/v1/node/syncing` probe.
pub struct BeaconConsensusProbe {
    client: reqwest::Client,
    url: String,
}

impl BeaconConsensusProbe {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("reqwest client build");
        BeaconConsensusProbe { client, url: base_url.into() }
    }

    fn syncing_url(&self) -> String {
        format!("{}/eth/v1/node/syncing", self.url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ConsensusProbe for BeaconConsensusProbe {
    async fn snapshot(&self) -> Result<ConsensusSnapshot, ProbeError> {
        let url = self.syncing_url();
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| ProbeError::Request { url: url.clone(), source })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ProbeError::Status { url: url.clone(), status: status.as_u16() });
        }

        let parsed: BeaconSyncingResponse = resp
            .json()
            .await
            .map_err(|e| ProbeError::Parse { url: url.clone(), message: e.to_string() })?;

        Ok(ConsensusSnapshot {
            head_slot: parsed.data.head_slot,
            sync_distance: parsed.data.sync_distance.parse().unwrap_or(0),
            is_syncing: parsed.data.is_syncing,
            is_optimistic: parsed.data.is_optimistic,
            el_offline: parsed.data.el_offline,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn parses_syncing_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/eth/v1/node/syncing"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {
                    "head_slot": "123",
                    "sync_distance": "4",
                    "is_syncing": true,
                    "is_optimistic": false,
                    "el_offline": false,
                }
            })))
            .mount(&server)
            .await;

        let probe = BeaconConsensusProbe::new(server.uri());
        let snap = probe.snapshot().await.unwrap();
        assert_eq!(snap.head_slot_u64(), 123);
        assert!(snap.is_syncing);
        assert!(!snap.is_optimistic);
    }

    #[test]
    fn head_slot_parse_failure_defaults_to_zero() {
        let snap = ConsensusSnapshot { head_slot: "garbage".into(), ..Default::default() };
        assert_eq!(snap.head_slot_u64(), 0);
    }
}
