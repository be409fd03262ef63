use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ProbeError;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncingProgress {
    pub current: u64,
    pub highest: u64,
    pub starting: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionSnapshot {
    pub block_number: u64,
    pub is_syncing: bool,
    pub peer_count: u32,
    pub progress: Option<SyncingProgress>,
}

#[async_trait]
pub trait ExecutionProbe: Send + Sync {
    async fn snapshot(&self) -> Result<ExecutionSnapshot, ProbeError>;
}

/// JSON-RPC execution-layer probe: `eth_blockNumber`, `eth_syncing`, `net_peerCount`.
pub struct JsonRpcExecutionProbe {
    client: reqwest::Client,
    url: String,
}

impl JsonRpcExecutionProbe {
    pub fn new(url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("reqwest client build");
        JsonRpcExecutionProbe { client, url: url.into() }
    }

    async fn rpc(&self, method: &str) -> Result<Value, ProbeError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": [],
        });

        let resp = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|source| ProbeError::Request { url: self.url.clone(), source })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ProbeError::Status { url: self.url.clone(), status: status.as_u16() });
        }

        #[derive(Deserialize)]
        struct RpcResponse {
            result: Option<Value>,
            error: Option<Value>,
        }

        let parsed: RpcResponse = resp
            .json()
            .await
            .map_err(|e| ProbeError::Parse { url: self.url.clone(), message: e.to_string() })?;

        if let Some(err) = parsed.error {
            return Err(ProbeError::Parse {
                url: self.url.clone(),
                message: format!("rpc error: {err}"),
            });
        }

        parsed.result.ok_or_else(|| ProbeError::Parse {
            url: self.url.clone(),
            message: "missing result field".to_string(),
        })
    }
}

fn parse_hex_u64(v: &Value) -> Option<u64> {
    let s = v.as_str()?;
    u64::from_str_radix(s.trim_start_matches("0x"), 16).ok()
}

#[async_trait]
impl ExecutionProbe for JsonRpcExecutionProbe {
    async fn snapshot(&self) -> Result<ExecutionSnapshot, ProbeError> {
        let block_number = parse_hex_u64(&self.rpc("eth_blockNumber").await?).unwrap_or(0);
        let peer_count = parse_hex_u64(&self.rpc("net_peerCount").await?).unwrap_or(0) as u32;
        let syncing = self.rpc("eth_syncing").await?;

        let (is_syncing, progress) = match &syncing {
            Value::Bool(false) => (false, None),
            Value::Object(obj) => {
                let current = obj.get("currentBlock").and_then(parse_hex_u64).unwrap_or(0);
                let highest = obj.get("highestBlock").and_then(parse_hex_u64).unwrap_or(0);
                let starting = obj.get("startingBlock").and_then(parse_hex_u64).unwrap_or(0);
                (true, Some(SyncingProgress { current, highest, starting }))
            }
            _ => (false, None),
        };

        Ok(ExecutionSnapshot { block_number, is_syncing, peer_count, progress })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mock_rpc(server: &MockServer, result: Value) {
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": result,
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn parses_not_syncing_snapshot() {
        let server = MockServer::start().await;
        // eth_blockNumber, net_peerCount, eth_syncing all hit the same endpoint;
        // wiremock returns the last registered matching mock, so we stub
        // per-call via a sequence isn't needed for a smoke test of `false`.
        mock_rpc(&server, json!("0x3e8")).await;
        let probe = JsonRpcExecutionProbe::new(server.uri());
        let snap = probe.snapshot().await.unwrap();
        assert_eq!(snap.block_number, 1000);
    }

    #[test]
    fn hex_parsing_handles_prefix() {
        assert_eq!(parse_hex_u64(&json!("0x1a")), Some(26));
        assert_eq!(parse_hex_u64(&json!("not-hex")), None);
    }
}
