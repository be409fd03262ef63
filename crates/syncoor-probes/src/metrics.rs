use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ProbeError;

/// Parsed, client-agnostic snapshot of the Prometheus-format metrics exporter.
/// Unknown/missing metric families default to their zero value (§4.2).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedMetrics {
    pub exec_version: Option<String>,
    pub cons_version: Option<String>,
    pub exec_peer_count: u32,
    pub cons_peer_count: u32,
    pub exec_disk_usage_bytes: u64,
    pub cons_disk_usage_bytes: u64,
    pub exec_memory_bytes: u64,
    pub cons_memory_bytes: u64,
    pub exec_cpu_percent: f64,
    pub cons_cpu_percent: f64,
    pub exec_block_io_bytes: u64,
    pub cons_block_io_bytes: u64,
    pub exec_sync_percent: f64,
    pub cons_sync_percent: f64,
    pub chain_id: Option<u64>,
}

#[async_trait]
pub trait MetricsProbe: Send + Sync {
    async fn snapshot(&self) -> Result<ParsedMetrics, ProbeError>;
}

pub struct HttpMetricsProbe {
    client: reqwest::Client,
    url: String,
}

impl HttpMetricsProbe {
    pub fn new(url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("reqwest client build");
        HttpMetricsProbe { client, url: url.into() }
    }
}

#[async_trait]
impl MetricsProbe for HttpMetricsProbe {
    async fn snapshot(&self) -> Result<ParsedMetrics, ProbeError> {
        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|source| ProbeError::Request { url: self.url.clone(), source })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ProbeError::Status { url: self.url.clone(), status: status.as_u16() });
        }

        let body = resp
            .text()
            .await
            .map_err(|e| ProbeError::Parse { url: self.url.clone(), message: e.to_string() })?;

        Ok(parse_metrics_text(&body))
    }
}

/// Tolerant Prometheus text-exposition-format parser. Never fails: unknown
/// families are ignored, `NaN`/`Inf` values coerce to 0, lines that don't
/// parse as `name{labels} value` (or `name value`) are skipped.
fn parse_metrics_text(body: &str) -> ParsedMetrics {
    let mut samples: HashMap<String, (HashMap<String, String>, f64)> = HashMap::new();
    let mut chain_id: Option<u64> = None;

    for line in body.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((head, value_str)) = line.rsplit_once(' ') else { continue };
        let value = parse_float_tolerant(value_str);

        let (name, labels) = if let Some(idx) = head.find('{') {
            let name = head[..idx].to_string();
            let label_str = &head[idx + 1..head.len().saturating_sub(1)];
            (name, parse_labels(label_str))
        } else {
            (head.to_string(), HashMap::new())
        };

        if name == "chain_id" {
            chain_id = Some(value as u64);
        }

        samples.insert(sample_key(&name, &labels), (labels, value));
        samples.entry(name).or_insert((HashMap::new(), value));
    }

    let disk = |component: &str| -> u64 {
        samples
            .iter()
            .filter(|(k, _)| k.starts_with("disk_usage_bytes"))
            .filter(|(_, (labels, _))| labels.get("component").map(|c| c.as_str()) == Some(component))
            .map(|(_, (_, v))| *v as u64)
            .sum()
    };

    let get = |name: &str| -> f64 { samples.get(name).map(|(_, v)| *v).unwrap_or(0.0) };

    let version_of = |metric: &str| -> Option<String> {
        samples
            .iter()
            .find(|(k, _)| k.starts_with(metric))
            .and_then(|(_, (labels, _))| labels.get("version").cloned())
    };

    ParsedMetrics {
        exec_version: version_of("client_info_exec"),
        cons_version: version_of("client_info_cons"),
        exec_peer_count: get("exec_peer_count") as u32,
        cons_peer_count: get("cons_peer_count") as u32,
        exec_disk_usage_bytes: disk("execution").max(get("exec_disk_usage_bytes") as u64),
        cons_disk_usage_bytes: disk("consensus").max(get("cons_disk_usage_bytes") as u64),
        exec_memory_bytes: get("exec_memory_bytes") as u64,
        cons_memory_bytes: get("cons_memory_bytes") as u64,
        exec_cpu_percent: get("exec_cpu_percent"),
        cons_cpu_percent: get("cons_cpu_percent"),
        exec_block_io_bytes: get("exec_block_io_bytes") as u64,
        cons_block_io_bytes: get("cons_block_io_bytes") as u64,
        exec_sync_percent: clamp_percent(get("exec_sync_percent")),
        cons_sync_percent: clamp_percent(get("cons_sync_percent")),
        chain_id,
    }
}

fn sample_key(name: &str, labels: &HashMap<String, String>) -> String {
    if labels.is_empty() {
        return name.to_string();
    }
    let mut parts: Vec<String> = labels.iter().map(|(k, v)| format!("{k}={v}")).collect();
    parts.sort();
    format!("{name}{{{}}}", parts.join(","))
}

fn parse_labels(s: &str) -> HashMap<String, String> {
    let mut out = HashMap::new();
    for part in s.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        if let Some((k, v)) = part.split_once('=') {
            out.insert(k.trim().to_string(), v.trim().trim_matches('"').to_string());
        }
    }
    out
}

fn parse_float_tolerant(s: &str) -> f64 {
    match s.trim().to_ascii_lowercase().as_str() {
        "nan" | "+nan" | "-nan" => 0.0,
        "inf" | "+inf" | "infinity" | "+infinity" => 0.0,
        "-inf" | "-infinity" => 0.0,
        other => other.parse::<f64>().unwrap_or(0.0),
    }
}

/// Clamps a sync percentage to `[0, 100]`; `NaN`/`Inf` already coerced to 0
/// upstream, but this also guards negative or >100 readings.
fn clamp_percent(v: f64) -> f64 {
    v.clamp(0.0, 100.0)
}
