use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

// ── Identifiers ──────────────────────────────────────────────────────────────

/// A globally-unique run identifier, assigned once at engine startup:
/// `<timestamp>-<network>-<el>-<cl>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn new(s: impl Into<String>) -> Self {
        RunId(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Build a run id from its constituent parts and the current epoch time.
    pub fn generate(now_epoch: i64, network: &str, el: &ClientType, cl: &ClientType) -> Self {
        RunId(format!("{now_epoch}-{network}-{el}-{cl}"))
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ordered key/value labels. A `BTreeMap` (not `HashMap`) so serialization
/// and fingerprinting are deterministic.
pub type Labels = BTreeMap<String, String>;

// ── Client type ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientType {
    // Execution layer
    Geth,
    Besu,
    Nethermind,
    Erigon,
    Reth,
    // Consensus layer
    Lighthouse,
    Teku,
    Prysm,
    Nimbus,
    Lodestar,
    Grandine,
}

impl ClientType {
    pub fn is_execution(&self) -> bool {
        matches!(
            self,
            ClientType::Geth
                | ClientType::Besu
                | ClientType::Nethermind
                | ClientType::Erigon
                | ClientType::Reth
        )
    }

    pub fn is_consensus(&self) -> bool {
        !self.is_execution()
    }
}

impl fmt::Display for ClientType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ClientType::Geth => "geth",
            ClientType::Besu => "besu",
            ClientType::Nethermind => "nethermind",
            ClientType::Erigon => "erigon",
            ClientType::Reth => "reth",
            ClientType::Lighthouse => "lighthouse",
            ClientType::Teku => "teku",
            ClientType::Prysm => "prysm",
            ClientType::Nimbus => "nimbus",
            ClientType::Lodestar => "lodestar",
            ClientType::Grandine => "grandine",
        };
        write!(f, "{s}")
    }
}

impl FromStr for ClientType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "geth" => Ok(ClientType::Geth),
            "besu" => Ok(ClientType::Besu),
            "nethermind" => Ok(ClientType::Nethermind),
            "erigon" => Ok(ClientType::Erigon),
            "reth" => Ok(ClientType::Reth),
            "lighthouse" => Ok(ClientType::Lighthouse),
            "teku" => Ok(ClientType::Teku),
            "prysm" => Ok(ClientType::Prysm),
            "nimbus" => Ok(ClientType::Nimbus),
            "lodestar" => Ok(ClientType::Lodestar),
            "grandine" => Ok(ClientType::Grandine),
            other => Err(DomainError::InvalidClientType(other.to_string())),
        }
    }
}

// ── ClientInfo ───────────────────────────────────────────────────────────────

/// Inspected/observed info about one client in the pair. Populated partially:
/// image/entrypoint/cmd/env from enclave inspection at startup, `version` later
/// from the metrics probe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub client_type: Option<ClientType>,
    pub image: String,
    pub version: String,
    pub entrypoint: Vec<String>,
    pub cmd: Vec<String>,
    pub env: BTreeMap<String, String>,
}

impl ClientInfo {
    /// Merge only the non-empty fields of `partial` into `self`. Lets startup
    /// inspection populate image/cmd/entrypoint and later metrics populate
    /// version without clobbering already-set fields.
    pub fn merge_non_empty(&mut self, partial: &ClientInfo) {
        if !partial.name.is_empty() {
            self.name = partial.name.clone();
        }
        if partial.client_type.is_some() {
            self.client_type = partial.client_type;
        }
        if !partial.image.is_empty() {
            self.image = partial.image.clone();
        }
        if !partial.version.is_empty() {
            self.version = partial.version.clone();
        }
        if !partial.entrypoint.is_empty() {
            self.entrypoint = partial.entrypoint.clone();
        }
        if !partial.cmd.is_empty() {
            self.cmd = partial.cmd.clone();
        }
        for (k, v) in &partial.env {
            if !v.is_empty() {
                self.env.insert(k.clone(), v.clone());
            }
        }
    }
}

// ── Progress & status ────────────────────────────────────────────────────────

/// One sampled point in a run's sync progress time-series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SyncProgressEntry {
    /// epoch-seconds
    pub t: i64,
    pub b: u64,
    pub s: u64,
    pub de: u64,
    pub dc: u64,
    pub pe: u32,
    pub pc: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TerminalStatus {
    Success,
    Timeout,
    Cancelled,
    Error,
}

impl fmt::Display for TerminalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TerminalStatus::Success => "success",
            TerminalStatus::Timeout => "timeout",
            TerminalStatus::Cancelled => "cancelled",
            TerminalStatus::Error => "error",
        };
        write!(f, "{s}")
    }
}

impl TerminalStatus {
    /// Process exit code for this terminal state (cancellation exits 0).
    pub fn exit_code(&self) -> i32 {
        match self {
            TerminalStatus::Success => 0,
            TerminalStatus::Cancelled => 0,
            TerminalStatus::Timeout => 124,
            TerminalStatus::Error => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Running,
    Success,
    Timeout,
    Cancelled,
    Error,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunState::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Running => "running",
            RunState::Success => "success",
            RunState::Timeout => "timeout",
            RunState::Cancelled => "cancelled",
            RunState::Error => "error",
        }
    }
}

impl From<TerminalStatus> for RunState {
    fn from(t: TerminalStatus) -> Self {
        match t {
            TerminalStatus::Success => RunState::Success,
            TerminalStatus::Timeout => RunState::Timeout,
            TerminalStatus::Cancelled => RunState::Cancelled,
            TerminalStatus::Error => RunState::Error,
        }
    }
}

/// `{ start, end, status, status_message, final_block, final_slot, progress, last_entry }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncStatus {
    pub start: i64,
    pub end: Option<i64>,
    pub status: RunState,
    pub status_message: String,
    pub final_block: u64,
    pub final_slot: u64,
    pub progress: Vec<SyncProgressEntry>,
    /// Populated only on the "main" (progress-omitting) persisted document.
    pub progress_file: Option<String>,
}

impl SyncStatus {
    pub fn new(start: i64) -> Self {
        SyncStatus {
            start,
            end: None,
            status: RunState::Running,
            status_message: String::new(),
            final_block: 0,
            final_slot: 0,
            progress: Vec::new(),
            progress_file: None,
        }
    }

    pub fn last_entry(&self) -> Option<&SyncProgressEntry> {
        self.progress.last()
    }

    pub fn is_frozen(&self) -> bool {
        self.status.is_terminal()
    }

    /// Append a progress entry. No-op (per spec §4.3) once the status is terminal.
    /// Returns an error if the new timestamp regresses (should never happen with
    /// a monotonic clock source, but guards the invariant explicitly).
    pub fn add_progress(&mut self, entry: SyncProgressEntry) -> Result<(), DomainError> {
        if self.is_frozen() {
            return Ok(());
        }
        if let Some(last) = self.progress.last() {
            if entry.t < last.t {
                return Err(DomainError::NonMonotonicTimestamp {
                    last: last.t,
                    new: entry.t,
                });
            }
        }
        self.progress.push(entry);
        Ok(())
    }

    pub fn set_terminal(&mut self, status: TerminalStatus, message: impl Into<String>, end: i64) {
        self.status = status.into();
        self.status_message = message.into();
        self.end = Some(end);
    }

    /// Strip progress for the "main" document and attach the sibling file reference.
    pub fn to_main_document(&self, progress_file: &str) -> SyncStatus {
        let mut doc = self.clone();
        doc.progress = Vec::new();
        doc.progress_file = Some(progress_file.to_string());
        doc
    }
}

// ── System info ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemInfo {
    pub hostname: String,
    pub os: String,
    pub arch: String,
    pub cpu_cores: usize,
    pub total_memory_bytes: u64,
}

// ── Report ───────────────────────────────────────────────────────────────────

/// `{ run_id, timestamp, network, labels, sync_status, exec, cons, system_info? }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub run_id: RunId,
    pub timestamp: i64,
    pub network: String,
    pub labels: Labels,
    pub sync_status: SyncStatus,
    pub exec: ClientInfo,
    pub cons: ClientInfo,
    pub system_info: Option<SystemInfo>,
}

impl Report {
    pub fn new(run_id: RunId, timestamp: i64, network: impl Into<String>) -> Self {
        Report {
            run_id,
            timestamp,
            network: network.into(),
            labels: Labels::new(),
            sync_status: SyncStatus::new(timestamp),
            exec: ClientInfo::default(),
            cons: ClientInfo::default(),
            system_info: None,
        }
    }

    /// Split into `(main, progress)` documents for on-disk persistence (§4.3, §6.2).
    pub fn split_for_persistence(&self, progress_file: &str) -> (Report, Vec<SyncProgressEntry>) {
        let mut main = self.clone();
        main.sync_status = self.sync_status.to_main_document(progress_file);
        (main, self.sync_status.progress.clone())
    }
}
