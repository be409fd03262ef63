use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "syncoor", about = "Execution/consensus client sync-test orchestrator", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a single sync test against a fresh or resumed enclave.
    Sync(Box<SyncArgs>),
    /// Run the ingestion server.
    Server(ServerArgs),
    /// Regenerate the persisted-reports directory index.
    ReportIndex(ReportIndexArgs),
    /// Render a persisted report pair as markdown.
    ReportToMd(ReportToMdArgs),
    /// Print host system information as JSON.
    Sysinfo,
}

#[derive(Debug, Parser)]
pub struct SyncArgs {
    #[arg(long)]
    pub network: String,
    #[arg(long)]
    pub enclave: String,
    #[arg(long = "el-client")]
    pub el_client: String,
    #[arg(long = "cl-client")]
    pub cl_client: String,
    #[arg(long = "el-image", default_value = "")]
    pub el_image: String,
    #[arg(long = "cl-image", default_value = "")]
    pub cl_image: String,
    #[arg(long = "el-extra-args")]
    pub el_extra_args: Vec<String>,
    #[arg(long = "cl-extra-args")]
    pub cl_extra_args: Vec<String>,
    #[arg(long = "el-env-vars", value_parser = parse_key_val)]
    pub el_env_vars: Vec<(String, String)>,
    #[arg(long = "cl-env-vars", value_parser = parse_key_val)]
    pub cl_env_vars: Vec<(String, String)>,
    #[arg(long = "report-dir", default_value = "./reports")]
    pub report_dir: String,
    #[arg(long = "label", value_parser = parse_key_val)]
    pub labels: Vec<(String, String)>,
    #[arg(long)]
    pub server: Option<String>,
    #[arg(long = "server-auth", env = "SYNCOOR_SERVER_AUTH")]
    pub server_auth: Option<String>,
    #[arg(long = "enable-recovery")]
    pub enable_recovery: bool,
    #[arg(long = "client-logs")]
    pub client_logs: bool,
    #[arg(long = "checkpoint-sync-enabled")]
    pub checkpoint_sync_enabled: bool,
    #[arg(long = "checkpoint-sync-url")]
    pub checkpoint_sync_url: Option<String>,
    #[arg(long)]
    pub public: bool,
    #[arg(long = "public-port-el")]
    pub public_port_el: Option<u16>,
    #[arg(long = "public-port-cl")]
    pub public_port_cl: Option<u16>,
    #[arg(long = "public-ip")]
    pub public_ip: Option<String>,
    #[arg(long = "log-level-el")]
    pub log_level_el: Option<String>,
    #[arg(long = "log-level-cl")]
    pub log_level_cl: Option<String>,
    #[arg(long = "check-interval", value_parser = parse_duration, default_value = "10s")]
    pub check_interval: Duration,
    #[arg(long = "run-timeout", value_parser = parse_duration, default_value = "30m")]
    pub run_timeout: Duration,
    /// Use the in-memory local controller instead of shelling out to kurtosis.
    #[arg(long = "local-enclave")]
    pub local_enclave: bool,
}

#[derive(Debug, Parser)]
pub struct ServerArgs {
    #[arg(long, default_value = "0.0.0.0:8080")]
    pub listen: String,
    #[arg(long = "auth-token", env = "SYNCOOR_AUTH_TOKEN")]
    pub auth_token: Option<String>,
    #[arg(long = "log-level", default_value = "info")]
    pub log_level: String,
    #[arg(long = "cors-origins", value_delimiter = ',')]
    pub cors_origins: Vec<String>,
    /// Accepted for source compatibility; this runner has no mock backend distinct from the real one.
    #[arg(long)]
    pub mock: bool,
}

#[derive(Debug, Parser)]
pub struct ReportIndexArgs {
    #[arg(long = "report-dir", default_value = "./reports")]
    pub report_dir: PathBuf,
    /// Keep regenerating the index, debounced to one run every 2s.
    #[arg(long)]
    pub watch: bool,
}

#[derive(Debug, Parser)]
pub struct ReportToMdArgs {
    /// Path to a persisted `*.main.json` report.
    pub report_path: PathBuf,
    #[arg(long)]
    pub output: Option<PathBuf>,
}

pub fn parse_key_val(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected KEY=VAL, got '{s}'"))
}

/// Hand-rolled duration parser: a run of digits followed by an optional `s`/`m`/`h`
/// suffix (defaulting to seconds), e.g. `10s`, `30m`, `2h`, `500`.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("duration must not be empty".to_string());
    }
    let split_at = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (num, suffix) = s.split_at(split_at);
    let n: u64 = num.parse().map_err(|_| format!("invalid duration '{s}'"))?;
    let secs = match suffix {
        "" | "s" => n,
        "m" => n * 60,
        "h" => n * 3600,
        other => return Err(format!("unknown duration suffix '{other}' in '{s}'")),
    };
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_key_val_splits_on_first_equals() {
        assert_eq!(parse_key_val("FOO=bar=baz").unwrap(), ("FOO".to_string(), "bar=baz".to_string()));
    }

    #[test]
    fn parse_key_val_rejects_missing_equals() {
        assert!(parse_key_val("nope").is_err());
    }

    #[test]
    fn parse_duration_accepts_bare_seconds_and_suffixes() {
        assert_eq!(parse_duration("10").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_duration("10s").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
    }

    #[test]
    fn parse_duration_rejects_unknown_suffix() {
        assert!(parse_duration("10x").is_err());
    }
}
