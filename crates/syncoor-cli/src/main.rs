mod cli;
mod commands;
mod output;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Command::Server(args) => args.log_level.clone(),
        _ => "info".to_string(),
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_target(false)
        .init();

    match cli.command {
        Command::Sync(args) => {
            let exit_code = commands::sync(*args).await?;
            std::process::exit(exit_code);
        }
        Command::Server(args) => commands::server(args).await,
        Command::ReportIndex(args) => commands::report_index(args).await,
        Command::ReportToMd(args) => commands::report_to_md(args).await,
        Command::Sysinfo => commands::sysinfo(),
    }
}
