use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;

use acq_dash::{logging, server, Config};

#[derive(Parser)]
#[command(name = "acq-dash")]
#[command(about = "Dashboard of Slack channel messages that mention a keyword", version)]
#[command(after_help = "Configuration is read from the environment or a .env file:
  SLACK_BOT_TOKEN, SLACK_CHANNEL_ID (required)
  SLACK_KEYWORD, TIMEZONE, DASHBOARD_HOST, DASHBOARD_PORT, REFRESH_INTERVAL_SECS, EXPORT_DIR

SLACK_KEYWORD is matched case-insensitively against the raw message text.
Slack sends a user-group mention as <!subteam^ID>, not as @handle, so to
count group mentions set SLACK_KEYWORD=<!subteam^S0123ABC (the group's id).")]
struct Cli {
    /// Address to bind, overrides DASHBOARD_HOST
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, overrides DASHBOARD_PORT
    #[arg(short, long)]
    port: Option<u16>,

    /// Load variables from this file before reading the environment
    #[arg(long, value_name = "PATH")]
    env_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init();

    if let Some(path) = &cli.env_file {
        dotenvy::from_path(path).with_context(|| format!("Failed to load {}", path.display()))?;
    }

    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {}", "✗ Configuration error:".red().bold(), e);
            std::process::exit(2);
        }
    };

    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }

    println!(
        "{}",
        format!("📊 Loading {} for channel {}...", config.title, config.channel_id)
            .cyan()
            .bold()
    );

    server::start(Arc::new(config)).await
}
