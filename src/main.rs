//! mcp-chat CLI entry point

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use mcp_chat::app::{self, RunOptions};
use mcp_chat::config::DEFAULT_CONFIG_PATH;

#[derive(Parser)]
#[command(name = "mcp-chat")]
#[command(about = "Chat with an LLM agent that can use tools from MCP servers")]
#[command(version, disable_version_flag = true)]
struct Cli {
    /// Path to the JSON5 configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Show tool output and progress logs
    #[arg(short = 'V', long)]
    verbose: bool,

    /// Print version
    #[arg(short = 'v', long)]
    version: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    if cli.version {
        println!("mcp-chat {}", env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config;
    let summary = app::run(RunOptions {
        config_path: config_path.clone(),
        verbose: cli.verbose,
    })
    .await
    .with_context(|| format!("mcp-chat failed (config: {})", config_path.display()))?;

    tracing::debug!(
        "Conversation finished after {} turn(s), {} sample(s) unused",
        summary.turns.len(),
        summary.remaining_samples.len()
    );
    Ok(())
}
