//! Top-level run: config, session, conversation.

use std::io;
use std::path::PathBuf;

use tokio::io::BufReader;
use tracing::debug;

use crate::config;
use crate::conversation::{ConversationLoop, ConversationSummary};
use crate::session::{initialize_session, with_session};
use crate::ui::{self, ConsoleStyle};
use crate::Result;

/// Options from the command line.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub config_path: PathBuf,
    pub verbose: bool,
}

/// Load the config and run one interactive conversation on stdin/stdout.
///
/// MCP servers started for the session are shut down before this returns,
/// whether the conversation ends normally or with an error.
pub async fn run(options: RunOptions) -> Result<ConversationSummary> {
    let config = config::load(&options.config_path)?;
    debug!(
        "Loaded config from {}: {} MCP server(s), {} sample quer(ies)",
        options.config_path.display(),
        config.mcp_servers.len(),
        config.example_queries.len()
    );

    let style = ConsoleStyle::detect();
    let verbose = options.verbose;
    let samples = config.example_queries.clone();

    with_session(initialize_session(&config, verbose), |session| async move {
        ui::print_header(&session.provider, &session.model, session.tool_count);

        ConversationLoop::new(session.agent.clone(), session.thread_id.clone(), io::stdout())
            .verbose(session.verbose)
            .style(style)
            .samples(samples)
            .run(BufReader::new(tokio::io::stdin()))
            .await
    })
    .await
}
