//! MCP tool conversion.
//!
//! Starts every configured MCP server, collects the tools they expose into a
//! [`ToolRunner`], and hands back an [`McpCleanup`] that shuts the servers
//! down again. If any server fails to come up, the servers that did start are
//! shut down here before the error is returned, so callers only ever own a
//! cleanup for a fully started set.

mod client;

pub use client::{McpRunningService, McpTool};

use std::collections::BTreeMap;

use futures_util::future::join_all;
use tracing::{debug, info, warn};

use crate::config::McpServerConfig;
use crate::error::Error;
use crate::tools::{Tool, ToolRunner};
use crate::Result;

/// Knobs for the conversion.
#[derive(Debug, Clone, Copy, Default)]
pub struct McpOptions {
    /// Report per-server progress at `info` instead of `debug`.
    pub verbose: bool,
}

impl McpOptions {
    fn progress(&self, message: std::fmt::Arguments<'_>) {
        if self.verbose {
            info!("{}", message);
        } else {
            debug!("{}", message);
        }
    }
}

/// Owns the running MCP sessions; [`McpCleanup::close`] terminates them.
#[must_use = "MCP servers keep running until `close` is awaited"]
pub struct McpCleanup {
    sessions: Vec<(String, McpRunningService)>,
}

impl McpCleanup {
    /// Names of the servers this cleanup will shut down.
    pub fn servers(&self) -> Vec<&str> {
        self.sessions.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Cancel every session. Failures are logged, never returned.
    pub async fn close(self) {
        for (name, session) in self.sessions {
            match session.cancel().await {
                Ok(reason) => debug!("MCP server '{}' closed: {:?}", name, reason),
                Err(e) => warn!("MCP server '{}' did not shut down cleanly: {}", name, e),
            }
        }
    }
}

/// Start the configured servers and expose their tools.
pub async fn convert_mcp_to_tools(
    servers: &BTreeMap<String, McpServerConfig>,
    options: McpOptions,
) -> Result<(ToolRunner, McpCleanup)> {
    options.progress(format_args!("Initializing {} MCP server(s)", servers.len()));

    let attempts = join_all(servers.iter().map(|(name, config)| async move {
        options.progress(format_args!("MCP server '{}': connecting", name));
        (name.clone(), client::connect(name, config).await)
    }))
    .await;

    let mut sessions = Vec::with_capacity(attempts.len());
    let mut failures = Vec::new();
    for (name, attempt) in attempts {
        match attempt {
            Ok(session) => sessions.push((name, session)),
            Err(Error::Mcp(msg)) => failures.push(msg),
            Err(other) => failures.push(other.to_string()),
        }
    }

    let cleanup = McpCleanup { sessions };
    if !failures.is_empty() {
        cleanup.close().await;
        return Err(Error::Mcp(failures.join("; ")));
    }

    let listed = join_all(
        cleanup
            .sessions
            .iter()
            .map(|(name, session)| client::list_tools(name.clone(), session.peer().clone())),
    )
    .await
    .into_iter()
    .collect::<Result<Vec<_>>>();

    let listed = match listed {
        Ok(listed) => listed,
        Err(e) => {
            cleanup.close().await;
            return Err(e);
        }
    };

    let mut tools = ToolRunner::new();
    for server_tools in listed {
        for tool in server_tools {
            options.progress(format_args!("MCP server '{}': tool '{}'", tool.server(), tool.name()));
            tools.register(tool);
        }
    }

    options.progress(format_args!(
        "MCP servers initialized: {} tool(s) from {} server(s)",
        tools.len(),
        cleanup.sessions.len()
    ));

    Ok((tools, cleanup))
}
