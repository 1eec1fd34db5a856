//! Session construction and lifetime.

mod guard;

pub use guard::{with_session, ReleaseGuard};

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::agent::{AgentHandle, MemorySaver, ProviderRegistry, ReactAgent};
use crate::config::Config;
use crate::error::Error;
use crate::mcp::{convert_mcp_to_tools, McpOptions};
use crate::Result;

/// Everything one interactive run needs.
pub struct Session {
    pub agent: Arc<dyn AgentHandle>,
    /// Fixed for the whole run so the agent's memory spans every turn.
    pub thread_id: String,
    pub verbose: bool,
    /// Provider name, for the banner.
    pub provider: String,
    pub model: String,
    pub tool_count: usize,
    release: ReleaseGuard,
}

impl Session {
    pub fn new(
        agent: Arc<dyn AgentHandle>,
        thread_id: impl Into<String>,
        verbose: bool,
        release: ReleaseGuard,
    ) -> Self {
        Self {
            agent,
            thread_id: thread_id.into(),
            verbose,
            provider: String::new(),
            model: String::new(),
            tool_count: 0,
            release,
        }
    }

    /// Take the release action out, leaving a no-op in its place.
    pub fn take_release(&mut self) -> ReleaseGuard {
        std::mem::replace(&mut self.release, ReleaseGuard::noop())
    }
}

/// A new thread id for this process run.
pub fn new_thread_id() -> String {
    format!("cli-{}", Uuid::new_v4())
}

/// Build the model client, start the MCP servers and bind both to a fresh
/// in-memory agent.
///
/// Failures come back as [`Error::Initialization`]. The MCP converter shuts
/// down any server it already started, so a failed call leaves nothing to
/// release.
pub async fn initialize_session(config: &Config, verbose: bool) -> Result<Session> {
    let client = ProviderRegistry::create(&config.llm).map_err(Error::initialization)?;

    let (tools, cleanup) = convert_mcp_to_tools(&config.mcp_servers, McpOptions { verbose })
        .await
        .map_err(Error::initialization)?;

    if !cleanup.servers().is_empty() {
        info!("MCP servers running: {}", cleanup.servers().join(", "));
    }

    let agent = ReactAgent::new(client, tools, Arc::new(MemorySaver::new()));
    let model = agent.model().to_string();
    let tool_count = agent.tool_count();

    info!(
        "Session ready: provider={}, model={}, tools={}",
        config.llm.model_provider, model, tool_count
    );

    let mut session = Session::new(
        Arc::new(agent),
        new_thread_id(),
        verbose,
        ReleaseGuard::new(move || cleanup.close()),
    );
    session.provider = config.llm.model_provider.clone();
    session.model = model;
    session.tool_count = tool_count;
    Ok(session)
}
