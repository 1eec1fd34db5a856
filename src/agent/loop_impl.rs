//! Agent loop - ReAct-style message processing

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::Result;
use crate::error::Error;
use crate::tools::ToolRunner;
use super::checkpoint::Checkpointer;
use super::handle::AgentHandle;
use super::llm::LlmClient;
use super::message::{Message, ToolCallRequest};

/// Model round-trips allowed per invocation before giving up.
pub const DEFAULT_MAX_ITERATIONS: usize = 20;

/// The agent alternates model calls and tool execution until the model
/// answers without requesting tools.
pub struct ReactAgent {
    client: Box<dyn LlmClient>,
    tools: ToolRunner,
    checkpointer: Arc<dyn Checkpointer>,
    max_iterations: usize,
}

impl ReactAgent {
    /// Create a new agent bound to a model client, a tool set and a state store
    pub fn new(client: Box<dyn LlmClient>, tools: ToolRunner, checkpointer: Arc<dyn Checkpointer>) -> Self {
        Self {
            client,
            tools,
            checkpointer,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    #[cfg(test)]
    fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn model(&self) -> &str {
        self.client.default_model()
    }

    pub fn tool_count(&self) -> usize {
        self.tools.len()
    }

    /// Drive the model over `history` until it produces a final answer.
    /// Returns `history` extended with every message produced on the way.
    async fn run(&self, mut history: Vec<Message>) -> Result<Vec<Message>> {
        let tools = self.tools.definitions();

        for iteration in 0..self.max_iterations {
            debug!("Iteration {}/{}", iteration + 1, self.max_iterations);

            let response = self.client.chat(&history, &tools).await?;

            if !response.has_tool_calls() {
                let content = response.content.unwrap_or_default();
                info!("Agent completed with response: {} chars", content.len());
                history.push(Message::assistant(content));
                return Ok(history);
            }

            history.push(Message::assistant_with_tools(
                response.content.clone().unwrap_or_default(),
                response.tool_calls.clone(),
            ));

            for tool_call in &response.tool_calls {
                let result = self.execute_tool(tool_call).await;
                history.push(Message::tool_result(&tool_call.id, &tool_call.name, result));
            }
        }

        Err(Error::MaxIterations)
    }

    async fn execute_tool(&self, tool_call: &ToolCallRequest) -> String {
        debug!("Executing tool: {} with args: {}", tool_call.name, tool_call.arguments);

        match self.tools.execute(&tool_call.name, tool_call.arguments.clone()).await {
            Ok(result) => {
                debug!("Tool {} succeeded: {} chars", tool_call.name, result.len());
                result
            }
            Err(e) => {
                let error_msg = format!("Error: {}", e);
                debug!("Tool {} failed: {}", tool_call.name, error_msg);
                error_msg
            }
        }
    }
}

#[async_trait]
impl AgentHandle for ReactAgent {
    async fn invoke(&self, messages: Vec<Message>, thread_id: &str) -> Result<Vec<Message>> {
        let mut history = self.checkpointer.load(thread_id);
        history.extend(messages);

        let history = self.run(history).await?;
        self.checkpointer.save(thread_id, history.clone());
        Ok(history)
    }
}
