//! Tools module - agent capabilities
//!
//! Tools are external actions the agent can take. In this client every tool
//! is backed by an MCP server (see [`crate::mcp`]); the agent only sees the
//! [`Tool`] trait and the [`ToolRunner`] that dispatches to it.

mod runner;

pub use runner::{ToolDefinition, ToolRunner};

use async_trait::async_trait;
use serde_json::Value;
use crate::Result;

/// Tool trait - interface for all agent tools
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name used in function calls
    fn name(&self) -> &str;

    /// Description of what the tool does
    fn description(&self) -> &str;

    /// JSON Schema for parameters
    fn parameters(&self) -> Value;

    /// Execute the tool with given parameters
    async fn execute(&self, params: Value) -> Result<String>;

    /// Convert to tool definition for LLM
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// Dummy tool for testing
#[cfg(test)]
pub struct DummyTool {
    pub name: String,
    pub result: std::result::Result<String, String>,
}

#[cfg(test)]
impl DummyTool {
    pub fn ok(name: &str, result: &str) -> Self {
        Self { name: name.to_string(), result: Ok(result.to_string()) }
    }

    pub fn failing(name: &str, message: &str) -> Self {
        Self { name: name.to_string(), result: Err(message.to_string()) }
    }
}

#[cfg(test)]
#[async_trait]
impl Tool for DummyTool {
    fn name(&self) -> &str { &self.name }
    fn description(&self) -> &str { "Dummy tool for testing" }
    fn parameters(&self) -> Value { serde_json::json!({"type": "object"}) }

    async fn execute(&self, _params: Value) -> Result<String> {
        match &self.result {
            Ok(text) => Ok(text.clone()),
            Err(message) => Err(crate::Error::Tool(message.clone())),
        }
    }
}
