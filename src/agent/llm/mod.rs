//! LLM client abstraction layer.
//!
//! This module provides:
//! - [`LlmClient`] trait for swappable LLM providers
//! - [`ProviderRegistry`] for building a client from the `llm` config section
//! - Concrete implementations: Gemini, OpenAI, Anthropic
//!
//! # Adding a New Provider
//!
//! 1. Create a new file (e.g., `mistral.rs`)
//! 2. Implement `LlmClient` trait
//! 3. Add to `ProviderRegistry::create()`

mod types;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::error::Error;
use crate::tools::ToolDefinition;
use crate::Result;

pub use types::*;

pub mod anthropic;
pub mod gemini;
pub mod openai;

pub use anthropic::AnthropicClient;
pub use gemini::GeminiClient;
pub use openai::OpenAiClient;

use super::message::{Message, ToolCallRequest};

/// Response from an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    /// Text content of the response.
    pub content: Option<String>,

    /// Tool calls requested by the LLM.
    pub tool_calls: Vec<ToolCallRequest>,

    /// Reason the response finished.
    pub finish_reason: String,

    /// Token usage statistics.
    pub usage: Usage,
}

impl LlmResponse {
    /// Create a simple text response.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: vec![],
            finish_reason: "stop".to_string(),
            usage: Usage::default(),
        }
    }

    /// Check if response has tool calls.
    #[inline]
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Token usage information.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

/// Sampling settings shared by every provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sampling {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl From<&LlmConfig> for Sampling {
    fn from(config: &LlmConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

/// LLM client trait - swappable provider abstraction.
///
/// Implement this trait to add a new LLM provider.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send messages and get response.
    async fn chat(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<LlmResponse>;

    /// Get the model this client talks to.
    fn default_model(&self) -> &str;
}

/// Provider registry - creates LLM clients dynamically.
///
/// # Example
///
/// ```ignore
/// let client = ProviderRegistry::create(&config.llm)?;
/// let response = client.chat(&messages, &tools).await?;
/// ```
pub struct ProviderRegistry;

impl ProviderRegistry {
    /// Create an LLM client from the `llm` configuration section.
    ///
    /// Supported providers:
    /// - `"openai"`: OpenAI chat completions (`OPENAI_API_KEY`)
    /// - `"anthropic"`: Anthropic messages API (`ANTHROPIC_API_KEY`)
    /// - `"google_genai"` / `"google"` / `"gemini"`: Gemini API (`GOOGLE_API_KEY`)
    pub fn create(config: &LlmConfig) -> Result<Box<dyn LlmClient>> {
        let sampling = Sampling::from(config);

        match config.model_provider.to_ascii_lowercase().as_str() {
            "openai" => {
                let key = config.resolve_api_key(&["OPENAI_API_KEY"])?;
                let mut client = OpenAiClient::new(&key, &config.model, sampling);
                if let Some(url) = &config.base_url {
                    client = client.with_base_url(url);
                }
                Ok(Box::new(client))
            }
            "anthropic" => {
                let key = config.resolve_api_key(&["ANTHROPIC_API_KEY"])?;
                let mut client = AnthropicClient::new(&key, &config.model, sampling);
                if let Some(url) = &config.base_url {
                    client = client.with_base_url(url);
                }
                Ok(Box::new(client))
            }
            "google_genai" | "google" | "gemini" => {
                let key = config.resolve_api_key(&["GOOGLE_API_KEY", "GEMINI_API_KEY"])?;
                let mut client = GeminiClient::new(&key, &config.model, sampling);
                if let Some(url) = &config.base_url {
                    client = client.with_base_url(url);
                }
                Ok(Box::new(client))
            }
            other => Err(Error::Config(format!(
                "Unknown model provider: {other} (expected one of {})",
                Self::available().join(", ")
            ))),
        }
    }

    /// List available provider names.
    pub fn available() -> &'static [&'static str] {
        &["openai", "anthropic", "google_genai"]
    }
}

/// Fake LLM client for testing.
#[cfg(test)]
pub struct FakeLlmClient {
    responses: std::sync::Mutex<std::collections::VecDeque<LlmResponse>>,
    seen: std::sync::Mutex<Vec<Vec<Message>>>,
}

#[cfg(test)]
impl FakeLlmClient {
    /// Create with predefined text responses.
    pub fn new(responses: Vec<&str>) -> Self {
        Self::scripted(responses.iter().map(|s| LlmResponse::text(*s)).collect())
    }

    /// Create with an arbitrary response script.
    pub fn scripted(responses: Vec<LlmResponse>) -> Self {
        Self {
            responses: std::sync::Mutex::new(responses.into()),
            seen: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Create with a single tool call followed by a text response.
    pub fn with_tool_call(name: &str, args: serde_json::Value, final_response: &str) -> Self {
        Self::scripted(vec![Self::tool_call(name, args), LlmResponse::text(final_response)])
    }

    /// A response that asks for one tool call.
    pub fn tool_call(name: &str, args: serde_json::Value) -> LlmResponse {
        LlmResponse {
            content: None,
            tool_calls: vec![ToolCallRequest {
                id: "tc_1".to_string(),
                name: name.to_string(),
                arguments: args,
            }],
            finish_reason: "tool_calls".to_string(),
            usage: Usage::default(),
        }
    }

    /// Message lists received so far, one entry per `chat` call.
    pub fn seen(&self) -> Vec<Vec<Message>> {
        self.seen.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl LlmClient for FakeLlmClient {
    async fn chat(
        &self,
        messages: &[Message],
        _tools: &[ToolDefinition],
    ) -> Result<LlmResponse> {
        self.seen.lock().unwrap().push(messages.to_vec());
        let mut responses = self.responses.lock().unwrap();
        responses
            .pop_front()
            .ok_or_else(|| Error::Llm("No more fake responses".to_string()))
    }

    fn default_model(&self) -> &str {
        "fake-model"
    }
}
