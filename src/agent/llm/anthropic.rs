//! Anthropic messages API client.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::Error;
use crate::tools::ToolDefinition;
use crate::Result;

use super::super::message::{Message, Role, ToolCallRequest};
use super::{LlmClient, LlmResponse, Sampling, Usage};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// The messages API requires `max_tokens`.
const DEFAULT_MAX_TOKENS: u32 = 4096;

#[derive(Clone)]
pub struct AnthropicClient {
    api_key: String,
    model: String,
    base_url: String,
    sampling: Sampling,
    client: Client,
}

impl AnthropicClient {
    pub fn new(api_key: &str, model: &str, sampling: Sampling) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: ANTHROPIC_API_URL.to_string(),
            sampling,
            client: Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn build_request(&self, messages: &[Message], tools: &[ToolDefinition]) -> Value {
        let mut system_parts = Vec::new();
        let mut converted: Vec<Value> = Vec::new();

        for m in messages {
            match m.role {
                Role::System => system_parts.push(m.content.clone()),
                Role::User => converted.push(json!({"role": "user", "content": m.content})),
                Role::Assistant => {
                    let mut content: Vec<Value> = Vec::new();
                    if !m.content.is_empty() {
                        content.push(json!({"type": "text", "text": m.content}));
                    }
                    for tc in m.requested_tools() {
                        content.push(json!({
                            "type": "tool_use",
                            "id": tc.id,
                            "name": tc.name,
                            "input": tc.arguments,
                        }));
                    }
                    if !content.is_empty() {
                        converted.push(json!({"role": "assistant", "content": content}));
                    }
                }
                Role::Tool => {
                    let block = json!({
                        "type": "tool_result",
                        "tool_use_id": m.tool_call_id.as_deref().unwrap_or_default(),
                        "content": m.content,
                    });
                    // All results for one assistant turn must share a single user message.
                    match converted.last_mut() {
                        Some(last) if is_tool_result_message(last) => {
                            if let Some(blocks) = last["content"].as_array_mut() {
                                blocks.push(block);
                            }
                        }
                        _ => converted.push(json!({"role": "user", "content": [block]})),
                    }
                }
            }
        }

        let mut request = json!({
            "model": self.model,
            "max_tokens": self.sampling.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            "messages": converted,
        });

        if !system_parts.is_empty() {
            request["system"] = json!(system_parts.join("\n\n"));
        }
        if let Some(temperature) = self.sampling.temperature {
            request["temperature"] = json!(temperature);
        }
        if !tools.is_empty() {
            request["tools"] = tools
                .iter()
                .map(|t| {
                    json!({
                        "name": t.name,
                        "description": t.description,
                        "input_schema": t.parameters,
                    })
                })
                .collect();
        }

        request
    }

    fn parse_response(response: MessagesResponse) -> LlmResponse {
        let mut text = String::new();
        let mut tool_calls = Vec::new();

        for block in response.content {
            match block.kind.as_str() {
                "text" => {
                    if let Some(t) = block.text {
                        text.push_str(&t);
                    }
                }
                "tool_use" => {
                    if let (Some(id), Some(name)) = (block.id, block.name) {
                        tool_calls.push(ToolCallRequest {
                            id,
                            name,
                            arguments: block.input.unwrap_or(Value::Null),
                        });
                    }
                }
                _ => {}
            }
        }

        let usage = response
            .usage
            .map(|u| Usage {
                prompt_tokens: u.input_tokens,
                completion_tokens: u.output_tokens,
                total_tokens: u.input_tokens + u.output_tokens,
            })
            .unwrap_or_default();

        LlmResponse {
            content: (!text.is_empty()).then_some(text),
            tool_calls,
            finish_reason: response.stop_reason.unwrap_or_else(|| "end_turn".to_string()),
            usage,
        }
    }
}

fn is_tool_result_message(message: &Value) -> bool {
    message["role"] == "user"
        && message["content"]
            .as_array()
            .and_then(|blocks| blocks.first())
            .is_some_and(|b| b["type"] == "tool_result")
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn chat(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<LlmResponse> {
        let request = self.build_request(messages, tools);

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(Error::Llm(format!("Anthropic API error ({status}): {error_text}")));
        }

        let parsed: MessagesResponse = response.json().await?;
        Ok(Self::parse_response(parsed))
    }

    fn default_model(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
    usage: Option<MessagesUsage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
    id: Option<String>,
    name: Option<String>,
    input: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct MessagesUsage {
    input_tokens: usize,
    output_tokens: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(id: &str) -> ToolCallRequest {
        ToolCallRequest {
            id: id.to_string(),
            name: "lookup".to_string(),
            arguments: json!({"q": id}),
        }
    }

    #[test]
    fn test_tool_results_share_one_user_message() {
        let client = AnthropicClient::new("key", "claude", Sampling::default());
        let messages = vec![
            Message::system("sys"),
            Message::user("two lookups please"),
            Message::assistant_with_tools("on it", vec![call("a"), call("b")]),
            Message::tool_result("a", "lookup", "A"),
            Message::tool_result("b", "lookup", "B"),
        ];

        let request = client.build_request(&messages, &[]);
        let converted = request["messages"].as_array().unwrap();

        assert_eq!(request["system"], "sys");
        assert_eq!(request["max_tokens"], DEFAULT_MAX_TOKENS);
        assert_eq!(converted.len(), 3);
        assert_eq!(converted[1]["content"][0]["type"], "text");
        assert_eq!(converted[1]["content"][2]["type"], "tool_use");
        assert_eq!(converted[2]["content"].as_array().unwrap().len(), 2);
        assert_eq!(converted[2]["content"][1]["tool_use_id"], "b");
    }

    #[test]
    fn test_parse_mixed_content() {
        let parsed: MessagesResponse = serde_json::from_value(json!({
            "content": [
                {"type": "text", "text": "Let me check."},
                {"type": "tool_use", "id": "tu_1", "name": "lookup", "input": {"q": "x"}}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 7, "output_tokens": 3}
        }))
        .unwrap();

        let response = AnthropicClient::parse_response(parsed);
        assert_eq!(response.content.as_deref(), Some("Let me check."));
        assert_eq!(response.tool_calls[0].id, "tu_1");
        assert_eq!(response.usage.total_tokens, 10);
    }
}
