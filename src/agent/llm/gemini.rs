//! Gemini LLM client implementation (API key authentication).

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::error::Error;
use crate::tools::ToolDefinition;
use crate::Result;

use super::super::message::{Message, Role, ToolCallRequest};
use super::{GeminiResponse, LlmClient, LlmResponse, Sampling, Usage};

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// JSON-schema keywords the Gemini function-declaration schema rejects.
const UNSUPPORTED_SCHEMA_KEYS: [&str; 3] = ["$schema", "additionalProperties", "default"];

/// Gemini API client using API key authentication.
#[derive(Clone)]
pub struct GeminiClient {
    api_key: String,
    model: String,
    base_url: String,
    sampling: Sampling,
    client: Client,
}

impl GeminiClient {
    /// Create a new Gemini client with API key.
    pub fn new(api_key: &str, model: &str, sampling: Sampling) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: GEMINI_API_URL.to_string(),
            sampling,
            client: Client::new(),
        }
    }

    /// Point the client at a different endpoint (proxies, tests).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn build_url(&self) -> String {
        format!("{}/{}:generateContent", self.base_url, self.model)
    }

    fn convert_messages(&self, messages: &[Message]) -> Vec<Value> {
        messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| match m.role {
                Role::Tool => json!({
                    "role": "function",
                    "parts": [{
                        "functionResponse": {
                            "name": m.name.as_deref().unwrap_or("unknown"),
                            "response": {"result": m.content}
                        }
                    }]
                }),
                Role::Assistant if !m.requested_tools().is_empty() => {
                    let mut parts: Vec<Value> = Vec::new();
                    if !m.content.is_empty() {
                        parts.push(json!({"text": m.content}));
                    }
                    parts.extend(m.requested_tools().iter().map(|tc| {
                        json!({
                            "functionCall": {
                                "name": tc.name,
                                "args": tc.arguments
                            }
                        })
                    }));
                    json!({"role": "model", "parts": parts})
                }
                Role::Assistant => json!({
                    "role": "model",
                    "parts": [{"text": m.content}]
                }),
                Role::User | Role::System => json!({
                    "role": "user",
                    "parts": [{"text": m.content}]
                }),
            })
            .collect()
    }

    fn get_system_instruction(&self, messages: &[Message]) -> Option<String> {
        messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.content.clone())
    }

    fn convert_tools(&self, tools: &[ToolDefinition]) -> Option<Value> {
        if tools.is_empty() {
            return None;
        }

        let function_declarations: Vec<Value> = tools
            .iter()
            .map(|t| {
                let mut parameters = t.parameters.clone();
                scrub_schema(&mut parameters);
                json!({
                    "name": t.name,
                    "description": t.description,
                    "parameters": parameters
                })
            })
            .collect();

        Some(json!([{
            "functionDeclarations": function_declarations
        }]))
    }

    fn build_request(&self, messages: &[Message], tools: &[ToolDefinition]) -> Value {
        let mut generation_config = json!({});
        if let Some(temperature) = self.sampling.temperature {
            generation_config["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = self.sampling.max_tokens {
            generation_config["maxOutputTokens"] = json!(max_tokens);
        }

        let mut request = json!({
            "contents": self.convert_messages(messages),
            "generationConfig": generation_config
        });

        if let Some(system) = self.get_system_instruction(messages) {
            request["systemInstruction"] = json!({
                "parts": [{"text": system}]
            });
        }

        if let Some(tool_config) = self.convert_tools(tools) {
            request["tools"] = tool_config;
        }

        request
    }

    fn parse_response(&self, response: &GeminiResponse) -> Result<LlmResponse> {
        let candidate = response
            .candidates
            .first()
            .ok_or_else(|| Error::Llm("No candidates in response".to_string()))?;

        let mut text = String::new();
        let mut tool_calls = Vec::new();

        for part in &candidate.content.parts {
            if let Some(ref t) = part.text {
                text.push_str(t);
            }

            if let Some(ref fc) = part.function_call {
                tool_calls.push(ToolCallRequest {
                    id: format!("call_{}", uuid::Uuid::new_v4().simple()),
                    name: fc.name.clone(),
                    arguments: fc.args.clone(),
                });
            }
        }

        let usage = response
            .usage_metadata
            .as_ref()
            .map(|u| Usage {
                prompt_tokens: u.prompt_token_count.unwrap_or(0),
                completion_tokens: u.candidates_token_count.unwrap_or(0),
                total_tokens: u.total_token_count.unwrap_or(0),
            })
            .unwrap_or_default();

        Ok(LlmResponse {
            content: (!text.is_empty()).then_some(text),
            tool_calls,
            finish_reason: candidate
                .finish_reason
                .clone()
                .unwrap_or_else(|| "stop".to_string()),
            usage,
        })
    }
}

fn scrub_schema(schema: &mut Value) {
    match schema {
        Value::Object(map) => {
            for key in UNSUPPORTED_SCHEMA_KEYS {
                map.remove(key);
            }
            for value in map.values_mut() {
                scrub_schema(value);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(scrub_schema),
        _ => {}
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn chat(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<LlmResponse> {
        let request = self.build_request(messages, tools);

        let response = self
            .client
            .post(self.build_url())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(Error::Llm(format!("Gemini API error ({status}): {error_text}")));
        }

        let gemini_response: GeminiResponse = response.json().await?;
        self.parse_response(&gemini_response)
    }

    fn default_model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> GeminiClient {
        GeminiClient::new("key", "gemini-2.0-flash", Sampling { temperature: Some(0.2), max_tokens: Some(512) })
    }

    #[test]
    fn test_request_shape() {
        let messages = vec![
            Message::system("be brief"),
            Message::user("weather?"),
            Message::assistant_with_tools(
                "",
                vec![ToolCallRequest {
                    id: "call_1".to_string(),
                    name: "get_weather".to_string(),
                    arguments: json!({"city": "SF"}),
                }],
            ),
            Message::tool_result("call_1", "get_weather", "sunny"),
        ];
        let tools = vec![ToolDefinition {
            name: "get_weather".to_string(),
            description: "Weather lookup".to_string(),
            parameters: json!({
                "$schema": "http://json-schema.org/draft-07/schema#",
                "type": "object",
                "additionalProperties": false,
                "properties": {"city": {"type": "string"}}
            }),
        }];

        let request = client().build_request(&messages, &tools);

        assert_eq!(request["systemInstruction"]["parts"][0]["text"], "be brief");
        assert_eq!(request["contents"].as_array().unwrap().len(), 3);
        assert_eq!(request["contents"][1]["parts"][0]["functionCall"]["name"], "get_weather");
        assert_eq!(
            request["contents"][2]["parts"][0]["functionResponse"]["name"],
            "get_weather"
        );
        assert_eq!(request["generationConfig"]["maxOutputTokens"], 512);

        let params = &request["tools"][0]["functionDeclarations"][0]["parameters"];
        assert!(params.get("$schema").is_none());
        assert!(params.get("additionalProperties").is_none());
        assert_eq!(params["properties"]["city"]["type"], "string");
    }

    #[test]
    fn test_parse_response_with_function_call() {
        let raw: GeminiResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {"parts": [
                    {"functionCall": {"name": "get_weather", "args": {"city": "SF"}}}
                ]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 3, "candidatesTokenCount": 2, "totalTokenCount": 5}
        }))
        .unwrap();

        let response = client().parse_response(&raw).unwrap();
        assert!(response.has_tool_calls());
        assert!(response.content.is_none());
        assert_eq!(response.tool_calls[0].name, "get_weather");
        assert_eq!(response.usage.total_tokens, 5);
    }
}
