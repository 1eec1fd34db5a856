//! One MCP server connection and the tools it exposes.

use async_trait::async_trait;
use rmcp::model::{CallToolRequestParams, CallToolResult, ClientInfo, Content, JsonObject, ResourceContents};
use rmcp::service::{DynService, Peer, RoleClient, RunningService, ServiceError, ServiceExt};
use rmcp::transport::{StreamableHttpClientTransport, TokioChildProcess};
use serde_json::Value;
use tokio::process::Command;

use crate::config::McpServerConfig;
use crate::error::Error;
use crate::tools::Tool;
use crate::Result;

pub type McpRunningService = RunningService<RoleClient, Box<dyn DynService<RoleClient>>>;

/// Spawn or dial the server and complete the MCP initialize handshake.
pub(super) async fn connect(server: &str, config: &McpServerConfig) -> Result<McpRunningService> {
    match config {
        McpServerConfig::Stdio { command, args, env, cwd } => {
            let mut cmd = Command::new(command);
            cmd.args(args).envs(env);
            if let Some(dir) = cwd {
                cmd.current_dir(dir);
            }

            let transport = TokioChildProcess::new(cmd).map_err(|e| {
                Error::Mcp(format!("{server}: failed to spawn `{command}`: {e}"))
            })?;

            ClientInfo::default()
                .into_dyn()
                .serve(transport)
                .await
                .map_err(|e| Error::Mcp(format!("{server}: initialize failed: {e}")))
        }
        McpServerConfig::Remote { url } => {
            let transport = StreamableHttpClientTransport::from_uri(url.as_str());

            ClientInfo::default()
                .into_dyn()
                .serve(transport)
                .await
                .map_err(|e| Error::Mcp(format!("{server}: initialize failed ({url}): {e}")))
        }
    }
}

/// List the server's tools and wrap each as a [`Tool`].
pub(super) async fn list_tools(server: String, peer: Peer<RoleClient>) -> Result<Vec<McpTool>> {
    let tools = match peer.list_all_tools().await {
        Ok(tools) => tools,
        Err(ServiceError::UnexpectedResponse) => peer
            .list_tools(None)
            .await
            .map(|page| page.tools)
            .map_err(|e| Error::Mcp(format!("{server}: tools/list failed: {e}")))?,
        Err(e) => return Err(Error::Mcp(format!("{server}: tools/list failed: {e}"))),
    };

    Ok(tools
        .into_iter()
        .map(|tool| McpTool {
            server: server.clone(),
            name: tool.name.to_string(),
            description: tool.description.map(|d| d.to_string()).unwrap_or_default(),
            schema: Value::Object((*tool.input_schema).clone()),
            peer: peer.clone(),
        })
        .collect())
}

/// A tool living on an MCP server, invoked through `tools/call`.
pub struct McpTool {
    server: String,
    name: String,
    description: String,
    schema: Value,
    peer: Peer<RoleClient>,
}

impl McpTool {
    pub fn server(&self) -> &str {
        &self.server
    }
}

#[async_trait]
impl Tool for McpTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Value {
        self.schema.clone()
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let arguments = coerce_tool_arguments(params)?;

        let result = self
            .peer
            .call_tool(CallToolRequestParams {
                meta: None,
                name: self.name.clone().into(),
                arguments,
                task: None,
            })
            .await
            .map_err(|e| Error::Tool(format!("{}/{}: tools/call failed: {e}", self.server, self.name)))?;

        render_call_result(&self.name, result)
    }
}

/// Models sometimes send arguments as a JSON string instead of an object.
fn coerce_tool_arguments(value: Value) -> Result<Option<JsonObject>> {
    match value {
        Value::Null => Ok(None),
        Value::Object(map) => Ok(Some(map)),
        Value::String(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            let parsed: Value = serde_json::from_str(trimmed).map_err(|e| {
                Error::Tool(format!("tool arguments must be valid JSON: {e}"))
            })?;
            coerce_tool_arguments(parsed)
        }
        other => Err(Error::Tool(format!(
            "tool arguments must be a JSON object; got {other}"
        ))),
    }
}

fn extract_text_content(content: &[Content]) -> Option<String> {
    let mut lines = Vec::new();
    for item in content {
        if let Some(text) = item.as_text() {
            lines.push(text.text.clone());
            continue;
        }
        if let Some(resource) = item.as_resource() {
            if let ResourceContents::TextResourceContents { text, .. } = &resource.resource {
                lines.push(text.clone());
            }
        }
    }

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

/// Flatten a call result into the text the model sees.
fn render_call_result(name: &str, result: CallToolResult) -> Result<String> {
    let text = extract_text_content(&result.content);

    if result.is_error.unwrap_or(false) {
        let message = text
            .or_else(|| result.structured_content.as_ref().map(|v| v.to_string()))
            .unwrap_or_else(|| "tool returned an error result".to_string());
        return Err(Error::Tool(format!("{name}: {message}")));
    }

    if let Some(text) = text {
        return Ok(text);
    }
    if let Some(structured) = result.structured_content {
        return Ok(structured.to_string());
    }
    Ok(serde_json::to_string(&result.content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call_result(value: Value) -> CallToolResult {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_coerce_accepts_object_and_stringified_object() {
        let from_obj = coerce_tool_arguments(json!({"city": "nyc"})).unwrap().unwrap();
        assert_eq!(from_obj.get("city"), Some(&json!("nyc")));

        let from_str = coerce_tool_arguments(json!(r#"{"city":"la"}"#)).unwrap().unwrap();
        assert_eq!(from_str.get("city"), Some(&json!("la")));

        assert!(coerce_tool_arguments(Value::Null).unwrap().is_none());
        assert!(coerce_tool_arguments(json!("  ")).unwrap().is_none());
    }

    #[test]
    fn test_coerce_rejects_non_object() {
        assert!(matches!(coerce_tool_arguments(json!(["bad"])), Err(Error::Tool(_))));
        assert!(matches!(
            coerce_tool_arguments(json!(r#"{"city":"nyc""#)),
            Err(Error::Tool(msg)) if msg.contains("valid JSON")
        ));
    }

    #[test]
    fn test_text_content_is_joined() {
        let result = call_result(json!({
            "content": [
                {"type": "text", "text": "line one"},
                {"type": "text", "text": "line two"}
            ]
        }));
        assert_eq!(render_call_result("t", result).unwrap(), "line one\nline two");
    }

    #[test]
    fn test_error_result_becomes_tool_error() {
        let result = call_result(json!({
            "content": [{"type": "text", "text": "file not found"}],
            "isError": true
        }));
        let err = render_call_result("read_file", result).unwrap_err();
        assert!(matches!(err, Error::Tool(msg) if msg == "read_file: file not found"));
    }

    #[test]
    fn test_structured_content_fallback() {
        let result = call_result(json!({
            "content": [],
            "structuredContent": {"temp": 21}
        }));
        assert_eq!(render_call_result("t", result).unwrap(), r#"{"temp":21}"#);
    }
}
