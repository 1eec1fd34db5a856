//! Configuration management

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use crate::Result;
use crate::error::Error;

/// Config file used when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "./llm-mcp-config.json5";

/// `${NAME}` placeholders resolved from the environment.
const ENV_VAR_PATTERN: &str = r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Model client settings
    pub llm: LlmConfig,

    /// Canned queries offered when the user submits a blank line
    #[serde(default)]
    pub example_queries: Vec<String>,

    /// MCP servers whose tools are exposed to the agent
    #[serde(default, alias = "mcpServers")]
    pub mcp_servers: BTreeMap<String, McpServerConfig>,
}

/// Model client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider name ("openai", "anthropic", "google_genai")
    #[serde(alias = "provider")]
    pub model_provider: String,

    /// Model to use
    pub model: String,

    #[serde(default)]
    pub temperature: Option<f32>,

    #[serde(default)]
    pub max_tokens: Option<u32>,

    /// API key; falls back to the provider's usual environment variable
    #[serde(default)]
    pub api_key: Option<String>,

    /// Override for the provider's API endpoint
    #[serde(default)]
    pub base_url: Option<String>,
}

impl LlmConfig {
    /// Resolve the API key from config, then from the first set env var.
    pub fn resolve_api_key(&self, env_vars: &[&str]) -> Result<String> {
        if let Some(key) = self.api_key.as_deref().filter(|k| !k.is_empty()) {
            return Ok(key.to_string());
        }

        env_vars
            .iter()
            .find_map(|name| std::env::var(name).ok().filter(|v| !v.is_empty()))
            .ok_or_else(|| {
                Error::Config(format!(
                    "No API key for provider '{}': set llm.api_key or {}",
                    self.model_provider,
                    env_vars.join(" / ")
                ))
            })
    }
}

/// How to reach one MCP server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum McpServerConfig {
    /// Local server spawned as a child process speaking MCP over stdio
    Stdio {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        env: HashMap<String, String>,
        #[serde(default)]
        cwd: Option<PathBuf>,
    },
    /// Remote server reached over streamable HTTP
    Remote { url: String },
}

/// Load configuration from a JSON5 file, expanding `${VAR}` placeholders.
pub fn load(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Err(Error::Config(format!("Config not found at {}", path.display())));
    }

    let content = std::fs::read_to_string(path)?;
    parse(&content).map_err(|e| match e {
        Error::Config(msg) => Error::Config(format!("{}: {}", path.display(), msg)),
        other => other,
    })
}

/// Parse configuration text (JSON5).
pub fn parse(content: &str) -> Result<Config> {
    let mut raw: Value = json5::from_str(content)
        .map_err(|e| Error::Config(format!("Invalid JSON5: {e}")))?;

    let pattern = Regex::new(ENV_VAR_PATTERN)
        .map_err(|e| Error::Config(format!("Bad placeholder pattern: {e}")))?;
    expand_env_vars(&mut raw, &pattern)?;

    let config: Config = serde_json::from_value(raw)
        .map_err(|e| Error::Config(format!("Invalid config: {e}")))?;
    config.validate()?;
    Ok(config)
}

impl Config {
    fn validate(&self) -> Result<()> {
        for (name, server) in &self.mcp_servers {
            match server {
                McpServerConfig::Stdio { command, .. } if command.trim().is_empty() => {
                    return Err(Error::Config(format!(
                        "MCP server '{name}' has an empty command"
                    )));
                }
                McpServerConfig::Remote { url } => {
                    url::Url::parse(url).map_err(|e| {
                        Error::Config(format!("MCP server '{name}' has invalid url '{url}': {e}"))
                    })?;
                }
                _ => {}
            }
        }
        Ok(())
    }
}

fn expand_env_vars(value: &mut Value, pattern: &Regex) -> Result<()> {
    match value {
        Value::String(s) => {
            if pattern.is_match(s) {
                *s = substitute(s, pattern)?;
            }
        }
        Value::Array(items) => {
            for item in items {
                expand_env_vars(item, pattern)?;
            }
        }
        Value::Object(map) => {
            for item in map.values_mut() {
                expand_env_vars(item, pattern)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn substitute(text: &str, pattern: &Regex) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for caps in pattern.captures_iter(text) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let resolved = std::env::var(name.as_str()).map_err(|_| {
            Error::Config(format!("Environment variable '{}' is not set", name.as_str()))
        })?;
        out.push_str(&text[last..whole.start()]);
        out.push_str(&resolved);
        last = whole.end();
    }

    out.push_str(&text[last..]);
    Ok(out)
}
