//! mcp-chat - interactive command-line client for a tool-augmented agent
//!
//! The binary loads a JSON5 config, starts the configured MCP servers,
//! binds their tools and a model client into an agent, and runs a
//! console conversation until the user quits. Session resources are
//! released exactly once on every exit path.

pub mod agent;
pub mod app;
pub mod config;
pub mod conversation;
pub mod error;
pub mod mcp;
pub mod session;
pub mod tools;
pub mod ui;

pub use error::{Error, Result};
