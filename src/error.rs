//! Error types for mcp-chat

use thiserror::Error;

/// Result type alias for mcp-chat operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in mcp-chat
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file missing, malformed or inconsistent.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Model or tool-set construction failed while building the session.
    #[error("Session initialization failed")]
    Initialization(#[source] Box<Error>),

    /// The agent call failed mid-conversation.
    #[error("Agent invocation failed")]
    Invocation(#[source] Box<Error>),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Tool error: {0}")]
    Tool(String),

    #[error("MCP error: {0}")]
    Mcp(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Max iterations reached")]
    MaxIterations,
}

impl Error {
    /// Wrap a failure raised while building the session.
    pub fn initialization(err: Error) -> Self {
        match err {
            Error::Initialization(_) => err,
            other => Error::Initialization(Box::new(other)),
        }
    }

    /// Wrap a failure raised by the agent during a turn.
    pub fn invocation(err: Error) -> Self {
        match err {
            Error::Invocation(_) => err,
            other => Error::Invocation(Box::new(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_initialization_keeps_cause() {
        let err = Error::initialization(Error::Llm("no key".to_string()));
        assert!(matches!(err, Error::Initialization(_)));
        assert_eq!(err.source().unwrap().to_string(), "LLM error: no key");
    }

    #[test]
    fn test_wrapping_is_not_nested() {
        let err = Error::invocation(Error::invocation(Error::MaxIterations));
        match err {
            Error::Invocation(inner) => assert!(matches!(*inner, Error::MaxIterations)),
            other => panic!("unexpected error: {other}"),
        }
    }
}
