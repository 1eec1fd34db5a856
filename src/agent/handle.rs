//! The capability the conversation loop talks to.

use async_trait::async_trait;

use crate::Result;

use super::message::Message;

/// Opaque agent capability: takes new messages for a thread and returns the
/// thread's updated message history, last message being the reply.
#[async_trait]
pub trait AgentHandle: Send + Sync {
    async fn invoke(&self, messages: Vec<Message>, thread_id: &str) -> Result<Vec<Message>>;
}
