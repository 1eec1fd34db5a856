//! Agent module - the reasoning engine behind the conversation.
//!
//! This module contains:
//! - Message types ([`Message`], [`Role`])
//! - The [`AgentHandle`] seam the conversation loop talks to
//! - LLM client trait and implementations
//! - [`ReactAgent`], the model/tool loop implementing [`AgentHandle`]
//! - [`MemorySaver`], per-thread conversation state
//!
//! # Adding a New LLM Provider
//!
//! See [`llm::ProviderRegistry`] for instructions.

mod checkpoint;
mod handle;
mod loop_impl;
mod message;

// LLM providers in submodule
pub mod llm;

// Re-exports for convenience
pub use checkpoint::{Checkpointer, MemorySaver};
pub use handle::AgentHandle;
pub use llm::{LlmClient, LlmResponse, ProviderRegistry, Usage};
pub use loop_impl::{ReactAgent, DEFAULT_MAX_ITERATIONS};
pub use message::{Message, Role, ToolCallRequest};
