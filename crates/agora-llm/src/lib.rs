//! Agora LLM - model invocation boundary
//!
//! This crate holds everything the orchestrator needs to talk to a model
//! without knowing which model it is:
//! - Message: role-tagged conversation messages (with tool call requests)
//! - Tools: tool call and tool spec types exchanged with the model
//! - Provider: the streaming `ModelProvider` trait
//! - Mock: scripted and echo providers for tests and dry runs
//! - Token: tiktoken-based token counting used by context compression

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod message;
pub mod mock;
pub mod provider;
pub mod token;
pub mod tools;

pub use error::{Error, Result};
pub use message::{Message, MessageRole};
pub use mock::{EchoProvider, ScriptedProvider, ScriptedRound};
pub use provider::{ModelChunk, ModelProvider, ModelRequest, ModelStream, TokenUsage};
pub use token::{count_message_tokens, count_tokens, TokenCounter};
pub use tools::{ToolCall, ToolSpec};
