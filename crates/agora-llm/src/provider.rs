//! Model provider trait definition
//!
//! A provider receives the fully transformed context of one agent plus the
//! tools that agent may use, and answers with a stream of chunks. Tool call
//! requests in the stream are executed by the caller, which then invokes the
//! provider again with the results appended.

use crate::error::Result;
use crate::message::Message;
use crate::tools::{ToolCall, ToolSpec};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// Token usage information
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt tokens
    pub prompt_tokens: u32,
    /// Completion tokens
    pub completion_tokens: u32,
    /// Total tokens
    pub total_tokens: u32,
}

impl TokenUsage {
    /// Create usage from prompt and completion counts
    #[must_use]
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }

    /// Add another usage record to this one
    pub fn accumulate(&mut self, other: &TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// One model invocation
#[derive(Debug, Clone, Default)]
pub struct ModelRequest {
    /// Opaque model reference taken from the agent definition
    pub model: String,
    /// Transformed context, system message first when present
    pub messages: Vec<Message>,
    /// Tools the agent is allowed to call
    pub tools: Vec<ToolSpec>,
}

impl ModelRequest {
    /// Create a new request
    #[must_use]
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            tools: Vec::new(),
        }
    }

    /// Set the advertised tools
    #[must_use]
    pub fn with_tools(mut self, tools: Vec<ToolSpec>) -> Self {
        self.tools = tools;
        self
    }
}

/// A single item of a model response stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelChunk {
    /// Text fragment of the answer
    Text {
        /// Fragment
        text: String,
    },
    /// The model wants a tool executed before it continues
    ToolCall {
        /// Requested call
        call: ToolCall,
    },
    /// A tool the provider executed on its own side
    ToolResult {
        /// Call this result answers
        call_id: String,
        /// Tool name
        name: String,
        /// Result text
        content: String,
    },
    /// Usage report, usually the last chunk
    Usage {
        /// Token counts
        usage: TokenUsage,
    },
}

impl ModelChunk {
    /// Text chunk
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Tool call chunk
    #[must_use]
    pub fn tool_call(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self::ToolCall {
            call: ToolCall::new(id, name, arguments),
        }
    }

    /// Usage chunk
    #[must_use]
    pub fn usage(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self::Usage {
            usage: TokenUsage::new(prompt_tokens, completion_tokens),
        }
    }
}

/// Stream of chunks returned by a provider
pub type ModelStream = Pin<Box<dyn Stream<Item = Result<ModelChunk>> + Send>>;

/// Trait for model providers
#[async_trait::async_trait]
pub trait ModelProvider: Send + Sync {
    /// Get the provider name
    fn name(&self) -> &str;

    /// Start one model round
    async fn invoke(&self, request: ModelRequest) -> Result<ModelStream>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_accumulate() {
        let mut total = TokenUsage::default();
        total.accumulate(&TokenUsage::new(10, 5));
        total.accumulate(&TokenUsage::new(3, 2));
        assert_eq!(total.prompt_tokens, 13);
        assert_eq!(total.completion_tokens, 7);
        assert_eq!(total.total_tokens, 20);
    }

    #[test]
    fn test_chunk_serialization() {
        let chunk = ModelChunk::tool_call("call_1", "emit_event", "{}");
        let json = serde_json::to_string(&chunk).unwrap();
        assert!(json.contains("\"type\":\"tool_call\""));
        assert!(json.contains("\"name\":\"emit_event\""));
    }
}
