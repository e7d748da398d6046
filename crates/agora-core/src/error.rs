//! Error types for agora-core
//!
//! Errors local to one agent's turn end up inside that agent's `TurnResult`;
//! `AgentUndefined` on targeted delivery and `ConversationNotFound` abort the
//! dispatch call itself.

use crate::conversation::ConversationId;
use crate::render::RenderError;
use thiserror::Error;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// Agent is missing from the workflow or disabled
    #[error("agent not defined: {0}")]
    AgentUndefined(String),

    /// Agent already used all of its turns in this conversation
    #[error("agent '{agent}' reached its turn limit of {limit}")]
    TurnLimitExceeded {
        /// Agent id
        agent: String,
        /// Configured `max_turns`
        limit: u32,
    },

    /// A tool tried to traverse deeper than the agent allows
    #[error("agent '{agent}' requested traversal depth {requested}, limit is {limit}")]
    TraversalDepthExceeded {
        /// Agent id
        agent: String,
        /// Depth the tool call asked for
        requested: usize,
        /// Configured `max_traversal_depth`
        limit: usize,
    },

    /// Tool is not in the agent's capability whitelist
    #[error("agent '{agent}' is not permitted to use tool '{tool}'")]
    ToolNotPermitted {
        /// Agent id
        agent: String,
        /// Requested tool name
        tool: String,
    },

    /// Underlying tool failure
    #[error("tool error: {0}")]
    ToolExecution(#[from] agora_tools::Error),

    /// Model provider or network failure
    #[error("model error: {0}")]
    ModelInvocation(#[from] agora_llm::Error),

    /// Prompt template could not be rendered
    #[error("render error: {0}")]
    Render(#[from] RenderError),

    /// Unknown conversation id
    #[error("conversation not found: {0}")]
    ConversationNotFound(ConversationId),

    /// Model kept requesting tools past the per-turn round limit
    #[error("agent '{agent}' exceeded {limit} tool rounds in one turn")]
    ToolRoundLimitExceeded {
        /// Agent id
        agent: String,
        /// Configured round limit
        limit: usize,
    },

    /// Event cascade hit the global ceiling
    #[error("event cascade halted after {processed} events at depth {depth}")]
    CascadeLimitExceeded {
        /// Events processed in this dispatch, including the halted one
        processed: usize,
        /// Cascade depth of the halted event
        depth: usize,
    },

    /// Turn was cancelled before it completed
    #[error("turn cancelled")]
    Cancelled,

    /// Invalid workflow or agent configuration
    #[error("invalid configuration: {field}: {message}")]
    InvalidConfig {
        /// Config field name
        field: String,
        /// Detailed message
        message: String,
    },

    /// Snapshot could not be read or written
    #[error("snapshot error: {0}")]
    Snapshot(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Shorthand for [`Error::InvalidConfig`]
    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Trait for user-friendly error messages
pub trait UserFriendlyError {
    /// Get a user-friendly error message
    fn user_message(&self) -> String;

    /// Get a suggestion for how to fix the error
    fn suggestion(&self) -> Option<String>;
}

impl UserFriendlyError for Error {
    fn user_message(&self) -> String {
        match self {
            Error::AgentUndefined(id) => format!("Agent '{}' is not available.", id),
            Error::TurnLimitExceeded { agent, limit } => {
                format!("Agent '{}' already used its {} turn(s).", agent, limit)
            }
            Error::InvalidConfig { field, message } => {
                format!("Configuration error in '{}': {}", field, message)
            }
            Error::ConversationNotFound(id) => format!("No conversation with id {}.", id),
            other => other.to_string(),
        }
    }

    fn suggestion(&self) -> Option<String> {
        match self {
            Error::AgentUndefined(_) => {
                Some("Check the agent id and its `enabled` flag in the workflow file.".to_string())
            }
            Error::TurnLimitExceeded { .. } => {
                Some("Raise `max_turns` or start a new conversation.".to_string())
            }
            Error::TraversalDepthExceeded { .. } => {
                Some("Raise `max_traversal_depth` for this agent.".to_string())
            }
            Error::ToolNotPermitted { tool, .. } => Some(format!(
                "Add '{}' to the agent's `tools` list if it should be allowed.",
                tool
            )),
            Error::CascadeLimitExceeded { .. } => Some(
                "Look for agents that re-emit the events they subscribe to, or raise the \
                 dispatcher's max_events / max_cascade_depth."
                    .to_string(),
            ),
            Error::InvalidConfig { field, .. } => {
                Some(format!("Check the '{}' setting in the workflow file.", field))
            }
            _ => None,
        }
    }
}

/// Format an error for display in the CLI
pub fn format_error_for_cli(error: &Error) -> String {
    let mut output = error.user_message();
    if let Some(suggestion) = error.suggestion() {
        output.push_str("\n  hint: ");
        output.push_str(&suggestion);
    }
    output
}
