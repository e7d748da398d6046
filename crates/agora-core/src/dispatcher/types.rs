use crate::error::Error;
use crate::event::Event;
use agora_llm::{TokenUsage, ToolCall};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use uuid::Uuid;

/// Default number of events processed per top-level dispatch
pub(crate) const DEFAULT_MAX_EVENTS: usize = 64;

/// Default deepest cascade level
pub(crate) const DEFAULT_MAX_CASCADE_DEPTH: usize = 8;

/// Dispatcher limits and tool environment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Events processed per top-level dispatch before the cascade halts
    #[serde(default = "default_max_events")]
    pub max_events: usize,
    /// Deepest cascade level still delivered (the triggering event is 0)
    #[serde(default = "default_max_cascade_depth")]
    pub max_cascade_depth: usize,
    /// Model rounds per turn while tools keep being requested
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,
    /// Agent turns running at once
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,
    /// Root directory for file tools
    #[serde(default = "default_workdir")]
    pub workdir: PathBuf,
    /// Facts made available to `Enrich` transforms and templates as `env.*`
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
}

fn default_max_events() -> usize {
    DEFAULT_MAX_EVENTS
}

fn default_max_cascade_depth() -> usize {
    DEFAULT_MAX_CASCADE_DEPTH
}

fn default_max_tool_rounds() -> usize {
    16
}

fn default_max_parallel() -> usize {
    8
}

fn default_workdir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_events: default_max_events(),
            max_cascade_depth: default_max_cascade_depth(),
            max_tool_rounds: default_max_tool_rounds(),
            max_parallel: default_max_parallel(),
            workdir: default_workdir(),
            environment: BTreeMap::new(),
        }
    }
}

/// One tool call made during a turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    /// Call ID from the model
    pub call_id: String,
    /// Tool name
    pub name: String,
    /// Whether the tool succeeded
    pub success: bool,
    /// Execution duration in milliseconds
    pub duration_ms: u64,
}

/// What a successful turn produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnOutput {
    /// Final assistant text
    pub response: String,
    /// Tool calls in execution order
    pub tool_calls: Vec<ToolCallRecord>,
    /// Token usage summed over all model rounds
    pub usage: TokenUsage,
    /// Turn counter after commit
    pub turn: u32,
    /// Turn duration in milliseconds
    pub duration_ms: u64,
}

/// Outcome of one agent's turn for one event
#[derive(Debug)]
pub struct TurnResult {
    /// Agent that ran (or was refused)
    pub agent_id: String,
    /// Name of the triggering event
    pub event: String,
    /// Id of the triggering event
    pub event_id: Uuid,
    /// Cascade depth of the triggering event
    pub depth: usize,
    /// Events emitted during the turn, in emission order
    pub emitted: Vec<Event>,
    /// Output or the turn-local error
    pub outcome: Result<TurnOutput, Error>,
}

impl TurnResult {
    pub(crate) fn new(
        agent_id: impl Into<String>,
        event: &Event,
        depth: usize,
        outcome: Result<TurnOutput, Error>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            event: event.name().to_string(),
            event_id: event.id(),
            depth,
            emitted: Vec::new(),
            outcome,
        }
    }

    /// Whether the turn completed
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// The turn's error, if it failed
    #[must_use]
    pub fn error(&self) -> Option<&Error> {
        self.outcome.as_ref().err()
    }

    /// The turn's output, if it completed
    #[must_use]
    pub fn output(&self) -> Option<&TurnOutput> {
        self.outcome.as_ref().ok()
    }
}

/// Collected model round
#[derive(Debug, Default)]
pub(crate) struct ModelReply {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
    /// Tool results the provider executed itself: (call id, name, content)
    pub provider_results: Vec<(String, String, String)>,
    pub usage: TokenUsage,
}
