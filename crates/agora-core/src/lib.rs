//! Agora Core - event-driven multi-agent orchestration
//!
//! This crate provides the orchestration engine:
//! - Workflow: validated, immutable agent definitions
//! - Event: named messages that trigger agent turns
//! - Conversation: per-agent history, turn counters and the event log
//! - Dispatcher: routes events to subscribers and drives their turns
//! - Transform: context compression, enrichment and observation
//! - Gate: per-agent tool capability checks
//! - EventBus: broadcast of dispatcher progress
//! - Render: prompt template rendering

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod conversation;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod event_bus;
pub mod gate;
pub mod render;
pub mod transform;
pub mod workflow;

pub use conversation::{
    load_snapshot, save_snapshot, AgentState, Conversation, ConversationId, ConversationStore,
    EventRecord, MemoryConversationStore, RenderedContext,
};
pub use dispatcher::{Dispatcher, DispatcherConfig, ToolCallRecord, TurnOutput, TurnResult};
pub use error::{format_error_for_cli, Error, Result, UserFriendlyError};
pub use event::{Event, SOURCE_AGENT_KEY};
pub use event_bus::{DispatchEvent, EventBus};
pub use gate::ToolGate;
pub use render::{PromptRenderer, RenderError, VariableRenderer};
pub use transform::{
    compress, enrich, CompressionPolicy, ContextObserver, ExcerptSummary, TracingObserver,
    TransformPipeline, TransformSpec,
};
pub use workflow::{AgentDefinition, Workflow, WorkflowConfig};
