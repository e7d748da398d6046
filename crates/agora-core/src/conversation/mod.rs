//! Conversation state
//!
//! A conversation holds, per agent, the append-only message history, the turn
//! counter and the last rendered system context, plus the log of every event
//! inserted into it. `Conversation` values are detached snapshots; all live
//! mutation goes through a [`ConversationStore`].

mod snapshot;
mod store;

pub use snapshot::{load_snapshot, save_snapshot};
pub use store::{ConversationStore, MemoryConversationStore};

use crate::event::Event;
use crate::workflow::Workflow;
use agora_llm::Message;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

/// Conversation identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(Uuid);

impl ConversationId {
    /// Fresh random id
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Underlying UUID
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ConversationId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Last system context rendered for an agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedContext {
    /// Rendered system prompt, if the agent has one
    pub system_prompt: Option<String>,
    /// When it was rendered
    pub rendered_at: DateTime<Utc>,
}

impl RenderedContext {
    /// Context rendered now
    #[must_use]
    pub fn new(system_prompt: Option<String>) -> Self {
        Self {
            system_prompt,
            rendered_at: Utc::now(),
        }
    }
}

/// Per-agent state inside a conversation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    /// Message history, oldest first
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Completed or attempted turns
    #[serde(default)]
    pub turns: u32,
    /// Last rendered system context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<RenderedContext>,
}

/// An inserted event and who it was delivered to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// The event
    pub event: Event,
    /// Agents notified, fixed at insertion time
    pub notified: Vec<String>,
    /// Insertion time
    pub recorded_at: DateTime<Utc>,
}

/// Snapshot of a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Identifier
    pub id: ConversationId,
    /// Workflow the conversation was created against
    pub workflow: Arc<Workflow>,
    /// Per-agent state, keyed by agent id
    #[serde(default)]
    pub agents: BTreeMap<String, AgentState>,
    /// Event log in insertion order
    #[serde(default)]
    pub events: Vec<EventRecord>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    /// Empty conversation with a fresh id
    #[must_use]
    pub fn new(workflow: Arc<Workflow>) -> Self {
        Self {
            id: ConversationId::new(),
            workflow,
            agents: BTreeMap::new(),
            events: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Message history of an agent (empty if it never ran)
    #[must_use]
    pub fn history(&self, agent_id: &str) -> &[Message] {
        self.agents
            .get(agent_id)
            .map(|state| state.messages.as_slice())
            .unwrap_or(&[])
    }

    /// Turn counter of an agent
    #[must_use]
    pub fn turns(&self, agent_id: &str) -> u32 {
        self.agents.get(agent_id).map(|s| s.turns).unwrap_or(0)
    }

    /// Last rendered context of an agent
    #[must_use]
    pub fn context(&self, agent_id: &str) -> Option<&RenderedContext> {
        self.agents.get(agent_id).and_then(|s| s.context.as_ref())
    }
}
