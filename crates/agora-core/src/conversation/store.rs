//! Conversation store
//!
//! Each mutating operation is atomic per `(conversation, agent)` and never
//! holds a map lock across an `.await`. Turn serialization for one agent is
//! a separate async lock handed out by [`ConversationStore::lock_agent`].

use super::{AgentState, Conversation, ConversationId, EventRecord, RenderedContext};
use crate::error::{Error, Result};
use crate::event::Event;
use crate::workflow::Workflow;
use agora_llm::Message;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

/// Store of live conversations
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Create an empty conversation and return its fresh id
    async fn create(&self, workflow: Arc<Workflow>) -> ConversationId;

    /// Detached snapshot of a conversation
    async fn get(&self, id: ConversationId) -> Option<Conversation>;

    /// Workflow a conversation runs against
    async fn workflow(&self, id: ConversationId) -> Result<Arc<Workflow>>;

    /// Append one message to an agent's history
    async fn append_message(&self, id: ConversationId, agent_id: &str, message: Message)
        -> Result<()>;

    /// Increment an agent's turn counter, returning the new value
    async fn increment_turn(&self, id: ConversationId, agent_id: &str) -> Result<u32>;

    /// Append a turn's messages, replace its rendered context when one is
    /// given, and increment its counter in one step
    async fn commit_turn(
        &self,
        id: ConversationId,
        agent_id: &str,
        messages: Vec<Message>,
        context: Option<RenderedContext>,
    ) -> Result<u32>;

    /// Current turn counter (0 for agents that never ran)
    async fn turn_count(&self, id: ConversationId, agent_id: &str) -> Result<u32>;

    /// Record the rendered system context of an agent
    async fn set_context(
        &self,
        id: ConversationId,
        agent_id: &str,
        context: RenderedContext,
    ) -> Result<()>;

    /// Copy of an agent's history
    async fn history(&self, id: ConversationId, agent_id: &str) -> Result<Vec<Message>>;

    /// Drop an agent's history, keeping its turn counter
    async fn clear_history(&self, id: ConversationId, agent_id: &str) -> Result<()>;

    /// Record an event and return the subscribers it notifies
    async fn insert_event(&self, id: ConversationId, event: Event) -> Result<Vec<String>>;

    /// Record an event delivered to an explicit set of agents
    async fn record_event(
        &self,
        id: ConversationId,
        event: Event,
        notified: Vec<String>,
    ) -> Result<()>;

    /// Serialize turns of one agent; the guard releases on drop
    async fn lock_agent(&self, id: ConversationId, agent_id: &str) -> Result<OwnedMutexGuard<()>>;

    /// Load a snapshot back in, replacing any conversation with the same id
    async fn restore(&self, conversation: Conversation) -> ConversationId;

    /// Remove a conversation, returning its final snapshot
    async fn remove(&self, id: ConversationId) -> Option<Conversation>;

    /// Ids of all live conversations
    async fn list_ids(&self) -> Vec<ConversationId>;
}

struct ConversationEntry {
    workflow: Arc<Workflow>,
    created_at: DateTime<Utc>,
    agents: DashMap<String, AgentState>,
    locks: DashMap<String, Arc<AsyncMutex<()>>>,
    events: Mutex<Vec<EventRecord>>,
}

impl ConversationEntry {
    fn new(workflow: Arc<Workflow>) -> Self {
        Self {
            workflow,
            created_at: Utc::now(),
            agents: DashMap::new(),
            locks: DashMap::new(),
            events: Mutex::new(Vec::new()),
        }
    }

    fn snapshot(&self, id: ConversationId) -> Conversation {
        Conversation {
            id,
            workflow: Arc::clone(&self.workflow),
            agents: self
                .agents
                .iter()
                .map(|entry| (entry.key().clone(), entry.value().clone()))
                .collect(),
            events: self
                .events
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clone(),
            created_at: self.created_at,
        }
    }

    fn with_agent<T>(&self, agent_id: &str, f: impl FnOnce(&mut AgentState) -> T) -> T {
        let mut state = self.agents.entry(agent_id.to_string()).or_default();
        f(state.value_mut())
    }

    fn read_agent<T>(&self, agent_id: &str, f: impl FnOnce(&AgentState) -> T) -> Option<T> {
        self.agents.get(agent_id).map(|state| f(state.value()))
    }

    fn push_event(&self, event: Event, notified: Vec<String>) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(EventRecord {
                event,
                notified,
                recorded_at: Utc::now(),
            });
    }
}

/// In-memory conversation store
#[derive(Default)]
pub struct MemoryConversationStore {
    conversations: DashMap<ConversationId, Arc<ConversationEntry>>,
}

impl MemoryConversationStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live conversations
    #[must_use]
    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    /// Whether the store holds no conversations
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    fn entry(&self, id: ConversationId) -> Result<Arc<ConversationEntry>> {
        self.conversations
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(Error::ConversationNotFound(id))
    }
}

#[async_trait]
impl ConversationStore for MemoryConversationStore {
    async fn create(&self, workflow: Arc<Workflow>) -> ConversationId {
        let id = ConversationId::new();
        self.conversations
            .insert(id, Arc::new(ConversationEntry::new(workflow)));
        debug!(conversation_id = %id, "Conversation created");
        id
    }

    async fn get(&self, id: ConversationId) -> Option<Conversation> {
        self.entry(id).ok().map(|entry| entry.snapshot(id))
    }

    async fn workflow(&self, id: ConversationId) -> Result<Arc<Workflow>> {
        Ok(Arc::clone(&self.entry(id)?.workflow))
    }

    async fn append_message(
        &self,
        id: ConversationId,
        agent_id: &str,
        message: Message,
    ) -> Result<()> {
        self.entry(id)?
            .with_agent(agent_id, |state| state.messages.push(message));
        Ok(())
    }

    async fn increment_turn(&self, id: ConversationId, agent_id: &str) -> Result<u32> {
        Ok(self.entry(id)?.with_agent(agent_id, |state| {
            state.turns += 1;
            state.turns
        }))
    }

    async fn commit_turn(
        &self,
        id: ConversationId,
        agent_id: &str,
        messages: Vec<Message>,
        context: Option<RenderedContext>,
    ) -> Result<u32> {
        Ok(self.entry(id)?.with_agent(agent_id, |state| {
            state.messages.extend(messages);
            if context.is_some() {
                state.context = context;
            }
            state.turns += 1;
            state.turns
        }))
    }

    async fn turn_count(&self, id: ConversationId, agent_id: &str) -> Result<u32> {
        Ok(self
            .entry(id)?
            .read_agent(agent_id, |state| state.turns)
            .unwrap_or(0))
    }

    async fn set_context(
        &self,
        id: ConversationId,
        agent_id: &str,
        context: RenderedContext,
    ) -> Result<()> {
        self.entry(id)?
            .with_agent(agent_id, |state| state.context = Some(context));
        Ok(())
    }

    async fn history(&self, id: ConversationId, agent_id: &str) -> Result<Vec<Message>> {
        Ok(self
            .entry(id)?
            .read_agent(agent_id, |state| state.messages.clone())
            .unwrap_or_default())
    }

    async fn clear_history(&self, id: ConversationId, agent_id: &str) -> Result<()> {
        self.entry(id)?
            .with_agent(agent_id, |state| state.messages.clear());
        Ok(())
    }

    async fn insert_event(&self, id: ConversationId, event: Event) -> Result<Vec<String>> {
        let entry = self.entry(id)?;
        let notified = entry.workflow.subscriber_ids(event.name());
        debug!(
            conversation_id = %id,
            event = %event.name(),
            notified = notified.len(),
            "Event inserted"
        );
        entry.push_event(event, notified.clone());
        Ok(notified)
    }

    async fn record_event(
        &self,
        id: ConversationId,
        event: Event,
        notified: Vec<String>,
    ) -> Result<()> {
        self.entry(id)?.push_event(event, notified);
        Ok(())
    }

    async fn lock_agent(&self, id: ConversationId, agent_id: &str) -> Result<OwnedMutexGuard<()>> {
        let lock = {
            let entry = self.entry(id)?;
            let lock = entry
                .locks
                .entry(agent_id.to_string())
                .or_default()
                .value()
                .clone();
            lock
        };
        Ok(lock.lock_owned().await)
    }

    async fn restore(&self, conversation: Conversation) -> ConversationId {
        let id = conversation.id;
        let entry = ConversationEntry {
            workflow: conversation.workflow,
            created_at: conversation.created_at,
            agents: conversation.agents.into_iter().collect(),
            locks: DashMap::new(),
            events: Mutex::new(conversation.events),
        };
        self.conversations.insert(id, Arc::new(entry));
        debug!(conversation_id = %id, "Conversation restored");
        id
    }

    async fn remove(&self, id: ConversationId) -> Option<Conversation> {
        self.conversations
            .remove(&id)
            .map(|(_, entry)| entry.snapshot(id))
    }

    async fn list_ids(&self) -> Vec<ConversationId> {
        let mut ids: Vec<ConversationId> = self.conversations.iter().map(|e| *e.key()).collect();
        ids.sort();
        ids
    }
}
