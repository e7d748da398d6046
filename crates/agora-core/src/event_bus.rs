//! EventBus - broadcast of dispatcher progress.
//!
//! Lets a CLI, log sink or test watch turns as they happen without touching
//! the conversation store. Payload text and tool output are never published;
//! fetch them from the store by conversation id.

use crate::conversation::ConversationId;
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Progress notifications published by the dispatcher.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DispatchEvent {
    /// An agent turn started
    TurnStarted {
        /// Conversation
        conversation_id: ConversationId,
        /// Agent running the turn
        agent_id: String,
        /// Name of the triggering event
        event: String,
        /// Cascade depth of the triggering event
        depth: usize,
    },
    /// Tool execution started
    ToolStarted {
        /// Conversation
        conversation_id: ConversationId,
        /// Calling agent
        agent_id: String,
        /// Tool name
        tool_name: String,
        /// Tool call ID from the model
        tool_call_id: String,
    },
    /// Tool execution finished
    ToolCompleted {
        /// Conversation
        conversation_id: ConversationId,
        /// Calling agent
        agent_id: String,
        /// Tool call ID
        tool_call_id: String,
        /// Whether the tool succeeded
        success: bool,
        /// Execution duration in milliseconds
        duration_ms: u64,
    },
    /// An agent turn finished and was committed
    TurnCompleted {
        /// Conversation
        conversation_id: ConversationId,
        /// Agent
        agent_id: String,
        /// Turn counter after commit
        turn: u32,
        /// Turn duration in milliseconds
        duration_ms: u64,
    },
    /// An agent turn failed
    TurnFailed {
        /// Conversation
        conversation_id: ConversationId,
        /// Agent
        agent_id: String,
        /// Error description
        error: String,
    },
    /// An agent turn was cancelled
    TurnCancelled {
        /// Conversation
        conversation_id: ConversationId,
        /// Agent
        agent_id: String,
    },
    /// An agent emitted an event through a tool
    EventEmitted {
        /// Conversation
        conversation_id: ConversationId,
        /// Emitting agent
        source_agent: String,
        /// Emitted event name
        event: String,
        /// Emitted event id
        event_id: Uuid,
    },
    /// The cascade ceiling stopped an event
    CascadeHalted {
        /// Conversation
        conversation_id: ConversationId,
        /// Name of the event that was not delivered
        event: String,
        /// Events processed so far
        processed: usize,
        /// Depth of the halted event
        depth: usize,
    },
}

impl DispatchEvent {
    /// Conversation the event belongs to.
    #[must_use]
    pub fn conversation_id(&self) -> ConversationId {
        match self {
            Self::TurnStarted {
                conversation_id, ..
            }
            | Self::ToolStarted {
                conversation_id, ..
            }
            | Self::ToolCompleted {
                conversation_id, ..
            }
            | Self::TurnCompleted {
                conversation_id, ..
            }
            | Self::TurnFailed {
                conversation_id, ..
            }
            | Self::TurnCancelled {
                conversation_id, ..
            }
            | Self::EventEmitted {
                conversation_id, ..
            }
            | Self::CascadeHalted {
                conversation_id, ..
            } => *conversation_id,
        }
    }

    /// Agent the event concerns, if any.
    #[must_use]
    pub fn agent_id(&self) -> Option<&str> {
        match self {
            Self::TurnStarted { agent_id, .. }
            | Self::ToolStarted { agent_id, .. }
            | Self::ToolCompleted { agent_id, .. }
            | Self::TurnCompleted { agent_id, .. }
            | Self::TurnFailed { agent_id, .. }
            | Self::TurnCancelled { agent_id, .. } => Some(agent_id),
            Self::EventEmitted { source_agent, .. } => Some(source_agent),
            Self::CascadeHalted { .. } => None,
        }
    }
}

/// Broadcast-based event bus for dispatcher progress.
///
/// Slow subscribers miss events (lagged) rather than blocking the dispatcher.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<DispatchEvent>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to all future events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DispatchEvent> {
        self.sender.subscribe()
    }

    /// Publish an event, returning how many subscribers received it.
    pub fn publish(&self, event: DispatchEvent) -> usize {
        // no receivers is not an error
        self.sender.send(event).unwrap_or(0)
    }

    /// Number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_subscribe() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        let id = ConversationId::new();
        bus.publish(DispatchEvent::TurnStarted {
            conversation_id: id,
            agent_id: "planner".to_string(),
            event: "start".to_string(),
            depth: 0,
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.conversation_id(), id);
        assert_eq!(event.agent_id(), Some("planner"));
        match event {
            DispatchEvent::TurnStarted { event, .. } => assert_eq!(event, "start"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let bus = EventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        let id = ConversationId::new();
        let count = bus.publish(DispatchEvent::TurnCancelled {
            conversation_id: id,
            agent_id: "a".to_string(),
        });
        assert_eq!(count, 2);
        assert_eq!(rx1.recv().await.unwrap().conversation_id(), id);
        assert_eq!(rx2.recv().await.unwrap().conversation_id(), id);
    }

    #[test]
    fn test_publish_no_subscribers() {
        let bus = EventBus::default();
        let count = bus.publish(DispatchEvent::CascadeHalted {
            conversation_id: ConversationId::new(),
            event: "loop".to_string(),
            processed: 65,
            depth: 3,
        });
        assert_eq!(count, 0);
    }

    #[test]
    fn test_event_serialization() {
        let event = DispatchEvent::ToolStarted {
            conversation_id: ConversationId::new(),
            agent_id: "reader".to_string(),
            tool_name: "fs_read".to_string(),
            tool_call_id: "call_1".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"tool_started\""));
        assert!(json.contains("\"tool_name\":\"fs_read\""));
    }
}
