//! Event - the unit of inter-agent communication
//!
//! Events are immutable once built: fields are private and the builder
//! methods consume the value.

use agora_tools::EmittedEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Metadata key naming the agent that emitted an event
pub const SOURCE_AGENT_KEY: &str = "source_agent";

/// A named message with a payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    id: Uuid,
    name: String,
    value: serde_json::Value,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    metadata: BTreeMap<String, serde_json::Value>,
    created_at: DateTime<Utc>,
}

impl Event {
    /// Create a new event
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            value: value.into(),
            metadata: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }

    /// Add a metadata entry
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Build the event an agent emitted through a tool
    #[must_use]
    pub fn from_emitted(emitted: EmittedEvent, source_agent: &str) -> Self {
        let mut event = Self::new(emitted.name, emitted.value);
        event.metadata = emitted.metadata;
        event
            .metadata
            .insert(SOURCE_AGENT_KEY.to_string(), source_agent.into());
        event
    }

    /// Unique id
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Event name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Payload
    #[must_use]
    pub fn value(&self) -> &serde_json::Value {
        &self.value
    }

    /// Metadata
    #[must_use]
    pub fn metadata(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.metadata
    }

    /// Creation time
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Agent that emitted this event, if any
    #[must_use]
    pub fn source_agent(&self) -> Option<&str> {
        self.metadata.get(SOURCE_AGENT_KEY).and_then(|v| v.as_str())
    }

    /// Payload as message text: strings verbatim, everything else as JSON
    #[must_use]
    pub fn value_text(&self) -> String {
        match &self.value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}
