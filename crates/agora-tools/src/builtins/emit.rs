//! Event emission tool
//!
//! The only tool whose output is not text: a successful call yields an
//! [`EmittedEvent`] that the dispatcher routes to the event's subscribers.

use crate::error::{Error, Result};
use crate::registry::{EmittedEvent, Tool, ToolCategory, ToolDefinition, ToolInput, ToolOutput};
use std::collections::BTreeMap;
use tracing::debug;

/// Tool that emits a named event
pub struct EmitEventTool {
    definition: ToolDefinition,
}

impl EmitEventTool {
    /// Create a new emit tool
    #[must_use]
    pub fn new() -> Self {
        let definition = ToolDefinition::new(
            "emit_event",
            "Emit an event that other agents subscribed to its name will receive",
        )
        .with_category(ToolCategory::Event)
        .with_parameters(serde_json::json!({
            "type": "object",
            "properties": {
                "name": {
                    "type": "string",
                    "description": "Event name"
                },
                "value": {
                    "description": "Event payload"
                },
                "metadata": {
                    "type": "object",
                    "description": "Optional structured metadata"
                }
            },
            "required": ["name", "value"]
        }));

        Self { definition }
    }
}

impl Default for EmitEventTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Tool for EmitEventTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(&self, input: ToolInput) -> Result<ToolOutput> {
        let name = input.str_arg("name")?.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("Event name must not be empty".to_string()));
        }

        let value = input
            .arguments
            .get("value")
            .cloned()
            .ok_or_else(|| Error::InvalidInput("Missing 'value' parameter".to_string()))?;

        let metadata: BTreeMap<String, serde_json::Value> = match input.arguments.get("metadata") {
            Some(serde_json::Value::Object(map)) => {
                map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
            }
            Some(serde_json::Value::Null) | None => BTreeMap::new(),
            Some(_) => {
                return Err(Error::InvalidInput(
                    "'metadata' must be an object".to_string(),
                ))
            }
        };

        debug!(event = %name, agent_id = %input.context.agent_id, "Emitting event");

        Ok(ToolOutput::Emit(EmittedEvent {
            name: name.to_string(),
            value,
            metadata,
        }))
    }
}
