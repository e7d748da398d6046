//! Agent definition
//!
//! Immutable descriptor of one agent: identity, capability whitelist, event
//! subscriptions and limits. Config files may use `tools`, `subscribe` and
//! `max_walker_depth` as aliases.

use crate::transform::TransformSpec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Agent definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDefinition {
    /// Unique agent identifier
    pub id: String,
    /// Opaque model reference passed to the provider
    pub model: String,
    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Template rendered into the system context before each turn
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// Template rendering the incoming event into the user message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_prompt: Option<String>,
    /// Tool names this agent may invoke
    #[serde(default, alias = "tools")]
    pub capabilities: BTreeSet<String>,
    /// Event names that trigger this agent
    #[serde(default, alias = "subscribe")]
    pub subscriptions: BTreeSet<String>,
    /// Discard message history after every turn
    #[serde(default)]
    pub ephemeral: bool,
    /// Whether the agent is enabled
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Turns allowed per conversation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_turns: Option<u32>,
    /// Deepest file/resource traversal tools may perform for this agent
    #[serde(
        default,
        alias = "max_walker_depth",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_traversal_depth: Option<usize>,
    /// Context transforms applied before each model invocation
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transforms: Vec<TransformSpec>,
}

fn default_true() -> bool {
    true
}

impl AgentDefinition {
    /// Create an enabled agent with no capabilities or subscriptions
    #[must_use]
    pub fn new(id: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            model: model.into(),
            description: None,
            system_prompt: None,
            user_prompt: None,
            capabilities: BTreeSet::new(),
            subscriptions: BTreeSet::new(),
            ephemeral: false,
            enabled: true,
            max_turns: None,
            max_traversal_depth: None,
            transforms: Vec::new(),
        }
    }

    /// Subscribe to an event name
    #[must_use]
    pub fn subscribe(mut self, event: impl Into<String>) -> Self {
        self.subscriptions.insert(event.into());
        self
    }

    /// Allow a tool
    #[must_use]
    pub fn with_capability(mut self, tool: impl Into<String>) -> Self {
        self.capabilities.insert(tool.into());
        self
    }

    /// Allow several tools
    #[must_use]
    pub fn with_capabilities<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities.extend(tools.into_iter().map(Into::into));
        self
    }

    /// Set the description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the system prompt template
    #[must_use]
    pub fn with_system_prompt(mut self, template: impl Into<String>) -> Self {
        self.system_prompt = Some(template.into());
        self
    }

    /// Set the user prompt template
    #[must_use]
    pub fn with_user_prompt(mut self, template: impl Into<String>) -> Self {
        self.user_prompt = Some(template.into());
        self
    }

    /// Bound the number of turns
    #[must_use]
    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = Some(max_turns);
        self
    }

    /// Bound traversal depth
    #[must_use]
    pub fn with_max_traversal_depth(mut self, depth: usize) -> Self {
        self.max_traversal_depth = Some(depth);
        self
    }

    /// Append a transform
    #[must_use]
    pub fn with_transform(mut self, transform: TransformSpec) -> Self {
        self.transforms.push(transform);
        self
    }

    /// Mark the agent ephemeral
    #[must_use]
    pub fn ephemeral(mut self) -> Self {
        self.ephemeral = true;
        self
    }

    /// Disable the agent
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Whether this agent subscribes to `event`
    #[must_use]
    pub fn is_subscribed(&self, event: &str) -> bool {
        self.subscriptions.contains(event)
    }
}
