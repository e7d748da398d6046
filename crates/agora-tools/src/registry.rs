//! Registry - Tool registration and discovery
//!
//! Tools implement a single `execute` method over a typed [`ToolInput`]. The
//! input carries the calling agent's limits so tools enforce them themselves;
//! authorization (whether the agent may call the tool at all) happens before
//! the registry is consulted.

use crate::error::{Error, Result};
use agora_llm::ToolSpec;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Tool category for organization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCategory {
    /// File operations
    File,
    /// Event emission
    Event,
    /// Utility operations
    Utility,
}

impl ToolCategory {
    /// Returns the string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Event => "event",
            Self::Utility => "utility",
        }
    }
}

/// Tool metadata and schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique tool name
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// JSON schema for parameters
    pub parameters: serde_json::Value,
    /// Tool category
    pub category: ToolCategory,
}

impl ToolDefinition {
    /// Create a new tool definition
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
            category: ToolCategory::Utility,
        }
    }

    /// Set the parameters schema
    #[must_use]
    pub fn with_parameters(mut self, parameters: serde_json::Value) -> Self {
        self.parameters = parameters;
        self
    }

    /// Set the category
    #[must_use]
    pub fn with_category(mut self, category: ToolCategory) -> Self {
        self.category = category;
        self
    }

    /// Spec advertised to the model
    #[must_use]
    pub fn to_spec(&self) -> ToolSpec {
        ToolSpec::new(&self.name, &self.description, self.parameters.clone())
    }
}

/// Limits and location of the agent a tool runs for
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Calling agent
    pub agent_id: String,
    /// Maximum traversal depth, `None` for unbounded
    pub max_traversal_depth: Option<usize>,
    /// Root directory filesystem tools resolve paths against
    pub workdir: PathBuf,
}

impl ToolContext {
    /// Create a context rooted at `workdir`
    #[must_use]
    pub fn new(agent_id: impl Into<String>, workdir: impl Into<PathBuf>) -> Self {
        Self {
            agent_id: agent_id.into(),
            max_traversal_depth: None,
            workdir: workdir.into(),
        }
    }

    /// Set the traversal bound
    #[must_use]
    pub fn with_max_traversal_depth(mut self, depth: Option<usize>) -> Self {
        self.max_traversal_depth = depth;
        self
    }

    /// Reject a traversal deeper than the agent allows
    pub fn check_depth(&self, requested: usize) -> Result<()> {
        match self.max_traversal_depth {
            Some(limit) if requested > limit => Err(Error::DepthExceeded { requested, limit }),
            _ => Ok(()),
        }
    }
}

/// Typed input of one tool execution
#[derive(Debug, Clone)]
pub struct ToolInput {
    /// Parsed JSON arguments
    pub arguments: serde_json::Value,
    /// Caller context
    pub context: ToolContext,
}

impl ToolInput {
    /// Create a new input
    #[must_use]
    pub fn new(arguments: serde_json::Value, context: ToolContext) -> Self {
        Self { arguments, context }
    }

    /// Required string argument
    pub fn str_arg(&self, key: &str) -> Result<&str> {
        self.arguments
            .get(key)
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::InvalidInput(format!("Missing '{}' parameter", key)))
    }
}

/// Event produced by a tool for the dispatcher to route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmittedEvent {
    /// Event name
    pub name: String,
    /// Event payload
    pub value: serde_json::Value,
    /// Structured metadata
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

/// Result of a tool execution
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    /// Plain text handed back to the model
    Text(String),
    /// A new event to dispatch
    Emit(EmittedEvent),
}

impl ToolOutput {
    /// Text the model sees as the tool response
    #[must_use]
    pub fn as_response(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Emit(event) => format!("event '{}' emitted", event.name),
        }
    }
}

/// Trait for tool implementations
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool definition
    fn definition(&self) -> &ToolDefinition;

    /// Execute the tool with given input
    async fn execute(&self, input: ToolInput) -> Result<ToolOutput>;

    /// Validate input before execution
    fn validate_input(&self, input: &ToolInput) -> Result<()> {
        if !input.arguments.is_object() {
            return Err(Error::InvalidInput("Input must be an object".to_string()));
        }
        Ok(())
    }
}

/// Registry for managing tools
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create a new empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.definition().name.clone();
        debug!(tool = %name, "Registering tool");
        self.tools.insert(name, tool);
    }

    /// Get a tool by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Check if a tool exists
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// List all tool names, sorted
    #[must_use]
    pub fn list_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered tools
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Validate and run a tool
    pub async fn execute(&self, name: &str, input: ToolInput) -> Result<ToolOutput> {
        let tool = self.get(name).ok_or_else(|| Error::NotFound {
            name: name.to_string(),
            available: self.list_names().join(", "),
        })?;
        tool.validate_input(&input)?;
        debug!(tool = %name, agent_id = %input.context.agent_id, "Executing tool");
        tool.execute(input).await
    }
}
