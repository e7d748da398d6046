//! Workflow - the set of agents a conversation runs against
//!
//! A workflow is validated once when built and never mutated afterwards.
//! Reconfiguring means building a new `Workflow` and starting conversations
//! against it.

mod agent;

pub use agent::AgentDefinition;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Declarative workflow as found in configuration files
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Agent definitions, in order
    #[serde(default)]
    pub agents: Vec<AgentDefinition>,
    /// Values available to prompt templates as `variables.*`
    #[serde(default)]
    pub variables: BTreeMap<String, serde_json::Value>,
}

/// Validated, immutable collection of agent definitions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "WorkflowConfig", into = "WorkflowConfig")]
pub struct Workflow {
    agents: Vec<AgentDefinition>,
    index: HashMap<String, usize>,
    variables: BTreeMap<String, serde_json::Value>,
}

impl Workflow {
    /// Build a workflow, rejecting duplicate ids and malformed names
    pub fn new(agents: Vec<AgentDefinition>) -> Result<Self> {
        Self::try_from(WorkflowConfig {
            agents,
            variables: BTreeMap::new(),
        })
    }

    /// Replace the template variables
    #[must_use]
    pub fn with_variables(mut self, variables: BTreeMap<String, serde_json::Value>) -> Self {
        self.variables = variables;
        self
    }

    /// Look up an enabled agent.
    ///
    /// Missing and disabled agents fail the same way.
    pub fn get_agent(&self, id: &str) -> Result<&AgentDefinition> {
        self.index
            .get(id)
            .map(|&i| &self.agents[i])
            .filter(|agent| agent.enabled)
            .ok_or_else(|| Error::AgentUndefined(id.to_string()))
    }

    /// Enabled agents subscribed to `event`, in definition order
    #[must_use]
    pub fn subscribers_of(&self, event: &str) -> Vec<&AgentDefinition> {
        self.enabled_agents()
            .filter(|agent| agent.is_subscribed(event))
            .collect()
    }

    /// Ids of [`subscribers_of`](Self::subscribers_of)
    #[must_use]
    pub fn subscriber_ids(&self, event: &str) -> Vec<String> {
        self.subscribers_of(event)
            .into_iter()
            .map(|agent| agent.id.clone())
            .collect()
    }

    /// All definitions, including disabled ones
    #[must_use]
    pub fn agents(&self) -> &[AgentDefinition] {
        &self.agents
    }

    /// Enabled definitions in order
    pub fn enabled_agents(&self) -> impl Iterator<Item = &AgentDefinition> {
        self.agents.iter().filter(|agent| agent.enabled)
    }

    /// Template variables
    #[must_use]
    pub fn variables(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.variables
    }

    /// Number of definitions
    #[must_use]
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Whether the workflow has no agents
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

fn validate_name(field: &str, agent: &str, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::invalid_config(
            field,
            format!("agent '{}' has an empty entry", agent),
        ));
    }
    if name.contains('*') {
        return Err(Error::invalid_config(
            field,
            format!("agent '{}': wildcards are not supported ('{}')", agent, name),
        ));
    }
    Ok(())
}

impl TryFrom<WorkflowConfig> for Workflow {
    type Error = Error;

    fn try_from(config: WorkflowConfig) -> Result<Self> {
        let mut index = HashMap::with_capacity(config.agents.len());

        for (i, agent) in config.agents.iter().enumerate() {
            if agent.id.trim().is_empty() {
                return Err(Error::invalid_config(
                    "agents.id",
                    format!("agent #{} has an empty id", i),
                ));
            }
            if agent.model.trim().is_empty() {
                return Err(Error::invalid_config(
                    "agents.model",
                    format!("agent '{}' has no model", agent.id),
                ));
            }
            for tool in &agent.capabilities {
                validate_name("agents.tools", &agent.id, tool)?;
            }
            for event in &agent.subscriptions {
                validate_name("agents.subscribe", &agent.id, event)?;
            }
            if index.insert(agent.id.clone(), i).is_some() {
                return Err(Error::invalid_config(
                    "agents.id",
                    format!("duplicate agent id '{}'", agent.id),
                ));
            }
        }

        debug!(agents = config.agents.len(), "Workflow loaded");

        Ok(Self {
            agents: config.agents,
            index,
            variables: config.variables,
        })
    }
}

impl From<Workflow> for WorkflowConfig {
    fn from(workflow: Workflow) -> Self {
        Self {
            agents: workflow.agents,
            variables: workflow.variables,
        }
    }
}
