//! Tool Gate - per-agent capability whitelist
//!
//! Every tool invocation passes through [`ToolGate::authorize`] before the
//! registry sees it. There is no wildcard: an agent may call exactly the
//! tools named in its `capabilities`.

use crate::error::{Error, Result};
use crate::workflow::AgentDefinition;
use agora_llm::ToolSpec;
use agora_tools::ToolRegistry;
use tracing::warn;

/// Capability check between agents and tools
#[derive(Debug, Clone, Copy, Default)]
pub struct ToolGate;

impl ToolGate {
    /// Permit or reject `tool` for `agent`
    pub fn authorize(agent: &AgentDefinition, tool: &str) -> Result<()> {
        if tool.is_empty() || tool.contains('*') || !agent.capabilities.contains(tool) {
            warn!(agent_id = %agent.id, tool = %tool, "Tool not permitted");
            return Err(Error::ToolNotPermitted {
                agent: agent.id.clone(),
                tool: tool.to_string(),
            });
        }
        Ok(())
    }

    /// Specs of the registered tools `agent` may call, sorted by name.
    ///
    /// Capabilities naming unregistered tools are skipped.
    #[must_use]
    pub fn allowed_specs(agent: &AgentDefinition, registry: &ToolRegistry) -> Vec<ToolSpec> {
        agent
            .capabilities
            .iter()
            .filter_map(|name| registry.get(name))
            .map(|tool| tool.definition().to_spec())
            .collect()
    }
}
