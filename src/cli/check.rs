//! `agora check` - workflow validation

use agora_tools::{register_builtins, ToolRegistry};
use anyhow::Result;
use std::collections::BTreeSet;
use std::path::Path;

/// Validate `path` and print each agent's routing and tool access
pub fn run(path: &Path) -> Result<()> {
    let workflow = super::load_workflow(path)?;

    let mut registry = ToolRegistry::new();
    register_builtins(&mut registry);

    println!("Workflow {} ({} agents)", path.display(), workflow.len());
    let mut events = BTreeSet::new();
    for agent in workflow.agents() {
        let state = if agent.enabled { "" } else { " [disabled]" };
        let mode = if agent.ephemeral { " [ephemeral]" } else { "" };
        println!("  {} -> {}{}{}", agent.id, agent.model, state, mode);
        if let Some(description) = &agent.description {
            println!("      {}", description);
        }
        println!("      subscribes: {}", join(&agent.subscriptions));
        println!("      tools:      {}", join(&agent.capabilities));
        for tool in &agent.capabilities {
            if !registry.has(tool) {
                println!("      warning: tool '{}' is not a built-in tool", tool);
            }
        }
        if agent.enabled {
            events.extend(agent.subscriptions.iter().cloned());
        }
    }

    println!();
    println!("Routing");
    for event in &events {
        println!("  {} -> {}", event, workflow.subscriber_ids(event).join(", "));
    }
    Ok(())
}

fn join(names: &BTreeSet<String>) -> String {
    if names.is_empty() {
        "-".to_string()
    } else {
        names.iter().cloned().collect::<Vec<_>>().join(", ")
    }
}
