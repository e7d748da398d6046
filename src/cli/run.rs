//! `agora run` - dispatch one event through a workflow
//!
//! Uses the echo model, so the run exercises routing, tool gating, limits and
//! state handling without contacting a model service.

use crate::settings::{load_config, AppConfig};
use agora_core::{
    format_error_for_cli, save_snapshot, ConversationId, ConversationStore, DispatchEvent,
    Dispatcher, Event, EventBus, MemoryConversationStore, TurnResult,
};
use agora_llm::EchoProvider;
use agora_tools::{register_builtins, ToolRegistry};
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Build a dispatcher over `store` from application settings
pub fn build_dispatcher(config: &AppConfig, store: Arc<dyn ConversationStore>) -> (Dispatcher, EventBus) {
    let mut registry = ToolRegistry::new();
    register_builtins(&mut registry);

    let bus = EventBus::new(config.event_bus.capacity);
    let dispatcher = Dispatcher::new(store, Arc::new(EchoProvider))
        .with_tools(Arc::new(registry))
        .with_config(config.dispatcher_config())
        .with_event_bus(bus.clone());
    (dispatcher, bus)
}

pub async fn run(
    workflow_path: &Path,
    event: &str,
    value: serde_json::Value,
    target: Option<&str>,
    snapshot: Option<&Path>,
) -> Result<()> {
    let config = load_config()?;
    let workflow = Arc::new(super::load_workflow(workflow_path)?);

    let store: Arc<dyn ConversationStore> = Arc::new(MemoryConversationStore::new());
    let (dispatcher, bus) = build_dispatcher(&config, Arc::clone(&store));
    let progress = tokio::spawn(print_progress(bus.subscribe()));

    let id = store.create(workflow).await;
    info!(conversation_id = %id, event = %event, "Running workflow");

    let event = Event::new(event, value);
    let dispatched = match target {
        Some(agent_id) => dispatcher.dispatch_to(id, agent_id, event).await,
        None => dispatcher.dispatch(id, event).await,
    };
    drop(dispatcher);
    drop(bus);
    let _ = progress.await;

    let results = dispatched.map_err(|e| anyhow::anyhow!(format_error_for_cli(&e)))?;
    print_results(id, &results);

    if let Some(path) = snapshot {
        let conversation = store
            .get(id)
            .await
            .context("Conversation disappeared before the snapshot")?;
        save_snapshot(path, &conversation)
            .await
            .map_err(|e| anyhow::anyhow!(format_error_for_cli(&e)))?;
        println!("Snapshot written to {}", path.display());
    }
    Ok(())
}

/// Print progress until every sender is gone
pub async fn print_progress(mut rx: broadcast::Receiver<DispatchEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => println!("  . {}", describe(&event)),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped = skipped, "Progress output lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn describe(event: &DispatchEvent) -> String {
    match event {
        DispatchEvent::TurnStarted {
            agent_id,
            event,
            depth,
            ..
        } => format!("{} started on '{}' (depth {})", agent_id, event, depth),
        DispatchEvent::ToolStarted {
            agent_id,
            tool_name,
            ..
        } => format!("{} calls {}", agent_id, tool_name),
        DispatchEvent::ToolCompleted {
            agent_id,
            success,
            duration_ms,
            ..
        } => format!(
            "{} tool {} in {}ms",
            agent_id,
            if *success { "succeeded" } else { "failed" },
            duration_ms
        ),
        DispatchEvent::TurnCompleted {
            agent_id,
            turn,
            duration_ms,
            ..
        } => format!("{} finished turn {} in {}ms", agent_id, turn, duration_ms),
        DispatchEvent::TurnFailed {
            agent_id, error, ..
        } => format!("{} failed: {}", agent_id, error),
        DispatchEvent::TurnCancelled { agent_id, .. } => format!("{} cancelled", agent_id),
        DispatchEvent::EventEmitted {
            source_agent,
            event,
            ..
        } => format!("{} emitted '{}'", source_agent, event),
        DispatchEvent::CascadeHalted {
            event,
            processed,
            depth,
            ..
        } => format!(
            "cascade halted at '{}' ({} events, depth {})",
            event, processed, depth
        ),
    }
}

/// Print one line per turn result
pub fn print_results(id: ConversationId, results: &[TurnResult]) {
    println!();
    println!("Conversation {}", id);
    if results.is_empty() {
        println!("  no agent subscribed to this event");
    }
    for result in results {
        let indent = "  ".repeat(result.depth + 1);
        match &result.outcome {
            Ok(output) => println!(
                "{}{} <- '{}': {}",
                indent, result.agent_id, result.event, output.response
            ),
            Err(error) => println!(
                "{}{} <- '{}': error: {}",
                indent,
                result.agent_id,
                result.event,
                format_error_for_cli(error)
            ),
        }
    }
}
