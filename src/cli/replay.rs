//! `agora replay` - inspect or continue a saved conversation

use super::run::{build_dispatcher, print_progress, print_results};
use crate::settings::load_config;
use agora_core::{
    format_error_for_cli, load_snapshot, save_snapshot, Conversation, ConversationStore, Event,
    MemoryConversationStore,
};
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

pub async fn run(path: &Path, next: Option<(String, serde_json::Value)>) -> Result<()> {
    let conversation = load_snapshot(path)
        .await
        .map_err(|e| anyhow::anyhow!(format_error_for_cli(&e)))?;
    print_conversation(&conversation);

    let Some((name, value)) = next else {
        return Ok(());
    };

    let config = load_config()?;
    let store: Arc<dyn ConversationStore> = Arc::new(MemoryConversationStore::new());
    let id = store.restore(conversation).await;
    let (dispatcher, bus) = build_dispatcher(&config, Arc::clone(&store));
    let progress = tokio::spawn(print_progress(bus.subscribe()));

    let dispatched = dispatcher.dispatch(id, Event::new(name, value)).await;
    drop(dispatcher);
    drop(bus);
    let _ = progress.await;

    let results = dispatched.map_err(|e| anyhow::anyhow!(format_error_for_cli(&e)))?;
    print_results(id, &results);

    let updated = store
        .get(id)
        .await
        .context("Conversation disappeared before the snapshot")?;
    save_snapshot(path, &updated)
        .await
        .map_err(|e| anyhow::anyhow!(format_error_for_cli(&e)))?;
    println!("Snapshot updated at {}", path.display());
    Ok(())
}

fn print_conversation(conversation: &Conversation) {
    println!(
        "Conversation {} (created {})",
        conversation.id,
        conversation.created_at.to_rfc3339()
    );

    println!("Events");
    for record in &conversation.events {
        let source = record.event.source_agent().unwrap_or("external");
        println!(
            "  {} from {} -> [{}]",
            record.event.name(),
            source,
            record.notified.join(", ")
        );
    }

    for (agent_id, state) in &conversation.agents {
        println!();
        println!("{} ({} turns)", agent_id, state.turns);
        for message in &state.messages {
            let content: String = message.content.chars().take(120).collect();
            println!("  {:>9}: {}", message.role.as_str(), content.replace('\n', " "));
        }
    }
}
