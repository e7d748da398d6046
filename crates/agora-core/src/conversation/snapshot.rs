use super::Conversation;
use crate::error::{Error, Result};
use std::path::Path;
use tracing::info;

/// Write a conversation snapshot as pretty JSON
pub async fn save_snapshot(path: impl AsRef<Path>, conversation: &Conversation) -> Result<()> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(conversation)
        .map_err(|e| Error::Snapshot(format!("serialize failed: {}", e)))?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| Error::Snapshot(format!("{}: {}", parent.display(), e)))?;
    }
    tokio::fs::write(path, json)
        .await
        .map_err(|e| Error::Snapshot(format!("{}: {}", path.display(), e)))?;
    info!(
        conversation_id = %conversation.id,
        path = %path.display(),
        "Snapshot saved"
    );
    Ok(())
}

/// Read a snapshot written by [`save_snapshot`]
pub async fn load_snapshot(path: impl AsRef<Path>) -> Result<Conversation> {
    let path = path.as_ref();
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| Error::Snapshot(format!("{}: {}", path.display(), e)))?;
    serde_json::from_str(&raw)
        .map_err(|e| Error::Snapshot(format!("{}: invalid snapshot: {}", path.display(), e)))
}
