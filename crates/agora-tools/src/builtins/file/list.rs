use super::security;
use crate::error::{Error, Result};
use crate::registry::{Tool, ToolCategory, ToolDefinition, ToolInput, ToolOutput};
use std::collections::VecDeque;
use std::path::PathBuf;
use tracing::debug;

const DEFAULT_MAX_ENTRIES: usize = 1000;

/// Tool for listing directory contents, optionally recursing.
///
/// `depth` 1 lists the immediate children. Any depth beyond the calling
/// agent's traversal limit is refused before the filesystem is touched.
pub struct FileListTool {
    definition: ToolDefinition,
}

impl FileListTool {
    /// Create a new file list tool
    #[must_use]
    pub fn new() -> Self {
        let definition = ToolDefinition::new("fs_list", "List contents of a directory")
            .with_category(ToolCategory::File)
            .with_parameters(serde_json::json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Directory to list, relative to the workdir",
                        "default": "."
                    },
                    "depth": {
                        "type": "integer",
                        "description": "How many directory levels to descend",
                        "default": 1
                    },
                    "max_entries": {
                        "type": "integer",
                        "description": "Maximum entries to return",
                        "default": DEFAULT_MAX_ENTRIES
                    }
                }
            }));

        Self { definition }
    }
}

impl Default for FileListTool {
    fn default() -> Self {
        Self::new()
    }
}

/// Read a non-negative integer argument, falling back to `default` when absent
fn count_argument(arguments: &serde_json::Value, key: &str, default: usize) -> Result<usize> {
    match arguments.get(key) {
        None | Some(serde_json::Value::Null) => Ok(default),
        Some(value) => value
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| {
                Error::InvalidInput(format!("'{}' must be a non-negative integer", key))
            }),
    }
}

#[async_trait::async_trait]
impl Tool for FileListTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(&self, input: ToolInput) -> Result<ToolOutput> {
        let path = input
            .arguments
            .get("path")
            .and_then(|v| v.as_str())
            .unwrap_or(".");
        let depth = count_argument(&input.arguments, "depth", 1)?;
        let max_entries = count_argument(&input.arguments, "max_entries", DEFAULT_MAX_ENTRIES)?;

        if depth == 0 {
            return Err(Error::InvalidInput("'depth' must be at least 1".to_string()));
        }
        input.context.check_depth(depth)?;

        let root = security::resolve_path(&input.context.workdir, path)?;
        debug!(path = %path, depth = depth, "Listing directory");

        let mut entries = Vec::new();
        let mut queue: VecDeque<(PathBuf, usize)> = VecDeque::from([(root.clone(), 1)]);

        'walk: while let Some((dir, level)) = queue.pop_front() {
            let mut reader = tokio::fs::read_dir(&dir).await.map_err(Error::Io)?;
            let mut children = Vec::new();
            while let Some(entry) = reader.next_entry().await.map_err(Error::Io)? {
                children.push(entry);
            }
            children.sort_by_key(|e| e.file_name());

            for entry in children {
                if entries.len() >= max_entries {
                    break 'walk;
                }
                let is_dir = entry
                    .file_type()
                    .await
                    .map(|t| t.is_dir())
                    .unwrap_or(false);
                let entry_path = entry.path();
                let relative = entry_path
                    .strip_prefix(&root)
                    .unwrap_or(&entry_path)
                    .to_string_lossy()
                    .into_owned();

                entries.push(serde_json::json!({
                    "path": relative,
                    "is_dir": is_dir,
                    "depth": level
                }));

                if is_dir && level < depth {
                    queue.push_back((entry_path, level + 1));
                }
            }
        }

        let truncated = entries.len() >= max_entries;
        Ok(ToolOutput::Text(
            serde_json::json!({
                "path": path,
                "entries": entries,
                "count": entries.len(),
                "truncated": truncated
            })
            .to_string(),
        ))
    }
}
