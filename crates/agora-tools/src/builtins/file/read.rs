use super::security;
use crate::error::{Error, Result};
use crate::registry::{Tool, ToolCategory, ToolDefinition, ToolInput, ToolOutput};
use tokio::io::AsyncReadExt;
use tracing::debug;

const DEFAULT_MAX_BYTES: u64 = 1_048_576;

/// Tool for reading file contents
pub struct FileReadTool {
    definition: ToolDefinition,
}

impl FileReadTool {
    /// Create a new file read tool
    #[must_use]
    pub fn new() -> Self {
        let definition = ToolDefinition::new("fs_read", "Read the contents of a file")
            .with_category(ToolCategory::File)
            .with_parameters(serde_json::json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Path to the file, relative to the workdir"
                    },
                    "max_bytes": {
                        "type": "integer",
                        "description": "Maximum bytes to read (default: 1MB)",
                        "default": DEFAULT_MAX_BYTES
                    }
                },
                "required": ["path"]
            }));

        Self { definition }
    }
}

impl Default for FileReadTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Tool for FileReadTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(&self, input: ToolInput) -> Result<ToolOutput> {
        let path = input.str_arg("path")?;
        let file_path = security::resolve_path(&input.context.workdir, path)?;

        let max_bytes = match input.arguments.get("max_bytes") {
            None | Some(serde_json::Value::Null) => DEFAULT_MAX_BYTES,
            Some(value) => value.as_u64().ok_or_else(|| {
                Error::InvalidInput("'max_bytes' must be a non-negative integer".to_string())
            })?,
        };

        debug!(path = %path, max_bytes = %max_bytes, "Reading file");

        let file = tokio::fs::File::open(&file_path).await.map_err(Error::Io)?;
        let mut contents = Vec::new();
        file.take(max_bytes)
            .read_to_end(&mut contents)
            .await
            .map_err(Error::Io)?;

        Ok(ToolOutput::Text(String::from_utf8_lossy(&contents).into_owned()))
    }
}
