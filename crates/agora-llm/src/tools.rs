//! Tool types for model function calling
//!
//! This module defines the types exchanged with the model when it requests
//! tools: the advertised `ToolSpec` and the requested `ToolCall`.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Tool advertised to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Tool name
    pub name: String,
    /// Tool description
    pub description: String,
    /// JSON schema for parameters
    pub parameters: serde_json::Value,
}

impl ToolSpec {
    /// Create a new tool spec
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// A tool call requested by the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique ID for this tool call
    pub id: String,
    /// Tool name
    pub name: String,
    /// Arguments as JSON string
    pub arguments: String,
}

impl ToolCall {
    /// Create a new tool call
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// Parse arguments as a typed value
    pub fn parse_arguments<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.arguments).map_err(|e| Error::InvalidResponse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_spec() {
        let spec = ToolSpec::new(
            "fs_list",
            "List a directory",
            serde_json::json!({
                "type": "object",
                "properties": { "path": { "type": "string" } },
                "required": ["path"]
            }),
        );
        assert_eq!(spec.name, "fs_list");
        assert_eq!(spec.parameters["required"][0], "path");
    }

    #[test]
    fn test_parse_arguments() {
        let call = ToolCall::new("call_1", "fs_read", r#"{"path": "README.md"}"#);
        let args: serde_json::Value = call.parse_arguments().unwrap();
        assert_eq!(args["path"], "README.md");

        let bad = ToolCall::new("call_2", "fs_read", "not json");
        assert!(matches!(
            bad.parse_arguments::<serde_json::Value>(),
            Err(Error::InvalidResponse(_))
        ));
    }
}
