//! Error types for agora-tools

use thiserror::Error;

/// Tool error type
#[derive(Debug, Error)]
pub enum Error {
    /// Tool not found
    #[error("tool not found: {name} (available: {available})")]
    NotFound {
        /// Requested tool name
        name: String,
        /// Comma separated list of registered tools
        available: String,
    },

    /// Tool execution failed
    #[error("execution failed: {0}")]
    Execution(String),

    /// Invalid input
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Permission denied
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Traversal deeper than the calling agent allows
    #[error("traversal depth {requested} exceeds limit {limit}")]
    DepthExceeded {
        /// Depth the call asked for
        requested: usize,
        /// Agent's configured limit
        limit: usize,
    },

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
