//! Builtins - Built-in tools for Agora agents
//!
//! - File tools: fs_read, fs_list (bounded by the agent's traversal depth)
//! - Event tool: emit_event (its output becomes a new dispatched event)

mod emit;
mod file;

pub use emit::EmitEventTool;
pub use file::{resolve_path, FileListTool, FileReadTool};

use crate::registry::ToolRegistry;
use std::sync::Arc;

/// Register all built-in tools
pub fn register_builtins(registry: &mut ToolRegistry) {
    registry.register(Arc::new(FileReadTool::new()));
    registry.register(Arc::new(FileListTool::new()));
    registry.register(Arc::new(EmitEventTool::new()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_builtins() {
        let mut registry = ToolRegistry::new();
        register_builtins(&mut registry);
        assert_eq!(registry.list_names(), vec!["emit_event", "fs_list", "fs_read"]);
    }
}
