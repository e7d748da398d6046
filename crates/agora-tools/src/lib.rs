//! Agora Tools - Tool registry and built-in tools
//!
//! This crate provides the tool system used by Agora agents:
//! - Registry: tool registration, lookup and the `Tool` trait
//! - Builtins: filesystem tools bounded by traversal depth, and the
//!   event-emission tool whose output re-enters the dispatcher

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod builtins;
pub mod error;
pub mod registry;

pub use builtins::register_builtins;
pub use error::{Error, Result};
pub use registry::{
    EmittedEvent, Tool, ToolCategory, ToolContext, ToolDefinition, ToolInput, ToolOutput,
    ToolRegistry,
};
