//! Value types shared by local and remote tools

mod tool;

pub use tool::{Tool, ToolCall, ToolResult};
