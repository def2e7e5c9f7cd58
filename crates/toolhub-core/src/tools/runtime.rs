//! Ready-to-use tool objects handed to consumers

use std::fmt;
use std::sync::Arc;

use super::local::LocalTool;
use crate::mcp::McpToolset;
use crate::reference::ToolKind;
use crate::types::{Tool, ToolCall, ToolResult};

/// A resolved tool: a fresh local instance or a shared remote handle
pub enum ToolRuntime {
    Local(Box<dyn LocalTool>),
    Remote(Arc<McpToolset>),
}

impl ToolRuntime {
    pub fn kind(&self) -> ToolKind {
        match self {
            ToolRuntime::Local(_) => ToolKind::Local,
            ToolRuntime::Remote(_) => ToolKind::Remote,
        }
    }

    /// Local tool name, or the `+`-joined provider names of a remote handle
    pub fn name(&self) -> String {
        match self {
            ToolRuntime::Local(tool) => tool.name().to_string(),
            ToolRuntime::Remote(toolset) => toolset.label(),
        }
    }

    /// Tool definitions exposed to the model
    ///
    /// For remote handles this connects on first use; an unreachable handle
    /// exposes nothing.
    pub async fn definitions(&self) -> Vec<Tool> {
        match self {
            ToolRuntime::Local(tool) => tool.definitions(),
            ToolRuntime::Remote(toolset) => toolset.definitions().await.unwrap_or_default(),
        }
    }

    pub async fn execute(&self, call: &ToolCall) -> ToolResult {
        match self {
            ToolRuntime::Local(tool) => tool.call(call).await,
            ToolRuntime::Remote(toolset) => toolset.execute(call).await,
        }
    }

    pub fn as_remote(&self) -> Option<&Arc<McpToolset>> {
        match self {
            ToolRuntime::Remote(toolset) => Some(toolset),
            ToolRuntime::Local(_) => None,
        }
    }

    pub fn as_local(&self) -> Option<&dyn LocalTool> {
        match self {
            ToolRuntime::Local(tool) => Some(tool.as_ref()),
            ToolRuntime::Remote(_) => None,
        }
    }
}

impl fmt::Debug for ToolRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolRuntime::Local(tool) => f.debug_tuple("Local").field(&tool.name()).finish(),
            ToolRuntime::Remote(toolset) => f.debug_tuple("Remote").field(toolset).finish(),
        }
    }
}
