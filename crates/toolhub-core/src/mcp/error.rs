//! MCP error types

use thiserror::Error;

/// Errors from talking to MCP providers
#[derive(Error, Debug)]
pub enum McpError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Timed out after {0} ms")]
    Timeout(u128),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Tool call failed: {0}")]
    ToolCallFailed(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Tool '{0}' is not exposed by this toolset")]
    ToolNotExposed(String),

    #[error("Unsupported transport '{0}' (only stdio is supported)")]
    UnsupportedTransport(String),

    #[error("Toolset is closed")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl McpError {
    /// Whether this error means the provider could not be reached at all
    pub fn is_connection_failure(&self) -> bool {
        matches!(
            self,
            McpError::ConnectionFailed(_)
                | McpError::InitializationFailed(_)
                | McpError::Timeout(_)
                | McpError::Io(_)
        )
    }
}

pub type McpResult<T> = Result<T, McpError>;
