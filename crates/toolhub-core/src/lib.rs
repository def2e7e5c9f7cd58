//! Toolhub Core
//!
//! Tool registry and MCP provider lifecycle management for language-model
//! agents. Tools come from two kinds of providers:
//! - local tools built in-process by registered constructors
//! - MCP servers launched as stdio child processes, possibly several of them
//!   combined behind one handle
//!
//! ## Tool references
//!
//! Consumers ask for tools by string reference:
//!
//! ```text
//! WebSearchTool                              local tool
//! mcp:custom_tools                           every capability of a provider
//! mcp:custom_tools[generate_id,get_timestamp] a subset of them
//! ```
//!
//! ## Startup
//!
//! ```rust,ignore
//! use toolhub_core::{ConsoleLogger, LocalToolSpec, ToolSystem};
//! use std::sync::Arc;
//!
//! let logger = Arc::new(ConsoleLogger::new());
//! let system = ToolSystem::stdio(None, logger).await?;
//! system.register_local_tools(vec![LocalToolSpec::new("WebSearchTool", web_search)]);
//! let report = system.initialize().await;
//!
//! // Later, per agent request
//! let tools = system
//!     .registry()
//!     .resolve_many(&["WebSearchTool", "mcp:custom_tools[generate_id]"])
//!     .await?;
//! ```

pub mod config;
pub mod logging;
pub mod mcp;
pub mod reference;
pub mod system;
pub mod tools;
pub mod types;

// Re-export commonly used types
pub use types::{Tool, ToolCall, ToolResult};

pub use logging::{ConsoleLogger, FileLogger, LogLevel, Logger, NoOpLogger, RecordingLogger};

pub use reference::{ReferenceError, ToolKind, ToolReference};

pub use config::{
    ConfigError, ConfigResult, ConfigSource, FileConfigSource, McpConfigFile, MemoryConfigSource,
    ProviderConfig, ProviderConfigStore, ProviderKind,
};

pub use mcp::{
    DiscoveryOutcome, DiscoveryService, McpError, McpResult, McpServerManager, McpToolset,
    ServerState, StdioConnector,
};

pub use tools::{
    local_constructor, DiscoveryStatus, FnTool, LocalTool, RegistryError, RegistryResult,
    ToolEntry, ToolRegistry, ToolRuntime,
};

pub use system::{InitReport, LocalToolSpec, ToolSummary, ToolSystem};
