//! MCP provider layer
//!
//! Uses the official rmcp SDK to talk to providers launched as stdio child
//! processes.
//!
//! - [`ProviderConnector`] / [`ProviderSession`]: the seam between this crate
//!   and a live provider ([`StdioConnector`] for real processes,
//!   [`mock::MockConnector`] for tests)
//! - [`McpToolset`]: runtime handle over one or more providers
//! - [`DiscoveryService`]: one-shot capability listing
//! - [`McpServerManager`]: bulk initialization of configured providers
//!
//! # Example
//!
//! ```rust,ignore
//! use toolhub_core::mcp::{McpToolset, StdioConnector, ToolsetPlan};
//! use toolhub_core::config::LaunchSpec;
//!
//! let plan = ToolsetPlan::single(
//!     "custom_tools",
//!     LaunchSpec::new("python", ["custom_tools_server.py"]),
//!     None,
//! );
//! let connector = Arc::new(StdioConnector::new(logger.clone()));
//!
//! let count = McpToolset::scoped(plan, connector, logger, |toolset| async move {
//!     toolset.list_capabilities().await.map(|caps| caps.len())
//! })
//! .await?;
//! ```

mod client;
mod connector;
mod discovery;
mod error;
mod manager;
pub mod mock;
mod toolset;

pub use client::{McpClient, StdioConnector};
pub use connector::{Capability, CapabilityOutput, ProviderConnector, ProviderSession};
pub use discovery::{DiscoveryOutcome, DiscoveryService};
pub use error::{McpError, McpResult};
pub use manager::{McpServerManager, ServerState};
pub use toolset::{LazyToolsetFactory, McpToolset, ServerPlan, ToolsetFactory, ToolsetPlan};

// Re-export rmcp types that consumers might need
pub use rmcp::model::{CallToolResult as McpToolResult, Tool as McpTool};
