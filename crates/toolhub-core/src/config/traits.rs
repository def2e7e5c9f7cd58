//! Configuration source trait

use async_trait::async_trait;

use super::types::McpConfigFile;

/// Where provider configuration comes from
///
/// Implementations:
/// - `MemoryConfigSource`: In-memory, for tests and programmatic setup
/// - `FileConfigSource`: YAML file (`<config dir>/toolhub/mcp_config.yaml`)
#[async_trait]
pub trait ConfigSource: Send + Sync {
    /// Human-readable description for log messages
    fn describe(&self) -> String;

    /// Load the full configuration
    async fn load(&self) -> ConfigResult<McpConfigFile>;
}

/// Errors that can occur during configuration operations
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("MCP server not configured: {0}")]
    ServerNotFound(String),

    #[error("MCP server already exists: {0}")]
    ServerExists(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Other(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
