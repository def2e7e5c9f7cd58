//! Provider config store

use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use super::env::resolve_env_value;
use super::memory::MemoryConfigSource;
use super::traits::{ConfigError, ConfigResult, ConfigSource};
use super::types::{LaunchSpec, McpConfigFile, ProviderConfig, ToolhubSettings};
use crate::logging::Logger;

/// Snapshot of the configured providers
///
/// Holds the last configuration loaded from its [`ConfigSource`]; `reload()`
/// replaces the snapshot. Environment placeholders are resolved on every
/// call, never stored.
pub struct ProviderConfigStore {
    source: Arc<dyn ConfigSource>,
    config: RwLock<McpConfigFile>,
    logger: Arc<dyn Logger>,
}

impl ProviderConfigStore {
    /// Load the configuration from `source`
    pub async fn load(source: Arc<dyn ConfigSource>, logger: Arc<dyn Logger>) -> ConfigResult<Self> {
        let config = Self::read(source.as_ref(), logger.as_ref()).await?;
        Ok(Self {
            source,
            config: RwLock::new(config),
            logger,
        })
    }

    /// Create a store over an in-memory configuration
    pub fn from_config(config: McpConfigFile, logger: Arc<dyn Logger>) -> Self {
        Self {
            source: Arc::new(MemoryConfigSource::with_config(config.clone())),
            config: RwLock::new(config),
            logger,
        }
    }

    async fn read(source: &dyn ConfigSource, logger: &dyn Logger) -> ConfigResult<McpConfigFile> {
        let config = source.load().await?;
        if config.mcp_servers.is_empty() {
            logger.warn(&format!(
                "[ProviderConfigStore] No MCP servers configured in {}",
                source.describe()
            ));
        } else {
            logger.info(&format!(
                "[ProviderConfigStore] Loaded {} MCP server(s) from {}",
                config.mcp_servers.len(),
                source.describe()
            ));
        }
        Ok(config)
    }

    /// Re-read the source and replace the snapshot
    ///
    /// On error the previous snapshot is kept.
    pub async fn reload(&self) -> ConfigResult<()> {
        let config = Self::read(self.source.as_ref(), self.logger.as_ref()).await?;
        *self.config.write() = config;
        Ok(())
    }

    /// Get one provider's configuration
    pub fn get(&self, name: &str) -> ConfigResult<ProviderConfig> {
        self.config
            .read()
            .mcp_servers
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::ServerNotFound(name.to_string()))
    }

    /// Names of all configured providers, sorted
    pub fn server_names(&self) -> Vec<String> {
        self.config.read().mcp_servers.keys().cloned().collect()
    }

    /// Effective settings
    pub fn settings(&self) -> ToolhubSettings {
        self.config.read().settings()
    }

    /// Resolve `${VAR}` placeholders in a value, recursing into objects and arrays
    pub fn resolve_env(&self, value: &Value) -> Value {
        resolve_env_value(value)
    }

    /// A copy of `config` with every placeholder resolved
    pub fn resolved(&self, config: &ProviderConfig) -> ProviderConfig {
        config.resolved()
    }

    /// Launch executable and arguments as one string, `None` without an executable
    pub fn build_launch_command(&self, config: &ProviderConfig) -> Option<String> {
        config.launch_command()
    }

    /// Resolved launch description, `None` without an executable
    pub fn launch_spec(&self, config: &ProviderConfig) -> Option<LaunchSpec> {
        config.launch_spec()
    }
}

impl std::fmt::Debug for ProviderConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfigStore")
            .field("source", &self.source.describe())
            .field("servers", &self.server_names())
            .finish()
    }
}
