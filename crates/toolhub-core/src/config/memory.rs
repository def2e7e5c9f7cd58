//! In-memory configuration source

use async_trait::async_trait;
use parking_lot::RwLock;

use super::traits::{ConfigError, ConfigResult, ConfigSource};
use super::types::{McpConfigFile, ProviderConfig};

/// In-memory configuration source
///
/// Edits are visible to the next `ProviderConfigStore::reload()`.
#[derive(Debug, Default)]
pub struct MemoryConfigSource {
    config: RwLock<McpConfigFile>,
}

impl MemoryConfigSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a source holding `config`
    pub fn with_config(config: McpConfigFile) -> Self {
        Self {
            config: RwLock::new(config),
        }
    }

    /// Replace the whole configuration
    pub fn set_config(&self, config: McpConfigFile) {
        *self.config.write() = config;
    }

    /// Add a provider; fails if the name is taken
    pub fn add_server(&self, name: &str, server: ProviderConfig) -> ConfigResult<()> {
        let mut guard = self.config.write();
        if guard.mcp_servers.contains_key(name) {
            return Err(ConfigError::ServerExists(name.to_string()));
        }
        guard.mcp_servers.insert(name.to_string(), server);
        Ok(())
    }

    /// Replace an existing provider
    pub fn update_server(&self, name: &str, server: ProviderConfig) -> ConfigResult<()> {
        let mut guard = self.config.write();
        match guard.mcp_servers.get_mut(name) {
            Some(existing) => {
                *existing = server;
                Ok(())
            }
            None => Err(ConfigError::ServerNotFound(name.to_string())),
        }
    }

    /// Remove a provider
    pub fn remove_server(&self, name: &str) -> ConfigResult<()> {
        self.config
            .write()
            .mcp_servers
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| ConfigError::ServerNotFound(name.to_string()))
    }
}

#[async_trait]
impl ConfigSource for MemoryConfigSource {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    async fn load(&self) -> ConfigResult<McpConfigFile> {
        Ok(self.config.read().clone())
    }
}
