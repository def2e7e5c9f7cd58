//! File-based configuration source (YAML)
//!
//! Default location is the user config dir (`~/.config/toolhub/mcp_config.yaml` on Linux).

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use once_cell::sync::Lazy;

use super::traits::{ConfigResult, ConfigSource};
use super::types::McpConfigFile;

static DEFAULT_CONFIG_PATH: Lazy<PathBuf> = Lazy::new(|| {
    // Use XDG config directory (~/.config on Linux, ~/Library/Application Support on macOS)
    let config_dir = dirs::config_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".config"));
    config_dir.join("toolhub").join("mcp_config.yaml")
});

/// YAML file configuration source
///
/// A missing file loads as an empty configuration; a malformed one is an error.
///
/// # Example
///
/// ```no_run
/// use toolhub_core::config::FileConfigSource;
///
/// let user = FileConfigSource::user();
/// let project = FileConfigSource::new("/path/to/project/mcp_config.yaml");
/// ```
#[derive(Debug, Clone)]
pub struct FileConfigSource {
    path: PathBuf,
}

impl FileConfigSource {
    /// Create a source for a specific path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Source at the default user location
    pub fn user() -> Self {
        Self::new(DEFAULT_CONFIG_PATH.clone())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Write a configuration to this file, creating parent directories
    pub fn save(&self, config: &McpConfigFile) -> ConfigResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, config.to_yaml()?)?;
        Ok(())
    }
}

#[async_trait]
impl ConfigSource for FileConfigSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn load(&self) -> ConfigResult<McpConfigFile> {
        if !self.exists() {
            return Ok(McpConfigFile::default());
        }
        let content = tokio::fs::read_to_string(&self.path).await?;
        McpConfigFile::from_yaml(&content)
    }
}
