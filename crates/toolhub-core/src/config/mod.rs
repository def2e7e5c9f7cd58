//! Provider configuration
//!
//! Declarative descriptions of remote (MCP) providers, where they come from,
//! and how they turn into a concrete launch command:
//! - `ProviderConfig`: one provider record (`type`, `command`, `args`, `env`)
//! - `ConfigSource`: where records are loaded from (`FileConfigSource`, `MemoryConfigSource`)
//! - `ProviderConfigStore`: the loaded snapshot, env resolution and launch command building

mod types;
mod env;
mod traits;
mod memory;
mod file;
mod store;

pub use types::{LaunchSpec, McpConfigFile, ProviderConfig, ProviderKind, ToolhubSettings};
pub use env::{resolve_env_str, resolve_env_str_with, resolve_env_value, resolve_env_value_with};
pub use traits::{ConfigError, ConfigResult, ConfigSource};
pub use memory::MemoryConfigSource;
pub use file::FileConfigSource;
pub use store::ProviderConfigStore;
