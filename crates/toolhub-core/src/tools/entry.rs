//! Catalog records

use std::fmt;

use serde_json::Value;

use super::local::LocalConstructor;
use crate::config::ProviderConfig;
use crate::reference::{capability_key, server_key, ToolKind};

/// What discovery reported when a provider's server-wide entry was registered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryStatus {
    /// The provider listed this many capabilities
    Listed(usize),
    /// The provider answered with no capabilities
    Empty,
}

impl DiscoveryStatus {
    pub fn from_count(count: usize) -> Self {
        if count == 0 {
            DiscoveryStatus::Empty
        } else {
            DiscoveryStatus::Listed(count)
        }
    }
}

/// One catalog record
///
/// Local entries are stored by name only; the registry fills in their
/// constructor and metadata from its local table when handing one out, so
/// those fields are a snapshot. Remote entries carry the provider's
/// configuration and are either one capability (`mcp:{provider}:{capability}`)
/// or the provider as a whole (`mcp:{provider}`).
#[derive(Clone)]
pub struct ToolEntry {
    pub name: String,
    pub kind: ToolKind,
    pub provider: Option<String>,
    pub capability: Option<String>,
    pub constructor: Option<LocalConstructor>,
    pub provider_config: Option<ProviderConfig>,
    pub metadata: Value,
    /// Set on server-wide entries only
    pub discovery: Option<DiscoveryStatus>,
}

impl ToolEntry {
    pub fn local(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ToolKind::Local,
            provider: None,
            capability: None,
            constructor: None,
            provider_config: None,
            metadata: Value::Null,
            discovery: None,
        }
    }

    /// Attach a local tool's constructor and metadata
    pub fn with_definition(mut self, constructor: LocalConstructor, metadata: Value) -> Self {
        self.constructor = Some(constructor);
        self.metadata = metadata;
        self
    }

    pub fn remote_capability(provider: &str, capability: &str, config: ProviderConfig) -> Self {
        Self {
            name: capability_key(provider, capability),
            kind: ToolKind::Remote,
            provider: Some(provider.to_string()),
            capability: Some(capability.to_string()),
            constructor: None,
            provider_config: Some(config),
            metadata: Value::Null,
            discovery: None,
        }
    }

    pub fn remote_server(provider: &str, config: ProviderConfig, status: DiscoveryStatus) -> Self {
        Self {
            name: server_key(provider),
            kind: ToolKind::Remote,
            provider: Some(provider.to_string()),
            capability: None,
            constructor: None,
            provider_config: Some(config),
            metadata: Value::Null,
            discovery: Some(status),
        }
    }

    pub fn is_local(&self) -> bool {
        self.kind == ToolKind::Local
    }

    /// Unrestricted entry for a whole provider
    pub fn is_server_wide(&self) -> bool {
        self.kind == ToolKind::Remote && self.capability.is_none()
    }
}

impl fmt::Debug for ToolEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolEntry")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("provider", &self.provider)
            .field("capability", &self.capability)
            .field("has_constructor", &self.constructor.is_some())
            .field("provider_config", &self.provider_config)
            .field("metadata", &self.metadata)
            .field("discovery", &self.discovery)
            .finish()
    }
}
