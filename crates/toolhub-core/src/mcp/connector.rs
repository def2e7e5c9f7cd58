//! Connection seam between toolsets/discovery and actual providers

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::McpResult;
use crate::config::LaunchSpec;
use crate::types::Tool;

/// One capability exposed by a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capability {
    /// Capability (tool) name
    pub name: String,
    /// Description
    pub description: String,
    /// JSON Schema for the parameters
    pub input_schema: Value,
}

impl Capability {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: Value::Object(Default::default()),
        }
    }
}

impl From<&Capability> for Tool {
    fn from(capability: &Capability) -> Self {
        Tool {
            name: capability.name.clone(),
            description: capability.description.clone(),
            input_schema: Some(capability.input_schema.clone()),
        }
    }
}

/// Output of one capability invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityOutput {
    /// Text content, multiple parts joined by newlines
    pub content: String,
    /// Whether the provider flagged the result as an error
    pub is_error: bool,
}

/// A live connection to one provider
#[async_trait]
pub trait ProviderSession: Send + Sync {
    /// List every capability the provider exposes
    async fn list_capabilities(&self) -> McpResult<Vec<Capability>>;

    /// Invoke one capability
    async fn call(&self, name: &str, arguments: Value) -> McpResult<CapabilityOutput>;

    /// Release the connection; safe to call more than once
    async fn close(&self) -> McpResult<()>;
}

/// Opens provider sessions from a launch description
#[async_trait]
pub trait ProviderConnector: Send + Sync {
    async fn connect(&self, launch: &LaunchSpec) -> McpResult<Arc<dyn ProviderSession>>;
}
