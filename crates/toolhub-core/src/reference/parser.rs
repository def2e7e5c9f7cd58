//! Reference parser

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Prefix that marks a reference to a remote (MCP) provider
pub const REMOTE_PREFIX: &str = "mcp:";

/// Errors produced while parsing a tool reference
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReferenceError {
    #[error("Invalid tool reference '{reference}': {reason}")]
    InvalidFormat { reference: String, reason: String },
}

impl ReferenceError {
    fn invalid(reference: &str, reason: impl Into<String>) -> Self {
        Self::InvalidFormat {
            reference: reference.to_string(),
            reason: reason.into(),
        }
    }
}

pub type ReferenceResult<T> = Result<T, ReferenceError>;

/// Kind of provider behind a tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    /// In-process tool built by a local constructor
    Local,
    /// Capability served by an out-of-process MCP provider
    #[serde(rename = "mcp")]
    Remote,
}

impl ToolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolKind::Local => "local",
            ToolKind::Remote => "mcp",
        }
    }
}

/// A parsed tool reference
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ToolReference {
    /// A locally registered tool, by name
    Local { name: String },
    /// A remote provider, optionally restricted to a subset of its capabilities
    Remote {
        provider: String,
        capabilities: Option<BTreeSet<String>>,
    },
}

impl ToolReference {
    /// Parse a reference string
    ///
    /// # Example
    ///
    /// ```
    /// use toolhub_core::ToolReference;
    ///
    /// let r = ToolReference::parse("mcp:custom_tools[generate_id,get_timestamp]").unwrap();
    /// assert_eq!(r.provider(), Some("custom_tools"));
    /// assert_eq!(r.capabilities().unwrap().len(), 2);
    /// ```
    pub fn parse(reference: &str) -> ReferenceResult<Self> {
        let trimmed = reference.trim();
        if trimmed.is_empty() {
            return Err(ReferenceError::invalid(reference, "reference is empty"));
        }

        match trimmed.strip_prefix(REMOTE_PREFIX) {
            Some(rest) => Self::parse_remote(reference, rest),
            None => {
                if trimmed.contains(['[', ']']) {
                    return Err(ReferenceError::invalid(
                        reference,
                        "capability brackets are only allowed on mcp: references",
                    ));
                }
                Ok(ToolReference::Local {
                    name: trimmed.to_string(),
                })
            }
        }
    }

    fn parse_remote(reference: &str, rest: &str) -> ReferenceResult<Self> {
        let (provider, capabilities) = match rest.find('[') {
            Some(open) => {
                let Some(inner) = rest[open + 1..].strip_suffix(']') else {
                    return Err(ReferenceError::invalid(reference, "unbalanced brackets"));
                };
                if inner.contains(['[', ']']) {
                    return Err(ReferenceError::invalid(reference, "unbalanced brackets"));
                }
                (&rest[..open], Some(Self::parse_capabilities(reference, inner)?))
            }
            None if rest.contains(']') => {
                return Err(ReferenceError::invalid(reference, "unbalanced brackets"));
            }
            None => match rest.split_once(':') {
                Some((provider, caps)) => {
                    (provider, Some(Self::parse_capabilities(reference, caps)?))
                }
                None => (rest, None),
            },
        };

        let provider = provider.trim();
        if provider.is_empty() {
            return Err(ReferenceError::invalid(reference, "provider name is empty"));
        }
        if provider.contains(|c: char| c.is_whitespace() || c == ',' || c == ':') {
            return Err(ReferenceError::invalid(
                reference,
                format!("invalid provider name '{}'", provider),
            ));
        }

        Ok(ToolReference::Remote {
            provider: provider.to_string(),
            capabilities,
        })
    }

    fn parse_capabilities(reference: &str, list: &str) -> ReferenceResult<BTreeSet<String>> {
        let mut capabilities = BTreeSet::new();
        for item in list.split(',') {
            let name = item.trim();
            if name.is_empty() {
                return Err(ReferenceError::invalid(reference, "empty capability name"));
            }
            if name.contains(':') {
                return Err(ReferenceError::invalid(
                    reference,
                    format!("invalid capability name '{}'", name),
                ));
            }
            capabilities.insert(name.to_string());
        }
        Ok(capabilities)
    }

    pub fn kind(&self) -> ToolKind {
        match self {
            ToolReference::Local { .. } => ToolKind::Local,
            ToolReference::Remote { .. } => ToolKind::Remote,
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, ToolReference::Remote { .. })
    }

    /// Provider name for remote references
    pub fn provider(&self) -> Option<&str> {
        match self {
            ToolReference::Remote { provider, .. } => Some(provider),
            ToolReference::Local { .. } => None,
        }
    }

    /// Requested capability subset, `None` meaning "everything the provider has"
    pub fn capabilities(&self) -> Option<&BTreeSet<String>> {
        match self {
            ToolReference::Remote { capabilities, .. } => capabilities.as_ref(),
            ToolReference::Local { .. } => None,
        }
    }
}

impl FromStr for ToolReference {
    type Err = ReferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Canonical form: local name, `mcp:provider` or `mcp:provider[a,b]` with sorted capabilities
impl fmt::Display for ToolReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolReference::Local { name } => write!(f, "{}", name),
            ToolReference::Remote {
                provider,
                capabilities: None,
            } => write!(f, "{}{}", REMOTE_PREFIX, provider),
            ToolReference::Remote {
                provider,
                capabilities: Some(caps),
            } => {
                let list: Vec<&str> = caps.iter().map(String::as_str).collect();
                write!(f, "{}{}[{}]", REMOTE_PREFIX, provider, list.join(","))
            }
        }
    }
}

/// Catalog key of the server-wide entry for a provider (`mcp:{provider}`)
pub fn server_key(provider: &str) -> String {
    format!("{}{}", REMOTE_PREFIX, provider)
}

/// Catalog key of one capability of a provider (`mcp:{provider}:{capability}`)
pub fn capability_key(provider: &str, capability: &str) -> String {
    format!("{}{}:{}", REMOTE_PREFIX, provider, capability)
}
