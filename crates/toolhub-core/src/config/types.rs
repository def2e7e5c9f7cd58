//! Configuration record types

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::env::{resolve_env_str, resolve_env_value};
use super::traits::{ConfigError, ConfigResult};

/// Connection kind of a provider
///
/// Only `stdio` is supported. Any other declared `type` is kept verbatim so
/// it can be reported, and is skipped at initialization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProviderKind {
    Stdio,
    Unsupported(String),
}

impl Default for ProviderKind {
    fn default() -> Self {
        ProviderKind::Unsupported(String::new())
    }
}

impl From<String> for ProviderKind {
    fn from(value: String) -> Self {
        if value == "stdio" {
            ProviderKind::Stdio
        } else {
            ProviderKind::Unsupported(value)
        }
    }
}

impl From<ProviderKind> for String {
    fn from(kind: ProviderKind) -> Self {
        match kind {
            ProviderKind::Stdio => "stdio".to_string(),
            ProviderKind::Unsupported(other) => other,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Stdio => write!(f, "stdio"),
            ProviderKind::Unsupported(other) if other.is_empty() => write!(f, "<unspecified>"),
            ProviderKind::Unsupported(other) => write!(f, "{}", other),
        }
    }
}

/// Declarative description of one remote provider
///
/// ```yaml
/// type: stdio
/// command: python
/// args: ["custom_tools_server.py"]
/// env:
///   API_KEY: "${CUSTOM_TOOLS_API_KEY}"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Connection kind (`type` in YAML)
    #[serde(rename = "type", default)]
    pub kind: ProviderKind,
    /// Executable to launch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Arguments passed to the executable
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    /// Environment for the child process; values may contain `${VAR}` placeholders
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    /// Any other keys, kept for forward compatibility
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ProviderConfig {
    /// Create a stdio provider config
    pub fn stdio(command: impl Into<String>) -> Self {
        Self {
            kind: ProviderKind::Stdio,
            command: Some(command.into()),
            ..Default::default()
        }
    }

    /// Set the argument list
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Add an environment variable (value may be a placeholder)
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set the connection kind
    pub fn with_kind(mut self, kind: ProviderKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn is_stdio(&self) -> bool {
        self.kind == ProviderKind::Stdio
    }

    /// A copy with every `${VAR}` placeholder resolved against the current environment
    pub fn resolved(&self) -> ProviderConfig {
        ProviderConfig {
            kind: self.kind.clone(),
            command: self.command.as_deref().map(resolve_env_str),
            args: self.args.iter().map(|a| resolve_env_str(a)).collect(),
            env: self
                .env
                .iter()
                .map(|(k, v)| (k.clone(), resolve_env_str(v)))
                .collect(),
            extra: self
                .extra
                .iter()
                .map(|(k, v)| (k.clone(), resolve_env_value(v)))
                .collect(),
        }
    }

    /// Resolved launch description, `None` without an executable
    pub fn launch_spec(&self) -> Option<LaunchSpec> {
        let resolved = self.resolved();
        let command = resolved.command.filter(|c| !c.trim().is_empty())?;
        Some(LaunchSpec {
            command,
            args: resolved.args,
            env: resolved.env,
        })
    }

    /// Launch executable and arguments as one string, `None` without an executable
    pub fn launch_command(&self) -> Option<String> {
        self.launch_spec().map(|spec| spec.command_line())
    }
}

/// Everything needed to spawn one stdio provider, with placeholders resolved
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LaunchSpec {
    pub command: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
}

impl LaunchSpec {
    /// Create a launch spec without environment
    pub fn new<I, S>(command: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: command.into(),
            args: args.into_iter().map(Into::into).collect(),
            env: BTreeMap::new(),
        }
    }

    /// Executable and arguments joined by spaces
    pub fn command_line(&self) -> String {
        std::iter::once(self.command.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Global settings block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolhubSettings {
    /// Upper bound for one discovery probe (connect + list)
    #[serde(default = "default_discovery_timeout_secs")]
    pub discovery_timeout_secs: u64,
    /// Upper bound for initializing one provider
    #[serde(default = "default_init_timeout_secs")]
    pub init_timeout_secs: u64,
}

fn default_discovery_timeout_secs() -> u64 {
    30
}

fn default_init_timeout_secs() -> u64 {
    60
}

impl Default for ToolhubSettings {
    fn default() -> Self {
        Self {
            discovery_timeout_secs: default_discovery_timeout_secs(),
            init_timeout_secs: default_init_timeout_secs(),
        }
    }
}

impl ToolhubSettings {
    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_secs(self.discovery_timeout_secs)
    }

    pub fn init_timeout(&self) -> Duration {
        Duration::from_secs(self.init_timeout_secs)
    }
}

/// Configuration file structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct McpConfigFile {
    /// Optional settings
    #[serde(default)]
    pub settings: Option<ToolhubSettings>,

    /// Configured providers, by name
    #[serde(default)]
    pub mcp_servers: BTreeMap<String, ProviderConfig>,
}

impl McpConfigFile {
    /// Parse a YAML document
    pub fn from_yaml(content: &str) -> ConfigResult<Self> {
        // An empty document is an empty configuration
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> ConfigResult<String> {
        serde_yaml::to_string(self).map_err(ConfigError::from)
    }

    /// Add a provider
    pub fn with_server(mut self, name: impl Into<String>, config: ProviderConfig) -> Self {
        self.mcp_servers.insert(name.into(), config);
        self
    }

    /// Effective settings (defaults when the block is absent)
    pub fn settings(&self) -> ToolhubSettings {
        self.settings.clone().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
settings:
  discovery_timeout_secs: 5
mcp_servers:
  custom_tools:
    type: stdio
    command: python
    args: ["custom_tools_server.py"]
  github:
    type: stdio
    command: npx
    args: ["-y", "@modelcontextprotocol/server-github"]
    env:
      GITHUB_PERSONAL_ACCESS_TOKEN: "${GITHUB_TOKEN}"
    description: GitHub access
  remote_api:
    type: sse
    url: http://localhost:9000/sse
"#;

    #[test]
    fn test_parse_yaml() {
        let config = McpConfigFile::from_yaml(SAMPLE).unwrap();
        assert_eq!(config.mcp_servers.len(), 3);

        let custom = &config.mcp_servers["custom_tools"];
        assert_eq!(custom.kind, ProviderKind::Stdio);
        assert_eq!(custom.command.as_deref(), Some("python"));
        assert_eq!(custom.args, vec!["custom_tools_server.py"]);

        let github = &config.mcp_servers["github"];
        assert_eq!(github.env["GITHUB_PERSONAL_ACCESS_TOKEN"], "${GITHUB_TOKEN}");
        assert_eq!(github.extra["description"], Value::String("GitHub access".into()));

        let remote = &config.mcp_servers["remote_api"];
        assert_eq!(remote.kind, ProviderKind::Unsupported("sse".to_string()));
        assert!(remote.command.is_none());

        let settings = config.settings();
        assert_eq!(settings.discovery_timeout(), Duration::from_secs(5));
        assert_eq!(settings.init_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_missing_type_is_unsupported() {
        let config = McpConfigFile::from_yaml("mcp_servers:\n  x:\n    command: foo\n").unwrap();
        assert_eq!(config.mcp_servers["x"].kind, ProviderKind::default());
        assert_eq!(config.mcp_servers["x"].kind.to_string(), "<unspecified>");
    }

    #[test]
    fn test_empty_document() {
        assert_eq!(McpConfigFile::from_yaml("").unwrap(), McpConfigFile::default());
    }

    #[test]
    fn test_malformed_document() {
        let result = McpConfigFile::from_yaml("mcp_servers: [not, a, map]");
        assert!(matches!(result, Err(ConfigError::Yaml(_))));
    }

    #[test]
    fn test_yaml_round_trip() {
        let config = McpConfigFile::default().with_server(
            "custom_tools",
            ProviderConfig::stdio("python")
                .with_args(["custom_tools_server.py"])
                .with_env("TOKEN", "${TOKEN}"),
        );
        let yaml = config.to_yaml().unwrap();
        assert!(yaml.contains("type: stdio"));
        assert_eq!(McpConfigFile::from_yaml(&yaml).unwrap(), config);
    }
}
