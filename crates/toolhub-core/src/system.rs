//! Process startup wiring
//!
//! [`ToolSystem`] builds and owns the config store, the registry and the
//! lifecycle manager, and hands them to whoever needs them. There is no
//! global instance; construct one at startup and pass it around.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::config::{ConfigResult, ConfigSource, FileConfigSource, ProviderConfigStore};
use crate::logging::Logger;
use crate::mcp::{LazyToolsetFactory, McpServerManager, ProviderConnector, StdioConnector};
use crate::tools::{LocalConstructor, ToolRegistry};

/// A local tool to register at startup
#[derive(Clone)]
pub struct LocalToolSpec {
    pub name: String,
    pub constructor: LocalConstructor,
    pub metadata: Value,
}

impl LocalToolSpec {
    pub fn new(name: impl Into<String>, constructor: LocalConstructor) -> Self {
        Self {
            name: name.into(),
            constructor,
            metadata: Value::Null,
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

impl std::fmt::Debug for LocalToolSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalToolSpec")
            .field("name", &self.name)
            .field("metadata", &self.metadata)
            .finish()
    }
}

/// Result of [`ToolSystem::initialize`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InitReport {
    pub local_tools: Vec<String>,
    pub mcp_servers: BTreeMap<String, bool>,
    pub total_tools: usize,
}

/// Snapshot of what the system currently offers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolSummary {
    pub local_tools: Vec<String>,
    pub mcp_tools: Vec<String>,
    pub initialized_servers: Vec<String>,
    pub configured_servers: Vec<String>,
    pub total_tools: usize,
}

/// Owner of the registry, config store and lifecycle manager
pub struct ToolSystem {
    store: Arc<ProviderConfigStore>,
    registry: Arc<ToolRegistry>,
    manager: Arc<McpServerManager>,
    logger: Arc<dyn Logger>,
}

impl ToolSystem {
    /// Wire a system whose toolsets connect lazily through `connector`
    pub fn new(
        store: Arc<ProviderConfigStore>,
        connector: Arc<dyn ProviderConnector>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        let factory = LazyToolsetFactory::new(connector.clone(), logger.clone())
            .with_connect_timeout(store.settings().discovery_timeout());
        let registry = Arc::new(ToolRegistry::new(Arc::new(factory), logger.clone()));
        Self::with_registry(store, registry, connector, logger)
    }

    /// Wire a system around an existing registry
    pub fn with_registry(
        store: Arc<ProviderConfigStore>,
        registry: Arc<ToolRegistry>,
        connector: Arc<dyn ProviderConnector>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        let manager = Arc::new(McpServerManager::new(
            store.clone(),
            registry.clone(),
            connector,
            logger.clone(),
        ));
        Self {
            store,
            registry,
            manager,
            logger,
        }
    }

    /// Load configuration from `source` and wire a system around it
    pub async fn from_source(
        source: Arc<dyn ConfigSource>,
        connector: Arc<dyn ProviderConnector>,
        logger: Arc<dyn Logger>,
    ) -> ConfigResult<Self> {
        let store = Arc::new(ProviderConfigStore::load(source, logger.clone()).await?);
        Ok(Self::new(store, connector, logger))
    }

    /// Standard setup: YAML file (`path`, or the user config file) and stdio providers
    pub async fn stdio(path: Option<PathBuf>, logger: Arc<dyn Logger>) -> ConfigResult<Self> {
        let source = match path {
            Some(path) => FileConfigSource::new(path),
            None => FileConfigSource::user(),
        };
        let connector = Arc::new(StdioConnector::new(logger.clone()));
        Self::from_source(Arc::new(source), connector, logger).await
    }

    /// Register one local tool
    pub fn register_local(&self, spec: LocalToolSpec) {
        self.registry
            .register_local(&spec.name, spec.constructor, spec.metadata);
    }

    /// Register local tools; returns how many were given
    pub fn register_local_tools<I>(&self, specs: I) -> usize
    where
        I: IntoIterator<Item = LocalToolSpec>,
    {
        let mut count = 0;
        for spec in specs {
            self.register_local(spec);
            count += 1;
        }
        self.logger
            .info(&format!("[ToolSystem] Registered {} local tools", count));
        count
    }

    /// Initialize every configured MCP provider and report the result
    pub async fn initialize(&self) -> InitReport {
        self.logger.info("[ToolSystem] Initializing tool system");

        let mcp_servers = self.manager.initialize_all().await;
        let names = |wanted: bool| {
            mcp_servers
                .iter()
                .filter(|(_, ok)| **ok == wanted)
                .map(|(name, _)| name.as_str())
                .collect::<Vec<_>>()
        };
        let (ok, failed) = (names(true), names(false));

        if !ok.is_empty() {
            self.logger.info(&format!(
                "[ToolSystem] Initialized MCP servers: {}",
                ok.join(", ")
            ));
        }
        if !failed.is_empty() {
            self.logger.warn(&format!(
                "[ToolSystem] Failed MCP servers: {}",
                failed.join(", ")
            ));
        }

        let report = InitReport {
            local_tools: self.registry.local_tool_names(),
            mcp_servers,
            total_tools: self.registry.tool_count(),
        };
        self.logger.info(&format!(
            "[ToolSystem] Ready with {} tools",
            report.total_tools
        ));
        report
    }

    /// Initialize only the named providers, one after another
    pub async fn initialize_servers<S: AsRef<str>>(&self, names: &[S]) -> BTreeMap<String, bool> {
        self.manager.initialize_servers(names).await
    }

    pub fn summary(&self) -> ToolSummary {
        ToolSummary {
            local_tools: self.registry.local_tool_names(),
            mcp_tools: self.registry.remote_tool_names(),
            initialized_servers: self.manager.initialized_servers(),
            configured_servers: self.manager.configured_servers(),
            total_tools: self.registry.tool_count(),
        }
    }

    /// Re-read configuration, forget initialization results and drop cached connections
    ///
    /// Catalog entries of providers no longer configured are removed; the rest
    /// are kept. Call `initialize()` again to pick up new providers.
    pub async fn reload_config(&self) -> ConfigResult<()> {
        self.store.reload().await?;
        self.manager.reset();
        let configured = self.store.server_names();
        for provider in self.registry.providers() {
            if !configured.contains(&provider) {
                self.registry.remove_provider(&provider);
            }
        }
        let released = self.registry.invalidate_cache().await;
        self.logger.info(&format!(
            "[ToolSystem] Configuration reloaded ({} connections released)",
            released
        ));
        Ok(())
    }

    /// Release every cached connection
    pub async fn shutdown(&self) {
        self.registry.invalidate_cache().await;
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn manager(&self) -> &Arc<McpServerManager> {
        &self.manager
    }

    pub fn store(&self) -> &Arc<ProviderConfigStore> {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{McpConfigFile, MemoryConfigSource, ProviderConfig};
    use crate::logging::{LogLevel, RecordingLogger};
    use crate::mcp::mock::MockConnector;
    use crate::mcp::ServerState;
    use crate::tools::{local_constructor, FnTool, ToolRuntime};
    use crate::types::ToolCall;
    use serde_json::json;

    fn connector() -> Arc<MockConnector> {
        Arc::new(
            MockConnector::new()
                .with_server(
                    "python custom_tools_server.py",
                    &["generate_id", "get_timestamp", "calculate_hash"],
                )
                .with_server("npx github-server", &["create_issue"]),
        )
    }

    fn web_search() -> LocalToolSpec {
        LocalToolSpec::new(
            "WebSearchTool",
            local_constructor(|| {
                FnTool::new("WebSearchTool", "Search the web", |call| {
                    Ok(format!("results for {}", call.get_arg_str("query").unwrap_or("")))
                })
            }),
        )
        .with_metadata(json!({"category": "search"}))
    }

    async fn system(source: Arc<MemoryConfigSource>) -> (ToolSystem, Arc<RecordingLogger>) {
        let logger = Arc::new(RecordingLogger::new());
        let system = ToolSystem::from_source(source, connector(), logger.clone())
            .await
            .unwrap();
        (system, logger)
    }

    fn memory_source() -> Arc<MemoryConfigSource> {
        Arc::new(MemoryConfigSource::with_config(
            McpConfigFile::default()
                .with_server(
                    "custom_tools",
                    ProviderConfig::stdio("python").with_args(["custom_tools_server.py"]),
                )
                .with_server("broken", ProviderConfig::stdio("missing-server")),
        ))
    }

    #[tokio::test]
    async fn test_startup_flow() {
        let (system, logger) = system(memory_source()).await;
        assert_eq!(system.register_local_tools([web_search()]), 1);

        let report = system.initialize().await;
        assert_eq!(report.local_tools, vec!["WebSearchTool"]);
        assert_eq!(
            report.mcp_servers,
            BTreeMap::from([
                ("broken".to_string(), false),
                ("custom_tools".to_string(), true),
            ])
        );
        // 1 local + 3 capabilities + 1 server-wide entry
        assert_eq!(report.total_tools, 5);
        assert!(logger.contains(LogLevel::Info, "Initialized MCP servers: custom_tools"));
        assert!(logger.contains(LogLevel::Warn, "Failed MCP servers: broken"));

        let summary = system.summary();
        assert_eq!(summary.initialized_servers, vec!["custom_tools"]);
        assert_eq!(summary.configured_servers, vec!["broken", "custom_tools"]);
        assert_eq!(summary.mcp_tools.len(), 4);
        assert_eq!(summary.total_tools, 5);

        let runtimes = system
            .registry()
            .resolve_many(&["WebSearchTool", "mcp:custom_tools[generate_id,get_timestamp]"])
            .await
            .unwrap();
        assert_eq!(runtimes.len(), 2);
        let result = runtimes[0]
            .execute(&ToolCall::new("1", "WebSearchTool", json!({"query": "rust"})))
            .await;
        assert_eq!(result.content, "results for rust");
        assert!(matches!(runtimes[1], ToolRuntime::Remote(_)));

        system.shutdown().await;
        assert_eq!(system.registry().cached_handles().await, 0);
    }

    #[tokio::test]
    async fn test_initialize_selected_servers() {
        let (system, _) = system(memory_source()).await;

        let results = system.initialize_servers(&["custom_tools", "unknown"]).await;
        assert!(results["custom_tools"]);
        assert!(!results["unknown"]);
        assert_eq!(
            system.manager().server_state("broken"),
            ServerState::Unknown
        );
    }

    #[tokio::test]
    async fn test_reload_resets_state_and_cache() {
        let source = memory_source();
        let (system, _) = system(source.clone()).await;
        system.initialize().await;
        system
            .registry()
            .resolve("mcp:custom_tools")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(system.registry().cached_handles().await, 1);

        source
            .add_server(
                "github",
                ProviderConfig::stdio("npx").with_args(["github-server"]),
            )
            .unwrap();
        system.reload_config().await.unwrap();

        assert_eq!(system.registry().cached_handles().await, 0);
        assert_eq!(
            system.manager().server_state("custom_tools"),
            ServerState::Unknown
        );
        // Catalog survives the reload
        assert!(system.registry().get_metadata("mcp:custom_tools").is_some());

        let report = system.initialize().await;
        assert!(report.mcp_servers["github"]);
        assert!(system
            .registry()
            .get_metadata("mcp:github:create_issue")
            .is_some());
    }

    #[tokio::test]
    async fn test_reload_drops_removed_provider() {
        let source = memory_source();
        source
            .add_server(
                "github",
                ProviderConfig::stdio("npx").with_args(["github-server"]),
            )
            .unwrap();
        let connector = connector();
        let system = ToolSystem::from_source(
            source.clone(),
            connector.clone(),
            Arc::new(RecordingLogger::new()),
        )
        .await
        .unwrap();
        system.initialize().await;
        assert!(system
            .summary()
            .mcp_tools
            .contains(&"mcp:github:create_issue".to_string()));
        let connects = connector.connection_count();

        source.remove_server("github").unwrap();
        system.reload_config().await.unwrap();

        let summary = system.summary();
        assert!(summary.mcp_tools.iter().all(|name| !name.starts_with("mcp:github")));
        assert!(summary.mcp_tools.contains(&"mcp:custom_tools".to_string()));
        assert!(system.registry().resolve("mcp:github").await.unwrap().is_none());
        assert!(system.registry().get_metadata("mcp:github:create_issue").is_none());
        assert_eq!(connector.connection_count(), connects);
    }

    #[tokio::test]
    async fn test_from_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mcp_config.yaml");
        std::fs::write(
            &path,
            r#"
mcp_servers:
  custom_tools:
    type: stdio
    command: python
    args: ["custom_tools_server.py"]
    env:
      API_KEY: "${TOOLHUB_SYSTEM_TEST_UNSET_KEY}"
"#,
        )
        .unwrap();

        let logger = Arc::new(RecordingLogger::new());
        let connector = connector();
        let system = ToolSystem::from_source(
            Arc::new(FileConfigSource::new(&path)),
            connector.clone(),
            logger,
        )
        .await
        .unwrap();

        let report = system.initialize().await;
        assert!(report.mcp_servers["custom_tools"]);
        assert_eq!(connector.launches()[0].env["API_KEY"], "");
    }

    #[tokio::test]
    async fn test_missing_file_means_no_servers() {
        let dir = tempfile::tempdir().unwrap();
        let logger = Arc::new(RecordingLogger::new());
        let system = ToolSystem::stdio(Some(dir.path().join("absent.yaml")), logger.clone())
            .await
            .unwrap();

        let report = system.initialize().await;
        assert!(report.mcp_servers.is_empty());
        assert_eq!(report.total_tools, 0);
        assert!(logger.contains(LogLevel::Warn, "No MCP servers configured"));
    }
}
