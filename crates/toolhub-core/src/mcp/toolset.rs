//! Runtime handles over one or more MCP providers
//!
//! An [`McpToolset`] is what a consumer gets back for remote references. It
//! connects lazily, exposes only the capabilities its plan allows, and routes
//! each call to the provider that owns the capability.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{watch, Mutex};
use tokio::time::{timeout_at, Instant};

use super::connector::{Capability, CapabilityOutput, ProviderConnector, ProviderSession};
use super::error::{McpError, McpResult};
use crate::config::LaunchSpec;
use crate::logging::Logger;
use crate::types::{Tool, ToolCall, ToolResult};

/// One provider inside a toolset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerPlan {
    /// Provider name
    pub name: String,
    /// Resolved launch description
    pub launch: LaunchSpec,
    /// Capabilities to expose; `None` exposes everything
    pub include: Option<BTreeSet<String>>,
}

/// What a toolset connects to
///
/// Servers are kept sorted by name so equal plans compare equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolsetPlan {
    servers: Vec<ServerPlan>,
}

impl ToolsetPlan {
    /// Plan for a single provider, launched with its own environment
    pub fn single(
        name: impl Into<String>,
        launch: LaunchSpec,
        include: Option<BTreeSet<String>>,
    ) -> Self {
        Self {
            servers: vec![ServerPlan {
                name: name.into(),
                launch,
                include,
            }],
        }
    }

    /// Plan for several providers sharing one merged environment
    pub fn combined(mut servers: Vec<ServerPlan>, env: BTreeMap<String, String>) -> Self {
        for server in &mut servers {
            server.launch.env = env.clone();
        }
        servers.sort_by(|a, b| a.name.cmp(&b.name));
        Self { servers }
    }

    pub fn servers(&self) -> &[ServerPlan] {
        &self.servers
    }

    /// Environment every provider is launched with, merged in server order
    pub fn merged_env(&self) -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();
        for server in &self.servers {
            env.extend(server.launch.env.clone());
        }
        env
    }

    /// More than one provider behind this plan
    pub fn is_aggregated(&self) -> bool {
        self.servers.len() > 1
    }

    /// Provider names joined by `+`
    pub fn label(&self) -> String {
        self.servers
            .iter()
            .map(|s| s.name.as_str())
            .collect::<Vec<_>>()
            .join("+")
    }
}

struct ConnectedServer {
    name: String,
    session: Arc<dyn ProviderSession>,
}

struct Connected {
    servers: Vec<ConnectedServer>,
    /// Exposed capabilities in server order
    capabilities: Vec<Capability>,
    /// Capability name -> index into `servers`
    routes: HashMap<String, usize>,
    /// Served by a provider but removed by its filter
    hidden: HashSet<String>,
}

enum ToolsetState {
    Idle,
    Connected(Arc<Connected>),
    Closed,
}

/// Default upper bound for opening one provider (connect + list)
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Live handle over the providers in a [`ToolsetPlan`]
///
/// Created idle; the first use (or `connect()`) opens every provider, each
/// within the connect timeout. Must be released with `close()`, which never
/// waits for a connect in progress: that connect is abandoned and its callers
/// get [`McpError::Closed`]. Dropping the last reference also releases the
/// provider processes, so a panic or an early return never leaks them.
pub struct McpToolset {
    plan: ToolsetPlan,
    connector: Arc<dyn ProviderConnector>,
    /// Only ever held briefly; never across provider I/O
    state: Mutex<ToolsetState>,
    /// Serializes connect attempts
    connecting: Mutex<()>,
    /// Flips to `true` on close; wakes a connect in progress
    closed: watch::Sender<bool>,
    connect_timeout: Duration,
    logger: Arc<dyn Logger>,
}

impl McpToolset {
    pub fn new(
        plan: ToolsetPlan,
        connector: Arc<dyn ProviderConnector>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            plan,
            connector,
            state: Mutex::new(ToolsetState::Idle),
            connecting: Mutex::new(()),
            closed,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            logger,
        }
    }

    /// Bound for opening each provider
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Run `f` against a fresh, request-scoped toolset and close it afterwards
    ///
    /// The toolset is closed whether `f` succeeds or fails.
    pub async fn scoped<F, Fut, T>(
        plan: ToolsetPlan,
        connector: Arc<dyn ProviderConnector>,
        logger: Arc<dyn Logger>,
        f: F,
    ) -> T
    where
        F: FnOnce(Arc<McpToolset>) -> Fut,
        Fut: Future<Output = T>,
    {
        let toolset = Arc::new(McpToolset::new(plan, connector, logger));
        let output = f(toolset.clone()).await;
        if let Err(e) = toolset.close().await {
            toolset.logger.warn(&format!(
                "[McpToolset] Failed to close scoped toolset {}: {}",
                toolset.plan.label(),
                e
            ));
        }
        output
    }

    pub fn plan(&self) -> &ToolsetPlan {
        &self.plan
    }

    pub fn label(&self) -> String {
        self.plan.label()
    }

    pub fn is_aggregated(&self) -> bool {
        self.plan.is_aggregated()
    }

    /// Whether `connect()` has completed and `close()` has not been called
    pub async fn is_connected(&self) -> bool {
        matches!(*self.state.lock().await, ToolsetState::Connected(_))
    }

    /// Open every provider now instead of on first use
    pub async fn connect(&self) -> McpResult<()> {
        self.connected().await.map(|_| ())
    }

    /// Current connection, or `None` while idle
    async fn current(&self) -> McpResult<Option<Arc<Connected>>> {
        match &*self.state.lock().await {
            ToolsetState::Connected(connected) => Ok(Some(connected.clone())),
            ToolsetState::Closed => Err(McpError::Closed),
            ToolsetState::Idle => Ok(None),
        }
    }

    async fn connected(&self) -> McpResult<Arc<Connected>> {
        if let Some(connected) = self.current().await? {
            return Ok(connected);
        }

        let _connecting = self.connecting.lock().await;
        // Another caller may have finished (or closed) while we waited
        if let Some(connected) = self.current().await? {
            return Ok(connected);
        }

        let opened = tokio::select! {
            opened = self.open_all() => opened?,
            _ = closed_signal(self.closed.subscribe()) => return Err(McpError::Closed),
        };

        let mut state = self.state.lock().await;
        if let ToolsetState::Closed = *state {
            drop(state);
            self.close_sessions(&opened).await.ok();
            return Err(McpError::Closed);
        }
        let connected = Arc::new(opened);
        *state = ToolsetState::Connected(connected.clone());
        Ok(connected)
    }

    /// Connect to each provider; a provider that fails is left out
    /// unless every one of them fails
    async fn open_all(&self) -> McpResult<Connected> {
        let mut servers = Vec::new();
        let mut capabilities = Vec::new();
        let mut routes = HashMap::new();
        let mut hidden = HashSet::new();
        let mut last_error = None;

        for plan in &self.plan.servers {
            let (session, listed) = match self.open_one(plan).await {
                Ok(opened) => opened,
                Err(e) => {
                    self.logger.error(&format!(
                        "[McpToolset] Provider {} unavailable: {}",
                        plan.name, e
                    ));
                    last_error = Some(e);
                    continue;
                }
            };

            if let Some(include) = &plan.include {
                for missing in include.iter().filter(|n| !listed.iter().any(|c| &c.name == *n)) {
                    self.logger.warn(&format!(
                        "[McpToolset] Provider {} does not expose requested capability {}",
                        plan.name, missing
                    ));
                }
            }

            let index = servers.len();
            for capability in listed {
                if plan.include.as_ref().is_some_and(|inc| !inc.contains(&capability.name)) {
                    hidden.insert(capability.name);
                    continue;
                }
                if routes.contains_key(&capability.name) {
                    self.logger.warn(&format!(
                        "[McpToolset] Capability {} from {} shadowed by an earlier provider",
                        capability.name, plan.name
                    ));
                    continue;
                }
                routes.insert(capability.name.clone(), index);
                capabilities.push(capability);
            }
            servers.push(ConnectedServer {
                name: plan.name.clone(),
                session,
            });
        }

        if servers.is_empty() {
            return Err(last_error.unwrap_or_else(|| {
                McpError::ConnectionFailed(format!("no providers in toolset {}", self.plan.label()))
            }));
        }

        self.logger.info(&format!(
            "[McpToolset] Connected {} ({} capabilities)",
            self.plan.label(),
            capabilities.len()
        ));

        hidden.retain(|name| !routes.contains_key(name));

        Ok(Connected {
            servers,
            capabilities,
            routes,
            hidden,
        })
    }

    async fn open_one(
        &self,
        plan: &ServerPlan,
    ) -> McpResult<(Arc<dyn ProviderSession>, Vec<Capability>)> {
        let deadline = Instant::now() + self.connect_timeout;
        let timed_out = || McpError::Timeout(self.connect_timeout.as_millis());

        let session = timeout_at(deadline, self.connector.connect(&plan.launch))
            .await
            .map_err(|_| timed_out())??;
        let listed = timeout_at(deadline, session.list_capabilities()).await;
        let error = match listed {
            Ok(Ok(listed)) => return Ok((session, listed)),
            Ok(Err(e)) => e,
            Err(_) => timed_out(),
        };

        if let Err(e) = session.close().await {
            self.logger.warn(&format!(
                "[McpToolset] Error closing provider {} after failed listing: {}",
                plan.name, e
            ));
        }
        Err(error)
    }

    /// Capabilities this toolset exposes (after filtering)
    pub async fn list_capabilities(&self) -> McpResult<Vec<Capability>> {
        Ok(self.connected().await?.capabilities.clone())
    }

    /// Exposed capabilities as tool definitions
    pub async fn definitions(&self) -> McpResult<Vec<Tool>> {
        Ok(self
            .connected()
            .await?
            .capabilities
            .iter()
            .map(Tool::from)
            .collect())
    }

    /// Provider that serves `capability`, if it is exposed
    pub async fn provider_of(&self, capability: &str) -> McpResult<Option<String>> {
        let connected = self.connected().await?;
        Ok(connected
            .routes
            .get(capability)
            .map(|&i| connected.servers[i].name.clone()))
    }

    /// Invoke a capability on whichever provider owns it
    pub async fn call_tool(&self, name: &str, arguments: Value) -> McpResult<CapabilityOutput> {
        let connected = self.connected().await?;
        let Some(&index) = connected.routes.get(name) else {
            if connected.hidden.contains(name) {
                return Err(McpError::ToolNotExposed(name.to_string()));
            }
            return Err(McpError::UnknownTool(name.to_string()));
        };
        connected.servers[index].session.call(name, arguments).await
    }

    /// Execute a tool call, turning failures into error results
    pub async fn execute(&self, call: &ToolCall) -> ToolResult {
        match self.call_tool(&call.name, call.input.clone()).await {
            Ok(output) => ToolResult {
                call_id: call.id.clone(),
                content: output.content,
                is_error: output.is_error,
            },
            Err(e) => ToolResult::error(call.id.clone(), format!("Error: {}", e)),
        }
    }

    /// Release every provider connection
    ///
    /// Idempotent. Any later use fails with [`McpError::Closed`].
    pub async fn close(&self) -> McpResult<()> {
        self.closed.send_replace(true);
        let previous = std::mem::replace(&mut *self.state.lock().await, ToolsetState::Closed);
        let ToolsetState::Connected(connected) = previous else {
            return Ok(());
        };
        self.close_sessions(&connected).await
    }

    async fn close_sessions(&self, connected: &Connected) -> McpResult<()> {
        let mut first_error = None;
        for server in &connected.servers {
            if let Err(e) = server.session.close().await {
                self.logger.warn(&format!(
                    "[McpToolset] Error closing provider {}: {}",
                    server.name, e
                ));
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// Resolves once the toolset is closed
async fn closed_signal(mut closed: watch::Receiver<bool>) {
    loop {
        if *closed.borrow_and_update() {
            return;
        }
        if closed.changed().await.is_err() {
            return;
        }
    }
}

impl std::fmt::Debug for McpToolset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpToolset").field("plan", &self.plan).finish()
    }
}

/// Builds toolsets for the registry's connection cache
#[async_trait]
pub trait ToolsetFactory: Send + Sync {
    async fn create(&self, plan: ToolsetPlan) -> McpResult<Arc<McpToolset>>;
}

/// Factory producing idle toolsets that connect on first use
pub struct LazyToolsetFactory {
    connector: Arc<dyn ProviderConnector>,
    connect_timeout: Duration,
    logger: Arc<dyn Logger>,
}

impl LazyToolsetFactory {
    pub fn new(connector: Arc<dyn ProviderConnector>, logger: Arc<dyn Logger>) -> Self {
        Self {
            connector,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            logger,
        }
    }

    /// Bound for opening each provider of the toolsets it creates
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

#[async_trait]
impl ToolsetFactory for LazyToolsetFactory {
    async fn create(&self, plan: ToolsetPlan) -> McpResult<Arc<McpToolset>> {
        Ok(Arc::new(
            McpToolset::new(plan, self.connector.clone(), self.logger.clone())
                .with_connect_timeout(self.connect_timeout),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{LogLevel, NoOpLogger, RecordingLogger};
    use crate::mcp::mock::{MockBehavior, MockConnector};
    use serde_json::json;

    fn launch(cmd: &str) -> LaunchSpec {
        let mut parts = cmd.split(' ');
        let command = parts.next().unwrap_or_default();
        LaunchSpec::new(command, parts)
    }

    fn set(names: &[&str]) -> Option<BTreeSet<String>> {
        Some(names.iter().map(|s| s.to_string()).collect())
    }

    fn connector() -> Arc<MockConnector> {
        Arc::new(
            MockConnector::new()
                .with_server(
                    "python custom_tools_server.py",
                    &["generate_id", "get_timestamp", "calculate_hash"],
                )
                .with_server("npx github-server", &["create_issue", "generate_id"]),
        )
    }

    #[tokio::test]
    async fn test_lazy_connect_and_filter() {
        let connector = connector();
        let plan = ToolsetPlan::single(
            "custom_tools",
            launch("python custom_tools_server.py"),
            set(&["generate_id", "get_timestamp"]),
        );
        let toolset = McpToolset::new(plan, connector.clone(), Arc::new(NoOpLogger::new()));

        // Nothing happens until first use
        assert_eq!(connector.connection_count(), 0);
        assert!(!toolset.is_connected().await);

        let names: Vec<String> = toolset
            .definitions()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["generate_id", "get_timestamp"]);
        assert_eq!(connector.connection_count(), 1);

        // Filtered-out capability is not callable
        let err = toolset.call_tool("calculate_hash", json!({})).await.unwrap_err();
        assert!(matches!(err, McpError::ToolNotExposed(_)));
        let err = toolset.call_tool("missing", json!({})).await.unwrap_err();
        assert!(matches!(err, McpError::UnknownTool(_)));

        let out = toolset.call_tool("generate_id", json!({"prefix": "X"})).await.unwrap();
        assert!(out.content.starts_with("generate_id("));

        // Second use reuses the connection
        toolset.list_capabilities().await.unwrap();
        assert_eq!(connector.connection_count(), 1);
    }

    #[tokio::test]
    async fn test_aggregated_routing() {
        let connector = connector();
        let plan = ToolsetPlan::combined(
            vec![
                ServerPlan {
                    name: "github".to_string(),
                    launch: launch("npx github-server"),
                    include: None,
                },
                ServerPlan {
                    name: "custom_tools".to_string(),
                    launch: launch("python custom_tools_server.py"),
                    include: set(&["generate_id", "get_timestamp"]),
                },
            ],
            BTreeMap::new(),
        );
        let logger = Arc::new(RecordingLogger::new());
        let toolset = McpToolset::new(plan, connector.clone(), logger.clone());
        assert!(toolset.is_aggregated());
        assert_eq!(toolset.label(), "custom_tools+github");

        assert_eq!(
            toolset.provider_of("create_issue").await.unwrap().as_deref(),
            Some("github")
        );
        // custom_tools sorts first, so it owns the colliding name
        assert_eq!(
            toolset.provider_of("generate_id").await.unwrap().as_deref(),
            Some("custom_tools")
        );
        assert!(logger.contains(LogLevel::Warn, "shadowed"));
        assert_eq!(toolset.list_capabilities().await.unwrap().len(), 3);
        assert_eq!(connector.open_sessions(), 2);

        let result = toolset
            .execute(&ToolCall::new("c1", "create_issue", json!({"title": "bug"})))
            .await;
        assert!(!result.is_error);
        assert_eq!(result.call_id, "c1");

        let missing = toolset.execute(&ToolCall::new("c2", "nope", json!({}))).await;
        assert!(missing.is_error);
    }

    #[tokio::test]
    async fn test_combined_plan_shares_env() {
        let mut a = launch("a");
        a.env.insert("A".to_string(), "1".to_string());
        let plan = ToolsetPlan::combined(
            vec![
                ServerPlan { name: "b".to_string(), launch: launch("b"), include: None },
                ServerPlan { name: "a".to_string(), launch: a, include: None },
            ],
            BTreeMap::from([("K".to_string(), "v".to_string())]),
        );
        assert_eq!(plan.servers()[0].name, "a");
        for server in plan.servers() {
            assert_eq!(server.launch.env, BTreeMap::from([("K".to_string(), "v".to_string())]));
        }
        assert_eq!(plan.merged_env().len(), 1);
    }

    #[tokio::test]
    async fn test_partial_provider_failure() {
        let connector = connector();
        connector.set("broken", MockBehavior::FailConnect("refused".to_string()));
        let plan = ToolsetPlan::combined(
            vec![
                ServerPlan { name: "broken".to_string(), launch: launch("broken"), include: None },
                ServerPlan {
                    name: "github".to_string(),
                    launch: launch("npx github-server"),
                    include: None,
                },
            ],
            BTreeMap::new(),
        );
        let toolset = McpToolset::new(plan, connector.clone(), Arc::new(NoOpLogger::new()));
        assert_eq!(toolset.list_capabilities().await.unwrap().len(), 2);

        // All providers failing is an error
        let plan = ToolsetPlan::single("broken", launch("broken"), None);
        let toolset = McpToolset::new(plan, connector.clone(), Arc::new(NoOpLogger::new()));
        assert!(matches!(
            toolset.connect().await,
            Err(McpError::ConnectionFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_close_releases_and_is_final() {
        let connector = connector();
        let plan = ToolsetPlan::single("github", launch("npx github-server"), None);
        let toolset = McpToolset::new(plan, connector.clone(), Arc::new(NoOpLogger::new()));

        toolset.connect().await.unwrap();
        assert_eq!(connector.open_sessions(), 1);

        toolset.close().await.unwrap();
        toolset.close().await.unwrap();
        assert_eq!(connector.open_sessions(), 0);
        assert!(matches!(toolset.connect().await, Err(McpError::Closed)));
    }

    #[tokio::test]
    async fn test_scoped_closes_on_every_path() {
        let connector = connector();
        let plan = ToolsetPlan::single("github", launch("npx github-server"), None);

        let result: McpResult<usize> = McpToolset::scoped(
            plan.clone(),
            connector.clone(),
            Arc::new(NoOpLogger::new()),
            |toolset| async move { Ok(toolset.list_capabilities().await?.len()) },
        )
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(connector.open_sessions(), 0);

        let failed: McpResult<()> = McpToolset::scoped(
            plan,
            connector.clone(),
            Arc::new(NoOpLogger::new()),
            |toolset| async move {
                toolset.connect().await?;
                Err(McpError::ToolCallFailed("boom".to_string()))
            },
        )
        .await;
        assert!(failed.is_err());
        assert_eq!(connector.open_sessions(), 0);
        assert_eq!(connector.closed_sessions(), 2);
    }

    #[tokio::test]
    async fn test_list_failure_closes_session() {
        let connector = Arc::new(MockConnector::new());
        connector.set("flaky", MockBehavior::FailList("bad response".to_string()));
        let plan = ToolsetPlan::single("flaky", launch("flaky"), None);
        let toolset = McpToolset::new(plan, connector.clone(), Arc::new(NoOpLogger::new()));

        assert!(matches!(toolset.connect().await, Err(McpError::Protocol(_))));
        assert_eq!(connector.open_sessions(), 0);
        // Still idle, so a later use may retry
        assert!(!toolset.is_connected().await);
    }

    #[tokio::test]
    async fn test_list_failure_reports_close_error() {
        let logger = Arc::new(RecordingLogger::new());
        let connector = Arc::new(MockConnector::new().with_close_error("pipe closed"));
        connector.set("flaky", MockBehavior::FailList("bad response".to_string()));
        let plan = ToolsetPlan::single("flaky", launch("flaky"), None);
        let toolset = McpToolset::new(plan, connector.clone(), logger.clone());

        assert!(matches!(
            toolset.connect().await,
            Err(McpError::Protocol(m)) if m == "bad response"
        ));
        assert_eq!(connector.open_sessions(), 0);
        assert!(logger.contains(
            LogLevel::Warn,
            "Error closing provider flaky after failed listing: Protocol error: pipe closed"
        ));
    }

    #[tokio::test]
    async fn test_hanging_provider_times_out() {
        let connector = Arc::new(MockConnector::new());
        connector.set("stuck", MockBehavior::Hang);
        let plan = ToolsetPlan::single("stuck", launch("stuck"), None);
        let toolset = McpToolset::new(plan, connector.clone(), Arc::new(NoOpLogger::new()))
            .with_connect_timeout(Duration::from_millis(50));

        assert!(matches!(toolset.connect().await, Err(McpError::Timeout(50))));
        assert_eq!(connector.connection_count(), 1);
        assert!(!toolset.is_connected().await);
    }

    #[tokio::test]
    async fn test_close_does_not_wait_for_pending_connect() {
        let connector = Arc::new(MockConnector::new());
        connector.set("stuck", MockBehavior::Hang);
        let plan = ToolsetPlan::single("stuck", launch("stuck"), None);
        let toolset = Arc::new(McpToolset::new(
            plan,
            connector.clone(),
            Arc::new(NoOpLogger::new()),
        ));

        let pending = tokio::spawn({
            let toolset = toolset.clone();
            async move { toolset.definitions().await }
        });
        while connector.connection_count() == 0 {
            tokio::task::yield_now().await;
        }

        let closed = tokio::time::timeout(Duration::from_secs(1), toolset.close()).await;
        assert!(matches!(closed, Ok(Ok(()))));

        let outcome = tokio::time::timeout(Duration::from_secs(1), pending)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(outcome, Err(McpError::Closed)));
        assert!(matches!(toolset.connect().await, Err(McpError::Closed)));
        assert_eq!(connector.open_sessions(), 0);
    }
}
