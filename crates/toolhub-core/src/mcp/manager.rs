//! Provider lifecycle manager
//!
//! Initializes configured MCP providers: probe each one, then register what it
//! exposes in the [`ToolRegistry`]. Every provider moves through
//!
//! ```text
//! Unknown -> Initializing -> Initialized(true | false)
//! ```
//!
//! and stays there until `reset()`.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::OnceCell;

use super::connector::ProviderConnector;
use super::discovery::{DiscoveryOutcome, DiscoveryService};
use crate::config::{ProviderConfig, ProviderConfigStore};
use crate::logging::Logger;
use crate::tools::ToolRegistry;

/// Initialization state of one provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Unknown,
    Initializing,
    Initialized(bool),
}

/// Initializes providers from a [`ProviderConfigStore`] into a [`ToolRegistry`]
pub struct McpServerManager {
    store: Arc<ProviderConfigStore>,
    registry: Arc<ToolRegistry>,
    connector: Arc<dyn ProviderConnector>,
    /// One cell per provider that has been asked for; the value is the memoized result
    servers: Mutex<HashMap<String, Arc<OnceCell<bool>>>>,
    logger: Arc<dyn Logger>,
}

impl McpServerManager {
    pub fn new(
        store: Arc<ProviderConfigStore>,
        registry: Arc<ToolRegistry>,
        connector: Arc<dyn ProviderConnector>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self {
            store,
            registry,
            connector,
            servers: Mutex::new(HashMap::new()),
            logger,
        }
    }

    /// Initialize every configured provider concurrently
    ///
    /// Each provider runs as its own task. A task that fails or panics only
    /// marks its own provider as failed.
    pub async fn initialize_all(self: &Arc<Self>) -> BTreeMap<String, bool> {
        let names = self.store.server_names();
        if names.is_empty() {
            self.logger
                .warn("[McpServerManager] No MCP servers configured");
            return BTreeMap::new();
        }

        let tasks: Vec<_> = names
            .into_iter()
            .map(|name| {
                let manager = Arc::clone(self);
                let task_name = name.clone();
                let handle =
                    tokio::spawn(async move { manager.initialize_server(&task_name).await });
                (name, handle)
            })
            .collect();

        let mut results = BTreeMap::new();
        for (name, handle) in tasks {
            let ok = match handle.await {
                Ok(ok) => ok,
                Err(e) => {
                    self.logger.error(&format!(
                        "[McpServerManager] Initialization of {} aborted: {}",
                        name, e
                    ));
                    let _ = self.cell(&name).set(false);
                    false
                }
            };
            results.insert(name, ok);
        }
        results
    }

    /// Initialize the named providers one after another
    pub async fn initialize_servers<S: AsRef<str>>(&self, names: &[S]) -> BTreeMap<String, bool> {
        let mut results = BTreeMap::new();
        for name in names {
            let name = name.as_ref();
            results.insert(name.to_string(), self.initialize_server(name).await);
        }
        results
    }

    /// Initialize one provider, or return its memoized result
    ///
    /// An unconfigured provider returns `false` without being memoized.
    pub async fn initialize_server(&self, name: &str) -> bool {
        let config = match self.store.get(name) {
            Ok(config) => config,
            Err(e) => {
                self.logger
                    .warn(&format!("[McpServerManager] {}", e));
                return false;
            }
        };

        let cell = self.cell(name);
        if let Some(&done) = cell.get() {
            crate::log_debug!(
                self.logger,
                "[McpServerManager] {} already initialized ({})",
                name,
                done
            );
            return done;
        }
        *cell.get_or_init(|| self.run(name, config)).await
    }

    async fn run(&self, name: &str, config: ProviderConfig) -> bool {
        let settings = self.store.settings();
        let limit = settings.init_timeout();
        let discovery = DiscoveryService::new(
            self.connector.clone(),
            settings.discovery_timeout(),
            self.logger.clone(),
        );

        self.logger
            .info(&format!("[McpServerManager] Initializing {}", name));
        let outcome = match tokio::time::timeout(limit, discovery.probe(name, &config)).await {
            Ok(outcome) => outcome,
            Err(_) => DiscoveryOutcome::Failed(format!(
                "initialization timed out after {}s",
                limit.as_secs()
            )),
        };

        match outcome {
            DiscoveryOutcome::Listed(capabilities) => {
                self.registry
                    .register_remote_server(name, &capabilities, config);
                self.logger.info(&format!(
                    "[McpServerManager] Initialized {} ({} capabilities)",
                    name,
                    capabilities.len()
                ));
                true
            }
            DiscoveryOutcome::Failed(reason) => {
                self.logger.warn(&format!(
                    "[McpServerManager] Failed to initialize {}: {}",
                    name, reason
                ));
                false
            }
            DiscoveryOutcome::Skipped(reason) => {
                self.logger.warn(&format!(
                    "[McpServerManager] Skipped {}: {}",
                    name, reason
                ));
                false
            }
        }
    }

    fn cell(&self, name: &str) -> Arc<OnceCell<bool>> {
        self.servers
            .lock()
            .entry(name.to_string())
            .or_default()
            .clone()
    }

    /// Forget every result; all providers go back to `Unknown`
    pub fn reset(&self) {
        self.servers.lock().clear();
    }

    pub fn reset_server(&self, name: &str) {
        self.servers.lock().remove(name);
    }

    pub fn server_state(&self, name: &str) -> ServerState {
        match self.servers.lock().get(name) {
            None => ServerState::Unknown,
            Some(cell) => match cell.get() {
                Some(&ok) => ServerState::Initialized(ok),
                None => ServerState::Initializing,
            },
        }
    }

    /// Whether `name` initialized successfully
    pub fn is_server_initialized(&self, name: &str) -> bool {
        self.server_state(name) == ServerState::Initialized(true)
    }

    /// Providers that initialized successfully, sorted
    pub fn initialized_servers(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .servers
            .lock()
            .iter()
            .filter(|(_, cell)| cell.get() == Some(&true))
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn server_config(&self, name: &str) -> Option<ProviderConfig> {
        self.store.get(name).ok()
    }

    pub fn configured_servers(&self) -> Vec<String> {
        self.store.server_names()
    }

    pub fn store(&self) -> &Arc<ProviderConfigStore> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }
}
