//! Tool registry
//!
//! The registry owns two things:
//! - the catalog: every known local tool, every discovered remote capability
//!   and one server-wide entry per remote provider
//! - the connection cache: at most one [`McpToolset`] per [`CacheKey`]
//!
//! Lookups take reference strings (see [`crate::reference`]). Problems with a
//! single reference or provider are logged and turn into omissions; only a
//! malformed reference is returned to the caller as an error.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex;

use super::cache::CacheKey;
use super::entry::{DiscoveryStatus, ToolEntry};
use super::local::{LocalConstructor, LocalFactoryTable};
use super::runtime::ToolRuntime;
use crate::config::{LaunchSpec, ProviderConfig};
use crate::logging::Logger;
use crate::mcp::{
    LazyToolsetFactory, McpError, McpToolset, ProviderConnector, ServerPlan, ToolsetFactory,
    ToolsetPlan,
};
use crate::reference::{
    capability_key, server_key, ReferenceError, ToolKind, ToolReference, REMOTE_PREFIX,
};

/// Registry errors
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error(transparent)]
    InvalidReference(#[from] ReferenceError),

    #[error("Provider not configured: {0}")]
    ProviderNotConfigured(String),

    #[error("No providers resolved for: {0}")]
    NoProvidersResolved(String),

    #[error("Toolset error: {0}")]
    Toolset(#[from] McpError),
}

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Catalog of tools and cache of provider connections
pub struct ToolRegistry {
    catalog: RwLock<BTreeMap<String, ToolEntry>>,
    locals: LocalFactoryTable,
    /// Held across the whole check-then-create sequence
    cache: Mutex<HashMap<CacheKey, Arc<McpToolset>>>,
    factory: Arc<dyn ToolsetFactory>,
    logger: Arc<dyn Logger>,
}

impl ToolRegistry {
    /// Create an empty registry building toolsets with `factory`
    pub fn new(factory: Arc<dyn ToolsetFactory>, logger: Arc<dyn Logger>) -> Self {
        Self {
            catalog: RwLock::new(BTreeMap::new()),
            locals: LocalFactoryTable::new(logger.clone()),
            cache: Mutex::new(HashMap::new()),
            factory,
            logger,
        }
    }

    /// Create an empty registry whose toolsets connect lazily through `connector`
    pub fn with_connector(connector: Arc<dyn ProviderConnector>, logger: Arc<dyn Logger>) -> Self {
        let factory = Arc::new(LazyToolsetFactory::new(connector, logger.clone()));
        Self::new(factory, logger)
    }

    // ---- Registration ----

    /// Register (or replace) a local tool
    pub fn register_local(&self, name: &str, constructor: LocalConstructor, metadata: Value) {
        if name.starts_with(REMOTE_PREFIX) {
            self.logger.warn(&format!(
                "[ToolRegistry] Refusing local tool '{}': the {} prefix is reserved for MCP providers",
                name, REMOTE_PREFIX
            ));
            return;
        }
        self.locals.register(name, constructor, metadata);
        self.catalog
            .write()
            .insert(name.to_string(), ToolEntry::local(name));
        self.logger
            .debug(&format!("[ToolRegistry] Registered local tool {}", name));
    }

    /// Register (or replace) one capability of a remote provider
    pub fn register_remote_capability(
        &self,
        provider: &str,
        capability: &str,
        config: ProviderConfig,
    ) {
        let entry = ToolEntry::remote_capability(provider, capability, config);
        self.catalog.write().insert(entry.name.clone(), entry);
    }

    /// Register every discovered capability of `provider` plus its server-wide entry
    ///
    /// The server-wide entry (`mcp:{provider}`) stands for unrestricted access
    /// and is registered even when `capabilities` is empty.
    pub fn register_remote_server(
        &self,
        provider: &str,
        capabilities: &[String],
        config: ProviderConfig,
    ) {
        let status = DiscoveryStatus::from_count(capabilities.len());
        {
            let mut catalog = self.catalog.write();
            for capability in capabilities {
                let entry = ToolEntry::remote_capability(provider, capability, config.clone());
                catalog.insert(entry.name.clone(), entry);
            }
            let server = ToolEntry::remote_server(provider, config, status);
            catalog.insert(server.name.clone(), server);
        }
        self.logger.info(&format!(
            "[ToolRegistry] Registered MCP server {} with {} capabilities",
            provider,
            capabilities.len()
        ));
    }

    /// Drop every catalog entry of `provider`
    ///
    /// Returns the number of entries removed. Cached toolsets are untouched;
    /// see [`ToolRegistry::invalidate_cache`].
    pub fn remove_provider(&self, provider: &str) -> usize {
        let removed = {
            let mut catalog = self.catalog.write();
            let before = catalog.len();
            catalog.retain(|_, entry| entry.provider.as_deref() != Some(provider));
            before - catalog.len()
        };
        if removed > 0 {
            self.logger.info(&format!(
                "[ToolRegistry] Removed MCP server {} ({} entries)",
                provider, removed
            ));
        }
        removed
    }

    // ---- Resolution ----

    /// Resolve one reference
    ///
    /// `Ok(None)` when the reference names nothing usable: an unknown local
    /// tool, an unconfigured provider, or a toolset that could not be built.
    pub async fn resolve(&self, reference: &str) -> RegistryResult<Option<ToolRuntime>> {
        let parsed = ToolReference::parse(reference)?;
        Ok(match &parsed {
            ToolReference::Local { name } => self.locals.construct(name).map(ToolRuntime::Local),
            ToolReference::Remote { .. } => self
                .combine(std::slice::from_ref(&parsed))
                .await
                .map(ToolRuntime::Remote),
        })
    }

    /// Resolve a list of references
    ///
    /// Local tools come first, in request order, each as its own instance.
    /// All remote references are combined into one handle appended at the end.
    /// Every reference is parsed before anything is resolved.
    pub async fn resolve_many<S: AsRef<str>>(
        &self,
        references: &[S],
    ) -> RegistryResult<Vec<ToolRuntime>> {
        let parsed = references
            .iter()
            .map(|r| ToolReference::parse(r.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        let mut runtimes = Vec::new();
        let mut remote = Vec::new();
        for reference in parsed {
            match &reference {
                ToolReference::Local { name } => {
                    if let Some(tool) = self.locals.construct(name) {
                        runtimes.push(ToolRuntime::Local(tool));
                    }
                }
                ToolReference::Remote { .. } => remote.push(reference),
            }
        }

        if !remote.is_empty() {
            if let Some(toolset) = self.combine(&remote).await {
                runtimes.push(ToolRuntime::Remote(toolset));
            }
        }
        Ok(runtimes)
    }

    /// One handle covering every remote reference in `references`
    ///
    /// Local references are ignored. `None` if no referenced provider is
    /// configured or the handle could not be built.
    pub async fn combine(&self, references: &[ToolReference]) -> Option<Arc<McpToolset>> {
        match self.try_combine(references).await {
            Ok(toolset) => Some(toolset),
            Err(e @ RegistryError::Toolset(_)) => {
                self.logger
                    .error(&format!("[ToolRegistry] Failed to create toolset: {}", e));
                None
            }
            Err(e) => {
                self.logger
                    .warn(&format!("[ToolRegistry] No remote tools available: {}", e));
                None
            }
        }
    }

    async fn try_combine(&self, references: &[ToolReference]) -> RegistryResult<Arc<McpToolset>> {
        let plan = self.plan_for(references)?;
        self.get_or_create(plan).await
    }

    /// Group references by provider and build the toolset plan
    fn plan_for(&self, references: &[ToolReference]) -> RegistryResult<ToolsetPlan> {
        // Providers in first-appearance order; any unrestricted reference wins
        let mut requested: Vec<(String, Option<BTreeSet<String>>)> = Vec::new();
        for reference in references {
            let ToolReference::Remote {
                provider,
                capabilities,
            } = reference
            else {
                continue;
            };
            match requested.iter_mut().find(|(name, _)| name == provider) {
                Some((_, filter)) => {
                    *filter = match (filter.take(), capabilities) {
                        (Some(mut existing), Some(more)) => {
                            existing.extend(more.iter().cloned());
                            Some(existing)
                        }
                        _ => None,
                    };
                }
                None => requested.push((provider.clone(), capabilities.clone())),
            }
        }

        let names: Vec<String> = requested.iter().map(|(name, _)| name.clone()).collect();
        let mut servers = Vec::new();
        for (name, include) in requested {
            match self.launch_for(&name) {
                Ok(launch) => servers.push(ServerPlan {
                    name,
                    launch,
                    include,
                }),
                Err(e) => self
                    .logger
                    .warn(&format!("[ToolRegistry] Skipping reference: {}", e)),
            }
        }

        if servers.len() > 1 {
            // Later providers win on conflicting keys
            let mut env = BTreeMap::new();
            for server in &servers {
                env.extend(server.launch.env.clone());
            }
            return Ok(ToolsetPlan::combined(servers, env));
        }
        match servers.pop() {
            Some(server) => Ok(ToolsetPlan::single(server.name, server.launch, server.include)),
            None => Err(RegistryError::NoProvidersResolved(names.join(", "))),
        }
    }

    /// Launch description for a registered provider, resolved now
    fn launch_for(&self, provider: &str) -> RegistryResult<LaunchSpec> {
        self.provider_config(provider)
            .and_then(|config| config.launch_spec())
            .ok_or_else(|| RegistryError::ProviderNotConfigured(provider.to_string()))
    }

    /// Return the cached toolset for this plan, creating it on a miss
    async fn get_or_create(&self, plan: ToolsetPlan) -> RegistryResult<Arc<McpToolset>> {
        let key = CacheKey::for_plan(&plan);
        let mut cache = self.cache.lock().await;
        if let Some(toolset) = cache.get(&key) {
            crate::log_debug!(self.logger, "[ToolRegistry] Reusing cached toolset {}", key);
            return Ok(toolset.clone());
        }

        let toolset = self.factory.create(plan).await?;
        self.logger
            .info(&format!("[ToolRegistry] Created toolset {}", key));
        cache.insert(key, toolset.clone());
        Ok(toolset)
    }

    /// Close and drop every cached toolset; the catalog is kept
    ///
    /// Returns the number of toolsets released.
    pub async fn invalidate_cache(&self) -> usize {
        let released: Vec<Arc<McpToolset>> = {
            let mut cache = self.cache.lock().await;
            cache.drain().map(|(_, toolset)| toolset).collect()
        };
        for toolset in &released {
            if let Err(e) = toolset.close().await {
                self.logger.warn(&format!(
                    "[ToolRegistry] Error closing toolset {}: {}",
                    toolset.label(),
                    e
                ));
            }
        }
        self.logger.info(&format!(
            "[ToolRegistry] Cleared {} cached toolsets",
            released.len()
        ));
        released.len()
    }

    // ---- Queries ----

    /// Catalog keys, sorted, optionally of one kind only
    pub fn list_all(&self, kind: Option<ToolKind>) -> Vec<String> {
        self.catalog
            .read()
            .values()
            .filter(|entry| kind.map_or(true, |k| entry.kind == k))
            .map(|entry| entry.name.clone())
            .collect()
    }

    /// Catalog entry for a reference
    ///
    /// Accepts catalog keys as well as bracketed references naming a single
    /// capability (`mcp:p[a]` finds `mcp:p:a`).
    pub fn get_metadata(&self, reference: &str) -> Option<ToolEntry> {
        let entry = self.catalog_entry(reference)?;
        if !entry.is_local() {
            return Some(entry);
        }
        let (constructor, metadata) = self.locals.definition(&entry.name)?;
        Some(entry.with_definition(constructor, metadata))
    }

    fn catalog_entry(&self, reference: &str) -> Option<ToolEntry> {
        let catalog = self.catalog.read();
        if let Some(entry) = catalog.get(reference) {
            return Some(entry.clone());
        }
        let key = match ToolReference::parse(reference).ok()? {
            ToolReference::Local { name } => name,
            ToolReference::Remote {
                provider,
                capabilities: None,
            } => server_key(&provider),
            ToolReference::Remote {
                provider,
                capabilities: Some(caps),
            } if caps.len() == 1 => capability_key(&provider, caps.iter().next()?),
            ToolReference::Remote { .. } => return None,
        };
        catalog.get(&key).cloned()
    }

    /// Configuration a provider was registered with
    pub fn provider_config(&self, provider: &str) -> Option<ProviderConfig> {
        let catalog = self.catalog.read();
        catalog
            .get(&server_key(provider))
            .or_else(|| {
                catalog
                    .values()
                    .find(|entry| entry.provider.as_deref() == Some(provider))
            })
            .and_then(|entry| entry.provider_config.clone())
    }

    /// Providers with at least one catalog entry, sorted
    pub fn providers(&self) -> Vec<String> {
        self.catalog
            .read()
            .values()
            .filter_map(|entry| entry.provider.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn local_tool_names(&self) -> Vec<String> {
        self.list_all(Some(ToolKind::Local))
    }

    pub fn remote_tool_names(&self) -> Vec<String> {
        self.list_all(Some(ToolKind::Remote))
    }

    /// Number of catalog entries
    pub fn tool_count(&self) -> usize {
        self.catalog.read().len()
    }

    pub async fn cached_handles(&self) -> usize {
        self.cache.lock().await.len()
    }

    pub async fn cache_keys(&self) -> Vec<CacheKey> {
        self.cache.lock().await.keys().cloned().collect()
    }
}
