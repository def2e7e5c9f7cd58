//! In-process tools and the table of their constructors

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use crate::logging::Logger;
use crate::types::{Tool, ToolCall, ToolResult};

/// A tool implemented inside this process
#[async_trait]
pub trait LocalTool: Send + Sync {
    /// Name the tool is registered under
    fn name(&self) -> &str;

    /// Definitions of the functions this tool exposes
    fn definitions(&self) -> Vec<Tool>;

    /// Run one call
    async fn call(&self, call: &ToolCall) -> ToolResult;
}

/// Zero-argument constructor producing a fresh tool instance
pub type LocalConstructor = Arc<dyn Fn() -> Box<dyn LocalTool> + Send + Sync>;

/// Wrap a plain constructor function
pub fn local_constructor<F, T>(f: F) -> LocalConstructor
where
    F: Fn() -> T + Send + Sync + 'static,
    T: LocalTool + 'static,
{
    Arc::new(move || Box::new(f()) as Box<dyn LocalTool>)
}

type Handler = Arc<dyn Fn(&ToolCall) -> Result<String, String> + Send + Sync>;

/// Local tool backed by a synchronous closure
#[derive(Clone)]
pub struct FnTool {
    definition: Tool,
    handler: Handler,
}

impl FnTool {
    pub fn new<F>(name: impl Into<String>, description: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&ToolCall) -> Result<String, String> + Send + Sync + 'static,
    {
        Self {
            definition: Tool::new(name, description),
            handler: Arc::new(handler),
        }
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.definition = self.definition.with_schema(schema);
        self
    }
}

#[async_trait]
impl LocalTool for FnTool {
    fn name(&self) -> &str {
        &self.definition.name
    }

    fn definitions(&self) -> Vec<Tool> {
        vec![self.definition.clone()]
    }

    async fn call(&self, call: &ToolCall) -> ToolResult {
        match (self.handler)(call) {
            Ok(content) => ToolResult::success(call.id.clone(), content),
            Err(e) => ToolResult::error(call.id.clone(), e),
        }
    }
}

struct LocalDefinition {
    constructor: LocalConstructor,
    metadata: Value,
}

/// Name -> constructor table for local tools
///
/// Every `construct` builds a new instance; nothing is shared between callers.
pub struct LocalFactoryTable {
    definitions: RwLock<HashMap<String, LocalDefinition>>,
    logger: Arc<dyn Logger>,
}

impl LocalFactoryTable {
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        Self {
            definitions: RwLock::new(HashMap::new()),
            logger,
        }
    }

    /// Register or replace the constructor for `name`
    pub fn register(&self, name: &str, constructor: LocalConstructor, metadata: Value) {
        self.definitions.write().insert(
            name.to_string(),
            LocalDefinition {
                constructor,
                metadata,
            },
        );
    }

    /// Build a new instance, or `None` (with a warning) for unknown names
    pub fn construct(&self, name: &str) -> Option<Box<dyn LocalTool>> {
        let constructor = self
            .definitions
            .read()
            .get(name)
            .map(|d| d.constructor.clone());
        match constructor {
            Some(constructor) => Some(constructor()),
            None => {
                self.logger
                    .warn(&format!("[ToolRegistry] Unknown local tool: {}", name));
                None
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.definitions.read().contains_key(name)
    }

    /// Constructor and metadata registered for `name`
    pub fn definition(&self, name: &str) -> Option<(LocalConstructor, Value)> {
        self.definitions
            .read()
            .get(name)
            .map(|d| (d.constructor.clone(), d.metadata.clone()))
    }

    pub fn metadata(&self, name: &str) -> Option<Value> {
        self.definitions.read().get(name).map(|d| d.metadata.clone())
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.definitions.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.definitions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.read().is_empty()
    }
}
