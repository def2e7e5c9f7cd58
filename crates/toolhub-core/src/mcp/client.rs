//! MCP client using the official rmcp SDK
//!
//! Spawns a provider as a child process and speaks MCP over its stdio.

use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rmcp::{
    ServiceExt,
    model::{
        CallToolRequestParams, CallToolResult, ClientCapabilities, ClientInfo, Implementation,
        RawContent, Tool as McpTool,
    },
    service::{Peer, RunningService},
    transport::{ConfigureCommandExt, TokioChildProcess},
    RoleClient,
};
use serde_json::Value;
use tokio::process::Command;

use super::connector::{Capability, CapabilityOutput, ProviderConnector, ProviderSession};
use super::error::{McpError, McpResult};
use crate::config::LaunchSpec;
use crate::logging::Logger;

impl From<McpTool> for Capability {
    fn from(tool: McpTool) -> Self {
        Self {
            name: tool.name.to_string(),
            description: tool.description.map(|s| s.to_string()).unwrap_or_default(),
            input_schema: Value::Object(tool.input_schema.as_ref().clone()),
        }
    }
}

impl From<CallToolResult> for CapabilityOutput {
    fn from(result: CallToolResult) -> Self {
        // Content is Annotated<RawContent>; only text parts are kept
        let content = result
            .content
            .iter()
            .filter_map(|c| match &c.raw {
                RawContent::Text(t) => Some(t.text.clone()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n");

        Self {
            content,
            is_error: result.is_error.unwrap_or(false),
        }
    }
}

fn client_info() -> ClientInfo {
    ClientInfo {
        meta: None,
        protocol_version: Default::default(),
        capabilities: ClientCapabilities::default(),
        client_info: Implementation {
            name: "toolhub-core".to_string(),
            title: Some("Toolhub".to_string()),
            version: env!("CARGO_PKG_VERSION").to_string(),
            website_url: None,
            icons: None,
        },
    }
}

/// MCP client connected to one stdio provider
pub struct McpClient {
    /// Request handle, cloned out of the running service
    peer: Peer<RoleClient>,
    /// The running service; taken on close
    service: Mutex<Option<RunningService<RoleClient, ClientInfo>>>,
    /// Launch command, for log messages
    label: String,
    logger: Arc<dyn Logger>,
}

impl McpClient {
    /// Spawn the provider described by `launch` and run the MCP handshake
    ///
    /// The child process is killed when the client is dropped without `close()`.
    pub async fn connect_stdio(launch: &LaunchSpec, logger: Arc<dyn Logger>) -> McpResult<Self> {
        let label = launch.command_line();
        logger.info(&format!("[McpClient] Spawning stdio server: {}", label));

        let transport = TokioChildProcess::new(Command::new(&launch.command).configure(|cmd| {
            cmd.args(&launch.args)
                .envs(launch.env.iter())
                .stderr(Stdio::inherit())
                .kill_on_drop(true);
        }))
        .map_err(|e| McpError::ConnectionFailed(format!("spawn '{}': {}", label, e)))?;

        let service = client_info()
            .serve(transport)
            .await
            .map_err(|e| McpError::InitializationFailed(e.to_string()))?;

        logger.info(&format!("[McpClient] Connected and initialized: {}", label));

        Ok(Self {
            peer: service.peer().clone(),
            service: Mutex::new(Some(service)),
            label,
            logger,
        })
    }

    /// List all available tools
    pub async fn list_tools(&self) -> McpResult<Vec<McpTool>> {
        let tools = self
            .peer
            .list_all_tools()
            .await
            .map_err(|e| McpError::Protocol(e.to_string()))?;

        self.logger.debug(&format!(
            "[McpClient] Listed {} tools from {}",
            tools.len(),
            self.label
        ));

        Ok(tools)
    }

    /// Call a tool by name
    pub async fn call_tool(&self, name: &str, arguments: Value) -> McpResult<CallToolResult> {
        self.logger.debug(&format!("[McpClient] Calling tool: {}", name));

        let params = CallToolRequestParams {
            meta: None,
            name: name.to_owned().into(),
            arguments: arguments.as_object().cloned(),
            task: None,
        };

        self.peer
            .call_tool(params)
            .await
            .map_err(|e| McpError::ToolCallFailed(e.to_string()))
    }

    /// Server name reported during the handshake
    pub fn server_name(&self) -> Option<String> {
        self.peer.peer_info().map(|info| info.server_info.name.clone())
    }

    /// Shut the connection down; later calls are no-ops
    pub async fn close(&self) -> McpResult<()> {
        let service = self.service.lock().take();
        if let Some(service) = service {
            self.logger.info(&format!("[McpClient] Closing connection: {}", self.label));
            service
                .cancel()
                .await
                .map_err(|e| McpError::Protocol(e.to_string()))?;
        }
        Ok(())
    }
}

#[async_trait]
impl ProviderSession for McpClient {
    async fn list_capabilities(&self) -> McpResult<Vec<Capability>> {
        Ok(self.list_tools().await?.into_iter().map(Capability::from).collect())
    }

    async fn call(&self, name: &str, arguments: Value) -> McpResult<CapabilityOutput> {
        Ok(self.call_tool(name, arguments).await?.into())
    }

    async fn close(&self) -> McpResult<()> {
        McpClient::close(self).await
    }
}

/// Connector that launches providers as stdio child processes
pub struct StdioConnector {
    logger: Arc<dyn Logger>,
}

impl StdioConnector {
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        Self { logger }
    }
}

#[async_trait]
impl ProviderConnector for StdioConnector {
    async fn connect(&self, launch: &LaunchSpec) -> McpResult<Arc<dyn ProviderSession>> {
        let client = McpClient::connect_stdio(launch, self.logger.clone()).await?;
        Ok(Arc::new(client))
    }
}
