//! Mock connector for testing
//!
//! Serves scripted providers keyed by launch command line, without spawning
//! anything. Useful for unit tests and for embedding the registry where no
//! real MCP servers are available.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use super::connector::{Capability, CapabilityOutput, ProviderConnector, ProviderSession};
use super::error::{McpError, McpResult};
use crate::config::LaunchSpec;

/// How a scripted provider behaves
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Accept connections and expose these capabilities
    Serve(Vec<Capability>),
    /// Refuse to connect
    FailConnect(String),
    /// Connect, then fail to list capabilities
    FailList(String),
    /// Never finish connecting
    Hang,
}

#[derive(Default)]
struct Counters {
    connects: AtomicUsize,
    open: AtomicUsize,
    closed: AtomicUsize,
}

/// Scripted stand-in for real providers
#[derive(Default)]
pub struct MockConnector {
    behaviors: RwLock<HashMap<String, MockBehavior>>,
    launches: RwLock<Vec<LaunchSpec>>,
    counters: Arc<Counters>,
    connect_delay: Option<Duration>,
    close_error: Option<String>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve capabilities (empty descriptions) for `command_line`
    pub fn with_server(self, command_line: &str, capabilities: &[&str]) -> Self {
        self.serve(
            command_line,
            capabilities
                .iter()
                .map(|name| Capability::new(*name, format!("{} (mock)", name)))
                .collect(),
        );
        self
    }

    /// Sleep this long inside every `connect`
    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = Some(delay);
        self
    }

    /// Sessions still release on `close` but report this error
    pub fn with_close_error(mut self, message: impl Into<String>) -> Self {
        self.close_error = Some(message.into());
        self
    }

    pub fn serve(&self, command_line: &str, capabilities: Vec<Capability>) {
        self.set(command_line, MockBehavior::Serve(capabilities));
    }

    pub fn set(&self, command_line: &str, behavior: MockBehavior) {
        self.behaviors.write().insert(command_line.to_string(), behavior);
    }

    /// Number of `connect` calls so far
    pub fn connection_count(&self) -> usize {
        self.counters.connects.load(Ordering::SeqCst)
    }

    /// Sessions connected and not yet closed
    pub fn open_sessions(&self) -> usize {
        self.counters.open.load(Ordering::SeqCst)
    }

    /// Sessions closed so far
    pub fn closed_sessions(&self) -> usize {
        self.counters.closed.load(Ordering::SeqCst)
    }

    /// Every launch spec passed to `connect`, in order
    pub fn launches(&self) -> Vec<LaunchSpec> {
        self.launches.read().clone()
    }
}

#[async_trait]
impl ProviderConnector for MockConnector {
    async fn connect(&self, launch: &LaunchSpec) -> McpResult<Arc<dyn ProviderSession>> {
        self.counters.connects.fetch_add(1, Ordering::SeqCst);
        self.launches.write().push(launch.clone());

        if let Some(delay) = self.connect_delay {
            tokio::time::sleep(delay).await;
        }

        let behavior = self.behaviors.read().get(&launch.command_line()).cloned();
        let (capabilities, list_error) = match behavior {
            Some(MockBehavior::Serve(caps)) => (caps, None),
            Some(MockBehavior::FailList(message)) => (Vec::new(), Some(message)),
            Some(MockBehavior::FailConnect(message)) => {
                return Err(McpError::ConnectionFailed(message));
            }
            Some(MockBehavior::Hang) => {
                return futures::future::pending().await;
            }
            None => {
                return Err(McpError::ConnectionFailed(format!(
                    "no mock server for '{}'",
                    launch.command_line()
                )));
            }
        };

        self.counters.open.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockSession {
            capabilities,
            list_error,
            close_error: self.close_error.clone(),
            closed: AtomicBool::new(false),
            counters: self.counters.clone(),
        }))
    }
}

struct MockSession {
    capabilities: Vec<Capability>,
    list_error: Option<String>,
    close_error: Option<String>,
    closed: AtomicBool,
    counters: Arc<Counters>,
}

#[async_trait]
impl ProviderSession for MockSession {
    async fn list_capabilities(&self) -> McpResult<Vec<Capability>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(McpError::Closed);
        }
        match &self.list_error {
            Some(message) => Err(McpError::Protocol(message.clone())),
            None => Ok(self.capabilities.clone()),
        }
    }

    async fn call(&self, name: &str, arguments: Value) -> McpResult<CapabilityOutput> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(McpError::Closed);
        }
        if !self.capabilities.iter().any(|c| c.name == name) {
            return Err(McpError::UnknownTool(name.to_string()));
        }
        Ok(CapabilityOutput {
            content: format!("{}({})", name, arguments),
            is_error: false,
        })
    }

    async fn close(&self) -> McpResult<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.counters.open.fetch_sub(1, Ordering::SeqCst);
            self.counters.closed.fetch_add(1, Ordering::SeqCst);
        }
        match &self.close_error {
            Some(message) => Err(McpError::Protocol(message.clone())),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_mock_serves_and_counts() {
        let connector = MockConnector::new().with_server("python tools.py", &["a", "b"]);
        let launch = LaunchSpec::new("python", ["tools.py"]);

        let session = connector.connect(&launch).await.unwrap();
        assert_eq!(connector.connection_count(), 1);
        assert_eq!(connector.open_sessions(), 1);

        let caps = session.list_capabilities().await.unwrap();
        assert_eq!(caps.len(), 2);

        let out = session.call("a", json!({"x": 1})).await.unwrap();
        assert_eq!(out.content, r#"a({"x":1})"#);

        session.close().await.unwrap();
        session.close().await.unwrap();
        assert_eq!(connector.open_sessions(), 0);
        assert_eq!(connector.closed_sessions(), 1);
        assert!(matches!(session.call("a", json!({})).await, Err(McpError::Closed)));
    }

    #[tokio::test]
    async fn test_mock_unknown_command() {
        let connector = MockConnector::new();
        let result = connector.connect(&LaunchSpec::new("nope", Vec::<String>::new())).await;
        assert!(matches!(result, Err(McpError::ConnectionFailed(_))));
        assert_eq!(connector.launches().len(), 1);
    }
}
