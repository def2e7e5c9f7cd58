//! One-shot capability discovery for remote providers

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{timeout_at, Instant};

use super::connector::ProviderConnector;
use super::error::McpError;
use crate::config::{ProviderConfig, ProviderKind};
use crate::logging::Logger;

/// What a discovery probe found out about a provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryOutcome {
    /// The provider answered; these are its capability names, in provider order
    Listed(Vec<String>),
    /// Launching, connecting or listing failed
    Failed(String),
    /// Not probed at all (unsupported kind, nothing to launch)
    Skipped(String),
}

impl DiscoveryOutcome {
    /// Discovered capability names; empty unless `Listed`
    pub fn capabilities(&self) -> &[String] {
        match self {
            DiscoveryOutcome::Listed(names) => names,
            _ => &[],
        }
    }

    pub fn is_listed(&self) -> bool {
        matches!(self, DiscoveryOutcome::Listed(_))
    }
}

/// Probes providers by connecting briefly and listing their capabilities
///
/// Every probe owns its connection: it is opened for the probe only and
/// closed before the probe returns, whatever the result.
pub struct DiscoveryService {
    connector: Arc<dyn ProviderConnector>,
    timeout: Duration,
    logger: Arc<dyn Logger>,
}

impl DiscoveryService {
    pub fn new(
        connector: Arc<dyn ProviderConnector>,
        timeout: Duration,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self {
            connector,
            timeout,
            logger,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn connector(&self) -> Arc<dyn ProviderConnector> {
        self.connector.clone()
    }

    /// Capability names of `name`, or an empty list if it could not be probed
    pub async fn discover(&self, name: &str, config: &ProviderConfig) -> Vec<String> {
        match self.probe(name, config).await {
            DiscoveryOutcome::Listed(names) => names,
            DiscoveryOutcome::Failed(_) | DiscoveryOutcome::Skipped(_) => Vec::new(),
        }
    }

    /// Probe `name` and report exactly what happened
    ///
    /// Connecting and listing share one deadline of [`Self::timeout`].
    pub async fn probe(&self, name: &str, config: &ProviderConfig) -> DiscoveryOutcome {
        match &config.kind {
            ProviderKind::Stdio => {}
            ProviderKind::Unsupported(kind) => {
                let reason = McpError::UnsupportedTransport(kind.clone()).to_string();
                self.logger
                    .warn(&format!("[Discovery] Skipping {}: {}", name, reason));
                return DiscoveryOutcome::Skipped(reason);
            }
        }

        let Some(launch) = config.launch_spec() else {
            let reason = "no command configured".to_string();
            self.logger
                .warn(&format!("[Discovery] Skipping {}: {}", name, reason));
            return DiscoveryOutcome::Skipped(reason);
        };

        self.logger.debug(&format!(
            "[Discovery] Probing {} ({})",
            name,
            launch.command_line()
        ));

        let deadline = Instant::now() + self.timeout;
        let session = match timeout_at(deadline, self.connector.connect(&launch)).await {
            Ok(Ok(session)) => session,
            Ok(Err(e)) => return self.failed(name, e),
            Err(_) => return self.failed(name, self.timed_out()),
        };

        let listed = timeout_at(deadline, session.list_capabilities()).await;

        if let Err(e) = session.close().await {
            self.logger.warn(&format!(
                "[Discovery] Error closing probe connection to {}: {}",
                name, e
            ));
        }

        match listed {
            Ok(Ok(capabilities)) => {
                let names: Vec<String> = capabilities.into_iter().map(|c| c.name).collect();
                self.logger.info(&format!(
                    "[Discovery] {} exposes {} capabilities",
                    name,
                    names.len()
                ));
                DiscoveryOutcome::Listed(names)
            }
            Ok(Err(e)) => self.failed(name, e),
            Err(_) => self.failed(name, self.timed_out()),
        }
    }

    fn timed_out(&self) -> McpError {
        McpError::Timeout(self.timeout.as_millis())
    }

    fn failed(&self, name: &str, error: McpError) -> DiscoveryOutcome {
        self.logger.error(&format!(
            "[Discovery] Failed to discover capabilities for {}: {}",
            name, error
        ));
        DiscoveryOutcome::Failed(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{LogLevel, RecordingLogger};
    use crate::mcp::mock::{MockBehavior, MockConnector};

    fn service(connector: Arc<MockConnector>) -> (DiscoveryService, Arc<RecordingLogger>) {
        let logger = Arc::new(RecordingLogger::new());
        (
            DiscoveryService::new(connector, Duration::from_millis(200), logger.clone()),
            logger,
        )
    }

    fn custom_tools() -> ProviderConfig {
        ProviderConfig::stdio("python").with_args(["custom_tools_server.py"])
    }

    #[tokio::test]
    async fn test_discover_lists_and_closes() {
        let connector = Arc::new(MockConnector::new().with_server(
            "python custom_tools_server.py",
            &["generate_id", "get_timestamp"],
        ));
        let (discovery, _) = service(connector.clone());

        let names = discovery.discover("custom_tools", &custom_tools()).await;
        assert_eq!(names, vec!["generate_id", "get_timestamp"]);
        assert_eq!(connector.connection_count(), 1);
        assert_eq!(connector.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_probe_passes_resolved_env() {
        std::env::set_var("TOOLHUB_DISCOVERY_TEST_KEY", "secret");
        let connector = Arc::new(MockConnector::new().with_server("python custom_tools_server.py", &[]));
        let (discovery, _) = service(connector.clone());

        let config = custom_tools().with_env("API_KEY", "${TOOLHUB_DISCOVERY_TEST_KEY}");
        let outcome = discovery.probe("custom_tools", &config).await;
        assert_eq!(outcome, DiscoveryOutcome::Listed(vec![]));
        assert_eq!(connector.launches()[0].env["API_KEY"], "secret");
    }

    #[tokio::test]
    async fn test_connect_failure_is_soft() {
        let connector = Arc::new(MockConnector::new());
        connector.set(
            "python custom_tools_server.py",
            MockBehavior::FailConnect("spawn failed".to_string()),
        );
        let (discovery, logger) = service(connector);

        let outcome = discovery.probe("custom_tools", &custom_tools()).await;
        assert!(matches!(outcome, DiscoveryOutcome::Failed(_)));
        assert!(outcome.capabilities().is_empty());
        assert!(logger.contains(LogLevel::Error, "custom_tools"));
    }

    #[tokio::test]
    async fn test_list_failure_still_closes() {
        let connector = Arc::new(MockConnector::new());
        connector.set(
            "python custom_tools_server.py",
            MockBehavior::FailList("bad frame".to_string()),
        );
        let (discovery, _) = service(connector.clone());

        assert!(discovery.discover("custom_tools", &custom_tools()).await.is_empty());
        assert_eq!(connector.open_sessions(), 0);
        assert_eq!(connector.closed_sessions(), 1);
    }

    #[tokio::test]
    async fn test_hanging_provider_times_out() {
        let connector = Arc::new(MockConnector::new());
        connector.set("python custom_tools_server.py", MockBehavior::Hang);
        let logger = Arc::new(RecordingLogger::new());
        let discovery =
            DiscoveryService::new(connector, Duration::from_millis(50), logger.clone());

        let outcome = discovery.probe("custom_tools", &custom_tools()).await;
        assert_eq!(
            outcome,
            DiscoveryOutcome::Failed(McpError::Timeout(50).to_string())
        );
    }

    #[tokio::test]
    async fn test_unsupported_kind_skipped() {
        let connector = Arc::new(MockConnector::new());
        let (discovery, logger) = service(connector.clone());

        let config = custom_tools().with_kind(ProviderKind::from("sse".to_string()));
        let outcome = discovery.probe("remote", &config).await;
        assert!(matches!(outcome, DiscoveryOutcome::Skipped(_)));
        assert!(logger.contains(LogLevel::Warn, "sse"));
        assert_eq!(connector.connection_count(), 0);

        let no_command = ProviderConfig {
            kind: ProviderKind::Stdio,
            ..Default::default()
        };
        assert!(matches!(
            discovery.probe("empty", &no_command).await,
            DiscoveryOutcome::Skipped(_)
        ));
    }
}
