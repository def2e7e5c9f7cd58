//! Connection cache keys

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::mcp::ToolsetPlan;

/// Key for connection cache entries (providers + filters + launch hash)
///
/// Providers are sorted and filters are sorted, so equal requests map to
/// equal keys. The resolved launch material (command lines and merged
/// environment) is hashed rather than stored, since it may hold credentials.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// `(provider, sorted filter)`; `None` means every capability
    pub servers: Vec<(String, Option<Vec<String>>)>,
    pub launch_hash: u64,
}

impl CacheKey {
    pub fn for_plan(plan: &ToolsetPlan) -> Self {
        let servers = plan
            .servers()
            .iter()
            .map(|s| {
                (
                    s.name.clone(),
                    s.include.as_ref().map(|set| set.iter().cloned().collect()),
                )
            })
            .collect();
        Self {
            servers,
            launch_hash: Self::hash_launch(plan),
        }
    }

    /// Hash command lines and environment. Returns 0 if there is nothing to launch.
    fn hash_launch(plan: &ToolsetPlan) -> u64 {
        if plan.servers().is_empty() {
            return 0;
        }
        let mut hasher = DefaultHasher::new();
        for server in plan.servers() {
            server.launch.command_line().hash(&mut hasher);
            // BTreeMap iterates in key order
            for (key, value) in &server.launch.env {
                key.hash(&mut hasher);
                value.hash(&mut hasher);
            }
        }
        hasher.finish()
    }

    pub fn providers(&self) -> Vec<&str> {
        self.servers.iter().map(|(name, _)| name.as_str()).collect()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .servers
            .iter()
            .map(|(name, filter)| match filter {
                Some(caps) => format!("{}[{}]", name, caps.join(",")),
                None => format!("{}[*]", name),
            })
            .collect();
        write!(f, "{}", parts.join("+"))
    }
}
