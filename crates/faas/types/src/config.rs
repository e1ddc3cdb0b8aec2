//! Scheduler configuration.
//!
//! Describes the invoker topology, the distribution policy and logging settings.
//! Loadable from TOML:
//!
//! ```toml
//! [policy]
//! kind = "round_robin"
//!
//! [[invokers]]
//! id = "edge"
//! max_ram = 4
//! threads = 2
//!
//! [[invokers]]
//! id = "rack"
//! max_ram = 2
//! threads = 1
//! children = [{ max_ram = 8, threads = 4 }]
//! ```

use crate::error::{FaasError, FaasResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Top-level scheduler configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FaasConfig {
    /// Distribution policy.
    pub policy: PolicyConfig,

    /// Top-level invokers, in registration order.
    pub invokers: Vec<InvokerSpec>,

    /// Logging settings.
    pub tracing: TracingSettings,
}

impl FaasConfig {
    pub fn from_toml_str(contents: &str) -> FaasResult<Self> {
        let config: FaasConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> FaasResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            FaasError::InvalidConfiguration(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&contents)
    }

    /// Reject zero budgets, zero pools and duplicate invoker ids anywhere in the tree
    pub fn validate(&self) -> FaasResult<()> {
        if self.policy.big_group_max_attempts == 0 {
            return Err(FaasError::InvalidConfiguration(
                "policy.big_group_max_attempts must be at least 1".into(),
            ));
        }
        let mut seen = HashSet::new();
        for spec in &self.invokers {
            spec.validate(&mut seen)?;
        }
        Ok(())
    }
}

/// Available distribution algorithms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    /// Cyclic cursor preferring providers with room
    #[default]
    RoundRobin,

    /// Best fit: tightest available budget first
    GreedyGroup,

    /// Batch-aware groups, retrying past incapable providers
    BigGroup,

    /// Batch-aware groups, skipping momentarily full providers
    UniformGroup,
}

impl PolicyKind {
    pub const ALL: [PolicyKind; 4] = [
        PolicyKind::RoundRobin,
        PolicyKind::GreedyGroup,
        PolicyKind::BigGroup,
        PolicyKind::UniformGroup,
    ];
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyKind::RoundRobin => write!(f, "round_robin"),
            PolicyKind::GreedyGroup => write!(f, "greedy_group"),
            PolicyKind::BigGroup => write!(f, "big_group"),
            PolicyKind::UniformGroup => write!(f, "uniform_group"),
        }
    }
}

impl FromStr for PolicyKind {
    type Err = FaasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PolicyKind::ALL
            .into_iter()
            .find(|kind| kind.to_string() == s)
            .ok_or_else(|| FaasError::InvalidConfiguration(format!("unknown policy {}", s)))
    }
}

/// Policy selection and tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Which algorithm to use.
    pub kind: PolicyKind,

    /// Attempts BigGroup makes past incapable providers before giving up.
    pub big_group_max_attempts: u32,

    /// Whether UniformGroup skips providers that are momentarily full.
    pub uniform_ignore_full: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            kind: PolicyKind::RoundRobin,
            big_group_max_attempts: 10,
            uniform_ignore_full: true,
        }
    }
}

/// One node of the invoker topology.
///
/// A spec with children describes a composite invoker; its own `max_ram` and
/// `threads` size the fallback budget it uses when no child can take the work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvokerSpec {
    /// Optional stable id (generated when absent).
    #[serde(default)]
    pub id: Option<String>,

    /// RAM budget in units.
    pub max_ram: u64,

    /// Worker pool size (capped at the number of CPU cores).
    #[serde(default = "default_threads")]
    pub threads: usize,

    /// Child invokers.
    #[serde(default)]
    pub children: Vec<InvokerSpec>,
}

fn default_threads() -> usize {
    1
}

impl InvokerSpec {
    pub fn leaf(max_ram: u64, threads: usize) -> Self {
        Self {
            id: None,
            max_ram,
            threads,
            children: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_child(mut self, child: InvokerSpec) -> Self {
        self.children.push(child);
        self
    }

    pub fn is_composite(&self) -> bool {
        !self.children.is_empty()
    }

    fn validate(&self, seen: &mut HashSet<String>) -> FaasResult<()> {
        let label = self.id.clone().unwrap_or_else(|| "<anonymous>".into());
        if self.max_ram == 0 {
            return Err(FaasError::InvalidConfiguration(format!(
                "invoker {} must have max_ram > 0",
                label
            )));
        }
        if self.threads == 0 {
            return Err(FaasError::InvalidConfiguration(format!(
                "invoker {} must have threads > 0",
                label
            )));
        }
        if let Some(id) = &self.id {
            if !seen.insert(id.clone()) {
                return Err(FaasError::InvalidConfiguration(format!(
                    "duplicate invoker id {}",
                    id
                )));
            }
        }
        for child in &self.children {
            child.validate(seen)?;
        }
        Ok(())
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TracingSettings {
    /// Default level filter (overridden by `RUST_LOG`).
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for TracingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FaasConfig::default();
        assert_eq!(config.policy.kind, PolicyKind::RoundRobin);
        assert!(config.invokers.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_nested_topology() {
        let config = FaasConfig::from_toml_str(
            r#"
            [policy]
            kind = "uniform_group"
            uniform_ignore_full = false

            [[invokers]]
            id = "edge"
            max_ram = 4
            threads = 2

            [[invokers]]
            id = "rack"
            max_ram = 2
            children = [{ id = "rack-a", max_ram = 8, threads = 4 }]
            "#,
        )
        .unwrap();

        assert_eq!(config.policy.kind, PolicyKind::UniformGroup);
        assert!(!config.policy.uniform_ignore_full);
        assert_eq!(config.policy.big_group_max_attempts, 10);
        assert_eq!(config.invokers.len(), 2);
        assert!(!config.invokers[0].is_composite());
        assert!(config.invokers[1].is_composite());
        assert_eq!(config.invokers[1].threads, 1);
        assert_eq!(config.invokers[1].children[0].max_ram, 8);
    }

    #[test]
    fn test_rejects_zero_ram_and_duplicates() {
        let zero = FaasConfig {
            invokers: vec![InvokerSpec::leaf(1, 1).with_child(InvokerSpec::leaf(0, 1))],
            ..Default::default()
        };
        assert!(matches!(zero.validate(), Err(FaasError::InvalidConfiguration(_))));

        let dup = FaasConfig {
            invokers: vec![
                InvokerSpec::leaf(1, 1).with_id("a"),
                InvokerSpec::leaf(1, 1).with_id("a"),
            ],
            ..Default::default()
        };
        assert!(matches!(dup.validate(), Err(FaasError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_policy_kind_from_str() {
        for kind in PolicyKind::ALL {
            assert_eq!(kind.to_string().parse::<PolicyKind>().unwrap(), kind);
        }
        assert!("fastest".parse::<PolicyKind>().is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let result = FaasConfig::load("/nonexistent/path/faas.toml");
        assert!(matches!(result, Err(FaasError::InvalidConfiguration(_))));
    }
}
