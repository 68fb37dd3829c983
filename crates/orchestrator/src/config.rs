use crate::error::{OrchestratorError, Result};
use crate::pool::MAX_WORKER_POOL_SIZE;
use rootcause_agents::{AgentToolkit, PipelineConfig, RuleSet};
use rootcause_graph::TopologyConfig;
use rootcause_search::SearchConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub const ENV_WORKER_POOL_SIZE: &str = "ROOTCAUSE_WORKER_POOL_SIZE";
pub const ENV_LEASE_TTL_MS: &str = "ROOTCAUSE_LEASE_TTL_MS";
pub const ENV_INTERRUPT_TTL_MS: &str = "ROOTCAUSE_INTERRUPT_TTL_MS";
pub const ENV_POLLING_INTERVAL_MS: &str = "ROOTCAUSE_POLLING_INTERVAL_MS";

const SEVEN_DAYS_MS: u64 = 7 * 24 * 60 * 60 * 1000;

/// Orchestrator settings, loaded from TOML. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Tasks executing concurrently
    pub worker_pool_size: usize,

    /// Execution lease lifetime without renewal
    pub lease_ttl_ms: u64,
    pub lease_renew_interval_ms: u64,

    /// Validity window of an interrupt flag; at least the worst-case duration of one stage
    pub interrupt_ttl_ms: u64,

    /// How long a terminal task record stays readable
    pub record_retention_ms: u64,

    /// Advertised to clients and used by `wait_for_terminal`
    pub polling_interval_ms: u64,

    /// Alternative rule tables; the built-in tables are used when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rules_path: Option<PathBuf>,

    pub pipeline: PipelineConfig,
    pub search: SearchConfig,
    pub topology: TopologyConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            worker_pool_size: 4,
            lease_ttl_ms: 15_000,
            lease_renew_interval_ms: 5_000,
            interrupt_ttl_ms: 120_000,
            record_retention_ms: SEVEN_DAYS_MS,
            polling_interval_ms: 1_000,
            rules_path: None,
            pipeline: PipelineConfig::default(),
            search: SearchConfig::default(),
            topology: TopologyConfig::default(),
        }
    }
}

impl OrchestratorConfig {
    pub fn from_toml(raw: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(raw)?;
        Ok(cfg)
    }

    /// Read a config file, apply environment overrides, validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let mut cfg = Self::from_toml(&raw)?;
        cfg.apply_env_overrides();
        cfg.validate()?;
        log::debug!("Loaded orchestrator config from {}", path.display());
        Ok(cfg)
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Empty, zero or unparsable values leave the current setting in place.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(size) = parse_positive(lookup(ENV_WORKER_POOL_SIZE).as_deref()) {
            self.worker_pool_size =
                usize::try_from(size).map_or(MAX_WORKER_POOL_SIZE, |s| s.min(MAX_WORKER_POOL_SIZE));
        }
        if let Some(ms) = parse_positive(lookup(ENV_LEASE_TTL_MS).as_deref()) {
            self.lease_ttl_ms = ms;
        }
        if let Some(ms) = parse_positive(lookup(ENV_INTERRUPT_TTL_MS).as_deref()) {
            self.interrupt_ttl_ms = ms;
        }
        if let Some(ms) = parse_positive(lookup(ENV_POLLING_INTERVAL_MS).as_deref()) {
            self.polling_interval_ms = ms;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.worker_pool_size == 0 || self.worker_pool_size > MAX_WORKER_POOL_SIZE {
            return invalid(format!(
                "worker_pool_size must be within 1..={MAX_WORKER_POOL_SIZE}, got {}",
                self.worker_pool_size
            ));
        }
        if self.lease_ttl_ms == 0 {
            return invalid("lease_ttl_ms must be > 0");
        }
        if self.lease_renew_interval_ms == 0 || self.lease_renew_interval_ms >= self.lease_ttl_ms {
            return invalid(format!(
                "lease_renew_interval_ms ({}) must be > 0 and below lease_ttl_ms ({})",
                self.lease_renew_interval_ms, self.lease_ttl_ms
            ));
        }
        for (name, value) in [
            ("interrupt_ttl_ms", self.interrupt_ttl_ms),
            ("record_retention_ms", self.record_retention_ms),
            ("polling_interval_ms", self.polling_interval_ms),
        ] {
            if value == 0 {
                return invalid(format!("{name} must be > 0"));
            }
        }
        self.pipeline
            .validate()
            .map_err(|err| OrchestratorError::InvalidConfig(err.to_string()))?;
        let stage_bound = self.pipeline.worst_case_stage_duration();
        if self.interrupt_ttl() < stage_bound {
            return invalid(format!(
                "interrupt_ttl_ms ({}) is shorter than the worst-case stage duration ({}ms)",
                self.interrupt_ttl_ms,
                stage_bound.as_millis()
            ));
        }
        self.search
            .validate()
            .map_err(|err| OrchestratorError::InvalidConfig(err.to_string()))?;
        self.topology
            .validate()
            .map_err(|err| OrchestratorError::InvalidConfig(err.to_string()))?;
        Ok(())
    }

    #[must_use]
    pub fn lease_ttl(&self) -> Duration {
        Duration::from_millis(self.lease_ttl_ms)
    }

    #[must_use]
    pub fn lease_renew_interval(&self) -> Duration {
        Duration::from_millis(self.lease_renew_interval_ms)
    }

    #[must_use]
    pub fn interrupt_ttl(&self) -> Duration {
        Duration::from_millis(self.interrupt_ttl_ms)
    }

    #[must_use]
    pub fn record_retention(&self) -> Duration {
        Duration::from_millis(self.record_retention_ms)
    }

    #[must_use]
    pub fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.polling_interval_ms)
    }

    /// Built-in rule tables, or the ones at `rules_path`.
    pub fn rules(&self) -> Result<RuleSet> {
        let rules = match &self.rules_path {
            Some(path) => RuleSet::load(path)?,
            None => RuleSet::builtin()?,
        };
        Ok(rules)
    }

    /// Toolkit over in-memory backends seeded from a corpus file.
    pub async fn toolkit_from_corpus(&self, corpus: impl AsRef<Path>) -> Result<AgentToolkit> {
        let toolkit = AgentToolkit::from_corpus_file(
            corpus,
            self.search.clone(),
            self.topology.clone(),
            Arc::new(self.rules()?),
        )
        .await?;
        Ok(toolkit)
    }
}

fn parse_positive(raw: Option<&str>) -> Option<u64> {
    raw.map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|v| *v > 0)
}

fn invalid<T>(message: impl Into<String>) -> Result<T> {
    Err(OrchestratorError::InvalidConfig(message.into()))
}
