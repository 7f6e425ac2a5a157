//! Pool and scheduler configuration structures.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::core::{AppResult, ResourceEstimate};
use crate::util::serde::{ResourceVector, ACCELERATOR, COMPUTE, MEMORY};

/// Environment variable naming a JSON config file.
pub const ENV_CONFIG_PATH: &str = "SCHEDULER_CONFIG";
/// Environment override for compute units.
pub const ENV_COMPUTE_UNITS: &str = "SCHEDULER_COMPUTE_UNITS";
/// Environment override for memory units.
pub const ENV_MEMORY_UNITS: &str = "SCHEDULER_MEMORY_UNITS";
/// Environment override for accelerator units.
pub const ENV_ACCELERATOR_UNITS: &str = "SCHEDULER_ACCELERATOR_UNITS";
/// Environment override for the queue depth.
pub const ENV_MAX_QUEUE_DEPTH: &str = "SCHEDULER_MAX_QUEUE_DEPTH";
/// Environment override enabling the deadline watchdog.
pub const ENV_DEADLINE_GRACE_SECS: &str = "SCHEDULER_DEADLINE_GRACE_SECS";

const fn default_metrics_window_secs() -> u64 {
    24 * 60 * 60
}

const fn default_watchdog_interval_secs() -> u64 {
    30
}

/// Resource pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Total units per resource class.
    pub resources: BTreeMap<String, u64>,
    /// Maximum queued jobs before rejection.
    pub max_queue_depth: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        let compute = u64::try_from(num_cpus::get()).unwrap_or(4).max(4);
        let resources = [(COMPUTE, compute), (MEMORY, 16_384), (ACCELERATOR, 2)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        Self {
            resources,
            max_queue_depth: 10_000,
        }
    }
}

impl PoolConfig {
    /// Pool totals as a resource vector.
    pub fn totals(&self) -> ResourceVector {
        self.resources.clone().into()
    }

    /// Validate pool configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.resources.is_empty() {
            return Err("at least one resource class must be defined".into());
        }
        if self.resources.values().all(|units| *units == 0) {
            return Err("at least one resource class must have capacity".into());
        }
        if self.max_queue_depth == 0 {
            return Err("max_queue_depth must be greater than 0".into());
        }
        Ok(())
    }
}

/// Root scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Resource pool.
    pub pool: PoolConfig,
    /// Per-type estimates replacing or extending the built-in table.
    #[serde(default)]
    pub estimates: HashMap<String, ResourceEstimate>,
    /// Trailing window for aggregate metrics.
    #[serde(default = "default_metrics_window_secs")]
    pub metrics_window_secs: u64,
    /// Grace after a deadline before the watchdog fails a processing job.
    /// `None` leaves deadlines advisory.
    #[serde(default)]
    pub deadline_grace_secs: Option<u64>,
    /// Watchdog tick.
    #[serde(default = "default_watchdog_interval_secs")]
    pub watchdog_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            pool: PoolConfig::default(),
            estimates: HashMap::new(),
            metrics_window_secs: default_metrics_window_secs(),
            deadline_grace_secs: None,
            watchdog_interval_secs: default_watchdog_interval_secs(),
        }
    }
}

impl SchedulerConfig {
    /// Validate the pool, windows and estimate overrides.
    pub fn validate(&self) -> Result<(), String> {
        self.pool.validate().map_err(|e| format!("pool invalid: {e}"))?;
        if self.metrics_window_secs == 0 {
            return Err("metrics_window_secs must be greater than 0".into());
        }
        if self.watchdog_interval_secs == 0 {
            return Err("watchdog_interval_secs must be greater than 0".into());
        }
        for (job_type, estimate) in &self.estimates {
            if job_type.is_empty() {
                return Err("estimate keys must be non-empty job types".into());
            }
            for (class, units) in estimate.resources.iter() {
                let total = self.pool.resources.get(class).copied();
                match total {
                    None if units > 0 => {
                        return Err(format!(
                            "estimate `{job_type}` uses unknown resource class `{class}`"
                        ));
                    }
                    Some(total) if units > total => {
                        return Err(format!(
                            "estimate `{job_type}` needs {units} `{class}` units but the pool has {total}"
                        ));
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    /// Tick for [`JobScheduler::run_watchdog`](crate::core::JobScheduler::run_watchdog).
    pub const fn watchdog_interval(&self) -> Duration {
        Duration::from_secs(self.watchdog_interval_secs)
    }

    /// Parse scheduler configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read and validate a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading scheduler config {}", path.display()))?;
        Self::from_json_str(&raw)
            .map_err(anyhow::Error::msg)
            .with_context(|| format!("loading scheduler config {}", path.display()))
    }

    /// Load configuration from the environment.
    ///
    /// Reads `.env` if present. `SCHEDULER_CONFIG` points at a JSON file;
    /// otherwise defaults are used. The `SCHEDULER_*_UNITS`,
    /// `SCHEDULER_MAX_QUEUE_DEPTH` and `SCHEDULER_DEADLINE_GRACE_SECS`
    /// variables override either source.
    pub fn from_env() -> AppResult<Self> {
        let _ = dotenvy::dotenv();
        let mut cfg = match std::env::var(ENV_CONFIG_PATH) {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };
        for (var, class) in [
            (ENV_COMPUTE_UNITS, COMPUTE),
            (ENV_MEMORY_UNITS, MEMORY),
            (ENV_ACCELERATOR_UNITS, ACCELERATOR),
        ] {
            if let Some(units) = env_number::<u64>(var)? {
                cfg.pool.resources.insert(class.to_string(), units);
            }
        }
        if let Some(depth) = env_number::<usize>(ENV_MAX_QUEUE_DEPTH)? {
            cfg.pool.max_queue_depth = depth;
        }
        if let Some(grace) = env_number::<u64>(ENV_DEADLINE_GRACE_SECS)? {
            cfg.deadline_grace_secs = Some(grace);
        }
        cfg.validate().map_err(anyhow::Error::msg)?;
        Ok(cfg)
    }
}

fn env_number<T>(var: &str) -> AppResult<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("{var} must be a number, got `{raw}`")),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = SchedulerConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.metrics_window_secs, 86_400);
        assert!(cfg.pool.resources[COMPUTE] >= 4);
    }

    #[test]
    fn json_defaults_apply() {
        let cfg = SchedulerConfig::from_json_str(
            r#"{"pool": {"resources": {"compute": 4, "memory": 8192}, "max_queue_depth": 10}}"#,
        )
        .unwrap();
        assert_eq!(cfg.metrics_window_secs, 86_400);
        assert_eq!(cfg.watchdog_interval_secs, 30);
        assert_eq!(cfg.watchdog_interval(), Duration::from_secs(30));
        assert!(cfg.deadline_grace_secs.is_none());
        assert!(cfg.estimates.is_empty());
    }

    #[test]
    fn estimate_must_fit_pool() {
        let err = SchedulerConfig::from_json_str(
            r#"{
                "pool": {"resources": {"compute": 2}, "max_queue_depth": 10},
                "estimates": {"big": {"resources": {"compute": 3}, "estimated_duration_secs": 5}}
            }"#,
        )
        .unwrap_err();
        assert!(err.contains("needs 3"));
    }

    #[test]
    fn estimate_unknown_class_rejected() {
        let err = SchedulerConfig::from_json_str(
            r#"{
                "pool": {"resources": {"compute": 2}, "max_queue_depth": 10},
                "estimates": {"x": {"resources": {"tpu": 1}, "estimated_duration_secs": 5}}
            }"#,
        )
        .unwrap_err();
        assert!(err.contains("unknown resource class"));
    }
}
