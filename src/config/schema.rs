//! Configuration schema definitions.
//!
//! This module defines the configuration structure for a pool cluster.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for a pool cluster.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ClusterConfig {
    /// Settings shared by every pool in the cluster.
    pub pool: PoolConfig,

    /// Backend definitions, one pool per entry, in rotation order.
    pub backends: Vec<BackendConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Tunables shared by all pools of a cluster.
///
/// Everything a pool needs except the procedure that creates its resources,
/// which is supplied per pool when it is registered.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Prefix used to name the pools (`<name>-<index>`).
    pub name: String,

    /// Minimum number of live resources (idle and in use).
    pub min: usize,

    /// Maximum number of live resources; further requests wait in the queue.
    pub max: usize,

    /// How long a released resource may sit idle before it is reaped.
    pub idle_timeout_ms: u64,

    /// Period of the idle reaper.
    pub reap_interval_ms: u64,

    /// Reap expired idle resources even if that drops the pool below `min`
    /// (they are recreated right away).
    pub refresh_idle: bool,

    /// Number of priority lanes; valid priorities are `0..priority_range`.
    pub priority_range: usize,

    /// Emit verbose per-pool log events.
    pub log: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            name: "pool".to_string(),
            min: 0,
            max: 1,
            idle_timeout_ms: 30_000,
            reap_interval_ms: 1_000,
            refresh_idle: true,
            priority_range: 1,
            log: false,
        }
    }
}

impl PoolConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn reap_interval(&self) -> Duration {
        Duration::from_millis(self.reap_interval_ms)
    }
}

/// Simulated backend definition.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Unique backend identifier.
    pub name: String,

    /// How long a caller holds a resource from this backend.
    #[serde(default = "default_hold_ms")]
    pub hold_ms: u64,

    /// Probability (0.0..=1.0) that creating a resource fails.
    #[serde(default)]
    pub fail_rate: f64,
}

fn default_hold_ms() -> u64 {
    1_000
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: ClusterConfig = toml::from_str("").unwrap();
        assert_eq!(config.pool, PoolConfig::default());
        assert!(config.backends.is_empty());
        assert_eq!(config.observability.log_level, "info");
    }

    #[test]
    fn test_backend_defaults() {
        let config: ClusterConfig = toml::from_str(
            r#"
            [pool]
            max = 4

            [[backends]]
            name = "a"
            "#,
        )
        .unwrap();

        assert_eq!(config.pool.max, 4);
        assert_eq!(config.pool.min, 0);
        assert_eq!(config.backends[0].hold_ms, 1_000);
        assert_eq!(config.backends[0].fail_rate, 0.0);
    }

    #[test]
    fn test_durations() {
        let config = PoolConfig {
            idle_timeout_ms: 1500,
            reap_interval_ms: 250,
            ..PoolConfig::default()
        };
        assert_eq!(config.idle_timeout(), Duration::from_millis(1500));
        assert_eq!(config.reap_interval(), Duration::from_millis(250));
    }
}
