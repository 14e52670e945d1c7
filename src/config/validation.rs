//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (capacity bounds, priority lanes, reap period)
//! - Detect duplicate backend names
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ClusterConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::str::FromStr;

use thiserror::Error;
use tracing_subscriber::filter::LevelFilter;

use crate::config::schema::{ClusterConfig, PoolConfig};

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("pool.max must be at least 1")]
    ZeroMax,

    #[error("pool.min ({min}) exceeds pool.max ({max})")]
    MinExceedsMax { min: usize, max: usize },

    #[error("pool.priority_range must be at least 1")]
    ZeroPriorityRange,

    #[error("pool.reap_interval_ms must be greater than 0")]
    ZeroReapInterval,

    #[error("duplicate backend name `{0}`")]
    DuplicateBackend(String),

    #[error("backend `{name}` has fail_rate {rate}, expected a value in 0.0..=1.0")]
    InvalidFailRate { name: String, rate: f64 },

    #[error("unknown log level `{0}`")]
    InvalidLogLevel(String),
}

/// Validate the tunables shared by the pools of a cluster.
pub fn validate_pool(pool: &PoolConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    check_pool(pool, &mut errors);
    into_result(errors)
}

/// Validate a complete cluster configuration.
pub fn validate_config(config: &ClusterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    check_pool(&config.pool, &mut errors);

    let mut seen = HashSet::new();
    for backend in &config.backends {
        if !seen.insert(backend.name.as_str()) {
            errors.push(ValidationError::DuplicateBackend(backend.name.clone()));
        }
        if !(0.0..=1.0).contains(&backend.fail_rate) {
            errors.push(ValidationError::InvalidFailRate {
                name: backend.name.clone(),
                rate: backend.fail_rate,
            });
        }
    }

    if LevelFilter::from_str(&config.observability.log_level).is_err() {
        errors.push(ValidationError::InvalidLogLevel(
            config.observability.log_level.clone(),
        ));
    }

    into_result(errors)
}

fn check_pool(pool: &PoolConfig, errors: &mut Vec<ValidationError>) {
    if pool.max == 0 {
        errors.push(ValidationError::ZeroMax);
    }
    if pool.min > pool.max {
        errors.push(ValidationError::MinExceedsMax {
            min: pool.min,
            max: pool.max,
        });
    }
    if pool.priority_range == 0 {
        errors.push(ValidationError::ZeroPriorityRange);
    }
    if pool.reap_interval_ms == 0 {
        errors.push(ValidationError::ZeroReapInterval);
    }
}

fn into_result(errors: Vec<ValidationError>) -> Result<(), Vec<ValidationError>> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::BackendConfig;

    fn backend(name: &str, fail_rate: f64) -> BackendConfig {
        BackendConfig {
            name: name.to_string(),
            hold_ms: 100,
            fail_rate,
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&ClusterConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_every_pool_error() {
        let pool = PoolConfig {
            min: 3,
            max: 0,
            priority_range: 0,
            reap_interval_ms: 0,
            ..PoolConfig::default()
        };

        let errors = validate_pool(&pool).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::ZeroMax,
                ValidationError::MinExceedsMax { min: 3, max: 0 },
                ValidationError::ZeroPriorityRange,
                ValidationError::ZeroReapInterval,
            ]
        );
    }

    #[test]
    fn test_backend_checks() {
        let mut config = ClusterConfig::default();
        config.backends = vec![backend("a", 0.0), backend("a", 1.5), backend("b", f64::NAN)];
        config.observability.log_level = "loud".to_string();

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::DuplicateBackend("a".into())));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::InvalidFailRate { name, .. } if name == "a")));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::InvalidFailRate { name, .. } if name == "b")));
        assert!(errors.contains(&ValidationError::InvalidLogLevel("loud".into())));
    }
}
