// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration validation
//!
//! All violations are collected and reported together.

use crate::{ConfigError, ConfigResult, SimulatorConfig};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validation errors that can occur during config validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValidationError {
    OutOfRange { field: String, reason: String },
    InvalidValue { field: String, reason: String },
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutOfRange { field, reason } => {
                write!(f, "{} is out of range: {}", field, reason)
            }
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid configuration value for {}: {}", field, reason)
            }
        }
    }
}

/// Validate the complete configuration
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` listing every violation
pub fn validate_config(config: &SimulatorConfig) -> ConfigResult<()> {
    let errors = collect_violations(config);
    if errors.is_empty() {
        return Ok(());
    }
    let error_messages = errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n");
    Err(ConfigError::ValidationError(format!(
        "Configuration validation failed:\n{}",
        error_messages
    )))
}

/// Every violation in `config`, in section order.
pub fn collect_violations(config: &SimulatorConfig) -> Vec<ConfigValidationError> {
    let mut errors = Vec::new();
    validate_system(config, &mut errors);
    validate_run(config, &mut errors);
    validate_limits(config, &mut errors);
    errors
}

fn validate_system(config: &SimulatorConfig, errors: &mut Vec<ConfigValidationError>) {
    if config.system.workers == 0 {
        errors.push(ConfigValidationError::OutOfRange {
            field: "system.workers".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    if !LOG_LEVELS.contains(&config.system.log_level.to_lowercase().as_str()) {
        errors.push(ConfigValidationError::InvalidValue {
            field: "system.log_level".to_string(),
            reason: format!("'{}' is not one of {:?}", config.system.log_level, LOG_LEVELS),
        });
    }
}

fn validate_run(config: &SimulatorConfig, errors: &mut Vec<ConfigValidationError>) {
    if config.run.cycles_per_trial == 0 {
        errors.push(ConfigValidationError::OutOfRange {
            field: "run.cycles_per_trial".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
}

fn validate_limits(config: &SimulatorConfig, errors: &mut Vec<ConfigValidationError>) {
    let limits = &config.limits;
    if limits.max_seed_advance == 0 || limits.max_seed_advance > (1 << 31) - 2 {
        errors.push(ConfigValidationError::OutOfRange {
            field: "limits.max_seed_advance".to_string(),
            reason: "must be in [1, 2^31 - 2]".to_string(),
        });
    }
    if limits.max_bands == 0 {
        errors.push(ConfigValidationError::OutOfRange {
            field: "limits.max_bands".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    if limits.max_synapses_per_cell == 0 {
        errors.push(ConfigValidationError::OutOfRange {
            field: "limits.max_synapses_per_cell".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
}
