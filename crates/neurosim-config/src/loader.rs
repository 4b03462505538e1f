// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading with override support
//!
//! Three tiers, later tiers win:
//! 1. TOML file (base values)
//! 2. Environment variables (runtime overrides)
//! 3. CLI arguments (explicit user overrides)

use crate::{ConfigError, ConfigResult, SimulatorConfig};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const CONFIG_FILE_NAME: &str = "neurosim_configuration.toml";

/// Find the configuration file
///
/// Search order:
/// 1. `NEUROSIM_CONFIG_PATH` environment variable
/// 2. Current working directory
/// 3. Up to 5 parent directories
///
/// # Errors
///
/// Returns `ConfigError::FileNotFound` if no config file is found in any location
pub fn find_config_file() -> ConfigResult<PathBuf> {
    if let Ok(env_path) = env::var("NEUROSIM_CONFIG_PATH") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        return Err(ConfigError::FileNotFound(format!(
            "Config file specified by NEUROSIM_CONFIG_PATH not found: {}",
            path.display()
        )));
    }

    let mut search_paths = Vec::new();
    if let Ok(cwd) = env::current_dir() {
        search_paths.push(cwd.join(CONFIG_FILE_NAME));
        let mut current = cwd.clone();
        for _ in 0..5 {
            if let Some(parent) = current.parent() {
                search_paths.push(parent.join(CONFIG_FILE_NAME));
                current = parent.to_path_buf();
            }
        }
    }

    if let Some(found) = search_paths.iter().find(|p| p.exists()) {
        return Ok(found.clone());
    }

    let search_list = search_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::FileNotFound(format!(
        "'{}' not found in any of these locations:\n{}\n\nSet NEUROSIM_CONFIG_PATH to specify a custom location.",
        CONFIG_FILE_NAME, search_list
    )))
}

/// Load configuration from a TOML file and apply overrides
///
/// # Arguments
///
/// * `config_path` - Optional path to config file. If `None`, the file is searched for.
/// * `cli_args` - Optional CLI argument overrides
///
/// # Errors
///
/// Returns error if the config file is not found or contains invalid TOML.
/// Validation is a separate step, see [`crate::validate_config`].
pub fn load_config(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<SimulatorConfig> {
    let config_file = match config_path {
        Some(path) => path.to_path_buf(),
        None => find_config_file()?,
    };

    let content = fs::read_to_string(&config_file)?;
    let mut config: SimulatorConfig = toml::from_str(&content)?;

    apply_environment_overrides(&mut config);
    if let Some(cli) = cli_args {
        apply_cli_overrides(&mut config, cli);
    }

    Ok(config)
}

fn parse_bool(value: &str) -> bool {
    let v = value.to_lowercase();
    v == "true" || v == "1" || v == "yes"
}

fn set_parsed<T: FromStr>(target: &mut T, value: &str) {
    if let Ok(parsed) = value.parse::<T>() {
        *target = parsed;
    }
}

/// Apply environment variable overrides to configuration
///
/// Supported environment variables:
/// - `NEUROSIM_WORKERS` -> `system.workers`
/// - `NEUROSIM_LOG_LEVEL` -> `system.log_level`
/// - `NEUROSIM_CYCLES_PER_TRIAL` -> `run.cycles_per_trial`
/// - `NEUROSIM_TRIALS` -> `run.trials`
/// - `NEUROSIM_SEED` -> `run.base_seed`
/// - `NEUROSIM_RESET_BETWEEN_TRIALS` -> `run.reset_between_trials`
/// - `NEUROSIM_LOG_DIR` -> `logging.log_dir`
/// - `NEUROSIM_FILE_LOGGING` -> `logging.file_logging`
pub fn apply_environment_overrides(config: &mut SimulatorConfig) {
    if let Ok(value) = env::var("NEUROSIM_WORKERS") {
        set_parsed(&mut config.system.workers, &value);
    }
    if let Ok(value) = env::var("NEUROSIM_LOG_LEVEL") {
        config.system.log_level = value;
    }
    if let Ok(value) = env::var("NEUROSIM_CYCLES_PER_TRIAL") {
        set_parsed(&mut config.run.cycles_per_trial, &value);
    }
    if let Ok(value) = env::var("NEUROSIM_TRIALS") {
        set_parsed(&mut config.run.trials, &value);
    }
    if let Ok(value) = env::var("NEUROSIM_SEED") {
        set_parsed(&mut config.run.base_seed, &value);
    }
    if let Ok(value) = env::var("NEUROSIM_RESET_BETWEEN_TRIALS") {
        config.run.reset_between_trials = parse_bool(&value);
    }
    if let Ok(value) = env::var("NEUROSIM_LOG_DIR") {
        config.logging.log_dir = PathBuf::from(value);
    }
    if let Ok(value) = env::var("NEUROSIM_FILE_LOGGING") {
        config.logging.file_logging = parse_bool(&value);
    }
}

/// Apply CLI argument overrides to configuration
///
/// # Arguments
///
/// * `config` - Configuration to modify
/// * `cli_args` - Map of CLI arguments (e.g., `{"workers": "8", "trials": "100"}`)
pub fn apply_cli_overrides(config: &mut SimulatorConfig, cli_args: &HashMap<String, String>) {
    if let Some(value) = cli_args.get("workers") {
        set_parsed(&mut config.system.workers, value);
    }
    if let Some(value) = cli_args.get("log_level") {
        config.system.log_level = value.clone();
    }
    if let Some(value) = cli_args.get("debug") {
        config.system.debug = parse_bool(value);
    }
    if let Some(value) = cli_args.get("cycles_per_trial") {
        set_parsed(&mut config.run.cycles_per_trial, value);
    }
    if let Some(value) = cli_args.get("trials") {
        set_parsed(&mut config.run.trials, value);
    }
    if let Some(value) = cli_args.get("seed") {
        set_parsed(&mut config.run.base_seed, value);
    }
    if let Some(value) = cli_args.get("stats_interval_trials") {
        set_parsed(&mut config.run.stats_interval_trials, value);
    }
}
