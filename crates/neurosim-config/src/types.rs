// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions
//!
//! Each struct maps to one section of `neurosim_configuration.toml`. Every
//! section is `#[serde(default)]`, so a file only needs the keys it changes.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SimulatorConfig {
    pub system: SystemConfig,
    pub run: RunConfig,
    pub limits: LimitsConfig,
    pub logging: LoggingConfig,
}

/// Process-level settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Contiguous cell slices per population; also the rayon pool size
    pub workers: usize,
    pub log_level: String,
    pub debug: bool,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            log_level: "info".to_string(),
            debug: false,
        }
    }
}

/// Trial and cycle sequencing
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RunConfig {
    pub cycles_per_trial: u32,
    pub trials: u64,
    /// Collect and reduce statistics every this many trials (0 disables)
    pub stats_interval_trials: u64,
    /// Restore every cell to its initial state at the start of each trial
    pub reset_between_trials: bool,
    /// Cycles at the start of each epoch with amplification suspended for
    /// every connection, on top of each rule's own freeze window
    pub freeze_amplification_cycles: u32,
    pub base_seed: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            cycles_per_trial: 10,
            trials: 1,
            stats_interval_trials: 1,
            reset_between_trials: false,
            freeze_amplification_cycles: 0,
            base_seed: 1_234_567,
        }
    }
}

/// Setup-time resource limits. Exceeding any of them is fatal.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_cells_per_population: u64,
    pub max_synapses_per_cell: u64,
    pub max_bands: usize,
    pub max_delay: u8,
    /// Largest seed advance one population may need in one cycle
    pub max_seed_advance: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_cells_per_population: 1 << 24,
            max_synapses_per_cell: 1 << 16,
            max_bands: 16,
            max_delay: 32,
            max_seed_advance: (1 << 31) - 2,
        }
    }
}

/// Logging sinks
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub file_logging: bool,
    pub log_dir: PathBuf,
    /// Emit a warning when overflow counters are non-zero at stats time
    pub warn_on_overflow: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file_logging: false,
            log_dir: PathBuf::from("./logs"),
            warn_on_overflow: true,
        }
    }
}
