// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! # NeuroSim
//!
//! Deterministic fixed-point simulation of large layered networks of
//! biologically inspired populations. Every cycle each cell gathers its
//! delayed afferent responses, geometric band sums and modulation terms,
//! passes the total through its response function and updates plasticity.
//! Results are bit-identical for a given seed regardless of worker count.
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! neurosim = "0.1"
//! ```
//!
//! ```rust,no_run
//! use neurosim::prelude::*;
//!
//! let input = GridShape::new(8, 8, 1);
//! let mut v1 = PopulationSpec::new("v1", input, ResponseFunction::Knee(Default::default()));
//! v1.connections.push(ConnectionSpec::new(
//!     SourceRef::Virtual(0),
//!     Generation::Topographic { radius: 1 },
//! ));
//! let spec = NetworkSpec {
//!     populations: vec![v1],
//!     virtual_inputs: vec![VirtualInputSpec::new("retina", input)],
//! };
//!
//! let mut sim = Simulator::build(spec, SimulatorConfig::default())?;
//! sim.set_stimulus(|_trial: u64, _cycle: u32, _input: usize, out: &mut [i32]| out.fill(S14_ONE / 2));
//! let summary = sim.run()?;
//! println!("{} cycles", summary.cycles);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Crates
//!
//! - [`config`]: TOML run configuration with environment and CLI overrides
//! - [`observability`]: logging init and `--debug-{crate}` flags
//! - [`neural`]: fixed-point formats, seeded generator, response functions
//! - [`plasticity`]: per-synapse decay and amplification rules
//! - [`engine`]: populations, geometric blocks, cycle engine, orchestrator

use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use tracing::info;

pub use neurosim_config as config;
pub use neurosim_npu_cycle_engine as engine;
pub use neurosim_npu_neural as neural;
pub use neurosim_npu_plasticity as plasticity;
pub use neurosim_observability as observability;

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude - commonly used types and traits
pub mod prelude {
    pub use crate::config::{LimitsConfig, RunConfig, SimulatorConfig};
    pub use crate::engine::{
        Boundary, CancelToken, ConnectionSpec, CoreError, CycleInputs, ErrorReporter, Generation,
        GeometricSpec, GridShape, ModulationSpec, Network, NetworkSpec, PopulationSpec, Probe,
        RunSummary, Simulator, SourceRef, StatsReport, StimulusSource, TracingErrorReporter,
        VirtualInputSpec,
    };
    pub use crate::neural::{
        PopulationId, ResponseFunction, Seed, S14_ONE, S16_ONE, S20_ONE, WEIGHT_MAX, WEIGHT_MIN,
    };
    pub use crate::plasticity::{AmplificationRule, DecayRule, PlasticityRule};
}

/// Logging settings for a run configuration.
pub fn logging_settings(config: &config::SimulatorConfig) -> observability::LoggingSettings {
    observability::LoggingSettings {
        level: config.system.log_level.clone(),
        file_logging: config.logging.file_logging,
        log_dir: config.logging.log_dir.clone(),
        ..observability::LoggingSettings::default()
    }
}

/// Debug flags for a run configuration: `system.debug` turns on every crate,
/// on top of whatever the process arguments and `NEUROSIM_DEBUG` select.
pub fn debug_flags(config: &config::SimulatorConfig) -> observability::CrateDebugFlags {
    let mut flags = observability::parse_debug_flags();
    if config.system.debug {
        flags.enable_all();
    }
    flags
}

/// Load and validate a run configuration.
///
/// Without an explicit `path`, a missing `neurosim_configuration.toml`
/// falls back to the defaults; environment and CLI overrides still apply.
///
/// # Errors
/// Fails if the file cannot be read or parsed, or a value is out of range.
pub fn load_run_config(
    path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> anyhow::Result<config::SimulatorConfig> {
    let config = match config::load_config(path, cli_args) {
        Err(config::ConfigError::FileNotFound(searched)) if path.is_none() => {
            info!("No configuration file found, using defaults. Searched: {}", searched);
            let mut config = config::SimulatorConfig::default();
            config::apply_environment_overrides(&mut config);
            if let Some(cli) = cli_args {
                config::apply_cli_overrides(&mut config, cli);
            }
            config
        }
        result => result.context("Failed to load configuration")?,
    };
    config::validate_config(&config).context("Invalid configuration")?;
    info!(
        "Loaded configuration: {} workers, {} trials x {} cycles, seed {}",
        config.system.workers, config.run.trials, config.run.cycles_per_trial, config.run.base_seed
    );
    Ok(config)
}
