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

//! # Configuration Pipeline Tests
//!
//! A run configured from a TOML file plus CLI overrides, all the way to the
//! statistics it produces.

use std::collections::HashMap;
use std::fs;

use neurosim::load_run_config;
use neurosim::prelude::*;
use tempfile::tempdir;

const RUN_TOML: &str = r#"
[system]
workers = 3
log_level = "debug"

[run]
cycles_per_trial = 4
trials = 6
stats_interval_trials = 2
base_seed = 777

[limits]
max_delay = 8

[logging]
warn_on_overflow = false
"#;

fn small_network() -> NetworkSpec {
    let grid = GridShape::new(4, 4, 2);
    let mut pop = PopulationSpec::new("layer", grid, ResponseFunction::Knee(Default::default()));
    pop.connections.push(ConnectionSpec::new(
        SourceRef::Virtual(0),
        Generation::Topographic { radius: 1 },
    ));
    NetworkSpec {
        populations: vec![pop],
        virtual_inputs: vec![VirtualInputSpec::new("input", GridShape::new(4, 4, 1))],
    }
}

#[test]
fn test_file_values_and_cli_overrides() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("neurosim_configuration.toml");
    fs::write(&path, RUN_TOML).unwrap();

    let mut cli = HashMap::new();
    cli.insert("trials".to_string(), "4".to_string());
    let config = load_run_config(Some(&path), Some(&cli)).unwrap();

    assert_eq!(config.system.workers, 3);
    assert_eq!(config.system.log_level, "debug");
    assert_eq!(config.run.cycles_per_trial, 4);
    assert_eq!(config.run.trials, 4);
    assert_eq!(config.run.base_seed, 777);
    assert_eq!(config.limits.max_delay, 8);
    assert!(!config.logging.warn_on_overflow);
    // Untouched sections keep their defaults
    assert_eq!(config.limits.max_bands, LimitsConfig::default().max_bands);
}

#[test]
fn test_invalid_file_lists_violations() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, "[system]\nworkers = 0\n\n[run]\ncycles_per_trial = 0\n").unwrap();

    let err = load_run_config(Some(&path), None).unwrap_err();
    let message = format!("{:#}", err);
    assert!(message.contains("system.workers"), "{}", message);
    assert!(message.contains("run.cycles_per_trial"), "{}", message);
}

#[test]
fn test_malformed_toml_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    fs::write(&path, "[run\ntrials = ").unwrap();
    assert!(load_run_config(Some(&path), None).is_err());
}

#[test]
fn test_configured_run_collects_stats_every_two_trials() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("neurosim_configuration.toml");
    fs::write(&path, RUN_TOML).unwrap();
    let config = load_run_config(Some(&path), None).unwrap();

    let mut sim = Simulator::build(small_network(), config).unwrap();
    sim.set_stimulus(|_trial: u64, _cycle: u32, _input: usize, out: &mut [i32]| out.fill(S14_ONE));
    let summary = sim.run().unwrap();

    assert_eq!(summary.trials, 6);
    assert_eq!(summary.cycles, 24);
    assert!(!summary.cancelled);
    let trials: Vec<u64> = summary.stats.iter().map(|s| s.trial).collect();
    assert_eq!(trials, vec![2, 4, 6]);
    for report in &summary.stats {
        let layer = &report.populations[0];
        // 32 cells x 4 cycles x 2 trials
        assert_eq!(layer.cells, 256);
        assert_eq!(layer.connection_afference.len(), 1);
        assert!(layer.fired > 0);
    }
}
