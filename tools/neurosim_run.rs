// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Demo runner: a retina driving one laterally inhibited layer.
//!
//! Reads `neurosim_configuration.toml` (or `--config <path>`), applies
//! `--workers`, `--trials`, `--cycles`, `--seed` overrides, and honors the
//! `--debug-{crate}` flags.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::process;

use neurosim::prelude::*;
use neurosim::{debug_flags, load_run_config, logging_settings, observability};
use tracing::info;

const RETINA_SIDE: u32 = 16;

fn usage_and_exit() -> ! {
    eprintln!(
        "Usage: neurosim_run [--config <path>] [--workers N] [--trials N] [--cycles N] [--seed N]\n\n{}",
        observability::debug_flags_help()
    );
    process::exit(2);
}

fn parse_args() -> (Option<PathBuf>, HashMap<String, String>) {
    let mut config_path = None;
    let mut overrides = HashMap::new();

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        let key = match arg.as_str() {
            "--config" => {
                let v = args.next().unwrap_or_else(|| usage_and_exit());
                config_path = Some(PathBuf::from(v));
                continue;
            }
            "--workers" => "workers",
            "--trials" => "trials",
            "--cycles" => "cycles_per_trial",
            "--seed" => "seed",
            "-h" | "--help" => usage_and_exit(),
            other if other.starts_with("--debug-") => continue,
            other => {
                eprintln!("Unknown argument: {other}");
                usage_and_exit();
            }
        };
        let v = args.next().unwrap_or_else(|| usage_and_exit());
        overrides.insert(key.to_string(), v);
    }

    (config_path, overrides)
}

fn demo_network() -> NetworkSpec {
    let retina = GridShape::new(RETINA_SIDE, RETINA_SIDE, 1);
    let layer = GridShape::new(RETINA_SIDE, RETINA_SIDE, 2);

    let mut v1 = PopulationSpec::new("v1", layer, ResponseFunction::Knee(Default::default()));
    let mut feed = ConnectionSpec::new(SourceRef::Virtual(0), Generation::Topographic { radius: 1 });
    feed.plasticity = PlasticityRule {
        decay: DecayRule::Exponential { rate: S16_ONE / 256 },
        amplification: AmplificationRule::Hebbian {
            rate: S16_ONE / 32,
            mti: S14_ONE / 8,
            mtj: S14_ONE / 8,
            value_modulated: false,
        },
        freeze_cycles: 2,
    };
    v1.connections.push(feed);
    v1.geometric.push(GeometricSpec::new(
        SourceRef::Population(PopulationId(0)),
        vec![1, 3],
        vec![0, -S16_ONE / 8, -S16_ONE / 32],
        Boundary::Torus,
    ));

    NetworkSpec {
        populations: vec![v1],
        virtual_inputs: vec![VirtualInputSpec::new("retina", retina)],
    }
}

/// Vertical bar sweeping one column per cycle.
fn moving_bar(trial: u64, cycle: u32, _input: usize, out: &mut [i32]) {
    let column = ((trial + cycle as u64) % RETINA_SIDE as u64) as usize;
    for (i, v) in out.iter_mut().enumerate() {
        *v = if i % RETINA_SIDE as usize == column { S14_ONE } else { 0 };
    }
}

fn main() {
    let (config_path, overrides) = parse_args();
    let config = match load_run_config(config_path.as_deref(), Some(&overrides)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e:#}");
            process::exit(2);
        }
    };

    let _guard = match observability::init_logging(&debug_flags(&config), &logging_settings(&config)) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            process::exit(2);
        }
    };

    let reporter = TracingErrorReporter::default();
    let mut sim = match Simulator::build(demo_network(), config) {
        Ok(sim) => sim,
        Err(e) => reporter.abort(&e.report()),
    };
    sim.set_stimulus(moving_bar);

    let summary = sim.run_or_abort(&reporter);
    info!(
        "Demo finished: {} trials, {} cycles, {} overflows",
        summary.trials, summary.cycles, summary.overflow
    );
}
