// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Statistics Transport Tests
//!
//! Ranks run as threads of one process; only the root keeps the reduced
//! records.

use std::thread;

use neurosim_config::SimulatorConfig;
use neurosim_npu_cycle_engine::*;
use neurosim_npu_neural::models::StepParams;
use neurosim_npu_neural::{ResponseFunction, S14_ONE};

fn simulator(rank: usize) -> Simulator {
    let grid = GridShape::new(3, 2, 2);
    let mut pop = PopulationSpec::new("relay", grid, ResponseFunction::Step(StepParams::default()));
    pop.connections.push(ConnectionSpec::new(
        SourceRef::Virtual(0),
        Generation::Topographic { radius: 0 },
    ));
    let spec = NetworkSpec {
        populations: vec![pop],
        virtual_inputs: vec![VirtualInputSpec::new("input", grid)],
    };
    let mut config = SimulatorConfig::default();
    config.run.trials = 4;
    config.run.cycles_per_trial = 3;
    config.run.stats_interval_trials = 2;
    let mut sim = Simulator::build(spec, config).unwrap();
    let level = if rank == 0 { S14_ONE } else { S14_ONE / 2 };
    sim.set_stimulus(move |_: u64, _: u32, _: usize, out: &mut [i32]| out.fill(level));
    sim
}

#[test]
fn test_root_receives_reduced_statistics() {
    let handles: Vec<_> = InProcessTransport::group(3)
        .into_iter()
        .map(|transport| {
            thread::spawn(move || {
                let rank = transport.rank();
                let mut sim = simulator(rank);
                sim.set_transport(transport);
                (rank, sim.run().unwrap())
            })
        })
        .collect();

    for handle in handles {
        let (rank, summary) = handle.join().unwrap();
        assert_eq!(summary.trials, 4);
        if rank != 0 {
            assert!(summary.stats.is_empty());
            continue;
        }
        assert_eq!(summary.stats.len(), 2);
        let stats = &summary.stats[1].populations[0];
        // 3 ranks x 12 cells x 3 cycles x 2 trials
        assert_eq!(stats.cells, 216);
        // weight 1/4: rank 0 stores 1/4, the others 1/8
        assert_eq!(stats.response_max, S14_ONE / 4);
        assert_eq!(stats.response_min, S14_ONE / 8);
        assert_eq!(stats.fired, 216);
    }
}

#[test]
fn test_local_transport_keeps_every_epoch() {
    let summary = simulator(0).run().unwrap();
    assert_eq!(summary.stats.len(), 2);
    assert_eq!(summary.stats[0].trial, 2);
    assert_eq!(summary.stats[1].trial, 4);
    assert_eq!(summary.stats[0].populations[0].cells, 72);
}
