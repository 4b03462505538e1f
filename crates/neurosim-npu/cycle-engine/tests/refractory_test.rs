// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Refractory Gating Tests
//!
//! While the refractory timer runs, the stored response is the decaying
//! after-hyperpolarization value and never the evaluated response.

use neurosim_config::SimulatorConfig;
use neurosim_npu_cycle_engine::model::WeightInit;
use neurosim_npu_cycle_engine::*;
use neurosim_npu_neural::models::{AfterHyperpolarization, Depression, StepParams};
use neurosim_npu_neural::{OverflowCounter, PopulationId, RefractoryState, ResponseFunction, S14_ONE, S16_ONE};

fn spec(refractory: Option<AfterHyperpolarization>) -> NetworkSpec {
    let grid = GridShape::new(1, 1, 1);
    let mut pop = PopulationSpec::new("cell", grid, ResponseFunction::Step(StepParams::default()));
    pop.refractory = refractory;
    let mut conn = ConnectionSpec::new(SourceRef::Virtual(0), Generation::Full);
    conn.weights = WeightInit::Constant {
        value: (S14_ONE / 2) as i16,
    };
    pop.connections.push(conn);
    NetworkSpec {
        populations: vec![pop],
        virtual_inputs: vec![VirtualInputSpec::new("drive", grid)],
    }
}

fn responses(spec: NetworkSpec, cycles: u32) -> Vec<i32> {
    let mut config = SimulatorConfig::default();
    config.run.cycles_per_trial = cycles;
    let mut sim = Simulator::build(spec, config).unwrap();
    sim.set_stimulus(|_: u64, _: u32, _: usize, out: &mut [i32]| out.fill(S14_ONE));
    let rec = sim.record(PopulationId(0), vec![0]).unwrap();
    sim.run().unwrap();
    sim.recordings()[rec].samples.clone()
}

#[test]
fn test_without_refractory_fires_every_cycle() {
    assert_eq!(responses(spec(None), 5), vec![S14_ONE / 2; 5]);
}

#[test]
fn test_refractory_substitutes_decaying_value() {
    let ahp = AfterHyperpolarization {
        period: 3,
        amplitude: -4000,
        decay: S16_ONE / 2,
    };
    let fired = S14_ONE / 2;
    assert_eq!(
        responses(spec(Some(ahp)), 9),
        vec![fired, -4000, -2000, -1000, fired, -4000, -2000, -1000, fired]
    );
}

#[test]
fn test_substituted_values_follow_refractory_formula() {
    let ahp = AfterHyperpolarization {
        period: 4,
        amplitude: -3277,
        decay: S16_ONE * 3 / 5,
    };
    let mut state = RefractoryState::default();
    let mut ov = OverflowCounter::new();
    ahp.start(&mut state);
    let expected: Vec<i32> = (0..4).map(|_| ahp.step(&mut state, &mut ov)).collect();

    let mut s = spec(Some(ahp));
    // depression acts on evaluated responses only
    s.populations[0].depression = Some(Depression {
        rate: S16_ONE / 2,
        recovery: S16_ONE / 8,
    });
    let got = responses(s, 5);
    assert_eq!(&got[1..5], &expected[..]);
}

#[test]
fn test_amplitude_outside_range_is_rejected() {
    let ahp = AfterHyperpolarization {
        period: 2,
        amplitude: -2 * S14_ONE,
        decay: S16_ONE / 2,
    };
    let err = Network::build(
        spec(Some(ahp)),
        &neurosim_config::LimitsConfig::default(),
        1,
    )
    .unwrap_err();
    assert_eq!(err.code(), 10);
}

#[test]
fn test_substituted_values_are_clamped_to_response_range() {
    let ahp = AfterHyperpolarization {
        period: 3,
        amplitude: S14_ONE / 5,
        decay: S16_ONE / 4,
    };
    let mut s = spec(Some(ahp));
    s.populations[0].response_min = S14_ONE / 10;
    let floor = S14_ONE / 10;
    let fired = S14_ONE / 2;
    // the decayed values 819 and 205 sit below the floor
    assert_eq!(
        responses(s, 5),
        vec![fired, S14_ONE / 5, floor, floor, fired]
    );
}
