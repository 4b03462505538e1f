// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Save/Restore Tests

use neurosim_config::SimulatorConfig;
use neurosim_npu_cycle_engine::model::WeightInit;
use neurosim_npu_cycle_engine::*;
use neurosim_npu_neural::models::TanhParams;
use neurosim_npu_neural::{ConnectionId, PopulationId, ResponseFunction, S14_ONE, S16_ONE};
use neurosim_npu_plasticity::{AmplificationRule, PlasticityRule};

fn simulator() -> Simulator {
    let input = GridShape::new(4, 4, 1);
    let grid = GridShape::new(2, 2, 3);
    let mut pop = PopulationSpec::new("layer", grid, ResponseFunction::Tanh(TanhParams::default()));
    let mut conn = ConnectionSpec::new(
        SourceRef::Virtual(0),
        Generation::Random {
            count: 5,
            allow_self: false,
        },
    );
    conn.weights = WeightInit::Uniform {
        min: -(S14_ONE / 4) as i16,
        max: (S14_ONE / 2) as i16,
    };
    conn.plasticity = PlasticityRule {
        amplification: AmplificationRule::Hebbian {
            rate: S16_ONE / 2,
            mti: S14_ONE / 4,
            mtj: 0,
            value_modulated: false,
        },
        ..PlasticityRule::default()
    };
    pop.connections.push(conn);
    let spec = NetworkSpec {
        populations: vec![pop],
        virtual_inputs: vec![VirtualInputSpec::new("input", input)],
    };
    let mut sim = Simulator::build(spec, SimulatorConfig::default()).unwrap();
    sim.set_stimulus(|_: u64, cycle: u32, _: usize, out: &mut [i32]| {
        for (i, v) in out.iter_mut().enumerate() {
            *v = ((i as i32 * 3 + cycle as i32) % 5) * S14_ONE / 4;
        }
    });
    sim
}

fn state(net: &Network) -> (Vec<i32>, Vec<i16>) {
    let pop = &net.populations()[0];
    (pop.responses().collect(), pop.connections[0].weights().collect())
}

#[test]
fn test_restore_returns_saved_state() {
    let layout = BufferLayout {
        leading_skip: 8,
        record_padding: 2,
    };
    let mut sim = simulator();
    for cycle in 0..4 {
        sim.step_cycle(cycle).unwrap();
    }
    let mut store = BufferStore::new();
    sim.network().save(&mut store, &layout).unwrap();
    assert_eq!(store.len(), 2);
    let saved = state(sim.network());

    for cycle in 4..9 {
        sim.step_cycle(cycle).unwrap();
    }
    assert_ne!(state(sim.network()), saved);

    sim.network_mut().restore(&store, &layout).unwrap();
    assert_eq!(state(sim.network()), saved);
    // delayed reads see the restored responses too
    let history = sim.network().history(SourceRef::Population(PopulationId(0)));
    assert_eq!(history.latest(), &saved.0[..]);
}

#[test]
fn test_restore_into_fresh_network() {
    let mut a = simulator();
    for cycle in 0..3 {
        a.step_cycle(cycle).unwrap();
    }
    let mut store = BufferStore::new();
    a.network().save(&mut store, &BufferLayout::PACKED).unwrap();

    let mut b = simulator();
    b.network_mut().restore(&store, &BufferLayout::PACKED).unwrap();
    assert_eq!(state(b.network()), state(a.network()));
}

#[test]
fn test_buffer_errors_name_the_array() {
    let sim = simulator();
    let mut small = [0u8; 4];
    let err = sim
        .network()
        .write_weights(PopulationId(0), ConnectionId(0), &mut small, &BufferLayout::PACKED)
        .unwrap_err();
    assert_eq!(err.code(), 30);
    assert!(err.to_string().contains("layer"));

    let mut sim = simulator();
    let err = sim
        .network_mut()
        .restore(&BufferStore::new(), &BufferLayout::PACKED)
        .unwrap_err();
    assert_eq!(err.code(), 30);
}

#[test]
fn test_packed_response_bytes() {
    let mut sim = simulator();
    sim.step_cycle(0).unwrap();
    let net = sim.network();
    let mut buf = vec![0u8; 12 * 4];
    let used = net
        .write_responses(PopulationId(0), &mut buf, &BufferLayout::PACKED)
        .unwrap();
    assert_eq!(used, 48);
    let first = net.populations()[0].cells[0].response;
    assert_eq!(&buf[..4], &first.to_le_bytes());
}

#[test]
fn test_restored_weight_below_signed_range_is_rejected() {
    let mut sim = simulator();
    let before = state(sim.network());
    let synapses = sim.network().populations()[0].connections[0].total_synapses();
    assert!(synapses > 3);
    let mut buf = vec![0u8; synapses * 2];
    sim.network()
        .write_weights(PopulationId(0), ConnectionId(0), &mut buf, &BufferLayout::PACKED)
        .unwrap();
    buf[6..8].copy_from_slice(&i16::MIN.to_le_bytes());

    let err = sim
        .network_mut()
        .read_weights(PopulationId(0), ConnectionId(0), &buf, &BufferLayout::PACKED)
        .unwrap_err();
    assert_eq!(err.code(), 30);
    assert!(err.to_string().contains("synapse 3"), "{}", err);
    assert_eq!(state(sim.network()), before);
}
