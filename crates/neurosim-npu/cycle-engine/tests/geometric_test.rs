// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Geometric Block Tests
//!
//! Band sums as a population sees them after a full cycle.

use neurosim_config::LimitsConfig;
use neurosim_npu_cycle_engine::geometric::Boundary;
use neurosim_npu_cycle_engine::*;
use neurosim_npu_neural::models::StepParams;
use neurosim_npu_neural::{BlockId, PopulationId, ResponseFunction, S16_ONE};

fn single_block(input: GridShape, target: GridShape, block: GeometricSpec) -> NetworkSpec {
    let mut pop = PopulationSpec::new(
        "inhibited",
        target,
        ResponseFunction::Step(StepParams::default()),
    );
    pop.geometric.push(block);
    NetworkSpec {
        populations: vec![pop],
        virtual_inputs: vec![VirtualInputSpec::new("input", input)],
    }
}

fn step_once(net: &mut Network, values: &[i32]) {
    net.present(0, values).unwrap();
    let pool = rayon::ThreadPoolBuilder::new().num_threads(1).build().unwrap();
    net.step(&pool, 1, &CycleInputs::default());
}

fn bands(net: &Network, group: usize) -> Vec<i64> {
    net.band_values(PopulationId(0), BlockId(0), group)
        .unwrap()
        .to_vec()
}

#[test]
fn test_torus_4x4_uniform_value() {
    let grid = GridShape::new(4, 4, 1);
    let spec = GeometricSpec::new(
        SourceRef::Virtual(0),
        vec![1],
        vec![0, 0],
        Boundary::Torus,
    );
    let mut net = Network::build(single_block(grid, grid, spec), &LimitsConfig::default(), 1).unwrap();
    step_once(&mut net, &[100; 16]);
    for g in 0..16 {
        assert_eq!(bands(&net, g), vec![100, 800], "group {}", g);
        assert_eq!(bands(&net, g).iter().sum::<i64>(), 900);
    }
}

#[test]
fn test_interior_band0_is_member_sum() {
    let grid = GridShape::new(5, 5, 3);
    let spec = GeometricSpec::new(
        SourceRef::Virtual(0),
        vec![1, 2],
        vec![0, 0, 0],
        Boundary::Zero,
    );
    let values: Vec<i32> = (0..75).map(|i| (i * 131 % 900) as i32 - 200).collect();
    let mut net = Network::build(single_block(grid, grid, spec), &LimitsConfig::default(), 1).unwrap();
    step_once(&mut net, &values);
    for (x, y) in [(1, 1), (2, 2), (3, 1), (2, 3)] {
        let g = grid.group_index(x, y);
        let members: i64 = values[grid.members(g)].iter().map(|&v| v as i64).sum();
        assert_eq!(bands(&net, g)[0], members);
    }
}

#[test]
fn test_total_minus_inner_identity_every_cycle() {
    let grid = GridShape::new(5, 5, 2);
    let mut spec = GeometricSpec::new(
        SourceRef::Virtual(0),
        vec![1, 2],
        vec![0, 0, 0],
        Boundary::Zero,
    );
    spec.total_minus_inner = true;
    let mut net = Network::build(single_block(grid, grid, spec), &LimitsConfig::default(), 1).unwrap();
    for cycle in 0..4 {
        let values: Vec<i32> = (0..50).map(|i| ((i * 37 + cycle * 11) % 300) as i32).collect();
        let total: i64 = values.iter().map(|&v| v as i64).sum();
        step_once(&mut net, &values);
        for g in 0..grid.group_count() {
            assert_eq!(bands(&net, g).iter().sum::<i64>(), total, "cycle {} group {}", cycle, g);
        }
    }
}

#[test]
fn test_total_minus_inner_rejects_edge_boundary() {
    let grid = GridShape::new(5, 5, 1);
    for boundary in [Boundary::Edge, Boundary::Mirror, Boundary::Noise { amplitude: 10 }] {
        let mut spec = GeometricSpec::new(SourceRef::Virtual(0), vec![1], vec![0, 0], boundary);
        spec.total_minus_inner = true;
        let err = Network::build(single_block(grid, grid, spec), &LimitsConfig::default(), 1).unwrap_err();
        assert_eq!(err.code(), 10, "{:?}", boundary);
    }
}

#[test]
fn test_band_range_reports_block() {
    let grid = GridShape::new(4, 4, 1);
    let spec = GeometricSpec::new(SourceRef::Virtual(0), vec![3], vec![0, 0], Boundary::Torus);
    let err = Network::build(single_block(grid, grid, spec), &LimitsConfig::default(), 1).unwrap_err();
    assert_eq!(
        err,
        CoreError::BandRange {
            population: PopulationId(0),
            block: BlockId(0),
            radius: 3,
            limit: 2
        }
    );
}

#[test]
fn test_lateral_inhibition_lowers_response() {
    let input = GridShape::new(3, 3, 1);
    let mut plain = PopulationSpec::new("plain", input, ResponseFunction::Step(StepParams::default()));
    plain.connections.push(ConnectionSpec::new(
        SourceRef::Virtual(0),
        Generation::Topographic { radius: 0 },
    ));
    let mut inhibited = plain.clone();
    inhibited.name = "inhibited".into();
    inhibited.geometric.push(GeometricSpec::new(
        SourceRef::Virtual(0),
        vec![1],
        vec![0, -S16_ONE / 4],
        Boundary::Zero,
    ));
    let spec = NetworkSpec {
        populations: vec![plain, inhibited],
        virtual_inputs: vec![VirtualInputSpec::new("input", input)],
    };
    let mut net = Network::build(spec, &LimitsConfig::default(), 1).unwrap();
    step_once(&mut net, &[neurosim_npu_neural::S14_ONE; 9]);
    let center = input.group_index(1, 1);
    let a = net.response(PopulationId(0), center).unwrap();
    let b = net.response(PopulationId(1), center).unwrap();
    assert!(a > 0);
    assert!(b < a, "inhibited {} vs plain {}", b, a);
}
