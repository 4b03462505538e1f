// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # Box-Sum Benchmarks
//!
//! Strip-sum ring growth should scale with rings x groups. Compares ring
//! counts on one grid, every boundary policy, and the exact-disc mode.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ndarray::Array2;

use neurosim_npu_cycle_engine::geometric::{BandMode, Boundary, BoxSumPlan, Reduction};
use neurosim_npu_neural::Seed;

fn grid(gx: usize, gy: usize) -> Array2<i64> {
    Array2::from_shape_fn((gy, gx), |(y, x)| ((x * 31 + y * 17) % 97) as i64)
}

fn bench_ring_count(c: &mut Criterion) {
    let (gx, gy) = (128usize, 128usize);
    let values = grid(gx, gy);
    let mut group = c.benchmark_group("boxsum_rings");
    group.throughput(Throughput::Elements((gx * gy) as u64));
    for rings in [1u32, 4, 16, 32] {
        let radii: Vec<u32> = (1..=rings).map(|r| r * 2).collect();
        let plan = BoxSumPlan::new(
            gx as u32,
            gy as u32,
            &radii,
            Boundary::Zero,
            BandMode::Square,
            Reduction::Sum,
            false,
        )
        .unwrap();
        let mut out = Array2::zeros((gx * gy, plan.band_count()));
        let mut seed = Seed::new(7);
        group.bench_with_input(BenchmarkId::from_parameter(rings), &rings, |b, _| {
            b.iter(|| plan.compute(black_box(values.view()), &mut seed, &mut out))
        });
    }
    group.finish();
}

fn bench_boundaries(c: &mut Criterion) {
    let (gx, gy) = (64usize, 64usize);
    let values = grid(gx, gy);
    let radii = [1u32, 3, 6, 12];
    let mut group = c.benchmark_group("boxsum_boundary");
    for (name, boundary) in [
        ("zero", Boundary::Zero),
        ("normalize", Boundary::Normalize),
        ("noise", Boundary::Noise { amplitude: 64 }),
        ("edge", Boundary::Edge),
        ("mirror", Boundary::Mirror),
        ("torus", Boundary::Torus),
    ] {
        let plan = BoxSumPlan::new(
            gx as u32,
            gy as u32,
            &radii,
            boundary,
            BandMode::Square,
            Reduction::Sum,
            false,
        )
        .unwrap();
        let mut out = Array2::zeros((gx * gy, plan.band_count()));
        let mut seed = Seed::new(11);
        group.bench_function(name, |b| {
            b.iter(|| plan.compute(black_box(values.view()), &mut seed, &mut out))
        });
    }
    group.finish();
}

fn bench_disc(c: &mut Criterion) {
    let (gx, gy) = (64usize, 64usize);
    let values = grid(gx, gy);
    let plan = BoxSumPlan::new(
        gx as u32,
        gy as u32,
        &[2, 4, 8],
        Boundary::Zero,
        BandMode::Disc {
            aspect_x: 1,
            aspect_y: 1,
        },
        Reduction::Sum,
        false,
    )
    .unwrap();
    let mut out = Array2::zeros((gx * gy, plan.band_count()));
    let mut seed = Seed::new(5);
    c.bench_function("boxsum_disc_64", |b| {
        b.iter(|| plan.compute(black_box(values.view()), &mut seed, &mut out))
    });
}

criterion_group!(benches, bench_ring_count, bench_boundaries, bench_disc);
criterion_main!(benches);
