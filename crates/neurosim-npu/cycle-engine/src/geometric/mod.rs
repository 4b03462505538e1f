// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Geometric (box-sum) afference: boundary padding, concentric band sums
//! and the per-population blocks that turn bands into afference.

pub mod block;
pub mod boxsum;
pub mod disc;
pub mod grid;

pub use block::{GeometricBlock, GeometricSpec};
pub use boxsum::{BandError, BandMode, BoxSumPlan, Reduction};
pub use disc::DiscOffsets;
pub use grid::Boundary;
