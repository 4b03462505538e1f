// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Read-only access for visualization, by stable cell and group index.

use neurosim_npu_neural::{BlockId, PopulationId};

pub trait VisualizationSource {
    fn population_count(&self) -> usize;

    fn cell_count(&self, population: PopulationId) -> Option<usize>;

    /// Latest stored response (S14)
    fn response(&self, population: PopulationId, cell: usize) -> Option<i32>;

    /// Raw bands of one source group of a geometric block
    fn band_values(&self, population: PopulationId, block: BlockId, group: usize) -> Option<&[i64]>;

    /// Consolidated afference of the last cycle: excitatory, hyperpolarizing,
    /// squared, shunting (S20)
    fn afference(&self, population: PopulationId, cell: usize) -> Option<[i32; 4]>;
}
