// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Cell populations: configuration records, per-cell state and the runtime
//! container the cycle engine mutates.

use serde::{Deserialize, Serialize};

use neurosim_npu_neural::{
    AfterHyperpolarization, CellModelState, Depression, PopulationId, RefractoryState,
    ResponseFunction, Seed, S14_ONE, S16_ONE,
};

use crate::cell::autoscale::{AutoscaleSpec, AutoscaleState};
use crate::cell::phase::PhaseSpec;
use crate::error::{CoreError, Result};
use crate::model::connection::{Connection, ConnectionSpec};
use crate::geometric::block::{GeometricBlock, GeometricSpec};
use crate::model::modulation::{ModulationBlock, ModulationSpec};

/// 2-D arrangement of groups; cells are stored group-major.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridShape {
    pub groups_x: u32,
    pub groups_y: u32,
    pub cells_per_group: u32,
}

impl GridShape {
    pub const fn new(groups_x: u32, groups_y: u32, cells_per_group: u32) -> Self {
        Self {
            groups_x,
            groups_y,
            cells_per_group,
        }
    }

    #[inline]
    pub fn group_count(&self) -> usize {
        self.groups_x as usize * self.groups_y as usize
    }

    #[inline]
    pub fn cell_count(&self) -> usize {
        self.group_count() * self.cells_per_group as usize
    }

    #[inline]
    pub fn group_of(&self, cell: usize) -> usize {
        cell / self.cells_per_group.max(1) as usize
    }

    /// `(x, y)` of a row-major group index
    #[inline]
    pub fn group_xy(&self, group: usize) -> (u32, u32) {
        let gx = self.groups_x.max(1) as usize;
        ((group % gx) as u32, (group / gx) as u32)
    }

    #[inline]
    pub fn group_index(&self, x: u32, y: u32) -> usize {
        y as usize * self.groups_x as usize + x as usize
    }

    /// Cells of one group
    pub fn members(&self, group: usize) -> std::ops::Range<usize> {
        let cpg = self.cells_per_group as usize;
        group * cpg..(group + 1) * cpg
    }

    /// Group of this grid at the same relative position as `group` of `target`.
    pub fn map_group_from(&self, target: &GridShape, group: usize) -> usize {
        let (tx, ty) = target.group_xy(group);
        let sx = tx as u64 * self.groups_x as u64 / target.groups_x.max(1) as u64;
        let sy = ty as u64 * self.groups_y as u64 / target.groups_y.max(1) as u64;
        self.group_index(sx as u32, sy as u32)
    }
}

/// Where an afferent stream comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceRef {
    Population(PopulationId),
    /// Externally driven input, by index into the network's virtual inputs
    Virtual(u16),
}

/// Gaussian noise added to the drive of every cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoiseSpec {
    /// Per-cell per-cycle probability (S16)
    pub probability: i32,
    /// Standard deviation (S20)
    pub sigma: i32,
}

/// Scale of the excitatory total as a linear function of the previous
/// response: `clamp(offset + slope * s, 0, max)` (all S16).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoltageRescale {
    pub offset: i32,
    pub slope: i32,
    pub max: i32,
}

/// Smoothing of the fast and slow running averages (S16 omega)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunningAverages {
    pub fast_omega: i32,
    pub slow_omega: i32,
}

impl Default for RunningAverages {
    fn default() -> Self {
        Self {
            fast_omega: S16_ONE / 2,
            slow_omega: S16_ONE / 16,
        }
    }
}

/// After a response at or above `threshold`, amplification stays frozen
/// for `period` cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmplificationRefractory {
    pub threshold: i32,
    pub period: u16,
}

/// Everything configurable about one population
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationSpec {
    pub name: String,
    pub grid: GridShape,
    pub response: ResponseFunction,
    /// Stored responses are clamped to `[response_min, response_max]` (S14)
    #[serde(default = "default_response_min")]
    pub response_min: i32,
    #[serde(default = "default_response_max")]
    pub response_max: i32,
    #[serde(default)]
    pub refractory: Option<AfterHyperpolarization>,
    #[serde(default)]
    pub depression: Option<Depression>,
    /// Fraction of the previous response carried into the drive (S16)
    #[serde(default)]
    pub persistence: i32,
    #[serde(default)]
    pub noise: Option<NoiseSpec>,
    /// Magnitude cap on the consolidated afference (S20)
    #[serde(default = "default_afference_cap")]
    pub afference_cap: i32,
    #[serde(default)]
    pub voltage_rescale: Option<VoltageRescale>,
    #[serde(default)]
    pub phase: Option<PhaseSpec>,
    #[serde(default)]
    pub averages: RunningAverages,
    #[serde(default)]
    pub amplification_refractory: Option<AmplificationRefractory>,
    #[serde(default)]
    pub autoscale: Option<AutoscaleSpec>,
    #[serde(default)]
    pub connections: Vec<ConnectionSpec>,
    #[serde(default)]
    pub geometric: Vec<GeometricSpec>,
    #[serde(default)]
    pub modulation: Vec<ModulationSpec>,
}

fn default_response_min() -> i32 {
    -S14_ONE
}

fn default_response_max() -> i32 {
    S14_ONE
}

fn default_afference_cap() -> i32 {
    i32::MAX
}

impl PopulationSpec {
    pub fn new(name: impl Into<String>, grid: GridShape, response: ResponseFunction) -> Self {
        Self {
            name: name.into(),
            grid,
            response,
            response_min: default_response_min(),
            response_max: default_response_max(),
            refractory: None,
            depression: None,
            persistence: 0,
            noise: None,
            afference_cap: default_afference_cap(),
            voltage_rescale: None,
            phase: None,
            averages: RunningAverages::default(),
            amplification_refractory: None,
            autoscale: None,
            connections: Vec::new(),
            geometric: Vec::new(),
            modulation: Vec::new(),
        }
    }

    /// Range checks that need nothing but the record itself.
    pub fn validate(&self, id: PopulationId) -> Result<()> {
        let config = |message: String| CoreError::Config {
            population: id,
            message,
        };
        self.response
            .validate()
            .map_err(|source| CoreError::Model { population: id, source })?;
        if let Some(r) = &self.refractory {
            r.validate().map_err(|source| CoreError::Model { population: id, source })?;
        }
        if let Some(d) = &self.depression {
            d.validate().map_err(|source| CoreError::Model { population: id, source })?;
        }
        if self.grid.group_count() == 0 || self.grid.cells_per_group == 0 {
            return Err(config(format!("{}: empty grid {:?}", self.name, self.grid)));
        }
        if self.response_min > self.response_max {
            return Err(config(format!(
                "{}: response range [{}, {}] is empty",
                self.name, self.response_min, self.response_max
            )));
        }
        if self.afference_cap <= 0 {
            return Err(config(format!("{}: afference cap must be positive", self.name)));
        }
        if !(0..=S16_ONE).contains(&self.persistence) {
            return Err(config(format!("{}: persistence must be in [0, 1]", self.name)));
        }
        for (what, omega) in [
            ("fast", self.averages.fast_omega),
            ("slow", self.averages.slow_omega),
        ] {
            if !(0..=S16_ONE).contains(&omega) {
                return Err(config(format!("{}: {} omega must be in [0, 1]", self.name, what)));
            }
        }
        if let Some(noise) = &self.noise {
            if !(0..=S16_ONE).contains(&noise.probability) || noise.sigma < 0 {
                return Err(config(format!("{}: noise {:?} out of range", self.name, noise)));
            }
        }
        if let Some(v) = &self.voltage_rescale {
            if v.max < 0 {
                return Err(config(format!("{}: voltage rescale max is negative", self.name)));
            }
        }
        if let Some(phase) = &self.phase {
            phase.validate().map_err(config)?;
        }
        if let Some(auto) = &self.autoscale {
            auto.validate().map_err(config)?;
        }
        for (j, m) in self.modulation.iter().enumerate() {
            m.validate()
                .map_err(|e| config(format!("{}: modulation block {}: {}", self.name, j, e)))?;
        }
        Ok(())
    }
}

/// Per-cell state carried from cycle to cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellState {
    /// Stored response (S14)
    pub response: i32,
    pub model: CellModelState,
    pub refractory: RefractoryState,
    /// Depression level (S14)
    pub depression: i32,
    /// Fast running average of the response (S14)
    pub fast: i32,
    /// Slow running average of the response (S14)
    pub slow: i32,
    /// Phase bin, 0 for populations without phase
    pub phase: u8,
    /// Cycles of amplification refractoriness left
    pub amp_timer: u16,
    /// Consolidated afference of the last cycle per kind (S20)
    pub afference: [i32; 4],
    pub fired: bool,
}

impl CellState {
    pub fn initial(response: &ResponseFunction) -> Self {
        Self {
            model: response.initial_state(),
            ..Self::default()
        }
    }
}

/// Runtime population: configuration plus everything that changes per cycle.
#[derive(Debug, Clone)]
pub struct Population {
    pub id: PopulationId,
    pub spec: PopulationSpec,
    pub cells: Vec<CellState>,
    pub connections: Vec<Connection>,
    pub blocks: Vec<GeometricBlock>,
    pub modulation: Vec<ModulationBlock>,
    pub noise_seed: Seed,
    pub synapse_seed: Seed,
    /// Synapse draws owed before each cell, one past the end at `cells.len()`
    pub synapse_prefix: Vec<u64>,
    pub autoscale: AutoscaleState,
}

impl Population {
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Noise draws charged per cell per cycle
    pub fn noise_budget(&self) -> u64 {
        if self.spec.noise.is_some() {
            crate::NOISE_DRAWS_PER_CELL
        } else {
            0
        }
    }

    /// Total seed advance of one cycle across both streams.
    pub fn seed_advance_per_cycle(&self) -> u64 {
        let synapses = self.synapse_prefix.last().copied().unwrap_or(0);
        self.noise_budget() * self.cells.len() as u64 + synapses
    }

    pub fn responses(&self) -> impl Iterator<Item = i32> + '_ {
        self.cells.iter().map(|c| c.response)
    }

    /// Return every cell to its initial state. Weights are left alone.
    pub fn reset_cells(&mut self) {
        let initial = CellState::initial(&self.spec.response);
        self.cells.iter_mut().for_each(|c| *c = initial);
        for block in &mut self.modulation {
            block.reset();
        }
        self.autoscale = AutoscaleState::default();
    }

    /// Recompute `synapse_prefix` from the connection tables.
    pub fn rebuild_synapse_prefix(&mut self) {
        let n = self.cells.len();
        let mut prefix = Vec::with_capacity(n + 1);
        let mut total = 0u64;
        prefix.push(0);
        for cell in 0..n {
            total += self
                .connections
                .iter()
                .map(|c| c.synapse_count(cell) as u64)
                .sum::<u64>();
            prefix.push(total);
        }
        self.synapse_prefix = prefix;
    }
}
