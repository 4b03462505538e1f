// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Geometric blocks: band sums of a source population turned into one
//! afference term per target cell.
//!
//! ```text
//! a = sum_k normalize(band_k) * beta_k      band S14, beta S16, a S20
//! ```
//!
//! With self-avoidance the cell's own share is taken out of band 0 first.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use neurosim_config::LimitsConfig;
use neurosim_npu_neural::fixed::{add_sat_wide, mul_round_shift_wide, narrow_i32};
use neurosim_npu_neural::{BlockId, OverflowCounter, PopulationId, Seed};

use crate::consolidation::SelfRelation;
use crate::error::{CoreError, Result};
use crate::geometric::boxsum::{BandError, BandMode, BoxSumPlan, Reduction};
use crate::geometric::grid::Boundary;
use crate::model::connection::InputKind;
use crate::model::history::History;
use crate::model::population::{GridShape, SourceRef};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeometricSpec {
    pub source: SourceRef,
    pub reduction: Reduction,
    /// Outer radius of each band after band 0, strictly increasing
    pub radii: Vec<u32>,
    /// Per-band multiplier including band 0 (S16)
    pub betas: Vec<i32>,
    pub boundary: Boundary,
    #[serde(default)]
    pub mode: BandMode,
    #[serde(default)]
    pub total_minus_inner: bool,
    #[serde(default)]
    pub self_avoid: bool,
    #[serde(default)]
    pub kind: InputKind,
    #[serde(default)]
    pub autoscale: bool,
}

impl GeometricSpec {
    pub fn new(source: SourceRef, radii: Vec<u32>, betas: Vec<i32>, boundary: Boundary) -> Self {
        Self {
            source,
            reduction: Reduction::Sum,
            radii,
            betas,
            boundary,
            mode: BandMode::Square,
            total_minus_inner: false,
            self_avoid: false,
            kind: InputKind::Linear,
            autoscale: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeometricBlock {
    pub id: BlockId,
    pub spec: GeometricSpec,
    pub relation: SelfRelation,
    plan: BoxSumPlan,
    target: GridShape,
    source: GridShape,
    groups: Array2<i64>,
    bands: Array2<i64>,
    pub noise_seed: Seed,
}

impl GeometricBlock {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        population: PopulationId,
        id: BlockId,
        spec: GeometricSpec,
        relation: SelfRelation,
        target: GridShape,
        source: GridShape,
        noise_seed: Seed,
        limits: &LimitsConfig,
    ) -> Result<Self> {
        let config = |message: String| CoreError::Config {
            population,
            message: format!("{}: {}", id, message),
        };
        if spec.radii.len() + 1 > limits.max_bands {
            return Err(CoreError::ResourceLimit {
                population,
                connection: None,
                what: "bands per block",
                value: spec.radii.len() as u64 + 1,
                limit: limits.max_bands as u64,
            });
        }
        if spec.betas.len() != spec.radii.len() + 1 {
            return Err(config(format!(
                "{} betas for {} bands",
                spec.betas.len(),
                spec.radii.len() + 1
            )));
        }
        if spec.self_avoid && relation != SelfRelation::SelfSource {
            return Err(config("self-avoidance needs the population as its own source".into()));
        }
        let plan = BoxSumPlan::new(
            source.groups_x,
            source.groups_y,
            &spec.radii,
            spec.boundary,
            spec.mode,
            spec.reduction,
            spec.total_minus_inner,
        )
        .map_err(|e| match e {
            BandError::Range { radius, limit } => CoreError::BandRange {
                population,
                block: id,
                radius,
                limit,
            },
            BandError::Degenerate { band, inner, outer } => CoreError::DegenerateAnnulus {
                population,
                block: id,
                band,
                inner,
                outer,
            },
            BandError::Unsupported(what) => config(what.to_string()),
        })?;
        let groups = Array2::zeros((source.groups_y as usize, source.groups_x as usize));
        let bands = Array2::zeros((source.group_count(), plan.band_count()));
        Ok(Self {
            id,
            spec,
            relation,
            plan,
            target,
            source,
            groups,
            bands,
            noise_seed,
        })
    }

    pub fn plan(&self) -> &BoxSumPlan {
        &self.plan
    }

    /// Draws the noise seed advances per cycle
    pub fn noise_draws(&self) -> u64 {
        self.plan.noise_draws()
    }

    /// Raw bands of a source group
    pub fn band_values(&self, source_group: usize) -> Option<&[i64]> {
        if source_group >= self.bands.nrows() {
            return None;
        }
        self.bands.row(source_group).to_slice()
    }

    /// Source group read by a target cell
    #[inline]
    pub fn source_group_of(&self, cell: usize) -> usize {
        self.source
            .map_group_from(&self.target, self.target.group_of(cell))
    }

    /// Reduce the source's latest responses per group and recompute bands.
    pub fn update(&mut self, source: &History, ov: &mut OverflowCounter) {
        let latest = source.latest();
        let gx = self.source.groups_x as usize;
        for g in 0..self.source.group_count() {
            let members = self.source.members(g);
            let value = self.spec.reduction.reduce(latest[members].iter().copied(), ov);
            self.groups[[g / gx, g % gx]] = value;
        }
        self.plan
            .compute(self.groups.view(), &mut self.noise_seed, &mut self.bands);
    }

    /// Afference term of one target cell (S20). `source` is the history the
    /// bands were computed from; it is only read for self-avoidance.
    pub fn contribution(&self, cell: usize, source: &History, ov: &mut OverflowCounter) -> i32 {
        let sg = self.source_group_of(cell);
        let mut acc = 0i64;
        for (k, &beta) in self.spec.betas.iter().enumerate() {
            let mut raw = self.bands[[sg, k]];
            if k == 0 && self.spec.self_avoid {
                raw = self.without_self(raw, sg, cell, source, ov);
            }
            let value = self.plan.normalized(sg, k, raw);
            acc = add_sat_wide(acc, mul_round_shift_wide(value, beta as i64, 10, ov), ov);
        }
        narrow_i32(acc, ov)
    }

    fn without_self(
        &self,
        raw: i64,
        group: usize,
        cell: usize,
        source: &History,
        ov: &mut OverflowCounter,
    ) -> i64 {
        let latest = source.latest();
        match self.spec.reduction {
            Reduction::Max => self
                .source
                .members(group)
                .filter(|&c| c != cell)
                .map(|c| latest[c] as i64)
                .max()
                .unwrap_or(0),
            reduction => raw - reduction.term(latest[cell], ov),
        }
    }
}
