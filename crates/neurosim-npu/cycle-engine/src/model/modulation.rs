// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Modulation blocks: a thresholded, leaky mean of a source population.
//!
//! ```text
//! v = max(mean(source) - threshold, 0)
//! m = m * decay + v
//! ```
//!
//! `m` (S14) is both a modulatory afference term and the third factor of
//! value-modulated amplification rules.

use serde::{Deserialize, Serialize};

use neurosim_npu_neural::fixed::{add_sat, div_round, mul_round_shift};
use neurosim_npu_neural::{BlockId, OverflowCounter, S16, S16_ONE};

use crate::consolidation::SelfRelation;
use crate::model::connection::InputKind;
use crate::model::history::History;
use crate::model::population::{GridShape, SourceRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModulationScope {
    /// Mean over the whole source population
    #[default]
    Scalar,
    /// Mean over the source group mapped from each target group
    Spatial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModulationSpec {
    pub source: SourceRef,
    #[serde(default)]
    pub scope: ModulationScope,
    /// S14
    #[serde(default)]
    pub threshold: i32,
    /// S16
    #[serde(default)]
    pub decay: i32,
    /// Multiplier into S20 afference (S16)
    #[serde(default = "default_scale")]
    pub scale: i32,
    #[serde(default)]
    pub kind: InputKind,
    #[serde(default)]
    pub autoscale: bool,
}

fn default_scale() -> i32 {
    S16_ONE
}

impl ModulationSpec {
    pub fn new(source: SourceRef, scope: ModulationScope) -> Self {
        Self {
            source,
            scope,
            threshold: 0,
            decay: 0,
            scale: default_scale(),
            kind: InputKind::Linear,
            autoscale: false,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(0..=S16_ONE).contains(&self.decay) {
            return Err(format!("modulation decay {} outside [0, 1]", self.decay));
        }
        if self.scale < 0 {
            return Err(format!("modulation scale {} is negative", self.scale));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ModulationBlock {
    pub id: BlockId,
    pub spec: ModulationSpec,
    pub relation: SelfRelation,
    target: GridShape,
    source: GridShape,
    state: Vec<i32>,
}

impl ModulationBlock {
    pub fn new(
        id: BlockId,
        spec: ModulationSpec,
        relation: SelfRelation,
        target: GridShape,
        source: GridShape,
    ) -> Self {
        let len = match spec.scope {
            ModulationScope::Scalar => 1,
            ModulationScope::Spatial => target.group_count(),
        };
        Self {
            id,
            spec,
            relation,
            target,
            source,
            state: vec![0; len],
        }
    }

    pub fn values(&self) -> &[i32] {
        &self.state
    }

    pub fn reset(&mut self) {
        self.state.iter_mut().for_each(|m| *m = 0);
    }

    /// Advance the decayed state from the source's latest responses.
    pub fn update(&mut self, source: &History, ov: &mut OverflowCounter) {
        let latest = source.latest();
        match self.spec.scope {
            ModulationScope::Scalar => {
                let sum: i64 = latest.iter().map(|&s| s as i64).sum();
                let mean = div_round(sum, latest.len().max(1) as i64, ov);
                self.state[0] = self.step(self.state[0], mean, ov);
            }
            ModulationScope::Spatial => {
                for g in 0..self.state.len() {
                    let sg = self.source.map_group_from(&self.target, g);
                    let members = self.source.members(sg);
                    let n = members.len().max(1) as i64;
                    let sum: i64 = latest[members].iter().map(|&s| s as i64).sum();
                    let mean = div_round(sum, n, ov);
                    self.state[g] = self.step(self.state[g], mean, ov);
                }
            }
        }
    }

    #[inline]
    fn step(&self, m: i32, mean: i32, ov: &mut OverflowCounter) -> i32 {
        let v = (mean as i64 - self.spec.threshold as i64).max(0);
        let kept = mul_round_shift(m as i64, self.spec.decay as i64, S16, ov);
        add_sat(kept, v.min(i32::MAX as i64) as i32, ov)
    }

    /// Modulation value seen by a target cell (S14)
    #[inline]
    pub fn value_for_cell(&self, cell: usize) -> i32 {
        match self.spec.scope {
            ModulationScope::Scalar => self.state[0],
            ModulationScope::Spatial => self.state[self.target.group_of(cell)],
        }
    }

    /// Afference term for a target cell (S20)
    #[inline]
    pub fn contribution(&self, cell: usize, ov: &mut OverflowCounter) -> i32 {
        mul_round_shift(self.value_for_cell(cell) as i64, self.spec.scale as i64, 10, ov)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neurosim_npu_neural::{PopulationId, S14_ONE};

    fn history(values: &[i32]) -> History {
        let mut h = History::new(values.len(), 0);
        h.commit(values.iter().map(|&v| (v, 0)));
        h
    }

    #[test]
    fn test_scalar_threshold_and_decay() {
        let grid = GridShape::new(2, 1, 2);
        let spec = ModulationSpec {
            threshold: S14_ONE / 4,
            decay: S16_ONE / 2,
            ..ModulationSpec::new(SourceRef::Population(PopulationId(0)), ModulationScope::Scalar)
        };
        let mut block = ModulationBlock::new(BlockId(0), spec, SelfRelation::NonSelf, grid, grid);
        let mut ov = OverflowCounter::new();
        let src = history(&[S14_ONE, S14_ONE, 0, 0]);
        block.update(&src, &mut ov);
        assert_eq!(block.values(), &[S14_ONE / 4]);
        block.update(&src, &mut ov);
        assert_eq!(block.values(), &[S14_ONE / 4 + S14_ONE / 8]);
        // below threshold: pure decay
        block.update(&history(&[0, 0, 0, 0]), &mut ov);
        assert_eq!(block.values(), &[S14_ONE * 3 / 16]);
        assert_eq!(block.contribution(3, &mut ov), (S14_ONE * 3 / 16) << 6);
    }

    #[test]
    fn test_validate_bounds_decay_and_scale() {
        let base = ModulationSpec::new(SourceRef::Virtual(0), ModulationScope::Scalar);
        assert!(base.validate().is_ok());
        assert!(ModulationSpec { decay: S16_ONE, ..base }.validate().is_ok());
        assert!(ModulationSpec { decay: S16_ONE + 1, ..base }.validate().is_err());
        assert!(ModulationSpec { decay: -1, ..base }.validate().is_err());
        assert!(ModulationSpec { scale: -S16_ONE, ..base }.validate().is_err());
    }

    #[test]
    fn test_spatial_reads_mapped_group() {
        let target = GridShape::new(2, 1, 1);
        let source = GridShape::new(2, 1, 2);
        let spec = ModulationSpec::new(SourceRef::Virtual(0), ModulationScope::Spatial);
        let mut block = ModulationBlock::new(BlockId(1), spec, SelfRelation::NonSelf, target, source);
        let mut ov = OverflowCounter::new();
        block.update(&history(&[100, 300, 0, 50]), &mut ov);
        assert_eq!(block.value_for_cell(0), 200);
        assert_eq!(block.value_for_cell(1), 25);
    }
}
