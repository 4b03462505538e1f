// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Autoscaling of afferent classes.
//!
//! A population with an autoscale record keeps two factors (S16), one for
//! depolarizing kinds (excitatory, squared) and one for hyperpolarizing
//! kinds (hyperpolarizing, shunting). Every source flagged `autoscale` is
//! multiplied by the factor of the kind it lands in. After each cycle the
//! factors move toward the value that would bring the mean per-cell total
//! onto its target:
//!
//! ```text
//! desired = factor * target / mean
//! factor  = clamp(factor + rate * (desired - factor), min, max)
//! ```
//!
//! Totals are integer sums over every cell, so the result does not depend
//! on how cells were split across workers.

use serde::{Deserialize, Serialize};

use neurosim_npu_neural::fixed::{div_round, mul_round_shift};
use neurosim_npu_neural::{OverflowCounter, S16, S16_ONE};

use crate::consolidation::AfferenceKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoscaleSpec {
    /// Mean depolarizing afference per cell to aim for (S20); 0 disables
    #[serde(default)]
    pub depolarizing_target: i32,
    /// Mean hyperpolarizing magnitude per cell to aim for (S20); 0 disables
    #[serde(default)]
    pub hyperpolarizing_target: i32,
    /// S16
    pub rate: i32,
    /// S16
    pub min_factor: i32,
    /// S16
    pub max_factor: i32,
}

impl AutoscaleSpec {
    pub fn validate(&self) -> Result<(), String> {
        if self.depolarizing_target < 0 || self.hyperpolarizing_target < 0 {
            return Err("autoscale targets must be non-negative".to_string());
        }
        if !(0..=S16_ONE).contains(&self.rate) {
            return Err(format!("autoscale rate {} outside [0, 1]", self.rate));
        }
        if self.min_factor <= 0 || self.min_factor > self.max_factor {
            return Err(format!(
                "autoscale factor range [{}, {}] is invalid",
                self.min_factor, self.max_factor
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoscaleState {
    pub depolarizing: i32,
    pub hyperpolarizing: i32,
}

impl Default for AutoscaleState {
    fn default() -> Self {
        Self {
            depolarizing: S16_ONE,
            hyperpolarizing: S16_ONE,
        }
    }
}

impl AutoscaleState {
    #[inline]
    pub fn factor(&self, kind: AfferenceKind) -> i32 {
        if kind.is_depolarizing() {
            self.depolarizing
        } else {
            self.hyperpolarizing
        }
    }

    #[inline]
    pub fn apply(&self, kind: AfferenceKind, value: i32, ov: &mut OverflowCounter) -> i32 {
        mul_round_shift(value as i64, self.factor(kind) as i64, S16, ov)
    }

    /// Move both factors after a cycle. Totals are magnitudes summed over
    /// `cells` cells (S20).
    pub fn update(
        &mut self,
        spec: &AutoscaleSpec,
        depolarizing_total: i64,
        hyperpolarizing_total: i64,
        cells: usize,
        ov: &mut OverflowCounter,
    ) {
        let cells = cells.max(1) as i64;
        self.depolarizing = step(
            spec,
            self.depolarizing,
            spec.depolarizing_target,
            depolarizing_total,
            cells,
            ov,
        );
        self.hyperpolarizing = step(
            spec,
            self.hyperpolarizing,
            spec.hyperpolarizing_target,
            hyperpolarizing_total,
            cells,
            ov,
        );
    }
}

fn step(
    spec: &AutoscaleSpec,
    factor: i32,
    target: i32,
    total: i64,
    cells: i64,
    ov: &mut OverflowCounter,
) -> i32 {
    let mean = div_round(total.abs(), cells, ov);
    if target == 0 || mean == 0 {
        return factor;
    }
    let desired = div_round(factor as i64 * target as i64, mean as i64, ov);
    let moved = factor as i64 + mul_round_shift(desired as i64 - factor as i64, spec.rate as i64, S16, ov) as i64;
    moved.clamp(spec.min_factor as i64, spec.max_factor as i64) as i32
}
