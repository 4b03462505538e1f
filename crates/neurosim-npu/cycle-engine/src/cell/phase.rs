// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Oscillatory phase.
//!
//! Positive contributions of phased connections are binned by the phase of
//! the source cell that sent them. The histogram is convolved with a
//! normalized raised-cosine kernel; the winning bin becomes the cell's new
//! phase and its value joins the excitatory total.

use serde::{Deserialize, Serialize};

use neurosim_npu_neural::fixed::{add_sat, narrow_i32, round_shift, to_fixed};
use neurosim_npu_neural::{OverflowCounter, S16, S16_ONE};

pub const PHASE_BINS: usize = 32;

/// Phased afference per bin (S20)
pub type PhaseHistogram = [i32; PHASE_BINS];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseSpec {
    /// Kernel half-width in bins
    pub kernel_width: u8,
}

impl Default for PhaseSpec {
    fn default() -> Self {
        Self { kernel_width: 4 }
    }
}

impl PhaseSpec {
    pub fn validate(&self) -> Result<(), String> {
        if self.kernel_width as usize > PHASE_BINS / 2 {
            return Err(format!(
                "phase kernel width {} exceeds {}",
                self.kernel_width,
                PHASE_BINS / 2
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseKernel {
    width: usize,
    /// `2 * width + 1` weights summing to exactly 1.0 (S16)
    weights: Vec<i32>,
}

impl PhaseKernel {
    pub fn new(spec: &PhaseSpec) -> Self {
        let width = spec.kernel_width as usize;
        let raw: Vec<f64> = (0..=2 * width)
            .map(|i| {
                let k = i as f64 - width as f64;
                0.5 * (1.0 + (std::f64::consts::PI * k / (width as f64 + 1.0)).cos())
            })
            .collect();
        let total: f64 = raw.iter().sum();
        let mut weights: Vec<i32> = raw.iter().map(|w| to_fixed(w / total, S16)).collect();
        let residual = S16_ONE - weights.iter().sum::<i32>();
        weights[width] += residual;
        Self { width, weights }
    }

    pub fn weights(&self) -> &[i32] {
        &self.weights
    }

    /// Convolve `hist` and return `(phase, value)` of the winning bin.
    ///
    /// The lowest bin wins ties. Without any positive convolved value the
    /// cell keeps `previous` and gains nothing.
    pub fn resolve(&self, hist: &PhaseHistogram, previous: u8, ov: &mut OverflowCounter) -> (u8, i32) {
        let mut best = (previous, 0i32);
        for bin in 0..PHASE_BINS {
            let mut acc = 0i64;
            for (i, &w) in self.weights.iter().enumerate() {
                let src = (bin + PHASE_BINS + i - self.width) % PHASE_BINS;
                acc += hist[src] as i64 * w as i64;
            }
            let value = narrow_i32(round_shift(acc, S16), ov);
            if value > best.1 {
                best = (bin as u8, value);
            }
        }
        best
    }
}

/// Add a scaled phased contribution to its bin.
#[inline]
pub fn deposit(hist: &mut PhaseHistogram, phase: u8, value: i32, ov: &mut OverflowCounter) {
    let bin = phase as usize % PHASE_BINS;
    hist[bin] = add_sat(hist[bin], value, ov);
}
