// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Absolute refractory period with a decaying after-hyperpolarization.
//!
//! ```text
//! on fire:            timer = period, ahp = amplitude
//! while timer > 0:    s = ahp, ahp = ahp * decay, timer -= 1
//! ```
//!
//! While the timer is active the response function is not evaluated at all.

#[cfg(feature = "std")]
use serde::{Deserialize, Serialize};

use crate::fixed::{mul_round_shift, to_fixed, OverflowCounter, S14, S16, S16_ONE};
use crate::types::{NeuralError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Serialize, Deserialize))]
pub struct AfterHyperpolarization {
    /// Refractory cycles after a firing
    pub period: u16,
    /// Response substituted on the first refractory cycle (S14)
    pub amplitude: i32,
    /// Per-cycle multiplier of the substituted response (S16)
    pub decay: i32,
}

impl Default for AfterHyperpolarization {
    fn default() -> Self {
        Self {
            period: 2,
            amplitude: to_fixed(-0.2, S14),
            decay: S16_ONE / 2,
        }
    }
}

/// Per-cell refractory state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Serialize, Deserialize))]
pub struct RefractoryState {
    pub timer: u16,
    pub ahp: i32,
}

impl RefractoryState {
    #[inline]
    pub fn is_active(&self) -> bool {
        self.timer > 0
    }
}

impl AfterHyperpolarization {
    pub fn validate(&self) -> Result<()> {
        if !(0..=S16_ONE).contains(&self.decay) {
            return Err(NeuralError::InvalidParameter {
                model: "refractory",
                parameter: "decay",
                reason: "must be in [0, 1]",
            });
        }
        Ok(())
    }

    /// Arm the timer after a firing.
    #[inline]
    pub fn start(&self, state: &mut RefractoryState) {
        state.timer = self.period;
        state.ahp = self.amplitude;
    }

    /// Response substituted for this refractory cycle; advances the state.
    #[inline]
    pub fn step(&self, state: &mut RefractoryState, ov: &mut OverflowCounter) -> i32 {
        debug_assert!(state.is_active());
        let out = state.ahp;
        state.ahp = mul_round_shift(state.ahp as i64, self.decay as i64, S16, ov);
        state.timer = state.timer.saturating_sub(1);
        out
    }
}
