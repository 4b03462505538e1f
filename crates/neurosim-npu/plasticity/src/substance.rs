// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Modifying substance: a per-synapse level that drives amplification.
//!
//! The level integrates pre/post coincidence and leaks. Its mode depends on
//! the sign of the most recent net change:
//!
//! ```text
//! level rising                 -> trace     (timer = 0), amplifies continuously
//! level falling while trace    -> countdown (timer = period), still amplifies
//! countdown reaching zero      -> expired   (timer = -1), no amplification
//! level rising again           -> trace
//! ```

#[cfg(feature = "std")]
use serde::{Deserialize, Serialize};

use neurosim_npu_neural::fixed::{mul_round_shift, product_round_shift};
use neurosim_npu_neural::{OverflowCounter, S14, S14_ONE, S16, S16_ONE};

use crate::error::{PlasticityError, Result};

const TIMER_TRACE: i16 = 0;
const TIMER_EXPIRED: i16 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Serialize, Deserialize))]
pub struct SubstanceParams {
    /// Coincidence-to-level gain (S16)
    pub gain: i32,
    /// Fraction of the level lost per cycle (S16)
    pub leak: i32,
    /// Cycles the substance keeps amplifying after it starts to fall
    pub countdown: i16,
}

impl Default for SubstanceParams {
    fn default() -> Self {
        Self {
            gain: S16_ONE / 4,
            leak: S16_ONE / 16,
            countdown: 5,
        }
    }
}

/// Per-synapse substance state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Serialize, Deserialize))]
pub struct SubstanceState {
    /// Level (S14), clamped to [0, 1]
    pub level: i32,
    /// `0` trace, `> 0` countdown remaining, `-1` expired
    pub timer: i16,
}

impl SubstanceState {
    pub fn is_trace(&self) -> bool {
        self.timer == TIMER_TRACE
    }

    pub fn is_expired(&self) -> bool {
        self.timer == TIMER_EXPIRED
    }
}

impl SubstanceParams {
    pub fn validate(&self) -> Result<()> {
        if !(0..=S16_ONE).contains(&self.leak) {
            return Err(PlasticityError::InvalidParameter {
                rule: "modifying-substance",
                parameter: "leak",
                reason: "must be in [0, 1]",
            });
        }
        if self.countdown < 1 {
            return Err(PlasticityError::InvalidParameter {
                rule: "modifying-substance",
                parameter: "countdown",
                reason: "must be at least 1",
            });
        }
        Ok(())
    }

    /// Advance the substance by one cycle of `pre_dev`·`post_dev` coincidence
    /// (both S14) and return the level that amplifies this cycle, or 0.
    pub fn advance(
        &self,
        state: &mut SubstanceState,
        pre_dev: i32,
        post_dev: i32,
        ov: &mut OverflowCounter,
    ) -> i32 {
        let coincidence = product_round_shift(
            &[pre_dev as i64, post_dev as i64, self.gain as i64],
            S14 + S16,
            ov,
        );
        let leak = mul_round_shift(state.level as i64, self.leak as i64, S16, ov);
        let level = (state.level as i64 - leak as i64 + coincidence.max(0) as i64)
            .clamp(0, S14_ONE as i64) as i32;
        let rising = level > state.level;
        state.level = level;

        if rising {
            state.timer = TIMER_TRACE;
            return level;
        }
        match state.timer {
            TIMER_TRACE => {
                state.timer = self.countdown;
                level
            }
            TIMER_EXPIRED => 0,
            t => {
                state.timer = if t <= 1 { TIMER_EXPIRED } else { t - 1 };
                level
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> SubstanceParams {
        SubstanceParams {
            gain: S16_ONE,
            leak: S16_ONE / 2,
            countdown: 2,
        }
    }

    #[test]
    fn test_rise_enters_trace() {
        let p = params();
        let mut s = SubstanceState::default();
        let mut ov = OverflowCounter::new();
        let out = p.advance(&mut s, S14_ONE / 2, S14_ONE / 2, &mut ov);
        assert_eq!(out, S14_ONE / 4);
        assert!(s.is_trace());
    }

    #[test]
    fn test_fall_counts_down_then_expires() {
        let p = params();
        let mut s = SubstanceState::default();
        let mut ov = OverflowCounter::new();
        p.advance(&mut s, S14_ONE, S14_ONE, &mut ov);
        assert_eq!(s.level, S14_ONE);

        // falling: trace -> countdown(2)
        assert_eq!(p.advance(&mut s, 0, 0, &mut ov), S14_ONE / 2);
        assert_eq!(s.timer, 2);
        assert_eq!(p.advance(&mut s, 0, 0, &mut ov), S14_ONE / 4);
        assert_eq!(s.timer, 1);
        assert_eq!(p.advance(&mut s, 0, 0, &mut ov), S14_ONE / 8);
        assert!(s.is_expired());
        assert_eq!(p.advance(&mut s, 0, 0, &mut ov), 0);
        assert!(s.is_expired());
    }

    #[test]
    fn test_rise_rearms_after_expiry() {
        let p = params();
        let mut s = SubstanceState {
            level: 100,
            timer: -1,
        };
        let mut ov = OverflowCounter::new();
        let out = p.advance(&mut s, S14_ONE, S14_ONE, &mut ov);
        assert!(out > 0);
        assert!(s.is_trace());
    }
}
