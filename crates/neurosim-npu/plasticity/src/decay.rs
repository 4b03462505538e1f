// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Weight decay, applied to every visited synapse before amplification.
//!
//! ```text
//! none                 w' = w
//! exponential          w' = w - r * w
//! to-baseline          w' = w - r * (w - b)
//! activity-modulated   w' = w - r * (1 - |pre|) * (w - b)
//! ```
//!
//! `r` is S16, `b` and weights S14, `pre` the presynaptic response (S14)
//! clamped to [-1, 1]. An active presynaptic cell slows its own decay.

#[cfg(feature = "std")]
use serde::{Deserialize, Serialize};

use neurosim_npu_neural::fixed::{mul_round_shift_wide, narrow_weight, product_round_shift};
use neurosim_npu_neural::{OverflowCounter, S14, S14_ONE, S16, S16_ONE};

use crate::error::{PlasticityError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "std", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "std", serde(tag = "kind", rename_all = "snake_case"))]
pub enum DecayRule {
    #[default]
    None,
    Exponential {
        rate: i32,
    },
    ToBaseline {
        rate: i32,
        baseline: i16,
    },
    ActivityModulated {
        rate: i32,
        baseline: i16,
    },
}

impl DecayRule {
    pub fn validate(&self) -> Result<()> {
        let rate = match *self {
            DecayRule::None => return Ok(()),
            DecayRule::Exponential { rate }
            | DecayRule::ToBaseline { rate, .. }
            | DecayRule::ActivityModulated { rate, .. } => rate,
        };
        if !(0..=S16_ONE).contains(&rate) {
            return Err(PlasticityError::InvalidParameter {
                rule: "decay",
                parameter: "rate",
                reason: "must be in [0, 1]",
            });
        }
        Ok(())
    }

    /// Decayed weight.
    #[inline]
    pub fn apply(&self, weight: i16, pre: i32, ov: &mut OverflowCounter) -> i16 {
        let w = weight as i64;
        let step = match *self {
            DecayRule::None => return weight,
            DecayRule::Exponential { rate } => mul_round_shift_wide(w, rate as i64, S16, ov),
            DecayRule::ToBaseline { rate, baseline } => {
                mul_round_shift_wide(w - baseline as i64, rate as i64, S16, ov)
            }
            DecayRule::ActivityModulated { rate, baseline } => {
                let idle = S14_ONE as i64 - (pre as i64).abs().min(S14_ONE as i64);
                product_round_shift(&[w - baseline as i64, rate as i64, idle], S16 + S14, ov)
                    as i64
            }
        };
        narrow_weight(w - step, ov)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_is_identity() {
        let mut ov = OverflowCounter::new();
        assert_eq!(DecayRule::None.apply(1234, 0, &mut ov), 1234);
    }

    #[test]
    fn test_exponential_halves() {
        let mut ov = OverflowCounter::new();
        let rule = DecayRule::Exponential { rate: S16_ONE / 2 };
        assert_eq!(rule.apply(1000, 0, &mut ov), 500);
        assert_eq!(rule.apply(-1000, 0, &mut ov), -500);
    }

    #[test]
    fn test_to_baseline_converges() {
        let mut ov = OverflowCounter::new();
        let rule = DecayRule::ToBaseline {
            rate: S16_ONE / 4,
            baseline: 4000,
        };
        let mut w = 12000;
        for _ in 0..100 {
            w = rule.apply(w, 0, &mut ov);
        }
        assert!((w - 4000).abs() <= 2, "w = {}", w);
    }

    #[test]
    fn test_activity_modulated_spares_active_synapses() {
        let mut ov = OverflowCounter::new();
        let rule = DecayRule::ActivityModulated {
            rate: S16_ONE / 2,
            baseline: 0,
        };
        assert_eq!(rule.apply(8000, S14_ONE, &mut ov), 8000);
        assert_eq!(rule.apply(8000, 0, &mut ov), 4000);
        assert_eq!(rule.apply(8000, S14_ONE / 2, &mut ov), 6000);
    }

    #[test]
    fn test_rate_validation() {
        assert!(DecayRule::Exponential { rate: -1 }.validate().is_err());
        assert!(DecayRule::Exponential { rate: S16_ONE }.validate().is_ok());
    }
}
