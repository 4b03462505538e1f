// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Presynaptic depression.
//!
//! ```text
//! s_out = s * (1 - d)
//! d     = clamp(d + rate * max(s_out, 0) - recovery * d, 0, 1)
//! ```
//!
//! `d` is S14, `rate` and `recovery` S16.

#[cfg(feature = "std")]
use serde::{Deserialize, Serialize};

use crate::fixed::{mul_round_shift, OverflowCounter, S14, S14_ONE, S16, S16_ONE};
use crate::types::{NeuralError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Serialize, Deserialize))]
pub struct Depression {
    pub rate: i32,
    pub recovery: i32,
}

impl Depression {
    pub fn validate(&self) -> Result<()> {
        if !(0..=S16_ONE).contains(&self.rate) {
            return Err(NeuralError::InvalidParameter {
                model: "depression",
                parameter: "rate",
                reason: "must be in [0, 1]",
            });
        }
        if !(0..=S16_ONE).contains(&self.recovery) {
            return Err(NeuralError::InvalidParameter {
                model: "depression",
                parameter: "recovery",
                reason: "must be in [0, 1]",
            });
        }
        Ok(())
    }

    /// Depress `response` by the cell's current level and update the level.
    #[inline]
    pub fn apply(&self, response: i32, level: &mut i32, ov: &mut OverflowCounter) -> i32 {
        let out = mul_round_shift(response as i64, (S14_ONE - *level) as i64, S14, ov);
        let gain = mul_round_shift(out.max(0) as i64, self.rate as i64, S16, ov);
        let loss = mul_round_shift(*level as i64, self.recovery as i64, S16, ov);
        *level = (*level as i64 + gain as i64 - loss as i64).clamp(0, S14_ONE as i64) as i32;
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_cell_passes_response() {
        let dep = Depression {
            rate: S16_ONE / 4,
            recovery: 0,
        };
        let mut level = 0;
        let mut ov = OverflowCounter::new();
        assert_eq!(dep.apply(S14_ONE, &mut level, &mut ov), S14_ONE);
        assert_eq!(level, S14_ONE / 4);
        // second cycle is depressed by 1/4
        assert_eq!(dep.apply(S14_ONE, &mut level, &mut ov), S14_ONE * 3 / 4);
    }

    #[test]
    fn test_recovers_without_activity() {
        let dep = Depression {
            rate: S16_ONE,
            recovery: S16_ONE / 2,
        };
        let mut level = S14_ONE;
        let mut ov = OverflowCounter::new();
        assert_eq!(dep.apply(S14_ONE, &mut level, &mut ov), 0);
        assert_eq!(level, S14_ONE / 2);
        dep.apply(0, &mut level, &mut ov);
        assert_eq!(level, S14_ONE / 4);
    }

    #[test]
    fn test_negative_response_does_not_depress() {
        let dep = Depression {
            rate: S16_ONE,
            recovery: 0,
        };
        let mut level = 0;
        let mut ov = OverflowCounter::new();
        assert_eq!(dep.apply(-S14_ONE, &mut level, &mut ov), -S14_ONE);
        assert_eq!(level, 0);
    }
}
