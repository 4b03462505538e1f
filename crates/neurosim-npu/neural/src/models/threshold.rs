// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Threshold Response Functions
//!
//! ```text
//! step:  s = x            if x >= pt  or  x <= nt
//!        s = 0            otherwise
//!
//! knee:  s = pt + g(x-pt) if x >= pt
//!        s = nt + g(x-nt) if x <= nt
//!        s = 0            otherwise
//! ```
//!
//! `x` is the combined drive (S20) and `s` the response (S14); the S20→S14
//! conversion is a rounding shift, so a step hit passes the drive through
//! unchanged in value. Thresholds are inclusive.

#[cfg(feature = "std")]
use serde::{Deserialize, Serialize};

use super::ResponseOutcome;
use crate::fixed::{
    mul_round_shift, round_shift, to_fixed, OverflowCounter, S14, S16, S16_ONE, S20,
};
use crate::types::{NeuralError, Result};

const DRIVE_TO_RESPONSE: u32 = S20 - S14;

#[inline]
fn drive_to_response(x: i64) -> i32 {
    round_shift(x, DRIVE_TO_RESPONSE) as i32
}

/// Step response parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Serialize, Deserialize))]
pub struct StepParams {
    /// Positive threshold (S20)
    pub pos_threshold: i32,
    /// Optional negative threshold (S20, must be <= 0)
    pub neg_threshold: Option<i32>,
}

impl Default for StepParams {
    fn default() -> Self {
        Self {
            pos_threshold: to_fixed(0.1, S20),
            neg_threshold: None,
        }
    }
}

impl StepParams {
    pub fn validate(&self) -> Result<()> {
        if self.pos_threshold < 0 {
            return Err(NeuralError::InvalidParameter {
                model: "step",
                parameter: "pos_threshold",
                reason: "must be non-negative",
            });
        }
        if matches!(self.neg_threshold, Some(nt) if nt > 0) {
            return Err(NeuralError::InvalidParameter {
                model: "step",
                parameter: "neg_threshold",
                reason: "must be non-positive",
            });
        }
        Ok(())
    }

    #[inline]
    pub fn evaluate(&self, drive: i32) -> ResponseOutcome {
        if drive >= self.pos_threshold {
            return ResponseOutcome {
                response: drive_to_response(drive as i64),
                fired: true,
            };
        }
        match self.neg_threshold {
            Some(nt) if drive <= nt => ResponseOutcome::quiet(drive_to_response(drive as i64)),
            _ => ResponseOutcome::quiet(0),
        }
    }
}

/// Knee response parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Serialize, Deserialize))]
pub struct KneeParams {
    /// Positive threshold (S20)
    pub pos_threshold: i32,
    /// Optional negative threshold (S20, must be <= 0)
    pub neg_threshold: Option<i32>,
    /// Slope beyond the knee (S16)
    pub gain: i32,
}

impl Default for KneeParams {
    fn default() -> Self {
        Self {
            pos_threshold: to_fixed(0.1, S20),
            neg_threshold: None,
            gain: S16_ONE,
        }
    }
}

impl KneeParams {
    pub fn validate(&self) -> Result<()> {
        if self.pos_threshold < 0 {
            return Err(NeuralError::InvalidParameter {
                model: "knee",
                parameter: "pos_threshold",
                reason: "must be non-negative",
            });
        }
        if matches!(self.neg_threshold, Some(nt) if nt > 0) {
            return Err(NeuralError::InvalidParameter {
                model: "knee",
                parameter: "neg_threshold",
                reason: "must be non-positive",
            });
        }
        if self.gain < 0 {
            return Err(NeuralError::InvalidParameter {
                model: "knee",
                parameter: "gain",
                reason: "must be non-negative",
            });
        }
        Ok(())
    }

    #[inline]
    fn bend(&self, knee: i32, drive: i32, ov: &mut OverflowCounter) -> i32 {
        let beyond = mul_round_shift(drive as i64 - knee as i64, self.gain as i64, S16, ov);
        drive_to_response(knee as i64 + beyond as i64)
    }

    #[inline]
    pub fn evaluate(&self, drive: i32, ov: &mut OverflowCounter) -> ResponseOutcome {
        if drive >= self.pos_threshold {
            return ResponseOutcome {
                response: self.bend(self.pos_threshold, drive, ov),
                fired: true,
            };
        }
        match self.neg_threshold {
            Some(nt) if drive <= nt => ResponseOutcome::quiet(self.bend(nt, drive, ov)),
            _ => ResponseOutcome::quiet(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_at_threshold_is_hit_and_unmodified() {
        let p = StepParams {
            pos_threshold: to_fixed(0.25, S20),
            neg_threshold: None,
        };
        let out = p.evaluate(p.pos_threshold);
        assert!(out.fired);
        assert_eq!(out.response, to_fixed(0.25, S14));
    }

    #[test]
    fn test_step_below_threshold_is_zero() {
        let p = StepParams::default();
        let out = p.evaluate(p.pos_threshold - 1);
        assert_eq!(out, ResponseOutcome::quiet(0));
    }

    #[test]
    fn test_step_negative_threshold_passes_through() {
        let p = StepParams {
            pos_threshold: to_fixed(0.25, S20),
            neg_threshold: Some(to_fixed(-0.5, S20)),
        };
        assert_eq!(p.evaluate(to_fixed(-0.75, S20)).response, to_fixed(-0.75, S14));
        assert_eq!(p.evaluate(to_fixed(-0.25, S20)).response, 0);
    }

    #[test]
    fn test_knee_at_threshold_returns_threshold() {
        let p = KneeParams {
            pos_threshold: to_fixed(0.3, S20),
            neg_threshold: None,
            gain: S16_ONE / 2,
        };
        let mut ov = OverflowCounter::new();
        let out = p.evaluate(p.pos_threshold, &mut ov);
        assert!(out.fired);
        assert_eq!(out.response, round_shift(p.pos_threshold as i64, 6) as i32);
    }

    #[test]
    fn test_knee_gain_applies_beyond_threshold() {
        let p = KneeParams {
            pos_threshold: to_fixed(0.25, S20),
            neg_threshold: Some(to_fixed(-0.25, S20)),
            gain: S16_ONE / 2,
        };
        let mut ov = OverflowCounter::new();
        // 0.25 + 0.5 * (0.75 - 0.25) = 0.5
        assert_eq!(p.evaluate(to_fixed(0.75, S20), &mut ov).response, to_fixed(0.5, S14));
        // -0.25 + 0.5 * (-0.75 + 0.25) = -0.5
        assert_eq!(p.evaluate(to_fixed(-0.75, S20), &mut ov).response, to_fixed(-0.5, S14));
        assert_eq!(p.evaluate(0, &mut ov).response, 0);
        assert_eq!(ov.count(), 0);
    }

    #[test]
    fn test_validation() {
        let bad = KneeParams {
            gain: -1,
            ..KneeParams::default()
        };
        assert!(bad.validate().is_err());
        let bad = StepParams {
            neg_threshold: Some(5),
            ..StepParams::default()
        };
        assert!(bad.validate().is_err());
    }
}
