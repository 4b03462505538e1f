// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Hyperbolic-tangent response.
//!
//! ```text
//! s = A * tanh(g * (x - pt))     (0 below pt when rectified)
//! ```

#[cfg(feature = "std")]
use serde::{Deserialize, Serialize};

use super::ResponseOutcome;
use crate::fixed::{mul_round_shift, to_fixed, OverflowCounter, S14_ONE, S16, S16_ONE, S20};
use crate::lut::ModelTables;
use crate::types::{NeuralError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Serialize, Deserialize))]
pub struct TanhParams {
    /// Threshold (S20)
    pub threshold: i32,
    /// Input gain (S16)
    pub gain: i32,
    /// Output amplitude (S14)
    pub amplitude: i32,
    /// Suppress negative outputs
    pub rectify: bool,
}

impl Default for TanhParams {
    fn default() -> Self {
        Self {
            threshold: to_fixed(0.05, S20),
            gain: 2 * S16_ONE,
            amplitude: S14_ONE,
            rectify: true,
        }
    }
}

impl TanhParams {
    pub fn validate(&self) -> Result<()> {
        if self.gain <= 0 {
            return Err(NeuralError::InvalidParameter {
                model: "tanh",
                parameter: "gain",
                reason: "must be positive",
            });
        }
        if self.amplitude <= 0 {
            return Err(NeuralError::InvalidParameter {
                model: "tanh",
                parameter: "amplitude",
                reason: "must be positive",
            });
        }
        Ok(())
    }

    #[inline]
    pub fn evaluate(
        &self,
        drive: i32,
        tables: &ModelTables,
        ov: &mut OverflowCounter,
    ) -> ResponseOutcome {
        let x = drive as i64 - self.threshold as i64;
        let fired = x >= 0;
        if !fired && self.rectify {
            return ResponseOutcome::quiet(0);
        }
        // (x S20 * g S16) >> 20 = S16 table input
        let arg = mul_round_shift(x, self.gain as i64, S20, ov);
        let t = tables.tanh.eval(arg as i64);
        let response = mul_round_shift(t as i64, self.amplitude as i64, S16, ov);
        ResponseOutcome { response, fired }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::S14;
    use crate::lut::model_tables;

    #[test]
    fn test_tanh_zero_at_threshold() {
        let p = TanhParams::default();
        let mut ov = OverflowCounter::new();
        let out = p.evaluate(p.threshold, model_tables(), &mut ov);
        assert!(out.fired);
        assert_eq!(out.response, 0);
    }

    #[test]
    fn test_tanh_saturates_at_amplitude() {
        let p = TanhParams::default();
        let mut ov = OverflowCounter::new();
        let out = p.evaluate(to_fixed(50.0, S20), model_tables(), &mut ov);
        assert!((out.response - p.amplitude).abs() <= 2);
    }

    #[test]
    fn test_tanh_matches_reference() {
        let p = TanhParams {
            threshold: 0,
            gain: S16_ONE,
            amplitude: S14_ONE,
            rectify: false,
        };
        let mut ov = OverflowCounter::new();
        for x in [-1.5, -0.3, 0.2, 0.7, 1.9] {
            let out = p.evaluate(to_fixed(x, S20), model_tables(), &mut ov);
            let want = to_fixed(f64::tanh(x), S14);
            assert!((out.response - want).abs() <= 2, "x={}", x);
        }
    }

    #[test]
    fn test_rectified_below_threshold() {
        let p = TanhParams::default();
        let mut ov = OverflowCounter::new();
        let out = p.evaluate(p.threshold - 1, model_tables(), &mut ov);
        assert_eq!(out, ResponseOutcome::quiet(0));
    }
}
