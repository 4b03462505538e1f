// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Brette–Gerstner adaptive exponential integrate-and-fire (AdEx).
//!
//! ```text
//! C v'   = -gL (v - EL) + gL ΔT exp((v - VT) / ΔT) - w + I
//! τw w'  = a (v - EL) - w
//! v >= vpeak  =>  v = vreset, w += b
//! ```
//!
//! Units: pF, nS, mV, ms, pA; all S16. The exponential is read from the
//! shared table; an argument beyond the table counts as an overflow.

#[cfg(feature = "std")]
use serde::{Deserialize, Serialize};

use super::{CellModelState, ResponseOutcome};
use crate::fixed::{
    clamp_counted, div_shift_round, mul_round_shift_wide, narrow_i32, to_fixed, OverflowCounter,
    S14_ONE, S16, S20,
};
use crate::lut::ModelTables;
use crate::types::{NeuralError, Result};

const V_LIMIT: i64 = 1000 << S16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Serialize, Deserialize))]
pub struct BretteGerstnerParams {
    pub cap: i32,
    pub g_leak: i32,
    pub e_leak: i32,
    pub v_thresh: i32,
    pub delta_t: i32,
    pub v_peak: i32,
    pub v_reset: i32,
    pub tau_w: i32,
    pub a: i32,
    pub b: i32,
    /// Drive (S20) to current (pA, S16), S16
    pub input_gain: i32,
    pub spike_height: i32,
    pub substeps: u8,
}

impl Default for BretteGerstnerParams {
    /// Parameters of the original 2005 paper, peak at VT + 5ΔT
    fn default() -> Self {
        Self {
            cap: to_fixed(281.0, S16),
            g_leak: to_fixed(30.0, S16),
            e_leak: to_fixed(-70.6, S16),
            v_thresh: to_fixed(-50.4, S16),
            delta_t: to_fixed(2.0, S16),
            v_peak: to_fixed(-40.4, S16),
            v_reset: to_fixed(-70.6, S16),
            tau_w: to_fixed(144.0, S16),
            a: to_fixed(4.0, S16),
            b: to_fixed(80.5, S16),
            input_gain: to_fixed(1000.0, S16),
            spike_height: S14_ONE,
            substeps: 4,
        }
    }
}

impl BretteGerstnerParams {
    pub fn initial_state(&self) -> CellModelState {
        CellModelState {
            v: self.e_leak,
            u: 0,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |parameter, reason| NeuralError::InvalidParameter {
            model: "brette-gerstner",
            parameter,
            reason,
        };
        if self.cap <= 0 {
            return Err(invalid("cap", "must be positive"));
        }
        if self.delta_t <= 0 {
            return Err(invalid("delta_t", "must be positive"));
        }
        if self.tau_w <= 0 {
            return Err(invalid("tau_w", "must be positive"));
        }
        if self.substeps == 0 {
            return Err(invalid("substeps", "must be at least 1"));
        }
        if self.v_peak <= self.v_thresh || self.v_reset >= self.v_peak {
            return Err(invalid("v_peak", "must exceed v_thresh and v_reset"));
        }
        Ok(())
    }

    pub fn evaluate(
        &self,
        drive: i32,
        state: &mut CellModelState,
        tables: &ModelTables,
        ov: &mut OverflowCounter,
    ) -> ResponseOutcome {
        let fx = |a: i64, b: i64, ov: &mut OverflowCounter| mul_round_shift_wide(a, b, S16, ov);
        let current = mul_round_shift_wide(drive as i64, self.input_gain as i64, S20, ov);
        let steps = self.substeps.max(1) as i64;
        let el = self.e_leak as i64;
        let gl = self.g_leak as i64;
        let mut v = state.v as i64;
        let mut w = state.u as i64;

        for _ in 0..steps {
            let arg = div_shift_round(v - self.v_thresh as i64, self.delta_t as i64, S16, ov);
            let expo = tables.exp.eval_counted(arg as i64, ov) as i64;
            let leak = fx(gl, v - el, ov);
            let spike_current = fx(fx(gl, self.delta_t as i64, ov), expo, ov);
            let dv = div_shift_round(-leak + spike_current - w + current, self.cap as i64, S16, ov);
            let dw = div_shift_round(
                fx(self.a as i64, v - el, ov) - w,
                self.tau_w as i64,
                S16,
                ov,
            );
            v = clamp_counted(v + dv as i64 / steps, -V_LIMIT, V_LIMIT, ov);
            w += dw as i64 / steps;
            if v >= self.v_peak as i64 {
                break;
            }
        }

        if v >= self.v_peak as i64 {
            state.v = self.v_reset;
            state.u = narrow_i32(w + self.b as i64, ov);
            return ResponseOutcome {
                response: self.spike_height,
                fired: true,
            };
        }
        state.v = narrow_i32(v, ov);
        state.u = narrow_i32(w, ov);
        ResponseOutcome::quiet(0)
    }
}
