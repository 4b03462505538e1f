// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Izhikevich Neuron Models
//!
//! ## 2003 ("simple model of spiking neurons")
//! ```text
//! v' = 0.04 v² + 5 v + 140 - u + I
//! u' = a (b v - u)
//! v >= 30 mV  =>  v = c, u += d
//! ```
//!
//! ## 2007 ("dynamical systems in neuroscience")
//! ```text
//! C v' = k (v - vr)(v - vt) - u + I
//!   u' = a (b (v - vr) - u)
//! v >= vpeak  =>  v = c, u += d
//! ```
//!
//! All quantities are S16 in millivolts / milliseconds / model units. The
//! cycle is one millisecond, integrated in `substeps` Euler steps for `v`
//! followed by one step for `u`. Drive (S20) is converted to current by
//! `input_gain` (S16).

#[cfg(feature = "std")]
use serde::{Deserialize, Serialize};

use super::{CellModelState, ResponseOutcome};
use crate::fixed::{
    clamp_counted, div_shift_round, mul_round_shift_wide, narrow_i32, to_fixed, OverflowCounter,
    S14_ONE, S16, S20,
};
use crate::types::{NeuralError, Result};

/// Shift from (mV S16 × gain S16) to a response at S14.
const SUBTHRESHOLD_SHIFT: u32 = 18;

/// Membrane variables are confined to this band (mV S16) to keep the
/// quadratic term inside i64.
const V_LIMIT: i64 = 1000 << S16;

#[inline]
fn fx(a: i64, b: i64, ov: &mut OverflowCounter) -> i64 {
    mul_round_shift_wide(a, b, S16, ov)
}

#[inline]
fn subthreshold_response(v: i64, rest: i64, gain: i32, ov: &mut OverflowCounter) -> i32 {
    if gain == 0 || v <= rest {
        return 0;
    }
    narrow_i32(mul_round_shift_wide(v - rest, gain as i64, SUBTHRESHOLD_SHIFT, ov), ov)
}

/// Izhikevich (2003) parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Serialize, Deserialize))]
pub struct Izhikevich2003Params {
    pub a: i32,
    pub b: i32,
    pub c: i32,
    pub d: i32,
    /// Drive (S20) to current (S16) conversion, S16
    pub input_gain: i32,
    /// Response on a spike (S14)
    pub spike_height: i32,
    /// Response per mV above `c` when not spiking (S16, 0 disables)
    pub subthreshold_gain: i32,
    /// Euler substeps per cycle for `v`
    pub substeps: u8,
}

impl Default for Izhikevich2003Params {
    /// Regular-spiking cortical cell
    fn default() -> Self {
        Self {
            a: to_fixed(0.02, S16),
            b: to_fixed(0.2, S16),
            c: to_fixed(-65.0, S16),
            d: to_fixed(8.0, S16),
            input_gain: to_fixed(10.0, S16),
            spike_height: S14_ONE,
            subthreshold_gain: 0,
            substeps: 2,
        }
    }
}

impl Izhikevich2003Params {
    const PEAK: i64 = 30 << S16;

    pub fn initial_state(&self) -> CellModelState {
        let mut ov = OverflowCounter::new();
        let v = self.c as i64;
        CellModelState {
            v: self.c,
            u: narrow_i32(fx(self.b as i64, v, &mut ov), &mut ov),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.substeps == 0 {
            return Err(NeuralError::InvalidParameter {
                model: "izhikevich-2003",
                parameter: "substeps",
                reason: "must be at least 1",
            });
        }
        if self.a <= 0 {
            return Err(NeuralError::InvalidParameter {
                model: "izhikevich-2003",
                parameter: "a",
                reason: "must be positive",
            });
        }
        if self.c as i64 >= Self::PEAK {
            return Err(NeuralError::InvalidParameter {
                model: "izhikevich-2003",
                parameter: "c",
                reason: "reset must be below the 30 mV peak",
            });
        }
        Ok(())
    }

    pub fn evaluate(
        &self,
        drive: i32,
        state: &mut CellModelState,
        ov: &mut OverflowCounter,
    ) -> ResponseOutcome {
        let c004 = to_fixed(0.04, S16) as i64;
        let current = mul_round_shift_wide(drive as i64, self.input_gain as i64, S20, ov);
        let steps = self.substeps.max(1) as i64;
        let mut v = state.v as i64;
        let u = state.u as i64;

        for _ in 0..steps {
            let dv = fx(c004, fx(v, v, ov), ov) + 5 * v + (140 << S16) - u + current;
            v = clamp_counted(v + dv / steps, -V_LIMIT, V_LIMIT, ov);
        }
        let u = u + fx(self.a as i64, fx(self.b as i64, v, ov) - u, ov);

        if v >= Self::PEAK {
            state.v = self.c;
            state.u = narrow_i32(u + self.d as i64, ov);
            return ResponseOutcome {
                response: self.spike_height,
                fired: true,
            };
        }
        state.v = narrow_i32(v, ov);
        state.u = narrow_i32(u, ov);
        ResponseOutcome::quiet(subthreshold_response(v, self.c as i64, self.subthreshold_gain, ov))
    }
}

/// Izhikevich (2007) parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Serialize, Deserialize))]
pub struct Izhikevich2007Params {
    /// Capacitance (pF, S16)
    pub cap: i32,
    pub k: i32,
    /// Resting potential (mV, S16)
    pub v_rest: i32,
    /// Instantaneous threshold (mV, S16)
    pub v_thresh: i32,
    /// Spike cutoff (mV, S16)
    pub v_peak: i32,
    pub a: i32,
    pub b: i32,
    pub c: i32,
    pub d: i32,
    pub input_gain: i32,
    pub spike_height: i32,
    pub subthreshold_gain: i32,
    pub substeps: u8,
}

impl Default for Izhikevich2007Params {
    /// Regular-spiking pyramidal cell
    fn default() -> Self {
        Self {
            cap: to_fixed(100.0, S16),
            k: to_fixed(0.7, S16),
            v_rest: to_fixed(-60.0, S16),
            v_thresh: to_fixed(-40.0, S16),
            v_peak: to_fixed(35.0, S16),
            a: to_fixed(0.03, S16),
            b: to_fixed(-2.0, S16),
            c: to_fixed(-50.0, S16),
            d: to_fixed(100.0, S16),
            input_gain: to_fixed(400.0, S16),
            spike_height: S14_ONE,
            subthreshold_gain: 0,
            substeps: 2,
        }
    }
}

impl Izhikevich2007Params {
    pub fn initial_state(&self) -> CellModelState {
        CellModelState { v: self.v_rest, u: 0 }
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |parameter, reason| NeuralError::InvalidParameter {
            model: "izhikevich-2007",
            parameter,
            reason,
        };
        if self.cap <= 0 {
            return Err(invalid("cap", "must be positive"));
        }
        if self.substeps == 0 {
            return Err(invalid("substeps", "must be at least 1"));
        }
        if self.v_thresh <= self.v_rest {
            return Err(invalid("v_thresh", "must exceed v_rest"));
        }
        if self.v_peak <= self.v_thresh || self.c >= self.v_peak {
            return Err(invalid("v_peak", "must exceed v_thresh and the reset c"));
        }
        Ok(())
    }

    pub fn evaluate(
        &self,
        drive: i32,
        state: &mut CellModelState,
        ov: &mut OverflowCounter,
    ) -> ResponseOutcome {
        let current = mul_round_shift_wide(drive as i64, self.input_gain as i64, S20, ov);
        let steps = self.substeps.max(1) as i64;
        let vr = self.v_rest as i64;
        let vt = self.v_thresh as i64;
        let mut v = state.v as i64;
        let u = state.u as i64;

        for _ in 0..steps {
            let quad = fx(self.k as i64, fx(v - vr, v - vt, ov), ov);
            let dv = div_shift_round(quad - u + current, self.cap as i64, S16, ov) as i64;
            v = clamp_counted(v + dv / steps, -V_LIMIT, V_LIMIT, ov);
        }
        let u = u + fx(self.a as i64, fx(self.b as i64, v - vr, ov) - u, ov);

        if v >= self.v_peak as i64 {
            state.v = self.c;
            state.u = narrow_i32(u + self.d as i64, ov);
            return ResponseOutcome {
                response: self.spike_height,
                fired: true,
            };
        }
        state.v = narrow_i32(v, ov);
        state.u = narrow_i32(u, ov);
        ResponseOutcome::quiet(subthreshold_response(v, vr, self.subthreshold_gain, ov))
    }
}
