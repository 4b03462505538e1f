// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Leaky integrate-and-fire spike response.
//!
//! ```text
//! v(t+1) = v(t) * leak + x
//! if v >= pt:  s = spike_height, v = reset
//! else:        s = 0
//! ```
//!
//! `v` is kept at S20 in [`CellModelState::v`](super::CellModelState).

#[cfg(feature = "std")]
use serde::{Deserialize, Serialize};

use super::{CellModelState, ResponseOutcome};
use crate::fixed::{
    add_sat, mul_round_shift, to_fixed, OverflowCounter, S14_ONE, S16, S16_ONE, S20,
};
use crate::types::{NeuralError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Serialize, Deserialize))]
pub struct SpikeParams {
    /// Firing threshold on the integrated potential (S20)
    pub threshold: i32,
    /// Fraction of the potential retained per cycle (S16)
    pub leak: i32,
    /// Potential after a spike (S20)
    pub reset: i32,
    /// Response emitted on a spike (S14)
    pub spike_height: i32,
}

impl Default for SpikeParams {
    fn default() -> Self {
        Self {
            threshold: to_fixed(0.5, S20),
            leak: S16_ONE * 3 / 4,
            reset: 0,
            spike_height: S14_ONE,
        }
    }
}

impl SpikeParams {
    pub fn initial_state(&self) -> CellModelState {
        CellModelState { v: self.reset, u: 0 }
    }

    pub fn validate(&self) -> Result<()> {
        if !(0..=S16_ONE).contains(&self.leak) {
            return Err(NeuralError::InvalidParameter {
                model: "spike",
                parameter: "leak",
                reason: "must be in [0, 1]",
            });
        }
        if self.reset >= self.threshold {
            return Err(NeuralError::InvalidParameter {
                model: "spike",
                parameter: "reset",
                reason: "must be below threshold",
            });
        }
        Ok(())
    }

    #[inline]
    pub fn evaluate(
        &self,
        drive: i32,
        state: &mut CellModelState,
        ov: &mut OverflowCounter,
    ) -> ResponseOutcome {
        let retained = mul_round_shift(state.v as i64, self.leak as i64, S16, ov);
        let v = add_sat(retained, drive, ov);
        if v >= self.threshold {
            state.v = self.reset;
            ResponseOutcome {
                response: self.spike_height,
                fired: true,
            }
        } else {
            state.v = v;
            ResponseOutcome::quiet(0)
        }
    }
}
