// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! One synapse, one cycle: decay, then amplification unless frozen.

#[cfg(feature = "std")]
use serde::{Deserialize, Serialize};

use neurosim_npu_neural::fixed::narrow_weight;
use neurosim_npu_neural::OverflowCounter;

use crate::decay::DecayRule;
use crate::error::Result;
use crate::rules::{Activity, AmplificationRule};
use crate::substance::SubstanceState;

/// Plasticity configuration of one connection type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "std", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "std", serde(default))]
pub struct PlasticityRule {
    pub decay: DecayRule,
    pub amplification: AmplificationRule,
    /// Cycles at the start of each epoch during which only decay runs
    pub freeze_cycles: u32,
}

impl PlasticityRule {
    pub fn validate(&self) -> Result<()> {
        self.decay.validate()?;
        self.amplification.validate()
    }

    /// Whether weights of this connection change at all.
    pub fn is_plastic(&self) -> bool {
        self.amplification.is_plastic() || self.decay != DecayRule::None
    }

    #[inline]
    pub fn is_frozen(&self, cycle_in_epoch: u64) -> bool {
        cycle_in_epoch < self.freeze_cycles as u64
    }
}

/// Per-cycle inputs shared by every synapse of one target cell.
#[derive(Debug, Clone, Copy, Default)]
pub struct SynapseContext {
    pub post: i32,
    pub post_slow: i32,
    pub modulation: i32,
    pub frozen: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SynapseUpdate {
    /// Weight change including decay (S14)
    pub delta: i32,
}

/// Update one weight in place. `pre` is the presynaptic response the
/// synapse transmitted this cycle (S14).
#[inline]
pub fn update_synapse(
    rule: &PlasticityRule,
    weight: &mut i16,
    substance: Option<&mut SubstanceState>,
    pre: i32,
    ctx: &SynapseContext,
    ov: &mut OverflowCounter,
) -> SynapseUpdate {
    let before = *weight;
    let mut w = rule.decay.apply(before, pre, ov);
    if !ctx.frozen && rule.amplification.is_plastic() {
        let act = Activity {
            pre,
            post: ctx.post,
            post_slow: ctx.post_slow,
            modulation: ctx.modulation,
        };
        let dw = rule.amplification.delta(&act, substance, ov);
        w = narrow_weight(w as i64 + dw as i64, ov);
    }
    *weight = w;
    SynapseUpdate {
        delta: w as i32 - before as i32,
    }
}
