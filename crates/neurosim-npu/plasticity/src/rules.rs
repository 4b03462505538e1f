// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Amplification Rules
//!
//! ```text
//! hebbian             dw = r * (pre - mti) * (post - mtj) [* m]
//! modifying substance dw = r * (pre - mti) * level         [* m]
//! bcm                 dw = r * pre * post * (post - theta),  theta = slow^2
//! ```
//!
//! `post` is the target cell's fast running average, `slow` its slow
//! average and `m` the connection's modulation value when value-modulated.
//! All terms are S14, `r` is S16, deltas come out at S14. Each rule forms
//! its full product before a single rounding shift, so a zero factor gives
//! a delta of exactly zero.

#[cfg(feature = "std")]
use serde::{Deserialize, Serialize};

use neurosim_npu_neural::fixed::{mul_round_shift, narrow_i32, product_round_shift};
use neurosim_npu_neural::{OverflowCounter, S14, S16};

use crate::error::{PlasticityError, Result};
use crate::substance::{SubstanceParams, SubstanceState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "std", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "std", serde(tag = "kind", rename_all = "snake_case"))]
pub enum AmplificationRule {
    #[default]
    None,
    Hebbian {
        rate: i32,
        /// Presynaptic modification threshold (S14)
        mti: i32,
        /// Postsynaptic modification threshold (S14)
        mtj: i32,
        value_modulated: bool,
    },
    ModifyingSubstance {
        rate: i32,
        mti: i32,
        mtj: i32,
        substance: SubstanceParams,
        value_modulated: bool,
    },
    Bcm {
        rate: i32,
    },
}

/// Activity terms one amplification step reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Activity {
    /// Presynaptic response (S14)
    pub pre: i32,
    /// Postsynaptic fast average (S14)
    pub post: i32,
    /// Postsynaptic slow average (S14)
    pub post_slow: i32,
    /// Modulation value (S14)
    pub modulation: i32,
}

impl AmplificationRule {
    pub fn name(&self) -> &'static str {
        match self {
            AmplificationRule::None => "none",
            AmplificationRule::Hebbian { .. } => "hebbian",
            AmplificationRule::ModifyingSubstance { .. } => "modifying-substance",
            AmplificationRule::Bcm { .. } => "bcm",
        }
    }

    pub fn uses_substance(&self) -> bool {
        matches!(self, AmplificationRule::ModifyingSubstance { .. })
    }

    pub fn is_plastic(&self) -> bool {
        !matches!(self, AmplificationRule::None)
    }

    pub fn validate(&self) -> Result<()> {
        let rate = match self {
            AmplificationRule::None => return Ok(()),
            AmplificationRule::Hebbian { rate, .. } | AmplificationRule::Bcm { rate } => *rate,
            AmplificationRule::ModifyingSubstance {
                rate, substance, ..
            } => {
                substance.validate()?;
                *rate
            }
        };
        if rate < 0 {
            return Err(PlasticityError::InvalidParameter {
                rule: self.name(),
                parameter: "rate",
                reason: "must be non-negative",
            });
        }
        Ok(())
    }

    /// Weight delta (S14) for one synapse; `substance` is advanced when the
    /// rule carries one.
    pub fn delta(
        &self,
        act: &Activity,
        substance: Option<&mut SubstanceState>,
        ov: &mut OverflowCounter,
    ) -> i32 {
        match *self {
            AmplificationRule::None => 0,
            AmplificationRule::Hebbian {
                rate,
                mti,
                mtj,
                value_modulated,
            } => {
                let pre_dev = act.pre as i64 - mti as i64;
                let post_dev = act.post as i64 - mtj as i64;
                if value_modulated {
                    product_round_shift(
                        &[rate as i64, pre_dev, post_dev, act.modulation as i64],
                        S16 + 2 * S14,
                        ov,
                    )
                } else {
                    product_round_shift(&[rate as i64, pre_dev, post_dev], S16 + S14, ov)
                }
            }
            AmplificationRule::ModifyingSubstance {
                rate,
                mti,
                mtj,
                substance: params,
                value_modulated,
            } => {
                let Some(state) = substance else {
                    return 0;
                };
                let pre_dev = act.pre as i64 - mti as i64;
                let post_dev = act.post as i64 - mtj as i64;
                let level = params.advance(
                    state,
                    narrow_i32(pre_dev, ov),
                    narrow_i32(post_dev, ov),
                    ov,
                );
                if value_modulated {
                    product_round_shift(
                        &[rate as i64, pre_dev, level as i64, act.modulation as i64],
                        S16 + 2 * S14,
                        ov,
                    )
                } else {
                    product_round_shift(&[rate as i64, pre_dev, level as i64], S16 + S14, ov)
                }
            }
            AmplificationRule::Bcm { rate } => {
                let theta = mul_round_shift(act.post_slow as i64, act.post_slow as i64, S14, ov);
                let post_dev = act.post as i64 - theta as i64;
                product_round_shift(
                    &[rate as i64, act.pre as i64, act.post as i64, post_dev],
                    S16 + 2 * S14,
                    ov,
                )
            }
        }
    }
}
