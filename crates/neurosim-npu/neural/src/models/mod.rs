// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # Response Function Architecture
//!
//! Each population selects exactly one response function from a closed menu.
//! Every variant honours the same contract: consume the cell's private model
//! state plus its combined drive (S20) and produce a new response (S14),
//! updating the state in place.
//!
//! ## Adding a New Response Function
//!
//! 1. Create `src/models/your_model.rs` with a parameter struct
//! 2. Implement `evaluate` and `validate` on it
//! 3. Add a variant to [`ResponseFunction`] and wire the two matches
//! 4. Add tests

pub mod brette_gerstner;
pub mod depression;
pub mod izhikevich;
pub mod refractory;
pub mod spike;
pub mod tanh;
pub mod threshold;

#[cfg(feature = "std")]
use serde::{Deserialize, Serialize};

use crate::fixed::OverflowCounter;
use crate::lut::ModelTables;
use crate::types::Result;

pub use brette_gerstner::BretteGerstnerParams;
pub use depression::Depression;
pub use izhikevich::{Izhikevich2003Params, Izhikevich2007Params};
pub use refractory::{AfterHyperpolarization, RefractoryState};
pub use spike::SpikeParams;
pub use tanh::TanhParams;
pub use threshold::{KneeParams, StepParams};

/// Private per-cell variables of a response function.
///
/// `v` is the membrane variable and `u` the recovery/adaptation variable of
/// the spiking models (both S16, millivolts or model units). Non-spiking
/// models leave them untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Serialize, Deserialize))]
pub struct CellModelState {
    pub v: i32,
    pub u: i32,
}

/// Result of one response evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseOutcome {
    /// New response (S14), before depression and clamping
    pub response: i32,
    /// Whether the cell crossed its firing criterion this cycle
    pub fired: bool,
}

impl ResponseOutcome {
    #[inline]
    pub fn quiet(response: i32) -> Self {
        Self { response, fired: false }
    }
}

/// The fixed menu of response functions.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "std", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "std", serde(tag = "kind", rename_all = "snake_case"))]
pub enum ResponseFunction {
    Step(StepParams),
    Knee(KneeParams),
    Tanh(TanhParams),
    Spike(SpikeParams),
    Izhikevich2003(Izhikevich2003Params),
    Izhikevich2007(Izhikevich2007Params),
    BretteGerstner(BretteGerstnerParams),
}

impl ResponseFunction {
    pub fn name(&self) -> &'static str {
        match self {
            ResponseFunction::Step(_) => "step",
            ResponseFunction::Knee(_) => "knee",
            ResponseFunction::Tanh(_) => "tanh",
            ResponseFunction::Spike(_) => "spike",
            ResponseFunction::Izhikevich2003(_) => "izhikevich-2003",
            ResponseFunction::Izhikevich2007(_) => "izhikevich-2007",
            ResponseFunction::BretteGerstner(_) => "brette-gerstner",
        }
    }

    /// State a freshly created or reset cell starts from.
    pub fn initial_state(&self) -> CellModelState {
        match self {
            ResponseFunction::Spike(p) => p.initial_state(),
            ResponseFunction::Izhikevich2003(p) => p.initial_state(),
            ResponseFunction::Izhikevich2007(p) => p.initial_state(),
            ResponseFunction::BretteGerstner(p) => p.initial_state(),
            _ => CellModelState::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            ResponseFunction::Step(p) => p.validate(),
            ResponseFunction::Knee(p) => p.validate(),
            ResponseFunction::Tanh(p) => p.validate(),
            ResponseFunction::Spike(p) => p.validate(),
            ResponseFunction::Izhikevich2003(p) => p.validate(),
            ResponseFunction::Izhikevich2007(p) => p.validate(),
            ResponseFunction::BretteGerstner(p) => p.validate(),
        }
    }

    /// Evaluate the response for one cell and cycle.
    #[inline]
    pub fn evaluate(
        &self,
        drive: i32,
        state: &mut CellModelState,
        tables: &ModelTables,
        ov: &mut OverflowCounter,
    ) -> ResponseOutcome {
        match self {
            ResponseFunction::Step(p) => p.evaluate(drive),
            ResponseFunction::Knee(p) => p.evaluate(drive, ov),
            ResponseFunction::Tanh(p) => p.evaluate(drive, tables, ov),
            ResponseFunction::Spike(p) => p.evaluate(drive, state, ov),
            ResponseFunction::Izhikevich2003(p) => p.evaluate(drive, state, ov),
            ResponseFunction::Izhikevich2007(p) => p.evaluate(drive, state, ov),
            ResponseFunction::BretteGerstner(p) => p.evaluate(drive, state, tables, ov),
        }
    }
}
