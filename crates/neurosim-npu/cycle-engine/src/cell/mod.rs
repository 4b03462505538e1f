// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Per-cell evaluation: afference gather, phase, autoscaling and the
//! ordered response update.

pub mod accumulator;
pub mod autoscale;
pub mod engine;
pub mod gather;
pub mod phase;

pub use autoscale::{AutoscaleSpec, AutoscaleState};
pub use engine::{run_part, CellPart, PartOutcome, PopulationCycle};
pub use phase::{PhaseKernel, PhaseSpec, PHASE_BINS};
