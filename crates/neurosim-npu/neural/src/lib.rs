// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # NeuroSim Neural Primitives
//!
//! Everything a single cell needs to be evaluated deterministically:
//! - **Fixed**: scaled-integer multiply/round/shift/saturate with overflow counting
//! - **Rng**: Park–Miller generator with O(1)-bounded `skip`
//! - **Lut**: interpolated lookup tables for `tanh` and `exp`
//! - **Models**: the closed menu of response functions plus refractory,
//!   depression and running-average helpers
//! - **Types**: identities and the crate error type
//!
//! Nothing here allocates per cycle and nothing touches global mutable state.

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod fixed;
pub mod lut;
pub mod models;
pub mod rng;
pub mod types;

pub use fixed::{
    OverflowCounter, S14, S14_ONE, S16, S16_ONE, S20, S20_ONE, S24, S28, WEIGHT_MAX, WEIGHT_MIN,
};
pub use lut::{FixedLut, ModelTables};
pub use models::{
    AfterHyperpolarization, CellModelState, Depression, RefractoryState, ResponseFunction,
    ResponseOutcome,
};
pub use rng::{Seed, SeedCursor};
pub use types::{
    BlockId, CellIndex, ConnectionId, GroupIndex, NeuralError, PopulationId, Result,
};
