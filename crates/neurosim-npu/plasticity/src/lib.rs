// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # NeuroSim Plasticity Module
//!
//! Per-synapse weight dynamics run inside the afference gather:
//! - **Decay**: none, exponential, exponential-to-baseline, activity-modulated
//! - **Amplification**: Hebbian, modifying substance, BCM
//! - **Freeze**: amplification suspended for the first cycles of an epoch
//!
//! ## Architecture
//! - Pure functions over scaled integers, no allocation
//! - Each synapse update consumes at most the caller's per-synapse draw
//! - Every weight write goes through a range-checked narrowing

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod decay;
pub mod error;
pub mod rules;
pub mod substance;
pub mod synapse;

pub use decay::DecayRule;
pub use error::{PlasticityError, Result};
pub use rules::{Activity, AmplificationRule};
pub use substance::{SubstanceParams, SubstanceState};
pub use synapse::{update_synapse, PlasticityRule, SynapseContext, SynapseUpdate};
