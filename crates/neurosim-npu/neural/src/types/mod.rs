// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Neural Types Module
//!
//! Identities shared by every NeuroSim crate and the neural error type.

pub mod error;
pub mod ids;

pub use error::{NeuralError, Result};
pub use ids::{BlockId, CellIndex, ConnectionId, GroupIndex, PopulationId};
