// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for network setup and cycle execution
//!
//! Arithmetic overflow never appears here: it is clamped and counted where
//! it happens. Everything below is fatal once it reaches the orchestrator.

use neurosim_npu_neural::{BlockId, ConnectionId, NeuralError, PopulationId};
use neurosim_npu_plasticity::PlasticityError;
use thiserror::Error;

/// Error code, description and payload handed to the error reporter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    pub code: i32,
    pub description: String,
    pub payload: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Setup-time range violation
    #[error("{population}: invalid configuration: {message}")]
    Config {
        population: PopulationId,
        message: String,
    },

    #[error("{population}: invalid response model: {source}")]
    Model {
        population: PopulationId,
        #[source]
        source: NeuralError,
    },

    #[error("{population} {connection}: invalid plasticity rule: {source}")]
    Plasticity {
        population: PopulationId,
        connection: ConnectionId,
        #[source]
        source: PlasticityError,
    },

    /// Outermost band does not fit the source grid
    #[error("{population} {block}: band radius {radius} exceeds the grid limit {limit}")]
    BandRange {
        population: PopulationId,
        block: BlockId,
        radius: u32,
        limit: u32,
    },

    /// A band whose outer radius does not exceed the previous one
    #[error("{population} {block}: band {band} is degenerate (radius {inner} .. {outer})")]
    DegenerateAnnulus {
        population: PopulationId,
        block: BlockId,
        band: usize,
        inner: u32,
        outer: u32,
    },

    /// Allocation size or bit-width limited count exceeded
    #[error("{population}{}: {what} = {value} exceeds limit {limit}", .connection.map(|c| format!(" {}", c)).unwrap_or_default())]
    ResourceLimit {
        population: PopulationId,
        connection: Option<ConnectionId>,
        what: &'static str,
        value: u64,
        limit: u64,
    },

    /// Per-cycle seed advance does not fit the generator's bookkeeping
    #[error("{population}: seed advance {value} per cycle exceeds limit {limit}")]
    SeedAdvance {
        population: PopulationId,
        value: u64,
        limit: u64,
    },

    /// Save/restore buffer does not match the network
    #[error("snapshot {key}: {message}")]
    Snapshot { key: String, message: String },

    /// Statistics collection failed
    #[error("statistics transport: {0}")]
    Transport(String),

    #[error("internal consistency error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Stable integer code for the error reporter.
    pub fn code(&self) -> i32 {
        match self {
            CoreError::Config { .. } => 10,
            CoreError::Model { .. } => 11,
            CoreError::Plasticity { .. } => 12,
            CoreError::BandRange { .. } => 13,
            CoreError::DegenerateAnnulus { .. } => 14,
            CoreError::ResourceLimit { .. } => 20,
            CoreError::SeedAdvance { .. } => 21,
            CoreError::Snapshot { .. } => 30,
            CoreError::Transport(_) => 31,
            CoreError::Internal(_) => 90,
        }
    }

    /// Offending value, where one exists.
    pub fn payload(&self) -> i64 {
        match self {
            CoreError::BandRange { radius, .. } => *radius as i64,
            CoreError::DegenerateAnnulus { band, .. } => *band as i64,
            CoreError::ResourceLimit { value, .. } | CoreError::SeedAdvance { value, .. } => {
                i64::try_from(*value).unwrap_or(i64::MAX)
            }
            _ => 0,
        }
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            code: self.code(),
            description: self.to_string(),
            payload: self.payload(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
