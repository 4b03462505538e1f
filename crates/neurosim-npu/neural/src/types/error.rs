// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for neural primitives and model validation

use thiserror::Error;

/// Errors raised while validating model parameters or checking
/// generator bookkeeping. Arithmetic overflow is never an error here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NeuralError {
    #[error("invalid {model} parameter `{parameter}`: {reason}")]
    InvalidParameter {
        model: &'static str,
        parameter: &'static str,
        reason: &'static str,
    },

    #[error("seed overdrawn: {consumed} draws consumed against a budget of {budget}")]
    SeedOverdrawn { consumed: u64, budget: u64 },

    #[error("lookup table range is empty: [{min}, {max}]")]
    EmptyTableRange { min: i64, max: i64 },
}

pub type Result<T> = core::result::Result<T, NeuralError>;
