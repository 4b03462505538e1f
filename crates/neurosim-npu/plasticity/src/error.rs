// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlasticityError {
    #[error("invalid {rule} parameter `{parameter}`: {reason}")]
    InvalidParameter {
        rule: &'static str,
        parameter: &'static str,
        reason: &'static str,
    },
}

pub type Result<T> = core::result::Result<T, PlasticityError>;
