// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # neurosim-observability
//!
//! Logging setup shared by every NeuroSim binary and test harness, with
//! per-crate debug flag support.
//!
//! ## Features
//! - `file-logging`: timestamped run folders with per-crate log files

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod config;
pub mod init;

pub use cli::*;
pub use config::*;
pub use init::*;

/// Known NeuroSim crate names for debug flags
pub const KNOWN_CRATES: &[&str] = &[
    "neurosim",
    "neurosim-config",
    "neurosim-npu-neural",
    "neurosim-npu-plasticity",
    "neurosim-npu-cycle-engine",
];

/// Tracing target of a crate: the package name with `-` replaced by `_`.
pub fn crate_target(crate_name: &str) -> String {
    crate_name.replace('-', "_")
}
