// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # NeuroSim Cycle Engine
//!
//! Deterministic per-cycle computation over a network of cell populations:
//! - **Model**: populations on 2-D group grids, connection types, modulation
//!   blocks and response histories for axonal delays
//! - **Consolidation**: the per-population key mask and the slot lists it
//!   implies
//! - **Geometric**: box sums in concentric bands under six boundary policies
//! - **Cell**: gather, phase, autoscale and the ordered response update
//! - **Network / Orchestrator**: setup validation, cycles, trials, statistics
//! - **Interfaces**: persistence, statistics transport, error reporting and
//!   visualization collaborators
//!
//! ## Determinism
//! Cells are split into contiguous parts that run on a rayon pool. Every part
//! skips its seeds over the cells and synapses before it, so any number of
//! workers produces bit-identical responses and weights.

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Noise draws charged to every cell of a noisy population each cycle: one
/// selection draw plus one Gaussian.
pub const NOISE_DRAWS_PER_CELL: u64 = 1 + neurosim_npu_neural::rng::GAUSSIAN_DRAWS;

pub mod cell;
pub mod consolidation;
pub mod error;
pub mod geometric;
pub mod interfaces;
pub mod model;
pub mod network;
pub mod orchestrator;
pub mod partition;
pub mod stats;

pub use consolidation::{
    AfferenceKind, AfferenceMask, ClassKey, ConnectionClass, ConsolidationTable, SelfRelation,
};
pub use error::{CoreError, ErrorReport, Result};
pub use geometric::{Boundary, GeometricBlock, GeometricSpec, Reduction};
pub use interfaces::{
    BufferLayout, BufferStore, ErrorReporter, InProcessTransport, LocalTransport, Reducer,
    SnapshotStore, StatsTransport, TracingErrorReporter, VisualizationSource,
};
pub use model::{
    Connection, ConnectionSpec, Generation, GridShape, InputKind, ModulationSpec, Population,
    PopulationSpec, SourceRef,
};
pub use network::{CycleInputs, CycleReport, Network, NetworkSpec, VirtualInputSpec};
pub use orchestrator::{CancelToken, Probe, Recording, RunSummary, Simulator, StatsReport, StimulusSource};
pub use stats::PopulationStats;
