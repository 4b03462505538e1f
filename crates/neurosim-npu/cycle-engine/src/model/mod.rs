// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Network data model: populations, connection types, modulation blocks
//! and the response histories they read.

pub mod connection;
pub mod history;
pub mod modulation;
pub mod population;

pub use connection::{
    Connection, ConnectionSpec, DelayRule, ExplicitSynapse, Generation, InputKind, SourceInfo,
    Synapse, TermSigns, WeightInit,
};
pub use history::{Histories, History};
pub use modulation::{ModulationBlock, ModulationScope, ModulationSpec};
pub use population::{
    AmplificationRefractory, CellState, GridShape, NoiseSpec, Population, PopulationSpec,
    RunningAverages, SourceRef, VoltageRescale,
};
