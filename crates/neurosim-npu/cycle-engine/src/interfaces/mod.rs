// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! External collaborators: the engine calls out through these traits and
//! owns no file or wire format.

pub mod error_report;
pub mod persistence;
pub mod stats_transport;
pub mod visualization;

pub use error_report::{ErrorReporter, TracingErrorReporter};
pub use persistence::{read_values, write_values, BufferLayout, BufferStore, LeScalar, SnapshotStore};
pub use stats_transport::{reduce_into, InProcessTransport, LocalTransport, Reducer, StatsTransport};
pub use visualization::VisualizationSource;
