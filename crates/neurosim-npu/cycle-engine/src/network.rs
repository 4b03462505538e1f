// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Network
//!
//! Every population with its connection types, geometric and modulation
//! blocks, plus the response histories they read. Populations are processed
//! in index order and each commits its responses before the next one runs.
//!
//! ## Seeds
//! All streams derive from one base seed. Stream `(population, kind, index)`
//! starts `((population * 4 + kind) * 256 + index) * 2^20` draws in:
//!
//! | kind | stream |
//! |---|---|
//! | 0 | drive noise |
//! | 1 | synapse transmission |
//! | 2 | connection generation (index = connection) |
//! | 3 | boundary noise (index = block) |

use ahash::AHashMap;
use rayon::prelude::*;
use rayon::ThreadPool;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use neurosim_config::LimitsConfig;
use neurosim_npu_neural::lut::model_tables;
use neurosim_npu_neural::{
    BlockId, ConnectionId, OverflowCounter, PopulationId, Seed, S14_ONE, WEIGHT_MIN,
};

use crate::cell::accumulator::Route;
use crate::cell::engine::{
    run_part, traced_cell, BlockInput, ModulationInput, PartOutcome, PopulationCycle,
};
use crate::cell::gather::ConnectionMeta;
use crate::cell::phase::PhaseKernel;
use crate::consolidation::{
    AfferenceMask, ClassKey, ConnectionClass, ConsolidationTable, SelfRelation,
};
use crate::error::{CoreError, Result};
use crate::geometric::block::GeometricBlock;
use crate::interfaces::persistence::{read_values, write_values, BufferLayout, LeScalar, SnapshotStore};
use crate::interfaces::visualization::VisualizationSource;
use crate::model::connection::{Connection, InputKind, SourceInfo};
use crate::model::history::{Histories, History};
use crate::model::modulation::ModulationBlock;
use crate::model::population::{CellState, GridShape, Population, PopulationSpec, SourceRef};
use crate::partition::{split_parts, split_ranges, SynapseTable};
use crate::stats::PopulationStats;

const STREAM_SPACING: u64 = 1 << 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Noise = 0,
    Synapse = 1,
    Generation = 2,
    BoundaryNoise = 3,
}

fn stream_seed(base: u64, population: usize, stream: Stream, index: usize) -> Seed {
    let slot = ((population as u64 * 4 + stream as u64) << 8) + index as u64;
    Seed::new(base).skip(slot * STREAM_SPACING)
}

/// An externally driven input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualInputSpec {
    pub name: String,
    pub grid: GridShape,
    #[serde(default)]
    pub response_min: i32,
    #[serde(default = "default_virtual_max")]
    pub response_max: i32,
}

fn default_virtual_max() -> i32 {
    S14_ONE
}

impl VirtualInputSpec {
    pub fn new(name: impl Into<String>, grid: GridShape) -> Self {
        Self {
            name: name.into(),
            grid,
            response_min: 0,
            response_max: default_virtual_max(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkSpec {
    pub populations: Vec<PopulationSpec>,
    #[serde(default)]
    pub virtual_inputs: Vec<VirtualInputSpec>,
}

/// Per-cycle settings from the orchestrator
#[derive(Debug, Clone, Copy, Default)]
pub struct CycleInputs<'a> {
    pub cycle_in_epoch: u64,
    /// Amplification suspended for every connection this cycle
    pub amplification_frozen: bool,
    pub probes: Option<&'a AHashMap<PopulationId, AHashMap<usize, i32>>>,
}

/// What one cycle produced, per population in processing order
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub stats: Vec<PopulationStats>,
}

impl CycleReport {
    pub fn overflow(&self) -> u64 {
        self.stats.iter().map(|s| s.overflow).sum()
    }
}

#[derive(Debug)]
pub struct Network {
    populations: Vec<Population>,
    histories: Histories,
    virtual_inputs: Vec<VirtualInputSpec>,
    masks: Vec<AfferenceMask>,
    kernels: Vec<Option<PhaseKernel>>,
}

impl Network {
    /// Validate every record, generate synapse tables and size the histories.
    pub fn build(spec: NetworkSpec, limits: &LimitsConfig, base_seed: u64) -> Result<Network> {
        let NetworkSpec {
            populations: specs,
            virtual_inputs,
        } = spec;
        if specs.len() > u16::MAX as usize {
            return Err(CoreError::ResourceLimit {
                population: PopulationId(u16::MAX),
                connection: None,
                what: "populations",
                value: specs.len() as u64,
                limit: u16::MAX as u64,
            });
        }
        for (i, v) in virtual_inputs.iter().enumerate() {
            if v.grid.cell_count() == 0 || v.response_min > v.response_max {
                return Err(CoreError::Config {
                    population: PopulationId(0),
                    message: format!("virtual input {} ({}) is empty or has an empty range", i, v.name),
                });
            }
        }

        let source_info = |id: PopulationId, source: SourceRef| -> Result<SourceInfo> {
            match source {
                SourceRef::Population(q) => specs
                    .get(q.0 as usize)
                    .map(|s| SourceInfo {
                        grid: s.grid,
                        response_min: s.response_min,
                        response_max: s.response_max,
                        is_self: q == id,
                    })
                    .ok_or_else(|| CoreError::Config {
                        population: id,
                        message: format!("source {} does not exist", q),
                    }),
                SourceRef::Virtual(i) => virtual_inputs
                    .get(i as usize)
                    .map(|v| SourceInfo {
                        grid: v.grid,
                        response_min: v.response_min,
                        response_max: v.response_max,
                        is_self: false,
                    })
                    .ok_or_else(|| CoreError::Config {
                        population: id,
                        message: format!("virtual input {} does not exist", i),
                    }),
            }
        };

        let mut populations = Vec::with_capacity(specs.len());
        let mut masks = Vec::with_capacity(specs.len());
        let mut kernels = Vec::with_capacity(specs.len());
        for (p, spec) in specs.iter().enumerate() {
            let id = PopulationId(p as u16);
            let population = build_population(id, spec, &source_info, limits, base_seed)?;
            masks.push(afference_mask(&population));
            kernels.push(spec.phase.as_ref().map(PhaseKernel::new));
            populations.push(population);
        }

        let mut delays_pop = vec![0u8; populations.len()];
        let mut delays_virtual = vec![0u8; virtual_inputs.len()];
        for conn in populations.iter().flat_map(|p| &p.connections) {
            let slot = match conn.spec.source {
                SourceRef::Population(q) => &mut delays_pop[q.0 as usize],
                SourceRef::Virtual(i) => &mut delays_virtual[i as usize],
            };
            *slot = (*slot).max(conn.max_delay());
        }
        let histories = Histories {
            populations: populations
                .iter()
                .zip(&delays_pop)
                .map(|(p, &d)| History::new(p.cell_count(), d))
                .collect(),
            virtuals: virtual_inputs
                .iter()
                .zip(&delays_virtual)
                .map(|(v, &d)| History::new(v.grid.cell_count(), d))
                .collect(),
        };

        let cells: usize = populations.iter().map(Population::cell_count).sum();
        let synapses: usize = populations
            .iter()
            .flat_map(|p| &p.connections)
            .map(Connection::total_synapses)
            .sum();
        info!(
            "[NETWORK] Built {} populations, {} virtual inputs, {} cells, {} synapses",
            populations.len(),
            virtual_inputs.len(),
            cells,
            synapses
        );

        Ok(Network {
            populations,
            histories,
            virtual_inputs,
            masks,
            kernels,
        })
    }

    pub fn populations(&self) -> &[Population] {
        &self.populations
    }

    pub fn population(&self, id: PopulationId) -> Option<&Population> {
        self.populations.get(id.0 as usize)
    }

    pub fn population_mut(&mut self, id: PopulationId) -> Option<&mut Population> {
        self.populations.get_mut(id.0 as usize)
    }

    pub fn find(&self, name: &str) -> Option<PopulationId> {
        self.populations
            .iter()
            .find(|p| p.spec.name == name)
            .map(|p| p.id)
    }

    pub fn virtual_inputs(&self) -> &[VirtualInputSpec] {
        &self.virtual_inputs
    }

    pub fn history(&self, source: SourceRef) -> &History {
        self.histories.source(source)
    }

    /// Present one cycle of a virtual input; values are clamped to its range.
    pub fn present(&mut self, input: usize, values: &[i32]) -> Result<()> {
        let spec = self.virtual_inputs.get(input).ok_or_else(|| CoreError::Config {
            population: PopulationId(0),
            message: format!("virtual input {} does not exist", input),
        })?;
        let history = &mut self.histories.virtuals[input];
        if values.len() != history.cells() {
            return Err(CoreError::Config {
                population: PopulationId(0),
                message: format!(
                    "virtual input {} takes {} values, got {}",
                    spec.name,
                    history.cells(),
                    values.len()
                ),
            });
        }
        let (lo, hi) = (spec.response_min, spec.response_max);
        history.commit(values.iter().map(|&v| (v.clamp(lo, hi), 0)));
        Ok(())
    }

    /// Return every cell and history to its initial state.
    pub fn reset_state(&mut self) {
        self.populations.iter_mut().for_each(Population::reset_cells);
        self.histories.clear();
    }

    /// Run one cycle over every population.
    pub fn step(&mut self, pool: &ThreadPool, workers: usize, inputs: &CycleInputs<'_>) -> CycleReport {
        let mut report = CycleReport {
            stats: Vec::with_capacity(self.populations.len()),
        };
        for p in 0..self.populations.len() {
            let stats = self.step_population(p, pool, workers, inputs);
            let pop = &self.populations[p];
            self.histories.populations[p].commit(pop.cells.iter().map(|c| (c.response, c.phase)));
            debug!(
                "[CYCLE] {} ({}) mean={} fired={} overflow={}",
                pop.id,
                pop.spec.name,
                stats.mean_response(),
                stats.fired,
                stats.overflow
            );
            report.stats.push(stats);
        }
        report
    }

    fn step_population(
        &mut self,
        p: usize,
        pool: &ThreadPool,
        workers: usize,
        inputs: &CycleInputs<'_>,
    ) -> PopulationStats {
        let histories = &self.histories;
        let pop = &mut self.populations[p];
        let mut ov = OverflowCounter::new();
        for block in &mut pop.blocks {
            block.update(histories.source(block.spec.source), &mut ov);
        }
        for block in &mut pop.modulation {
            block.update(histories.source(block.spec.source), &mut ov);
        }

        let noise_budget = pop.noise_budget();
        let Population {
            id,
            spec,
            cells,
            connections,
            blocks,
            modulation,
            noise_seed,
            synapse_seed,
            synapse_prefix,
            autoscale,
        } = pop;
        let id = *id;
        let n = cells.len();

        let mut metas = Vec::with_capacity(connections.len());
        let mut tables = Vec::with_capacity(connections.len());
        for conn in connections.iter_mut() {
            let Connection {
                id: conn_id,
                spec: conn_spec,
                offsets,
                synapses,
                substances,
                relation,
                terms,
            } = conn;
            metas.push(ConnectionMeta {
                id: *conn_id,
                spec: &*conn_spec,
                offsets: &offsets[..],
                route: Route {
                    class: ConnectionClass::Specific,
                    relation: *relation,
                    kind: conn_spec.kind,
                    autoscale: conn_spec.autoscale,
                },
                terms: *terms,
                raw_limit: conn_spec.raw_limit(),
                plastic: conn_spec.plasticity.is_plastic(),
                source: histories.source(conn_spec.source),
            });
            tables.push(SynapseTable {
                offsets: &offsets[..],
                synapses: &mut synapses[..],
                substances: &mut substances[..],
            });
        }

        let mut stats = PopulationStats::empty(metas.len());
        let mut depolarizing = 0i64;
        let mut hyperpolarizing = 0i64;
        {
            let ctx = PopulationCycle {
                id,
                spec: &*spec,
                mask: self.masks[p],
                table: ConsolidationTable::build(self.masks[p]),
                connections: metas,
                blocks: blocks
                    .iter()
                    .map(|block| BlockInput {
                        block,
                        source: histories.source(block.spec.source),
                        route: Route {
                            class: ConnectionClass::Geometric,
                            relation: block.relation,
                            kind: block.spec.kind,
                            autoscale: block.spec.autoscale,
                        },
                    })
                    .collect(),
                modulation: modulation
                    .iter()
                    .map(|block| ModulationInput {
                        block,
                        route: Route {
                            class: ConnectionClass::Modulatory,
                            relation: block.relation,
                            kind: block.spec.kind,
                            autoscale: block.spec.autoscale,
                        },
                    })
                    .collect(),
                kernel: self.kernels[p].as_ref(),
                autoscale: *autoscale,
                tables: model_tables(),
                noise_seed: *noise_seed,
                noise_budget,
                synapse_seed: *synapse_seed,
                synapse_prefix: &synapse_prefix[..],
                cycle_in_epoch: inputs.cycle_in_epoch,
                amplification_frozen: inputs.amplification_frozen,
                probes: inputs.probes.and_then(|m| m.get(&id)),
                trace_cell: traced_cell(id),
            };

            let ranges = split_ranges(n, workers);
            let parts = split_parts(&mut cells[..], tables, &ranges);
            let outcomes: Vec<PartOutcome> = if parts.len() == 1 {
                parts.into_iter().map(|part| run_part(&ctx, part)).collect()
            } else {
                pool.install(|| parts.into_par_iter().map(|part| run_part(&ctx, part)).collect())
            };
            for outcome in &outcomes {
                stats.merge(&outcome.stats);
                ov.merge(outcome.overflow);
                depolarizing = depolarizing.saturating_add(outcome.depolarizing);
                hyperpolarizing = hyperpolarizing.saturating_add(outcome.hyperpolarizing);
            }
        }

        *noise_seed = noise_seed.skip(n as u64 * noise_budget);
        *synapse_seed = synapse_seed.skip(synapse_prefix.last().copied().unwrap_or(0));
        if let Some(auto) = &spec.autoscale {
            autoscale.update(auto, depolarizing, hyperpolarizing, n, &mut ov);
        }
        stats.overflow = ov.count();
        stats
    }

    fn population_ref(&self, id: PopulationId) -> Result<&Population> {
        self.population(id).ok_or_else(|| CoreError::Config {
            population: id,
            message: "population does not exist".to_string(),
        })
    }

    /// Write a population's responses into `buf`; returns the bytes used.
    pub fn write_responses(&self, id: PopulationId, buf: &mut [u8], layout: &BufferLayout) -> Result<usize> {
        let pop = self.population_ref(id)?;
        write_values(&responses_key(pop), pop.cells.iter().map(|c| c.response), buf, layout)
    }

    /// Restore a population's responses; every history row takes them.
    pub fn read_responses(&mut self, id: PopulationId, buf: &[u8], layout: &BufferLayout) -> Result<()> {
        let pop = self.population_ref(id)?;
        let values: Vec<i32> = read_values(&responses_key(pop), buf, pop.cell_count(), layout)?;
        let p = id.0 as usize;
        for (cell, &v) in self.populations[p].cells.iter_mut().zip(&values) {
            cell.response = v;
        }
        self.histories.populations[p].fill(&values);
        Ok(())
    }

    pub fn write_weights(
        &self,
        id: PopulationId,
        connection: ConnectionId,
        buf: &mut [u8],
        layout: &BufferLayout,
    ) -> Result<usize> {
        let pop = self.population_ref(id)?;
        let conn = connection_ref(pop, connection)?;
        write_values(
            &weights_key(pop, connection),
            conn.synapses.iter().map(|s| s.weight),
            buf,
            layout,
        )
    }

    pub fn read_weights(
        &mut self,
        id: PopulationId,
        connection: ConnectionId,
        buf: &[u8],
        layout: &BufferLayout,
    ) -> Result<()> {
        let pop = self.population_ref(id)?;
        let conn = connection_ref(pop, connection)?;
        let key = weights_key(pop, connection);
        let values: Vec<i16> = read_values(&key, buf, conn.total_synapses(), layout)?;
        if let Some(pos) = values.iter().position(|&w| w < WEIGHT_MIN) {
            return Err(CoreError::Snapshot {
                key,
                message: format!("weight {} at synapse {} below {}", values[pos], pos, WEIGHT_MIN),
            });
        }
        let info = self.source_info(id, conn.spec.source);
        let conn = &mut self.populations[id.0 as usize].connections[connection.0 as usize];
        for (syn, w) in conn.synapses.iter_mut().zip(values) {
            syn.weight = w;
        }
        conn.refresh_terms(&info);
        Ok(())
    }

    fn source_info(&self, id: PopulationId, source: SourceRef) -> SourceInfo {
        match source {
            SourceRef::Population(q) => {
                let s = &self.populations[q.0 as usize].spec;
                SourceInfo {
                    grid: s.grid,
                    response_min: s.response_min,
                    response_max: s.response_max,
                    is_self: q == id,
                }
            }
            SourceRef::Virtual(i) => {
                let v = &self.virtual_inputs[i as usize];
                SourceInfo {
                    grid: v.grid,
                    response_min: v.response_min,
                    response_max: v.response_max,
                    is_self: false,
                }
            }
        }
    }

    /// Every response and weight array into `store`.
    pub fn save(&self, store: &mut dyn SnapshotStore, layout: &BufferLayout) -> Result<()> {
        for pop in &self.populations {
            let mut buf = vec![0u8; layout.required_len(pop.cell_count(), i32::WIDTH)];
            self.write_responses(pop.id, &mut buf, layout)?;
            store.put(&responses_key(pop), buf)?;
            for conn in &pop.connections {
                let mut buf = vec![0u8; layout.required_len(conn.total_synapses(), i16::WIDTH)];
                self.write_weights(pop.id, conn.id, &mut buf, layout)?;
                store.put(&weights_key(pop, conn.id), buf)?;
            }
        }
        info!("[NETWORK] Saved {} populations", self.populations.len());
        Ok(())
    }

    /// Inverse of [`Network::save`]; every key must be present.
    pub fn restore(&mut self, store: &dyn SnapshotStore, layout: &BufferLayout) -> Result<()> {
        let missing = |key: String| CoreError::Snapshot {
            key,
            message: "missing from store".to_string(),
        };
        for p in 0..self.populations.len() {
            let id = PopulationId(p as u16);
            let key = responses_key(&self.populations[p]);
            let buf = store.get(&key).ok_or_else(|| missing(key.clone()))?;
            self.read_responses(id, buf, layout)?;
            for c in 0..self.populations[p].connections.len() {
                let conn = ConnectionId(c as u16);
                let key = weights_key(&self.populations[p], conn);
                let buf = store.get(&key).ok_or_else(|| missing(key.clone()))?;
                self.read_weights(id, conn, buf, layout)?;
            }
        }
        info!("[NETWORK] Restored {} populations", self.populations.len());
        Ok(())
    }
}

fn responses_key(pop: &Population) -> String {
    format!("population/{}/responses", pop.spec.name)
}

fn weights_key(pop: &Population, connection: ConnectionId) -> String {
    format!("population/{}/connection/{}/weights", pop.spec.name, connection.0)
}

fn connection_ref(pop: &Population, connection: ConnectionId) -> Result<&Connection> {
    pop.connections
        .get(connection.0 as usize)
        .ok_or_else(|| CoreError::Config {
            population: pop.id,
            message: format!("{} does not exist", connection),
        })
}

fn build_population(
    id: PopulationId,
    spec: &PopulationSpec,
    source_info: &dyn Fn(PopulationId, SourceRef) -> Result<SourceInfo>,
    limits: &LimitsConfig,
    base_seed: u64,
) -> Result<Population> {
    spec.validate(id)?;
    let config = |message: String| CoreError::Config {
        population: id,
        message: format!("{}: {}", spec.name, message),
    };
    let cells = spec.grid.cell_count();
    if cells as u64 > limits.max_cells_per_population {
        return Err(CoreError::ResourceLimit {
            population: id,
            connection: None,
            what: "cells",
            value: cells as u64,
            limit: limits.max_cells_per_population,
        });
    }
    if let Some(ahp) = &spec.refractory {
        if !(spec.response_min..=spec.response_max).contains(&ahp.amplitude) {
            return Err(config(format!(
                "after-hyperpolarization amplitude {} outside the response range",
                ahp.amplitude
            )));
        }
    }

    let p = id.0 as usize;
    let mut connections = Vec::with_capacity(spec.connections.len());
    for (j, cspec) in spec.connections.iter().enumerate() {
        let conn_id = ConnectionId(j as u16);
        if cspec.phased && (spec.phase.is_none() || cspec.kind != InputKind::Linear) {
            return Err(config(format!(
                "{} is phased but the population has no phase or the input is not linear",
                conn_id
            )));
        }
        match cspec.modulated_by {
            Some(m) if m as usize >= spec.modulation.len() => {
                return Err(config(format!("{} reads missing modulation block {}", conn_id, m)));
            }
            None if cspec.is_value_modulated() => {
                return Err(config(format!("{} is value-modulated without a modulation block", conn_id)));
            }
            _ => {}
        }
        let info = source_info(id, cspec.source)?;
        let seed = stream_seed(base_seed, p, Stream::Generation, j);
        connections.push(Connection::generate(
            id,
            conn_id,
            cspec.clone(),
            &spec.grid,
            &info,
            seed,
            limits,
        )?);
    }

    let mut blocks = Vec::with_capacity(spec.geometric.len());
    for (b, gspec) in spec.geometric.iter().enumerate() {
        let info = source_info(id, gspec.source)?;
        let block = GeometricBlock::new(
            id,
            BlockId(b as u16),
            gspec.clone(),
            relation(&info),
            spec.grid,
            info.grid,
            stream_seed(base_seed, p, Stream::BoundaryNoise, b),
            limits,
        )?;
        if block.noise_draws() > limits.max_seed_advance {
            return Err(CoreError::SeedAdvance {
                population: id,
                value: block.noise_draws(),
                limit: limits.max_seed_advance,
            });
        }
        blocks.push(block);
    }

    let mut modulation = Vec::with_capacity(spec.modulation.len());
    for (m, mspec) in spec.modulation.iter().enumerate() {
        let info = source_info(id, mspec.source)?;
        modulation.push(ModulationBlock::new(
            BlockId(m as u16),
            *mspec,
            relation(&info),
            spec.grid,
            info.grid,
        ));
    }

    let mut population = Population {
        id,
        spec: spec.clone(),
        cells: vec![CellState::initial(&spec.response); cells],
        connections,
        blocks,
        modulation,
        noise_seed: stream_seed(base_seed, p, Stream::Noise, 0),
        synapse_seed: stream_seed(base_seed, p, Stream::Synapse, 0),
        synapse_prefix: Vec::new(),
        autoscale: Default::default(),
    };
    population.rebuild_synapse_prefix();
    let advance = population.seed_advance_per_cycle();
    if advance > limits.max_seed_advance {
        return Err(CoreError::SeedAdvance {
            population: id,
            value: advance,
            limit: limits.max_seed_advance,
        });
    }
    debug!(
        "[NETWORK] {} ({}): {} cells, {} connection types, {} blocks, seed advance {}",
        id,
        spec.name,
        cells,
        population.connections.len(),
        population.blocks.len(),
        advance
    );
    Ok(population)
}

fn relation(info: &SourceInfo) -> SelfRelation {
    if info.is_self {
        SelfRelation::SelfSource
    } else {
        SelfRelation::NonSelf
    }
}

fn afference_mask(pop: &Population) -> AfferenceMask {
    let mut mask = AfferenceMask::empty();
    let mut insert = |class: ConnectionClass, relation: SelfRelation, kind: InputKind| {
        for &k in kind.kinds() {
            mask.insert(ClassKey::new(class, relation, k));
        }
    };
    for c in &pop.connections {
        insert(ConnectionClass::Specific, c.relation, c.spec.kind);
    }
    for b in &pop.blocks {
        insert(ConnectionClass::Geometric, b.relation, b.spec.kind);
    }
    for m in &pop.modulation {
        insert(ConnectionClass::Modulatory, m.relation, m.spec.kind);
    }
    mask
}

impl VisualizationSource for Network {
    fn population_count(&self) -> usize {
        self.populations.len()
    }

    fn cell_count(&self, population: PopulationId) -> Option<usize> {
        self.population(population).map(Population::cell_count)
    }

    fn response(&self, population: PopulationId, cell: usize) -> Option<i32> {
        self.population(population)?.cells.get(cell).map(|c| c.response)
    }

    fn band_values(&self, population: PopulationId, block: BlockId, group: usize) -> Option<&[i64]> {
        self.population(population)?
            .blocks
            .get(block.0 as usize)?
            .band_values(group)
    }

    fn afference(&self, population: PopulationId, cell: usize) -> Option<[i32; 4]> {
        self.population(population)?.cells.get(cell).map(|c| c.afference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::connection::{ConnectionSpec, Generation};
    use neurosim_npu_neural::models::StepParams;
    use neurosim_npu_neural::ResponseFunction;

    fn step() -> ResponseFunction {
        ResponseFunction::Step(StepParams::default())
    }

    fn spec() -> NetworkSpec {
        let grid = GridShape::new(2, 2, 2);
        let mut pop = PopulationSpec::new("v1", grid, step());
        pop.connections.push(ConnectionSpec::new(SourceRef::Virtual(0), Generation::Full));
        NetworkSpec {
            populations: vec![pop],
            virtual_inputs: vec![VirtualInputSpec::new("retina", grid)],
        }
    }

    #[test]
    fn test_stream_seeds_are_distinct() {
        let a = stream_seed(7, 0, Stream::Noise, 0);
        let b = stream_seed(7, 0, Stream::Synapse, 0);
        let c = stream_seed(7, 1, Stream::Noise, 0);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, stream_seed(7, 0, Stream::Noise, 0));
    }

    #[test]
    fn test_build_rejects_missing_source() {
        let mut s = spec();
        s.populations[0]
            .connections
            .push(ConnectionSpec::new(SourceRef::Population(PopulationId(5)), Generation::Full));
        let err = Network::build(s, &LimitsConfig::default(), 1).unwrap_err();
        assert_eq!(err.code(), 10);
        assert!(err.to_string().contains("Population(5)"));
    }

    #[test]
    fn test_seed_advance_limit() {
        let limits = LimitsConfig {
            max_seed_advance: 10,
            ..LimitsConfig::default()
        };
        // 8 cells x 8 synapses
        let err = Network::build(spec(), &limits, 1).unwrap_err();
        assert_eq!(
            err,
            CoreError::SeedAdvance {
                population: PopulationId(0),
                value: 64,
                limit: 10
            }
        );
    }

    #[test]
    fn test_present_checks_length_and_clamps() {
        let mut net = Network::build(spec(), &LimitsConfig::default(), 1).unwrap();
        assert!(net.present(0, &[0; 3]).is_err());
        assert!(net.present(1, &[0; 8]).is_err());
        net.present(0, &[-5, 2 * S14_ONE, 0, 0, 0, 0, 0, 0]).unwrap();
        let h = net.history(SourceRef::Virtual(0));
        assert_eq!(h.response(0, 0), 0);
        assert_eq!(h.response(0, 1), S14_ONE);
    }

    #[test]
    fn test_visualization_view() {
        let net = Network::build(spec(), &LimitsConfig::default(), 1).unwrap();
        assert_eq!(net.population_count(), 1);
        assert_eq!(net.cell_count(PopulationId(0)), Some(8));
        assert_eq!(net.response(PopulationId(0), 7), Some(0));
        assert_eq!(net.response(PopulationId(0), 8), None);
        assert_eq!(net.band_values(PopulationId(0), BlockId(0), 0), None);
        assert_eq!(net.find("v1"), Some(PopulationId(0)));
    }
}
