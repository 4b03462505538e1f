// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Per-Cell Engine
//!
//! One cell, one cycle, in this order:
//!
//! 1. gather every afferent source into the accumulator (synapse plasticity
//!    runs inside the gather)
//! 2. rescale the excitatory total by the previous response
//! 3. resolve phase and add the phased total
//! 4. divide by shunting, cap the magnitude
//! 5. add persistence, noise and probe current
//! 6. evaluate the response, or substitute the after-hyperpolarization
//!    value while the refractory timer runs
//! 7. depression, clamp, store
//! 8. running averages and amplification refractoriness
//!
//! A part is a contiguous slice of cells. Its seeds start where a single
//! worker would be after the cells before it, so any split gives the same
//! result.

use std::sync::OnceLock;

use ahash::AHashMap;
use tracing::trace;

use neurosim_npu_neural::fixed::{
    add_sat, div_shift_round, exp_average, mul_round_shift, mul_round_shift_wide, narrow_i32,
};
use neurosim_npu_neural::{
    ModelTables, OverflowCounter, PopulationId, Seed, SeedCursor, S14, S16, S20_ONE, S24,
};
use neurosim_npu_plasticity::SynapseContext;

use crate::cell::accumulator::{Accumulator, Route};
use crate::cell::autoscale::AutoscaleState;
use crate::cell::gather::{gather_connection, ConnectionMeta, SynapseSlice};
use crate::cell::phase::PhaseKernel;
use crate::consolidation::{AfferenceKind, AfferenceMask, ConsolidationTable};
use crate::geometric::block::GeometricBlock;
use crate::model::history::History;
use crate::model::modulation::ModulationBlock;
use crate::model::population::{CellState, PopulationSpec};
use crate::stats::PopulationStats;

/// Runtime-gated per-cell tracing.
/// Enable with `NEUROSIM_TRACE_CELL=<population>:<cell>`.
struct CellTraceCfg {
    target: Option<(u16, usize)>,
}

fn cell_trace_cfg() -> &'static CellTraceCfg {
    static CFG: OnceLock<CellTraceCfg> = OnceLock::new();
    CFG.get_or_init(|| {
        let target = std::env::var("NEUROSIM_TRACE_CELL").ok().and_then(|v| {
            let (p, c) = v.split_once(':')?;
            Some((p.trim().parse().ok()?, c.trim().parse().ok()?))
        });
        CellTraceCfg { target }
    })
}

/// Cell of `population` selected for tracing, if any
pub fn traced_cell(population: PopulationId) -> Option<usize> {
    cell_trace_cfg()
        .target
        .filter(|(p, _)| *p == population.0)
        .map(|(_, c)| c)
}

/// A geometric block with the history it reads
#[derive(Debug, Clone, Copy)]
pub struct BlockInput<'a> {
    pub block: &'a GeometricBlock,
    pub source: &'a History,
    pub route: Route,
}

#[derive(Debug, Clone, Copy)]
pub struct ModulationInput<'a> {
    pub block: &'a ModulationBlock,
    pub route: Route,
}

/// Everything about one population's cycle that every part reads
pub struct PopulationCycle<'a> {
    pub id: PopulationId,
    pub spec: &'a PopulationSpec,
    pub mask: AfferenceMask,
    pub table: ConsolidationTable,
    pub connections: Vec<ConnectionMeta<'a>>,
    pub blocks: Vec<BlockInput<'a>>,
    pub modulation: Vec<ModulationInput<'a>>,
    pub kernel: Option<&'a PhaseKernel>,
    pub autoscale: AutoscaleState,
    pub tables: &'a ModelTables,
    pub noise_seed: Seed,
    pub noise_budget: u64,
    pub synapse_seed: Seed,
    pub synapse_prefix: &'a [u64],
    pub cycle_in_epoch: u64,
    /// Amplification suspended for every connection this cycle
    pub amplification_frozen: bool,
    /// Probe current per cell this cycle (S20)
    pub probes: Option<&'a AHashMap<usize, i32>>,
    pub trace_cell: Option<usize>,
}

/// The cells of one part with their synapse rows
#[derive(Debug)]
pub struct CellPart<'a> {
    pub start: usize,
    pub cells: &'a mut [CellState],
    /// One per connection type, same order as the population's connections
    pub synapses: Vec<SynapseSlice<'a>>,
}

#[derive(Debug, Clone)]
pub struct PartOutcome {
    pub stats: PopulationStats,
    pub overflow: OverflowCounter,
    /// Depolarizing total over the part's cells (S20)
    pub depolarizing: i64,
    /// Hyperpolarizing magnitude over the part's cells (S20)
    pub hyperpolarizing: i64,
}

/// Process every cell of one part in order.
pub fn run_part(ctx: &PopulationCycle<'_>, part: CellPart<'_>) -> PartOutcome {
    let CellPart {
        start,
        cells,
        mut synapses,
    } = part;
    let mut out = PartOutcome {
        stats: PopulationStats::empty(ctx.connections.len()),
        overflow: OverflowCounter::new(),
        depolarizing: 0,
        hyperpolarizing: 0,
    };
    let mut acc = Accumulator::new(ctx.mask);
    let mut noise_seed = ctx.noise_seed.skip(start as u64 * ctx.noise_budget);
    let mut synapse_seed = ctx.synapse_seed.skip(ctx.synapse_prefix[start]);
    for (i, cell) in cells.iter_mut().enumerate() {
        step_cell(
            ctx,
            start + i,
            cell,
            &mut synapses,
            &mut acc,
            &mut noise_seed,
            &mut synapse_seed,
            &mut out,
        );
    }
    out.stats.overflow = out.overflow.count();
    out
}

#[allow(clippy::too_many_arguments)]
fn step_cell(
    ctx: &PopulationCycle<'_>,
    index: usize,
    cell: &mut CellState,
    synapses: &mut [SynapseSlice<'_>],
    acc: &mut Accumulator,
    noise_seed: &mut Seed,
    synapse_seed: &mut Seed,
    out: &mut PartOutcome,
) {
    let spec = ctx.spec;
    let ov = &mut out.overflow;
    let prev = *cell;
    acc.clear();

    // 1. gather
    for (j, (meta, slice)) in ctx.connections.iter().zip(synapses.iter_mut()).enumerate() {
        let modulation = meta
            .spec
            .modulated_by
            .and_then(|m| ctx.modulation.get(m as usize))
            .map_or(0, |m| m.block.value_for_cell(index));
        let sctx = SynapseContext {
            post: prev.fast,
            post_slow: prev.slow,
            modulation,
            frozen: ctx.amplification_frozen
                || meta.spec.plasticity.is_frozen(ctx.cycle_in_epoch)
                || prev.amp_timer > 0,
        };
        let net = gather_connection(meta, slice, index, &sctx, synapse_seed, acc, &ctx.autoscale, ov);
        let total = &mut out.stats.connection_afference[j];
        *total = total.saturating_add(net);
    }
    for input in &ctx.blocks {
        let value = input.block.contribution(index, input.source, ov);
        acc.deposit(&input.route, value, &ctx.autoscale, ov);
    }
    for input in &ctx.modulation {
        let value = input.block.contribution(index, ov);
        acc.deposit(&input.route, value, &ctx.autoscale, ov);
    }

    let totals = ctx.table.consolidate(&acc.slots);
    out.depolarizing = out
        .depolarizing
        .saturating_add(ctx.table.sum_of(ctx.table.depolarizing(), &acc.slots));
    out.hyperpolarizing = ctx
        .table
        .hyperpolarizing()
        .iter()
        .fold(out.hyperpolarizing, |t, &s| t.saturating_add(acc.slots[s].saturating_abs()));

    // 2. voltage rescale
    let mut excitatory = totals[AfferenceKind::Excitatory as usize];
    if let Some(v) = &spec.voltage_rescale {
        let factor = (v.offset as i64
            + mul_round_shift(v.slope as i64, prev.response as i64, S14, ov) as i64)
            .clamp(0, v.max as i64);
        excitatory = mul_round_shift_wide(excitatory, factor, S16, ov);
    }

    // 3. phase
    let mut phase = prev.phase;
    if let Some(kernel) = ctx.kernel {
        let (bin, value) = kernel.resolve(&acc.phase, prev.phase, ov);
        phase = bin;
        excitatory = excitatory.saturating_add(value as i64);
    }

    // 4. shunt and cap
    let hyperpolarizing = totals[AfferenceKind::Hyperpolarizing as usize];
    let squared = totals[AfferenceKind::Squared as usize];
    let shunting = totals[AfferenceKind::Shunting as usize];
    let mut afference = excitatory.saturating_add(hyperpolarizing).saturating_add(squared);
    if shunting > 0 {
        afference = div_shift_round(afference, S20_ONE as i64 + shunting, 20, ov) as i64;
    }
    let cap = spec.afference_cap as i64;
    let afference = afference.clamp(-cap, cap) as i32;

    // 5. persistence, noise, probe
    let mut drive = afference;
    if spec.persistence != 0 {
        let kept = mul_round_shift(prev.response as i64, spec.persistence as i64, 10, ov);
        drive = add_sat(drive, kept, ov);
    }
    let mut cursor = SeedCursor::new(*noise_seed);
    let mut noise = 0;
    if let Some(n) = &spec.noise {
        if cursor.chance(n.probability) {
            noise = mul_round_shift(cursor.gaussian_s24() as i64, n.sigma as i64, S24, ov);
            drive = add_sat(drive, noise, ov);
        }
    }
    *noise_seed = cursor.finish(ctx.noise_budget);
    if let Some(&current) = ctx.probes.and_then(|p| p.get(&index)) {
        drive = add_sat(drive, current, ov);
    }

    // 6. response or after-hyperpolarization
    let (mut response, fired, substituted) = match &spec.refractory {
        Some(ahp) if cell.refractory.is_active() => (ahp.step(&mut cell.refractory, ov), false, true),
        _ => {
            let outcome = spec.response.evaluate(drive, &mut cell.model, ctx.tables, ov);
            if outcome.fired {
                if let Some(ahp) = &spec.refractory {
                    ahp.start(&mut cell.refractory);
                }
            }
            (outcome.response, outcome.fired, false)
        }
    };

    // 7. depression, clamp, store
    if !substituted {
        if let Some(dep) = &spec.depression {
            response = dep.apply(response, &mut cell.depression, ov);
        }
    }
    let response = response.clamp(spec.response_min, spec.response_max);
    cell.response = response;
    cell.fired = fired;
    cell.phase = phase;
    cell.afference = [
        narrow_i32(excitatory, ov),
        narrow_i32(hyperpolarizing, ov),
        narrow_i32(squared, ov),
        narrow_i32(shunting, ov),
    ];

    // 8. averages, amplification refractoriness
    cell.fast = exp_average(prev.fast, response, spec.averages.fast_omega, ov);
    cell.slow = exp_average(prev.slow, response, spec.averages.slow_omega, ov);
    if cell.amp_timer > 0 {
        cell.amp_timer -= 1;
    } else if let Some(ar) = &spec.amplification_refractory {
        if response >= ar.threshold {
            cell.amp_timer = ar.period;
        }
    }

    out.stats.record(response, fired);
    if ctx.trace_cell == Some(index) {
        trace!(
            "[CELL] {} cell={} afference={} noise={} drive={} response={} fired={} refractory={} phase={}",
            ctx.id,
            index,
            afference,
            noise,
            drive,
            response,
            fired,
            substituted,
            phase
        );
    }
}
