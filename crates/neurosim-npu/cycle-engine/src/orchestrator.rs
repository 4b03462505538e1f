// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Cycle Orchestrator
//!
//! Drives trials of `cycles_per_trial` cycles. Per cycle:
//!
//! 1. check the cancel token (cycle boundaries only)
//! 2. present every virtual input from the stimulus source
//! 3. collect the probe currents active this cycle
//! 4. step the network
//! 5. append recorded responses, fold the cycle into the running statistics
//!
//! Every `stats_interval_trials` trials the statistics go through the
//! transport; the root logs and keeps the reduced records.

use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ahash::AHashMap;
use rayon::ThreadPool;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use neurosim_config::SimulatorConfig;
use neurosim_npu_neural::fixed::add_sat;
use neurosim_npu_neural::{OverflowCounter, PopulationId};

use crate::error::{CoreError, ErrorReport, Result};
use crate::interfaces::error_report::ErrorReporter;
use crate::interfaces::stats_transport::{LocalTransport, StatsTransport};
use crate::network::{CycleInputs, Network, NetworkSpec};
use crate::stats::PopulationStats;

/// Interrupt request, honored between cycles.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Values of the virtual inputs, cycle by cycle.
pub trait StimulusSource: Send {
    /// Fill `out` (one S14 value per cell of virtual input `input`).
    fn fill(&mut self, trial: u64, cycle: u32, input: usize, out: &mut [i32]);
}

impl<F> StimulusSource for F
where
    F: FnMut(u64, u32, usize, &mut [i32]) + Send,
{
    fn fill(&mut self, trial: u64, cycle: u32, input: usize, out: &mut [i32]) {
        self(trial, cycle, input, out)
    }
}

/// Current injected into one cell for a cycle range of every trial
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Probe {
    pub population: PopulationId,
    pub cell: usize,
    /// S20
    pub current: i32,
    pub cycles: Range<u32>,
}

/// Responses of selected cells, one row per cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recording {
    pub population: PopulationId,
    pub cells: Vec<usize>,
    /// Row-major, `cells.len()` values per cycle
    pub samples: Vec<i32>,
}

impl Recording {
    pub fn cycles(&self) -> usize {
        if self.cells.is_empty() {
            0
        } else {
            self.samples.len() / self.cells.len()
        }
    }

    pub fn row(&self, cycle: usize) -> Option<&[i32]> {
        let n = self.cells.len();
        self.samples.get(cycle * n..(cycle + 1) * n)
    }
}

/// Reduced statistics of one collection epoch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsReport {
    /// Last trial covered
    pub trial: u64,
    pub populations: Vec<PopulationStats>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub trials: u64,
    pub cycles: u64,
    pub cancelled: bool,
    pub overflow: u64,
    /// Root only; empty on other ranks
    pub stats: Vec<StatsReport>,
}

pub struct Simulator {
    network: Network,
    config: SimulatorConfig,
    pool: ThreadPool,
    stimulus: Option<Box<dyn StimulusSource>>,
    probes: Vec<Probe>,
    recordings: Vec<Recording>,
    transport: Box<dyn StatsTransport>,
    cancel: CancelToken,
    cycle_in_epoch: u64,
    trial: u64,
    pending: Vec<PopulationStats>,
    frame: Vec<i32>,
}

impl std::fmt::Debug for Simulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulator")
            .field("populations", &self.network.populations().len())
            .field("workers", &self.config.system.workers)
            .field("trial", &self.trial)
            .field("cycle_in_epoch", &self.cycle_in_epoch)
            .finish()
    }
}

impl Simulator {
    pub fn new(network: Network, config: SimulatorConfig) -> Result<Self> {
        let workers = config.system.workers.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("neurosim-worker-{}", i))
            .build()
            .map_err(|e| CoreError::Internal(format!("worker pool: {}", e)))?;
        let pending = empty_stats(&network);
        info!(
            "[SIMULATOR] {} populations on {} workers, {} cycles x {} trials",
            network.populations().len(),
            workers,
            config.run.cycles_per_trial,
            config.run.trials
        );
        Ok(Self {
            network,
            config,
            pool,
            stimulus: None,
            probes: Vec::new(),
            recordings: Vec::new(),
            transport: Box::new(LocalTransport),
            cancel: CancelToken::new(),
            cycle_in_epoch: 0,
            trial: 0,
            pending,
            frame: Vec::new(),
        })
    }

    /// Build the network from `spec` with the configured limits and seed.
    pub fn build(spec: NetworkSpec, config: SimulatorConfig) -> Result<Self> {
        let network = Network::build(spec, &config.limits, config.run.base_seed)?;
        Self::new(network, config)
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn network_mut(&mut self) -> &mut Network {
        &mut self.network
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn trial(&self) -> u64 {
        self.trial
    }

    pub fn set_stimulus(&mut self, stimulus: impl StimulusSource + 'static) {
        self.stimulus = Some(Box::new(stimulus));
    }

    pub fn set_transport(&mut self, transport: impl StatsTransport + 'static) {
        self.transport = Box::new(transport);
    }

    pub fn add_probe(&mut self, probe: Probe) -> Result<()> {
        let cells = self
            .network
            .population(probe.population)
            .map(|p| p.cell_count())
            .ok_or_else(|| CoreError::Config {
                population: probe.population,
                message: "probe on a missing population".to_string(),
            })?;
        if probe.cell >= cells {
            return Err(CoreError::Config {
                population: probe.population,
                message: format!("probe cell {} outside {} cells", probe.cell, cells),
            });
        }
        self.probes.push(probe);
        Ok(())
    }

    /// Start recording `cells` of `population`; returns the recording index.
    pub fn record(&mut self, population: PopulationId, cells: Vec<usize>) -> Result<usize> {
        let count = self
            .network
            .population(population)
            .map(|p| p.cell_count())
            .ok_or_else(|| CoreError::Config {
                population,
                message: "recording on a missing population".to_string(),
            })?;
        if let Some(&bad) = cells.iter().find(|&&c| c >= count) {
            return Err(CoreError::Config {
                population,
                message: format!("recorded cell {} outside {} cells", bad, count),
            });
        }
        self.recordings.push(Recording {
            population,
            cells,
            samples: Vec::new(),
        });
        Ok(self.recordings.len() - 1)
    }

    pub fn recordings(&self) -> &[Recording] {
        &self.recordings
    }

    /// Start a reconfiguration epoch: freeze windows count from here.
    pub fn begin_epoch(&mut self) {
        self.cycle_in_epoch = 0;
        info!("[SIMULATOR] New epoch at trial {}", self.trial);
    }

    /// Every configured trial, or until cancelled.
    pub fn run(&mut self) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        for _ in 0..self.config.run.trials {
            let (cycles, complete) = self.run_trial(&mut summary)?;
            summary.cycles += cycles;
            if !complete {
                summary.cancelled = true;
                info!(
                    "[SIMULATOR] Cancelled in trial {} after {} cycles",
                    self.trial, cycles
                );
                break;
            }
            summary.trials += 1;
        }
        info!(
            "[SIMULATOR] Run finished: {} trials, {} cycles, {} overflows",
            summary.trials, summary.cycles, summary.overflow
        );
        Ok(summary)
    }

    /// [`Simulator::run`], handing any error to `reporter`.
    pub fn run_or_abort(&mut self, reporter: &dyn ErrorReporter) -> RunSummary {
        match self.run() {
            Ok(summary) => summary,
            Err(e) => {
                let report: ErrorReport = e.report();
                reporter.abort(&report)
            }
        }
    }

    /// One trial. Returns the cycles run and whether the trial completed.
    pub fn run_trial(&mut self, summary: &mut RunSummary) -> Result<(u64, bool)> {
        if self.config.run.reset_between_trials && self.trial > 0 {
            self.network.reset_state();
        }
        let mut cycles = 0;
        for cycle in 0..self.config.run.cycles_per_trial {
            if self.cancel.is_cancelled() {
                return Ok((cycles, false));
            }
            summary.overflow += self.step_cycle(cycle)?;
            cycles += 1;
        }
        self.trial += 1;
        let interval = self.config.run.stats_interval_trials;
        if interval > 0 && self.trial % interval == 0 {
            if let Some(report) = self.collect_stats()? {
                summary.stats.push(report);
            }
        }
        Ok((cycles, true))
    }

    /// One cycle at position `cycle` of the current trial; returns its
    /// overflow count.
    pub fn step_cycle(&mut self, cycle: u32) -> Result<u64> {
        self.present_stimulus(cycle)?;
        let probes = self.active_probes(cycle);
        let inputs = CycleInputs {
            cycle_in_epoch: self.cycle_in_epoch,
            amplification_frozen: self.cycle_in_epoch
                < self.config.run.freeze_amplification_cycles as u64,
            probes: if probes.is_empty() { None } else { Some(&probes) },
        };
        let workers = self.config.system.workers.max(1);
        let report = self.network.step(&self.pool, workers, &inputs);
        self.cycle_in_epoch += 1;

        for rec in &mut self.recordings {
            if let Some(pop) = self.network.population(rec.population) {
                rec.samples
                    .extend(rec.cells.iter().map(|&c| pop.cells[c].response));
            }
        }
        for (acc, stats) in self.pending.iter_mut().zip(&report.stats) {
            acc.merge(stats);
        }
        let overflow = report.overflow();
        debug!(
            "[SIMULATOR] trial {} cycle {} overflow {}",
            self.trial, cycle, overflow
        );
        Ok(overflow)
    }

    fn present_stimulus(&mut self, cycle: u32) -> Result<()> {
        let Some(stimulus) = self.stimulus.as_mut() else {
            return Ok(());
        };
        for input in 0..self.network.virtual_inputs().len() {
            let cells = self.network.virtual_inputs()[input].grid.cell_count();
            self.frame.clear();
            self.frame.resize(cells, 0);
            stimulus.fill(self.trial, cycle, input, &mut self.frame);
            self.network.present(input, &self.frame)?;
        }
        Ok(())
    }

    fn active_probes(&self, cycle: u32) -> AHashMap<PopulationId, AHashMap<usize, i32>> {
        let mut active: AHashMap<PopulationId, AHashMap<usize, i32>> = AHashMap::new();
        let mut ov = OverflowCounter::new();
        for probe in self.probes.iter().filter(|p| p.cycles.contains(&cycle)) {
            let slot = active
                .entry(probe.population)
                .or_default()
                .entry(probe.cell)
                .or_insert(0);
            *slot = add_sat(*slot, probe.current, &mut ov);
        }
        active
    }

    /// Reduce the pending statistics through the transport and start a new
    /// collection epoch.
    fn collect_stats(&mut self) -> Result<Option<StatsReport>> {
        let pending = std::mem::replace(&mut self.pending, empty_stats(&self.network));
        let mut reduced = Vec::with_capacity(pending.len());
        for stats in &pending {
            match self.transport.collect(&stats.flatten(), &stats.reducers())? {
                Some(values) => reduced.push(PopulationStats::unflatten(&values)?),
                None => return Ok(None),
            }
        }
        for (pop, stats) in self.network.populations().iter().zip(&reduced) {
            info!(
                "[STATS] trial {} {} ({}): mean={} min={} max={} fired={}",
                self.trial,
                pop.id,
                pop.spec.name,
                stats.mean_response(),
                stats.response_min,
                stats.response_max,
                stats.fired
            );
            if stats.overflow > 0 && self.config.logging.warn_on_overflow {
                warn!(
                    "[STATS] {} ({}): {} arithmetic overflows clamped since the last collection",
                    pop.id, pop.spec.name, stats.overflow
                );
            }
        }
        Ok(Some(StatsReport {
            trial: self.trial,
            populations: reduced,
        }))
    }
}

fn empty_stats(network: &Network) -> Vec<PopulationStats> {
    network
        .populations()
        .iter()
        .map(|p| PopulationStats::empty(p.connections.len()))
        .collect()
}
