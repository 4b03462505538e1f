// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Connection Types
//!
//! One connection type holds every synapse of one rule between a source and
//! a target population, stored row-compressed by target cell:
//!
//! ```text
//! offsets:  [0, 3, 3, 5, ...]          len = cells + 1
//! synapses: [s0 s1 s2 | | s3 s4 | ...] source cell, weight (S14), delay
//! ```
//!
//! Generation draws from a per-cell sub-stream so the tables do not depend
//! on how cells are later partitioned.

use serde::{Deserialize, Serialize};

use neurosim_config::LimitsConfig;
use neurosim_npu_neural::fixed::mul_round_shift;
use neurosim_npu_neural::{
    ConnectionId, OverflowCounter, PopulationId, Seed, SeedCursor, S14_ONE, S16_ONE, S24,
    WEIGHT_MIN,
};
use neurosim_npu_plasticity::{AmplificationRule, PlasticityRule, SubstanceState};

use crate::consolidation::{AfferenceKind, SelfRelation};
use crate::error::{CoreError, Result};
use crate::model::population::{GridShape, SourceRef};

/// Generation draws reserved per potential synapse: source, weight, delay.
pub const GENERATION_DRAWS_PER_SYNAPSE: u64 = 3;

/// How a contribution enters the consolidated afference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    /// Split by sign into excitatory and hyperpolarizing
    #[default]
    Linear,
    /// `x^2`, depolarizing
    Squared,
    /// Divides the depolarizing total by `1 + |x|`
    Shunting,
}

impl InputKind {
    /// Afference kinds a source of this input kind writes to.
    pub fn kinds(self) -> &'static [AfferenceKind] {
        match self {
            InputKind::Linear => &[AfferenceKind::Excitatory, AfferenceKind::Hyperpolarizing],
            InputKind::Squared => &[AfferenceKind::Squared],
            InputKind::Shunting => &[AfferenceKind::Shunting],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum Generation {
    /// `count` sources per target cell, uniformly at random
    Random { count: u32, allow_self: bool },
    /// Every source cell in groups within `radius` of the mapped group
    Topographic { radius: u32 },
    /// Every source cell
    Full,
    Explicit { synapses: Vec<ExplicitSynapse> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplicitSynapse {
    pub target: u32,
    pub source: u32,
    pub weight: i16,
    #[serde(default)]
    pub delay: u8,
}

/// Initial weights (S14)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WeightInit {
    Constant { value: i16 },
    Uniform { min: i16, max: i16 },
}

impl Default for WeightInit {
    fn default() -> Self {
        WeightInit::Constant {
            value: (S14_ONE / 4) as i16,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DelayRule {
    Constant { delay: u8 },
    Uniform { min: u8, max: u8 },
}

impl Default for DelayRule {
    fn default() -> Self {
        DelayRule::Constant { delay: 0 }
    }
}

impl DelayRule {
    pub fn max_delay(&self) -> u8 {
        match *self {
            DelayRule::Constant { delay } => delay,
            DelayRule::Uniform { max, .. } => max,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSpec {
    pub source: SourceRef,
    pub generation: Generation,
    #[serde(default)]
    pub weights: WeightInit,
    #[serde(default)]
    pub delays: DelayRule,
    #[serde(default)]
    pub kind: InputKind,
    /// Multiplier from raw S28 sums to S20 afference (S16)
    #[serde(default = "default_scale")]
    pub scale: i32,
    #[serde(default)]
    pub autoscale: bool,
    /// Per-synapse transmission probability (S16)
    #[serde(default)]
    pub transmission_probability: Option<i32>,
    #[serde(default)]
    pub plasticity: PlasticityRule,
    /// Positive contributions feed the phase histogram
    #[serde(default)]
    pub phased: bool,
    /// Modulation block supplying the third factor of value-modulated rules
    #[serde(default)]
    pub modulated_by: Option<u16>,
}

fn default_scale() -> i32 {
    S16_ONE
}

impl ConnectionSpec {
    pub fn new(source: SourceRef, generation: Generation) -> Self {
        Self {
            source,
            generation,
            weights: WeightInit::default(),
            delays: DelayRule::default(),
            kind: InputKind::Linear,
            scale: default_scale(),
            autoscale: false,
            transmission_probability: None,
            plasticity: PlasticityRule::default(),
            phased: false,
            modulated_by: None,
        }
    }

    pub fn is_value_modulated(&self) -> bool {
        matches!(
            self.plasticity.amplification,
            AmplificationRule::Hebbian {
                value_modulated: true,
                ..
            } | AmplificationRule::ModifyingSubstance {
                value_modulated: true,
                ..
            }
        )
    }

    /// Raw-sum magnitude beyond which the scaled value is saturated.
    pub fn raw_limit(&self) -> i64 {
        if self.scale <= 0 {
            return i64::MAX;
        }
        ((i32::MAX as i64 + 1) << S24) / self.scale as i64 + 1
    }

    /// Raw S28 sum to S20 afference.
    #[inline]
    pub fn scale_raw(&self, raw: i64, ov: &mut OverflowCounter) -> i32 {
        mul_round_shift(raw, self.scale as i64, S24, ov)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Synapse {
    pub source: u32,
    pub weight: i16,
    pub delay: u8,
}

/// Which signs the products `weight * response` can take.
///
/// Fixed for a non-plastic connection; used to stop summing once every
/// part that can still move has saturated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TermSigns {
    pub positive: bool,
    pub negative: bool,
}

impl TermSigns {
    fn from_ranges(weights: (i16, i16), responses: (i32, i32)) -> Self {
        let (wmin, wmax) = weights;
        let (smin, smax) = responses;
        Self {
            positive: (wmax > 0 && smax > 0) || (wmin < 0 && smin < 0),
            negative: (wmax > 0 && smin < 0) || (wmin < 0 && smax > 0),
        }
    }
}

/// What generation needs to know about the source side
#[derive(Debug, Clone, Copy)]
pub struct SourceInfo {
    pub grid: GridShape,
    pub response_min: i32,
    pub response_max: i32,
    pub is_self: bool,
}

#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ConnectionId,
    pub spec: ConnectionSpec,
    pub offsets: Vec<u32>,
    pub synapses: Vec<Synapse>,
    /// One per synapse for substance rules, empty otherwise
    pub substances: Vec<SubstanceState>,
    pub relation: SelfRelation,
    pub terms: TermSigns,
}

impl Connection {
    #[inline]
    pub fn synapse_count(&self, cell: usize) -> usize {
        (self.offsets[cell + 1] - self.offsets[cell]) as usize
    }

    pub fn synapses_of(&self, cell: usize) -> &[Synapse] {
        &self.synapses[self.offsets[cell] as usize..self.offsets[cell + 1] as usize]
    }

    pub fn total_synapses(&self) -> usize {
        self.synapses.len()
    }

    pub fn max_delay(&self) -> u8 {
        self.synapses.iter().map(|s| s.delay).max().unwrap_or(0)
    }

    pub fn weights(&self) -> impl Iterator<Item = i16> + '_ {
        self.synapses.iter().map(|s| s.weight)
    }

    /// Recompute `terms` after weights were replaced from outside.
    pub fn refresh_terms(&mut self, source: &SourceInfo) {
        let wmin = self.weights().min().unwrap_or(0);
        let wmax = self.weights().max().unwrap_or(0);
        self.terms = TermSigns::from_ranges(
            (wmin, wmax),
            (source.response_min, source.response_max),
        );
    }

    /// Build the synapse table of one connection type.
    pub fn generate(
        population: PopulationId,
        id: ConnectionId,
        spec: ConnectionSpec,
        target: &GridShape,
        source: &SourceInfo,
        seed: Seed,
        limits: &LimitsConfig,
    ) -> Result<Connection> {
        let config = |message: String| CoreError::Config {
            population,
            message: format!("{}: {}", id, message),
        };
        spec.plasticity.validate().map_err(|e| CoreError::Plasticity {
            population,
            connection: id,
            source: e,
        })?;
        if spec.scale < 0 {
            return Err(config("scale must be non-negative".into()));
        }
        if let Some(p) = spec.transmission_probability {
            if !(0..=S16_ONE).contains(&p) {
                return Err(config(format!("transmission probability {} out of range", p)));
            }
        }
        let lowest = match spec.weights {
            WeightInit::Constant { value } => value,
            WeightInit::Uniform { min, max } => {
                if min > max {
                    return Err(config(format!("weight range [{}, {}] is empty", min, max)));
                }
                min
            }
        };
        if lowest < WEIGHT_MIN {
            return Err(config(format!("initial weight {} below {}", lowest, WEIGHT_MIN)));
        }
        if let DelayRule::Uniform { min, max } = spec.delays {
            if min > max {
                return Err(config(format!("delay range [{}, {}] is empty", min, max)));
            }
        }

        let n_target = target.cell_count();
        let n_source = source.grid.cell_count();
        let per_cell = per_cell_capacity(&spec.generation, &source.grid);
        let limit = limits.max_synapses_per_cell;
        if per_cell > limit {
            return Err(CoreError::ResourceLimit {
                population,
                connection: Some(id),
                what: "synapses per cell",
                value: per_cell,
                limit,
            });
        }
        let delay = spec.delays.max_delay();
        if delay > limits.max_delay {
            return Err(CoreError::ResourceLimit {
                population,
                connection: Some(id),
                what: "axonal delay",
                value: delay as u64,
                limit: limits.max_delay as u64,
            });
        }
        let stride = per_cell * GENERATION_DRAWS_PER_SYNAPSE;

        let mut offsets = Vec::with_capacity(n_target + 1);
        let mut synapses = Vec::new();
        offsets.push(0u32);

        if let Generation::Explicit { synapses: list } = &spec.generation {
            let mut rows: Vec<Vec<Synapse>> = vec![Vec::new(); n_target];
            for s in list {
                if s.target as usize >= n_target || s.source as usize >= n_source {
                    return Err(config(format!("explicit synapse {:?} out of range", s)));
                }
                if s.weight < WEIGHT_MIN {
                    return Err(config(format!("explicit synapse {:?} weight below {}", s, WEIGHT_MIN)));
                }
                if s.delay > limits.max_delay {
                    return Err(CoreError::ResourceLimit {
                        population,
                        connection: Some(id),
                        what: "axonal delay",
                        value: s.delay as u64,
                        limit: limits.max_delay as u64,
                    });
                }
                rows[s.target as usize].push(Synapse {
                    source: s.source,
                    weight: s.weight,
                    delay: s.delay,
                });
            }
            for row in rows {
                if row.len() as u64 > limit {
                    return Err(CoreError::ResourceLimit {
                        population,
                        connection: Some(id),
                        what: "synapses per cell",
                        value: row.len() as u64,
                        limit,
                    });
                }
                synapses.extend(row);
                offsets.push(offset_of(synapses.len(), population, id)?);
            }
        } else {
            if let Generation::Random {
                count,
                allow_self: false,
            } = spec.generation
            {
                if source.is_self && count > 0 && n_source < 2 {
                    return Err(config("self-avoiding random connection needs two cells".into()));
                }
            }
            for cell in 0..n_target {
                let cursor = SeedCursor::new(seed.skip(cell as u64 * stride));
                generate_row(&spec, cell, target, source, cursor, &mut synapses);
                offsets.push(offset_of(synapses.len(), population, id)?);
            }
        }

        let substances = if spec.plasticity.amplification.uses_substance() {
            vec![SubstanceState::default(); synapses.len()]
        } else {
            Vec::new()
        };
        let relation = if source.is_self {
            SelfRelation::SelfSource
        } else {
            SelfRelation::NonSelf
        };
        let mut conn = Connection {
            id,
            spec,
            offsets,
            synapses,
            substances,
            relation,
            terms: TermSigns::default(),
        };
        conn.refresh_terms(source);
        Ok(conn)
    }
}

fn offset_of(len: usize, population: PopulationId, id: ConnectionId) -> Result<u32> {
    u32::try_from(len).map_err(|_| CoreError::ResourceLimit {
        population,
        connection: Some(id),
        what: "synapses per connection",
        value: len as u64,
        limit: u32::MAX as u64,
    })
}

/// Upper bound on synapses one target cell can receive.
fn per_cell_capacity(generation: &Generation, source: &GridShape) -> u64 {
    match generation {
        Generation::Random { count, .. } => *count as u64,
        Generation::Topographic { radius } => {
            let side = 2 * *radius as u64 + 1;
            side.min(source.groups_x as u64) * side.min(source.groups_y as u64)
                * source.cells_per_group as u64
        }
        Generation::Full => source.cell_count() as u64,
        Generation::Explicit { .. } => 0,
    }
}

fn generate_row(
    spec: &ConnectionSpec,
    cell: usize,
    target: &GridShape,
    source: &SourceInfo,
    mut cursor: SeedCursor,
    out: &mut Vec<Synapse>,
) {
    let n_source = source.grid.cell_count() as u32;
    let mut push = |src: u32, cursor: &mut SeedCursor| {
        let weight = match spec.weights {
            WeightInit::Constant { value } => value,
            WeightInit::Uniform { min, max } => {
                let span = (max as i32 - min as i32 + 1) as u32;
                (min as i32 + cursor.below(span) as i32) as i16
            }
        };
        let delay = match spec.delays {
            DelayRule::Constant { delay } => delay,
            DelayRule::Uniform { min, max } => {
                min + cursor.below((max - min) as u32 + 1) as u8
            }
        };
        out.push(Synapse {
            source: src,
            weight,
            delay,
        });
    };

    match &spec.generation {
        Generation::Random { count, allow_self } => {
            for _ in 0..*count {
                let mut src = cursor.below(n_source);
                if !allow_self && source.is_self && src as usize == cell {
                    src = (src + 1) % n_source;
                }
                push(src, &mut cursor);
            }
        }
        Generation::Topographic { radius } => {
            let grid = &source.grid;
            let centre = grid.map_group_from(target, target.group_of(cell));
            let (cx, cy) = grid.group_xy(centre);
            let r = *radius as i64;
            let y0 = (cy as i64 - r).max(0);
            let y1 = (cy as i64 + r).min(grid.groups_y as i64 - 1);
            let x0 = (cx as i64 - r).max(0);
            let x1 = (cx as i64 + r).min(grid.groups_x as i64 - 1);
            for y in y0..=y1 {
                for x in x0..=x1 {
                    for src in grid.members(grid.group_index(x as u32, y as u32)) {
                        push(src as u32, &mut cursor);
                    }
                }
            }
        }
        Generation::Full => {
            for src in 0..n_source {
                push(src, &mut cursor);
            }
        }
        Generation::Explicit { .. } => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(grid: GridShape, is_self: bool) -> SourceInfo {
        SourceInfo {
            grid,
            response_min: 0,
            response_max: S14_ONE,
            is_self,
        }
    }

    fn build(spec: ConnectionSpec, target: GridShape, source: SourceInfo) -> Result<Connection> {
        Connection::generate(
            PopulationId(0),
            ConnectionId(0),
            spec,
            &target,
            &source,
            Seed::new(99),
            &LimitsConfig::default(),
        )
    }

    #[test]
    fn test_random_avoids_self() {
        let grid = GridShape::new(3, 3, 1);
        let spec = ConnectionSpec::new(
            SourceRef::Population(PopulationId(0)),
            Generation::Random {
                count: 20,
                allow_self: false,
            },
        );
        let conn = build(spec, grid, info(grid, true)).unwrap();
        assert_eq!(conn.total_synapses(), 9 * 20);
        for cell in 0..9 {
            assert_eq!(conn.synapse_count(cell), 20);
            assert!(conn.synapses_of(cell).iter().all(|s| s.source as usize != cell));
        }
        assert_eq!(conn.relation, SelfRelation::SelfSource);
    }

    #[test]
    fn test_rows_are_independent_of_neighbours() {
        // The table for cell 5 comes from its own sub-stream, so growing the
        // population does not change it.
        let spec = ConnectionSpec {
            weights: WeightInit::Uniform { min: -100, max: 100 },
            delays: DelayRule::Uniform { min: 0, max: 3 },
            ..ConnectionSpec::new(
                SourceRef::Virtual(0),
                Generation::Random {
                    count: 4,
                    allow_self: true,
                },
            )
        };
        let source = info(GridShape::new(5, 5, 1), false);
        let small = build(spec.clone(), GridShape::new(3, 2, 1), source).unwrap();
        let large = build(spec, GridShape::new(6, 2, 1), source).unwrap();
        assert_eq!(small.synapses_of(5), large.synapses_of(5));
        assert!(large.synapses.iter().all(|s| (-100..=100).contains(&s.weight)));
        assert!(large.synapses.iter().all(|s| s.delay <= 3));
    }

    #[test]
    fn test_topographic_clips_to_grid() {
        let grid = GridShape::new(4, 4, 2);
        let spec = ConnectionSpec::new(SourceRef::Virtual(0), Generation::Topographic { radius: 1 });
        let conn = build(spec, grid, info(grid, false)).unwrap();
        // corner group sees 2x2 groups, interior 3x3
        assert_eq!(conn.synapse_count(0), 4 * 2);
        assert_eq!(conn.synapse_count(grid.members(5).start), 9 * 2);
    }

    #[test]
    fn test_explicit_and_limits() {
        let grid = GridShape::new(2, 1, 1);
        let spec = ConnectionSpec::new(
            SourceRef::Virtual(0),
            Generation::Explicit {
                synapses: vec![
                    ExplicitSynapse {
                        target: 1,
                        source: 0,
                        weight: 7,
                        delay: 2,
                    },
                    ExplicitSynapse {
                        target: 1,
                        source: 1,
                        weight: -7,
                        delay: 0,
                    },
                ],
            },
        );
        let conn = build(spec, grid, info(grid, false)).unwrap();
        assert_eq!(conn.offsets, vec![0, 0, 2]);
        assert_eq!(conn.max_delay(), 2);
        assert!(conn.terms.positive && conn.terms.negative);

        let full = ConnectionSpec::new(SourceRef::Virtual(0), Generation::Full);
        let big = GridShape::new(300, 300, 1);
        let err = build(full, grid, info(big, false)).unwrap_err();
        assert!(matches!(
            err,
            CoreError::ResourceLimit {
                what: "synapses per cell",
                ..
            }
        ));
    }

    #[test]
    fn test_weights_below_signed_range_are_rejected() {
        let grid = GridShape::new(2, 2, 1);
        let mut constant = ConnectionSpec::new(SourceRef::Virtual(0), Generation::Full);
        constant.weights = WeightInit::Constant { value: i16::MIN };
        let mut uniform = ConnectionSpec::new(SourceRef::Virtual(0), Generation::Full);
        uniform.weights = WeightInit::Uniform {
            min: i16::MIN,
            max: 0,
        };
        let explicit = ConnectionSpec::new(
            SourceRef::Virtual(0),
            Generation::Explicit {
                synapses: vec![ExplicitSynapse {
                    target: 0,
                    source: 0,
                    weight: i16::MIN,
                    delay: 0,
                }],
            },
        );
        for spec in [constant, uniform, explicit] {
            let err = build(spec, grid, info(grid, false)).unwrap_err();
            assert!(matches!(err, CoreError::Config { .. }), "{:?}", err);
        }

        let mut lowest = ConnectionSpec::new(SourceRef::Virtual(0), Generation::Full);
        lowest.weights = WeightInit::Constant { value: WEIGHT_MIN };
        let conn = build(lowest, grid, info(grid, false)).unwrap();
        assert!(conn.weights().all(|w| w == WEIGHT_MIN));
    }

    #[test]
    fn test_raw_limit_saturates() {
        let spec = ConnectionSpec::new(SourceRef::Virtual(0), Generation::Full);
        let limit = spec.raw_limit();
        let mut ov = OverflowCounter::new();
        assert_eq!(spec.scale_raw(limit, &mut ov), i32::MAX);
        assert_eq!(ov.count(), 1);
        assert!(spec.scale_raw(limit - (1 << 25), &mut ov) < i32::MAX);
    }
}
