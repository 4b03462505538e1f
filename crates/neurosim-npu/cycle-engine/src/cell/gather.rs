// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Synapse gather for one target cell and one connection type.
//!
//! Each synapse transmits the delayed response of its source cell (or
//! nothing, when a transmission draw fails), contributes `weight * pre`
//! with the weight it had before this cycle, and then runs its plasticity
//! update. Positive and negative products are summed apart (S28) and scaled
//! apart into S20.
//!
//! The synapse seed always advances by the row length, whether the loop
//! ran to the end or stopped early.

use neurosim_npu_neural::fixed::add_sat_wide;
use neurosim_npu_neural::{ConnectionId, OverflowCounter, Seed, SeedCursor};
use neurosim_npu_plasticity::{update_synapse, SubstanceState, SynapseContext};

use crate::cell::accumulator::{Accumulator, Route};
use crate::cell::autoscale::AutoscaleState;
use crate::cell::phase::{self, PHASE_BINS};
use crate::consolidation::AfferenceKind;
use crate::model::connection::{ConnectionSpec, Synapse, TermSigns};
use crate::model::history::History;

/// Read-only view of one connection type for the cell loop
#[derive(Debug, Clone, Copy)]
pub struct ConnectionMeta<'a> {
    pub id: ConnectionId,
    pub spec: &'a ConnectionSpec,
    pub offsets: &'a [u32],
    pub route: Route,
    pub terms: TermSigns,
    pub raw_limit: i64,
    pub plastic: bool,
    pub source: &'a History,
}

impl<'a> ConnectionMeta<'a> {
    /// Whether both sums that can still move are past saturation.
    #[inline]
    fn saturated(&self, positive: i64, negative: i64) -> bool {
        (!self.terms.positive || positive >= self.raw_limit)
            && (!self.terms.negative || negative <= -self.raw_limit)
    }
}

/// The synapses of one connection type owned by one part
#[derive(Debug)]
pub struct SynapseSlice<'a> {
    /// Index of `synapses[0]` in the connection's full table
    pub base: usize,
    pub synapses: &'a mut [Synapse],
    /// Empty unless the rule carries a substance
    pub substances: &'a mut [SubstanceState],
}

/// Gather `cell`'s row of `meta` into `acc`. Returns the net afference the
/// connection delivered (S20).
#[allow(clippy::too_many_arguments)]
pub fn gather_connection(
    meta: &ConnectionMeta<'_>,
    slice: &mut SynapseSlice<'_>,
    cell: usize,
    ctx: &SynapseContext,
    seed: &mut Seed,
    acc: &mut Accumulator,
    scale: &AutoscaleState,
    ov: &mut OverflowCounter,
) -> i64 {
    let start = meta.offsets[cell] as usize - slice.base;
    let end = meta.offsets[cell + 1] as usize - slice.base;
    let phased = meta.spec.phased;
    let with_substance = !slice.substances.is_empty();
    if phased {
        acc.phase_raw = [0; PHASE_BINS];
    }

    let mut cursor = SeedCursor::new(*seed);
    let mut positive = 0i64;
    let mut negative = 0i64;
    for i in start..end {
        let syn = &mut slice.synapses[i];
        let transmitted = match meta.spec.transmission_probability {
            Some(p) => cursor.chance(p),
            None => true,
        };
        let src = syn.source as usize;
        let pre = if transmitted {
            meta.source.response(syn.delay, src)
        } else {
            0
        };
        let product = syn.weight as i64 * pre as i64;
        if product > 0 {
            positive = positive.saturating_add(product);
            if phased {
                let bin = meta.source.phase(syn.delay, src) as usize % PHASE_BINS;
                acc.phase_raw[bin] = acc.phase_raw[bin].saturating_add(product);
            }
        } else {
            negative = negative.saturating_add(product);
        }

        if meta.plastic {
            let substance = if with_substance {
                Some(&mut slice.substances[i])
            } else {
                None
            };
            update_synapse(&meta.spec.plasticity, &mut syn.weight, substance, pre, ctx, ov);
        } else if meta.saturated(positive, negative) {
            break;
        }
    }
    *seed = cursor.finish((end - start) as u64);

    let pos = meta.spec.scale_raw(positive, ov);
    let neg = meta.spec.scale_raw(negative, ov);
    if phased {
        for (bin, &raw) in acc.phase_raw.iter().enumerate() {
            if raw == 0 {
                continue;
            }
            let mut value = meta.spec.scale_raw(raw, ov);
            if meta.route.autoscale {
                value = scale.apply(AfferenceKind::Excitatory, value, ov);
            }
            phase::deposit(&mut acc.phase, bin as u8, value, ov);
        }
        acc.deposit_split(&meta.route, 0, neg, scale, ov);
    } else {
        acc.deposit_split(&meta.route, pos, neg, scale, ov);
    }
    add_sat_wide(pos as i64, neg as i64, ov)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consolidation::{AfferenceMask, ClassKey, ConnectionClass, SelfRelation};
    use crate::model::connection::{Generation, InputKind};
    use crate::model::population::SourceRef;
    use neurosim_npu_neural::{S14_ONE, S16_ONE};
    use neurosim_npu_plasticity::{AmplificationRule, DecayRule, PlasticityRule};

    fn route() -> Route {
        Route {
            class: ConnectionClass::Specific,
            relation: SelfRelation::NonSelf,
            kind: InputKind::Linear,
            autoscale: false,
        }
    }

    fn accumulator() -> Accumulator {
        let mut mask = AfferenceMask::empty();
        for &kind in InputKind::Linear.kinds() {
            mask.insert(ClassKey::new(ConnectionClass::Specific, SelfRelation::NonSelf, kind));
        }
        Accumulator::new(mask)
    }

    fn source() -> History {
        let mut h = History::new(4, 0);
        h.commit([(S14_ONE, 0), (S14_ONE / 2, 0), (-S14_ONE, 0), (0, 0)]);
        h
    }

    fn synapses() -> Vec<Synapse> {
        [(0, 1000), (1, 1000), (2, 1000), (3, 1000)]
            .iter()
            .map(|&(source, weight)| Synapse {
                source,
                weight,
                delay: 0,
            })
            .collect()
    }

    fn meta<'a>(spec: &'a ConnectionSpec, offsets: &'a [u32], source: &'a History) -> ConnectionMeta<'a> {
        ConnectionMeta {
            id: ConnectionId(0),
            spec,
            offsets,
            route: route(),
            terms: TermSigns {
                positive: true,
                negative: true,
            },
            raw_limit: spec.raw_limit(),
            plastic: spec.plasticity.is_plastic(),
            source,
        }
    }

    #[test]
    fn test_split_sums_and_seed_advance() {
        let spec = ConnectionSpec::new(SourceRef::Virtual(0), Generation::Full);
        let offsets = [0u32, 4];
        let h = source();
        let m = meta(&spec, &offsets, &h);
        let mut syn = synapses();
        let mut slice = SynapseSlice {
            base: 0,
            synapses: &mut syn,
            substances: &mut [],
        };
        let mut acc = accumulator();
        let start = Seed::new(17);
        let mut seed = start;
        let mut ov = OverflowCounter::new();
        let net = gather_connection(
            &m,
            &mut slice,
            0,
            &SynapseContext::default(),
            &mut seed,
            &mut acc,
            &AutoscaleState::default(),
            &mut ov,
        );
        // 1000 * (1 + 0.5) and 1000 * -1, S28 scaled by 1.0 into S20
        assert_eq!(acc.slots, vec![1500 << 6, -1000 << 6]);
        assert_eq!(net, 500 << 6);
        assert_eq!(seed, start.skip(4));
    }

    #[test]
    fn test_early_stop_still_skips_row() {
        let spec = ConnectionSpec {
            scale: S16_ONE,
            ..ConnectionSpec::new(SourceRef::Virtual(0), Generation::Full)
        };
        let offsets = [0u32, 4];
        let h = source();
        let mut m = meta(&spec, &offsets, &h);
        m.terms.negative = false;
        m.raw_limit = 1;
        let mut syn = synapses();
        let mut slice = SynapseSlice {
            base: 0,
            synapses: &mut syn,
            substances: &mut [],
        };
        let mut acc = accumulator();
        let start = Seed::new(5);
        let mut seed = start;
        let mut ov = OverflowCounter::new();
        gather_connection(
            &m,
            &mut slice,
            0,
            &SynapseContext::default(),
            &mut seed,
            &mut acc,
            &AutoscaleState::default(),
            &mut ov,
        );
        // stopped after the first synapse
        assert_eq!(acc.slots, vec![1000 << 6, 0]);
        assert_eq!(seed, start.skip(4));
    }

    #[test]
    fn test_contribution_uses_weight_before_update() {
        let spec = ConnectionSpec {
            plasticity: PlasticityRule {
                decay: DecayRule::None,
                amplification: AmplificationRule::Hebbian {
                    rate: S16_ONE,
                    mti: 0,
                    mtj: 0,
                    value_modulated: false,
                },
                freeze_cycles: 0,
            },
            ..ConnectionSpec::new(SourceRef::Virtual(0), Generation::Full)
        };
        let offsets = [0u32, 4];
        let h = source();
        let m = meta(&spec, &offsets, &h);
        let mut syn = synapses();
        let mut slice = SynapseSlice {
            base: 0,
            synapses: &mut syn,
            substances: &mut [],
        };
        let mut acc = accumulator();
        let mut seed = Seed::new(5);
        let mut ov = OverflowCounter::new();
        let ctx = SynapseContext {
            post: S14_ONE / 2,
            ..SynapseContext::default()
        };
        gather_connection(
            &m,
            &mut slice,
            0,
            &ctx,
            &mut seed,
            &mut acc,
            &AutoscaleState::default(),
            &mut ov,
        );
        assert_eq!(acc.slots, vec![1500 << 6, -1000 << 6]);
        assert!(syn[0].weight > 1000);
        assert_eq!(syn[3].weight, 1000);
    }
}
