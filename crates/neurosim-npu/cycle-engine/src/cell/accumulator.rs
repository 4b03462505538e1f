// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Per-cell scratch for one worker's cell loop.
//!
//! Created once per part, cleared before every cell, never shared.

use neurosim_npu_neural::fixed::{add_sat_wide, mul_round_shift};
use neurosim_npu_neural::OverflowCounter;

use crate::cell::autoscale::AutoscaleState;
use crate::cell::phase::{PhaseHistogram, PHASE_BINS};
use crate::consolidation::{AfferenceKind, AfferenceMask, ClassKey, ConnectionClass, SelfRelation};
use crate::model::connection::InputKind;

/// Where one afferent source deposits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub class: ConnectionClass,
    pub relation: SelfRelation,
    pub kind: InputKind,
    pub autoscale: bool,
}

#[derive(Debug, Clone)]
pub struct Accumulator {
    mask: AfferenceMask,
    /// One per consolidation key present (S20)
    pub slots: Vec<i64>,
    /// Phased afference of the current cell (S20)
    pub phase: PhaseHistogram,
    /// Raw positive S28 sums of the connection being gathered, per bin
    pub phase_raw: [i64; PHASE_BINS],
}

impl Accumulator {
    pub fn new(mask: AfferenceMask) -> Self {
        Self {
            mask,
            slots: vec![0; mask.len()],
            phase: [0; PHASE_BINS],
            phase_raw: [0; PHASE_BINS],
        }
    }

    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|s| *s = 0);
        self.phase = [0; PHASE_BINS];
    }

    #[inline]
    fn add(&mut self, route: &Route, kind: AfferenceKind, value: i32, scale: &AutoscaleState, ov: &mut OverflowCounter) {
        if value == 0 {
            return;
        }
        let value = if route.autoscale {
            scale.apply(kind, value, ov)
        } else {
            value
        };
        let key = ClassKey::new(route.class, route.relation, kind);
        debug_assert!(self.mask.contains(key), "{:?} not in mask", key);
        let slot = self.mask.offset(key);
        self.slots[slot] = add_sat_wide(self.slots[slot], value as i64, ov);
    }

    /// Deposit a source whose positive and negative parts were scaled
    /// separately (S20). Linear sources keep the split; the other kinds act
    /// on the net value.
    pub fn deposit_split(
        &mut self,
        route: &Route,
        positive: i32,
        negative: i32,
        scale: &AutoscaleState,
        ov: &mut OverflowCounter,
    ) {
        match route.kind {
            InputKind::Linear => {
                self.add(route, AfferenceKind::Excitatory, positive, scale, ov);
                self.add(route, AfferenceKind::Hyperpolarizing, negative, scale, ov);
            }
            _ => {
                let net = (positive as i64 + negative as i64).clamp(i32::MIN as i64, i32::MAX as i64) as i32;
                self.deposit(route, net, scale, ov);
            }
        }
    }

    /// Deposit one signed value (S20).
    pub fn deposit(&mut self, route: &Route, value: i32, scale: &AutoscaleState, ov: &mut OverflowCounter) {
        match route.kind {
            InputKind::Linear if value >= 0 => {
                self.add(route, AfferenceKind::Excitatory, value, scale, ov)
            }
            InputKind::Linear => self.add(route, AfferenceKind::Hyperpolarizing, value, scale, ov),
            InputKind::Squared => {
                let sq = mul_round_shift(value as i64, value as i64, 20, ov);
                self.add(route, AfferenceKind::Squared, sq, scale, ov)
            }
            InputKind::Shunting => {
                let magnitude = value.checked_abs().unwrap_or(i32::MAX);
                self.add(route, AfferenceKind::Shunting, magnitude, scale, ov)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(kind: InputKind) -> Route {
        Route {
            class: ConnectionClass::Geometric,
            relation: SelfRelation::NonSelf,
            kind,
            autoscale: false,
        }
    }

    fn mask_for(routes: &[Route]) -> AfferenceMask {
        let mut mask = AfferenceMask::empty();
        for r in routes {
            for &kind in r.kind.kinds() {
                mask.insert(ClassKey::new(r.class, r.relation, kind));
            }
        }
        mask
    }

    #[test]
    fn test_kinds_land_in_their_slots() {
        let routes = [
            route(InputKind::Linear),
            route(InputKind::Squared),
            route(InputKind::Shunting),
        ];
        let mut acc = Accumulator::new(mask_for(&routes));
        let scale = AutoscaleState::default();
        let mut ov = OverflowCounter::new();
        acc.deposit(&routes[0], 300, &scale, &mut ov);
        acc.deposit(&routes[0], -100, &scale, &mut ov);
        acc.deposit(&routes[1], -(1 << 20), &scale, &mut ov);
        acc.deposit(&routes[2], -50, &scale, &mut ov);
        // slot order follows kind bits: E, H, Sq, Sh
        assert_eq!(acc.slots, vec![300, -100, 1 << 20, 50]);
        acc.clear();
        assert!(acc.slots.iter().all(|&s| s == 0));
    }

    #[test]
    fn test_split_and_autoscale() {
        let r = Route {
            autoscale: true,
            ..route(InputKind::Linear)
        };
        let mut acc = Accumulator::new(mask_for(&[r]));
        let scale = AutoscaleState {
            depolarizing: 1 << 15,
            hyperpolarizing: 1 << 17,
        };
        let mut ov = OverflowCounter::new();
        acc.deposit_split(&r, 400, -400, &scale, &mut ov);
        assert_eq!(acc.slots, vec![200, -800]);
    }
}
