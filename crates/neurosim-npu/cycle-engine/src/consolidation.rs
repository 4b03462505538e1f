// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Afference Consolidation
//!
//! Every afferent source of a population lands in one accumulator slot per
//! `(class, self-relation, kind)` key it produces. Which keys exist is a
//! 24-bit mask:
//!
//! ```text
//! bit = class * 8 + relation * 4 + kind
//!
//! class     Specific=0  Geometric=1  Modulatory=2
//! relation  SelfSource=0  NonSelf=1
//! kind      Excitatory=0  Hyperpolarizing=1  Squared=2  Shunting=3
//! ```
//!
//! A key's slot is the number of set bits below it, so the slot vector is
//! dense and its layout is a pure function of the mask. The table is built
//! once per population per cycle and lists, per kind, the slots to add up.

use serde::{Deserialize, Serialize};

/// Connection class of an afferent source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionClass {
    Specific = 0,
    Geometric = 1,
    Modulatory = 2,
}

/// Whether a source is the target population itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelfRelation {
    SelfSource = 0,
    NonSelf = 1,
}

/// Physiological category an afferent contribution is summed into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AfferenceKind {
    Excitatory = 0,
    Hyperpolarizing = 1,
    Squared = 2,
    Shunting = 3,
}

impl AfferenceKind {
    pub const ALL: [AfferenceKind; 4] = [
        AfferenceKind::Excitatory,
        AfferenceKind::Hyperpolarizing,
        AfferenceKind::Squared,
        AfferenceKind::Shunting,
    ];

    /// Kinds whose sum feeds the depolarizing autoscale total
    pub fn is_depolarizing(self) -> bool {
        matches!(self, AfferenceKind::Excitatory | AfferenceKind::Squared)
    }
}

/// One accumulator key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassKey {
    pub class: ConnectionClass,
    pub relation: SelfRelation,
    pub kind: AfferenceKind,
}

impl ClassKey {
    pub const fn new(class: ConnectionClass, relation: SelfRelation, kind: AfferenceKind) -> Self {
        Self {
            class,
            relation,
            kind,
        }
    }

    #[inline]
    pub const fn bit(self) -> u32 {
        self.class as u32 * 8 + self.relation as u32 * 4 + self.kind as u32
    }
}

/// Set of keys present in one population
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AfferenceMask(u32);

impl AfferenceMask {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn insert(&mut self, key: ClassKey) {
        self.0 |= 1 << key.bit();
    }

    pub fn contains(self, key: ClassKey) -> bool {
        self.0 & (1 << key.bit()) != 0
    }

    /// The same mask with `key` removed.
    pub fn without(self, key: ClassKey) -> Self {
        Self(self.0 & !(1 << key.bit()))
    }

    /// Number of slots.
    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Slot index of `key`: the count of set bits below its bit. Defined for
    /// absent keys too, where it is the slot the key would take.
    #[inline]
    pub fn offset(self, key: ClassKey) -> usize {
        (self.0 & ((1u32 << key.bit()) - 1)).count_ones() as usize
    }
}

/// Per-kind slot lists for one population and cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsolidationTable {
    mask: AfferenceMask,
    by_kind: [Vec<usize>; 4],
    depolarizing: Vec<usize>,
    hyperpolarizing: Vec<usize>,
}

/// Slot totals per kind, S20
pub type KindTotals = [i64; 4];

impl ConsolidationTable {
    pub fn build(mask: AfferenceMask) -> Self {
        let mut by_kind: [Vec<usize>; 4] = Default::default();
        let mut depolarizing = Vec::new();
        let mut hyperpolarizing = Vec::new();
        for bit in 0..24u32 {
            if mask.0 & (1 << bit) == 0 {
                continue;
            }
            let slot = (mask.0 & ((1u32 << bit) - 1)).count_ones() as usize;
            let kind = AfferenceKind::ALL[(bit % 4) as usize];
            by_kind[kind as usize].push(slot);
            if kind.is_depolarizing() {
                depolarizing.push(slot);
            } else {
                hyperpolarizing.push(slot);
            }
        }
        Self {
            mask,
            by_kind,
            depolarizing,
            hyperpolarizing,
        }
    }

    pub fn mask(&self) -> AfferenceMask {
        self.mask
    }

    pub fn slots(&self, kind: AfferenceKind) -> &[usize] {
        &self.by_kind[kind as usize]
    }

    /// Slots feeding the depolarizing autoscale total
    pub fn depolarizing(&self) -> &[usize] {
        &self.depolarizing
    }

    /// Slots feeding the hyperpolarizing autoscale total
    pub fn hyperpolarizing(&self) -> &[usize] {
        &self.hyperpolarizing
    }

    /// Sum the slot vector into per-kind totals.
    #[inline]
    pub fn consolidate(&self, slots: &[i64]) -> KindTotals {
        let mut totals = [0i64; 4];
        for (kind, list) in self.by_kind.iter().enumerate() {
            totals[kind] = list.iter().map(|&s| slots[s]).fold(0i64, i64::saturating_add);
        }
        totals
    }

    #[inline]
    pub fn sum_of(&self, list: &[usize], slots: &[i64]) -> i64 {
        list.iter().map(|&s| slots[s]).fold(0i64, i64::saturating_add)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPEC_E_NS: ClassKey = ClassKey::new(
        ConnectionClass::Specific,
        SelfRelation::NonSelf,
        AfferenceKind::Excitatory,
    );
    const SPEC_H_NS: ClassKey = ClassKey::new(
        ConnectionClass::Specific,
        SelfRelation::NonSelf,
        AfferenceKind::Hyperpolarizing,
    );
    const GEO_H_SELF: ClassKey = ClassKey::new(
        ConnectionClass::Geometric,
        SelfRelation::SelfSource,
        AfferenceKind::Hyperpolarizing,
    );
    const MOD_SHUNT_NS: ClassKey = ClassKey::new(
        ConnectionClass::Modulatory,
        SelfRelation::NonSelf,
        AfferenceKind::Shunting,
    );

    fn mask() -> AfferenceMask {
        let mut m = AfferenceMask::empty();
        for key in [SPEC_E_NS, SPEC_H_NS, GEO_H_SELF, MOD_SHUNT_NS] {
            m.insert(key);
        }
        m
    }

    #[test]
    fn test_bits_are_distinct_and_below_24() {
        let mut seen = 0u32;
        for class in [
            ConnectionClass::Specific,
            ConnectionClass::Geometric,
            ConnectionClass::Modulatory,
        ] {
            for relation in [SelfRelation::SelfSource, SelfRelation::NonSelf] {
                for kind in AfferenceKind::ALL {
                    let bit = ClassKey::new(class, relation, kind).bit();
                    assert!(bit < 24);
                    assert_eq!(seen & (1 << bit), 0);
                    seen |= 1 << bit;
                }
            }
        }
        assert_eq!(seen.count_ones(), 24);
    }

    #[test]
    fn test_offsets_are_dense_in_bit_order() {
        let m = mask();
        assert_eq!(m.len(), 4);
        assert_eq!(m.offset(SPEC_E_NS), 0);
        assert_eq!(m.offset(SPEC_H_NS), 1);
        assert_eq!(m.offset(GEO_H_SELF), 2);
        assert_eq!(m.offset(MOD_SHUNT_NS), 3);
    }

    #[test]
    fn test_offset_with_one_bit_masked_out() {
        let m = mask();
        let reduced = m.without(SPEC_H_NS);
        assert!(!reduced.contains(SPEC_H_NS));
        assert_eq!(reduced.offset(GEO_H_SELF), 1);
        // the removed key keeps the position it would take
        assert_eq!(reduced.offset(SPEC_H_NS), 1);
        assert_eq!(m.offset(GEO_H_SELF), reduced.offset(GEO_H_SELF) + 1);
    }

    #[test]
    fn test_table_lists_and_totals() {
        let table = ConsolidationTable::build(mask());
        assert_eq!(table.slots(AfferenceKind::Excitatory), &[0]);
        assert_eq!(table.slots(AfferenceKind::Hyperpolarizing), &[1, 2]);
        assert_eq!(table.slots(AfferenceKind::Shunting), &[3]);
        assert_eq!(table.depolarizing(), &[0]);
        assert_eq!(table.hyperpolarizing(), &[1, 2, 3]);

        let totals = table.consolidate(&[10, -3, -4, 7]);
        assert_eq!(totals, [10, -7, 0, 7]);
    }
}
