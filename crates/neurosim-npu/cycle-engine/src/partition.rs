// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Static partitioning of a population's cells into contiguous parts.
//!
//! Part `i` of `n` over `len` cells covers `[i * len / n, (i + 1) * len / n)`.
//! The split is fixed by the worker count alone; parts never move cells.

use std::ops::Range;

use neurosim_npu_plasticity::SubstanceState;

use crate::cell::engine::CellPart;
use crate::cell::gather::SynapseSlice;
use crate::model::connection::Synapse;
use crate::model::population::CellState;

pub fn split_ranges(len: usize, parts: usize) -> Vec<Range<usize>> {
    let parts = parts.max(1);
    (0..parts)
        .map(|i| i * len / parts..(i + 1) * len / parts)
        .collect()
}

/// Cut `slice` into consecutive pieces of the given lengths.
fn split_by<'a, T>(mut slice: &'a mut [T], lengths: impl IntoIterator<Item = usize>) -> Vec<&'a mut [T]> {
    let mut out = Vec::new();
    for len in lengths {
        let (head, tail) = std::mem::take(&mut slice).split_at_mut(len);
        out.push(head);
        slice = tail;
    }
    out
}

/// One connection's synapse table, borrowed apart from its metadata
#[derive(Debug)]
pub struct SynapseTable<'a> {
    pub offsets: &'a [u32],
    pub synapses: &'a mut [Synapse],
    /// Empty unless the rule carries a substance
    pub substances: &'a mut [SubstanceState],
}

/// Split the cells and every synapse table along `ranges`.
pub fn split_parts<'a>(
    cells: &'a mut [CellState],
    tables: Vec<SynapseTable<'a>>,
    ranges: &[Range<usize>],
) -> Vec<CellPart<'a>> {
    let cell_parts = split_by(cells, ranges.iter().map(|r| r.len()));

    // per connection, per part
    let mut per_table: Vec<std::vec::IntoIter<SynapseSlice<'a>>> = Vec::with_capacity(tables.len());
    for table in tables {
        let SynapseTable {
            offsets,
            synapses,
            substances,
        } = table;
        let bounds: Vec<(usize, usize)> = ranges
            .iter()
            .map(|r| (offsets[r.start] as usize, offsets[r.end] as usize))
            .collect();
        let lengths = || bounds.iter().map(|(a, b)| b - a);
        let syn_parts = split_by(synapses, lengths());
        let sub_parts: Vec<&'a mut [SubstanceState]> = if substances.is_empty() {
            bounds.iter().map(|_| <&mut [SubstanceState]>::default()).collect()
        } else {
            split_by(substances, lengths())
        };
        let slices: Vec<SynapseSlice<'a>> = bounds
            .iter()
            .zip(syn_parts.into_iter().zip(sub_parts))
            .map(|(&(base, _), (synapses, substances))| SynapseSlice {
                base,
                synapses,
                substances,
            })
            .collect();
        per_table.push(slices.into_iter());
    }

    ranges
        .iter()
        .zip(cell_parts)
        .map(|(range, cells)| CellPart {
            start: range.start,
            cells,
            synapses: per_table.iter_mut().filter_map(Iterator::next).collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranges_cover_everything_in_order() {
        for (len, parts) in [(10, 3), (3, 5), (0, 2), (7, 1)] {
            let ranges = split_ranges(len, parts);
            assert_eq!(ranges.len(), parts);
            assert_eq!(ranges[0].start, 0);
            assert_eq!(ranges.last().unwrap().end, len);
            for pair in ranges.windows(2) {
                assert_eq!(pair[0].end, pair[1].start);
            }
        }
        assert_eq!(split_ranges(10, 3), vec![0..3, 3..6, 6..10]);
    }

    #[test]
    fn test_split_by_lengths() {
        let mut data = [1, 2, 3, 4, 5];
        let parts = split_by(&mut data[..], [2, 0, 3]);
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], &[1, 2]);
        assert!(parts[1].is_empty());
        assert_eq!(parts[2], &[3, 4, 5]);
    }

    #[test]
    fn test_split_parts_rebases_synapse_rows() {
        let mut cells = vec![CellState::default(); 3];
        let offsets = [0u32, 2, 2, 5];
        let mut synapses: Vec<Synapse> = (0..5)
            .map(|source| Synapse {
                source,
                weight: 0,
                delay: 0,
            })
            .collect();
        let table = SynapseTable {
            offsets: &offsets,
            synapses: &mut synapses,
            substances: &mut [],
        };
        let parts = split_parts(&mut cells, vec![table], &split_ranges(3, 2));
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].cells.len(), 1);
        assert_eq!(parts[0].synapses[0].synapses[1].source, 1);
        assert_eq!(parts[1].start, 1);
        assert_eq!(parts[1].synapses[0].base, 2);
        assert_eq!(parts[1].synapses[0].synapses.len(), 3);
    }
}
