// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Response history rings serving axonal delays.
//!
//! Delay 0 reads the most recently committed row. Populations are committed
//! in processing order, so a reader sees the current cycle of every earlier
//! population and the previous cycle of itself and every later one.

use crate::model::population::SourceRef;

#[derive(Debug, Clone)]
pub struct History {
    cells: usize,
    depth: usize,
    head: usize,
    responses: Vec<i32>,
    phases: Vec<u8>,
}

impl History {
    /// Ring holding `max_delay + 1` rows of `cells` values, all zero.
    pub fn new(cells: usize, max_delay: u8) -> Self {
        let depth = max_delay as usize + 1;
        Self {
            cells,
            depth,
            head: 0,
            responses: vec![0; cells * depth],
            phases: vec![0; cells * depth],
        }
    }

    pub fn cells(&self) -> usize {
        self.cells
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    #[inline]
    fn row(&self, delay: u8) -> usize {
        let delay = (delay as usize).min(self.depth - 1);
        (self.head + self.depth - delay) % self.depth
    }

    #[inline]
    pub fn response(&self, delay: u8, cell: usize) -> i32 {
        self.responses[self.row(delay) * self.cells + cell]
    }

    #[inline]
    pub fn phase(&self, delay: u8, cell: usize) -> u8 {
        self.phases[self.row(delay) * self.cells + cell]
    }

    /// Most recent row
    pub fn latest(&self) -> &[i32] {
        let start = self.head * self.cells;
        &self.responses[start..start + self.cells]
    }

    /// Push a new row; `values` yields `(response, phase)` per cell.
    pub fn commit(&mut self, values: impl IntoIterator<Item = (i32, u8)>) {
        self.head = (self.head + 1) % self.depth;
        let start = self.head * self.cells;
        let rows = self.responses[start..start + self.cells]
            .iter_mut()
            .zip(self.phases[start..start + self.cells].iter_mut());
        for ((r, p), (response, phase)) in rows.zip(values) {
            *r = response;
            *p = phase;
        }
    }

    /// Fill every row with the same values.
    pub fn fill(&mut self, values: &[i32]) {
        for row in self.responses.chunks_mut(self.cells.max(1)) {
            row.copy_from_slice(&values[..row.len()]);
        }
        self.phases.iter_mut().for_each(|p| *p = 0);
    }

    pub fn clear(&mut self) {
        self.responses.iter_mut().for_each(|r| *r = 0);
        self.phases.iter_mut().for_each(|p| *p = 0);
        self.head = 0;
    }
}

/// Histories of every population and virtual input of a network
#[derive(Debug, Clone, Default)]
pub struct Histories {
    pub populations: Vec<History>,
    pub virtuals: Vec<History>,
}

impl Histories {
    #[inline]
    pub fn source(&self, source: SourceRef) -> &History {
        match source {
            SourceRef::Population(id) => &self.populations[id.0 as usize],
            SourceRef::Virtual(i) => &self.virtuals[i as usize],
        }
    }

    pub fn clear(&mut self) {
        self.populations.iter_mut().for_each(History::clear);
        self.virtuals.iter_mut().for_each(History::clear);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delays_read_older_rows() {
        let mut h = History::new(2, 2);
        for t in 1..=4 {
            h.commit([(t * 10, t as u8), (t * 100, 0)]);
        }
        assert_eq!(h.response(0, 0), 40);
        assert_eq!(h.response(1, 0), 30);
        assert_eq!(h.response(2, 1), 200);
        assert_eq!(h.phase(1, 0), 3);
        assert_eq!(h.latest(), &[40, 400]);
    }

    #[test]
    fn test_delay_beyond_depth_reads_oldest() {
        let mut h = History::new(1, 1);
        h.commit([(5, 0)]);
        h.commit([(6, 0)]);
        assert_eq!(h.response(9, 0), 5);
    }

    #[test]
    fn test_fill_and_clear() {
        let mut h = History::new(3, 1);
        h.fill(&[1, 2, 3]);
        assert_eq!(h.response(1, 2), 3);
        h.clear();
        assert_eq!(h.latest(), &[0, 0, 0]);
    }
}
