// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Box-Sum Engine
//!
//! Per group and band, the reduction over every group at that ring
//! distance. Band 0 is the group itself; band `k` covers radii
//! `(r_{k-1}, r_k]`.
//!
//! ## Square rings
//! The square of radius `r` grows from radius `r - 1` by two columns over
//! the old rows and two rows over the new columns:
//!
//! ```text
//!   r r r r r
//!   c . . . c        c: column strip, rows of the old box
//!   c . o . c        r: row strip, columns of the new box
//!   c . . . c
//!   r r r r r
//! ```
//!
//! Each strip is one difference of a 1-D prefix sum, so a group pays O(1)
//! per radius step. On a torus the box extent per side is clipped to
//! `left = min(r, n/2)`, `right = min(r, (n-1)/2)` so the box never wraps
//! onto itself.
//!
//! ## Exact discs
//! A precomputed offset list per band, read straight from the padded grid
//! (or with wrap-around on a torus).
//!
//! ## Total minus inner
//! The outermost band is `total - box(r_{K-1})`, with `total` the sum over
//! the whole grid. Only for additive reductions on Zero, Normalize and Torus
//! boundaries.

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use neurosim_npu_neural::fixed::mul_round_shift;
use neurosim_npu_neural::{OverflowCounter, Seed, S14};

use crate::geometric::disc::DiscOffsets;
use crate::geometric::grid::{padded, wrap, Boundary};

/// How member cells of a group are reduced to one value (S14)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reduction {
    Sum,
    /// Sum of the parts above `threshold`
    Threshold { threshold: i32 },
    /// Sum of squares
    Square,
    Max,
}

impl Reduction {
    pub fn is_additive(&self) -> bool {
        !matches!(self, Reduction::Max)
    }

    /// One member's share of an additive reduction
    #[inline]
    pub fn term(&self, s: i32, ov: &mut OverflowCounter) -> i64 {
        match *self {
            Reduction::Sum | Reduction::Max => s as i64,
            Reduction::Threshold { threshold } => (s as i64 - threshold as i64).max(0),
            Reduction::Square => mul_round_shift(s as i64, s as i64, S14, ov) as i64,
        }
    }

    pub fn reduce(&self, members: impl IntoIterator<Item = i32>, ov: &mut OverflowCounter) -> i64 {
        let it = members.into_iter();
        match self {
            Reduction::Max => it.map(|s| s as i64).max().unwrap_or(0),
            _ => it.fold(0i64, |acc, s| acc.saturating_add(self.term(s, ov))),
        }
    }
}

/// Shape of the bands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BandMode {
    /// Chebyshev rings, incremental strips
    #[default]
    Square,
    /// Euclidean (elliptical) rings from an offset list
    Disc { aspect_x: u32, aspect_y: u32 },
}

/// Setup-time band configuration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BandError {
    #[error("band radius {radius} exceeds the grid limit {limit}")]
    Range { radius: u32, limit: u32 },
    #[error("band {band} is degenerate (radius {inner} .. {outer})")]
    Degenerate { band: usize, inner: u32, outer: u32 },
    #[error("{0}")]
    Unsupported(&'static str),
}

/// Per-side reach of the box at one radius
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Extents {
    left: usize,
    right: usize,
    up: usize,
    down: usize,
}

/// Everything about a block's bands that is fixed at setup.
#[derive(Debug, Clone)]
pub struct BoxSumPlan {
    groups_x: usize,
    groups_y: usize,
    radii: Vec<u32>,
    boundary: Boundary,
    reduction: Reduction,
    total_minus_inner: bool,
    disc: Option<DiscOffsets>,
    pad_x: usize,
    pad_y: usize,
    /// Torus clip per side `(left, right, up, down)`; unbounded otherwise
    clip: (usize, usize, usize, usize),
    /// In-grid group count per group and band, Normalize only
    actual: Option<Array2<i64>>,
    nominal: Vec<i64>,
}

impl BoxSumPlan {
    pub fn new(
        groups_x: u32,
        groups_y: u32,
        radii: &[u32],
        boundary: Boundary,
        mode: BandMode,
        reduction: Reduction,
        total_minus_inner: bool,
    ) -> Result<Self, BandError> {
        let (gx, gy) = (groups_x as usize, groups_y as usize);
        let limit = if boundary.is_torus() {
            groups_x.max(groups_y) / 2
        } else {
            groups_x.max(groups_y)
        };
        let mut inner = 0u32;
        for (k, &r) in radii.iter().enumerate() {
            if r <= inner {
                return Err(BandError::Degenerate {
                    band: k + 1,
                    inner,
                    outer: r,
                });
            }
            inner = r;
        }
        if inner > limit {
            return Err(BandError::Range { radius: inner, limit });
        }
        if total_minus_inner {
            if radii.is_empty() {
                return Err(BandError::Unsupported("total-minus-inner needs at least one band"));
            }
            if !boundary.supports_total_minus_inner() {
                return Err(BandError::Unsupported(
                    "total-minus-inner requires a zero, normalize or torus boundary",
                ));
            }
            if !reduction.is_additive() {
                return Err(BandError::Unsupported("total-minus-inner requires an additive reduction"));
            }
        }
        if matches!(boundary, Boundary::Normalize) && !reduction.is_additive() {
            return Err(BandError::Unsupported("area normalization requires an additive reduction"));
        }

        let r_max = inner as usize;
        let clip = if boundary.is_torus() {
            (gx / 2, (gx.max(1) - 1) / 2, gy / 2, (gy.max(1) - 1) / 2)
        } else {
            (usize::MAX, usize::MAX, usize::MAX, usize::MAX)
        };
        let disc = match mode {
            BandMode::Square => None,
            BandMode::Disc { aspect_x, aspect_y } => {
                if aspect_x == 0 || aspect_y == 0 {
                    return Err(BandError::Unsupported("disc aspect must be positive"));
                }
                let torus = boundary.is_torus().then_some((groups_x, groups_y));
                Some(DiscOffsets::build(radii, aspect_x, aspect_y, torus))
            }
        };
        let (pad_x, pad_y) = match (&disc, boundary.is_torus()) {
            (Some(_), true) => (0, 0),
            (Some(d), false) => (d.extent().0 as usize, d.extent().1 as usize),
            (None, true) => (r_max.min(gx / 2), r_max.min(gy / 2)),
            (None, false) => (r_max, r_max),
        };

        let mut plan = Self {
            groups_x: gx,
            groups_y: gy,
            radii: radii.to_vec(),
            boundary,
            reduction,
            total_minus_inner,
            disc,
            pad_x,
            pad_y,
            clip,
            actual: None,
            nominal: Vec::new(),
        };
        if matches!(boundary, Boundary::Normalize) {
            // In-grid footprint: the same bands over an all-ones grid, zero fill.
            let counter = Self {
                boundary: Boundary::Zero,
                reduction: Reduction::Sum,
                ..plan.clone()
            };
            let ones = Array2::<i64>::ones((gy, gx));
            let mut actual = Array2::<i64>::zeros((gx * gy, plan.band_count()));
            counter.compute(ones.view(), &mut Seed::default(), &mut actual);
            plan.nominal = (0..plan.band_count())
                .map(|k| actual.column(k).iter().copied().max().unwrap_or(0))
                .collect();
            plan.actual = Some(actual);
        }
        Ok(plan)
    }

    pub fn band_count(&self) -> usize {
        self.radii.len() + 1
    }

    pub fn radii(&self) -> &[u32] {
        &self.radii
    }

    pub fn boundary(&self) -> Boundary {
        self.boundary
    }

    pub fn reduction(&self) -> Reduction {
        self.reduction
    }

    pub fn group_count(&self) -> usize {
        self.groups_x * self.groups_y
    }

    /// Draws one `compute` takes from the noise seed
    pub fn noise_draws(&self) -> u64 {
        if !matches!(self.boundary, Boundary::Noise { .. }) {
            return 0;
        }
        let padded = (self.groups_x + 2 * self.pad_x) * (self.groups_y + 2 * self.pad_y);
        (padded - self.groups_x * self.groups_y) as u64
    }

    /// Raw band values of every group into `out` (`groups x bands`).
    ///
    /// `groups` is `(groups_y, groups_x)`.
    pub fn compute(&self, groups: ArrayView2<'_, i64>, noise: &mut Seed, out: &mut Array2<i64>) {
        debug_assert_eq!(groups.dim(), (self.groups_y, self.groups_x));
        debug_assert_eq!(out.dim(), (self.group_count(), self.band_count()));
        let grid = padded(groups, self.pad_y, self.pad_x, self.boundary, noise);
        match (&self.disc, self.reduction.is_additive()) {
            (Some(disc), _) => self.compute_disc(groups, &grid, disc, out),
            (None, true) => self.compute_square_additive(groups, &grid, out),
            (None, false) => self.compute_square_max(&grid, out),
        }
    }

    fn extents(&self, r: usize) -> Extents {
        Extents {
            left: r.min(self.clip.0),
            right: r.min(self.clip.1),
            up: r.min(self.clip.2),
            down: r.min(self.clip.3),
        }
    }

    fn compute_square_additive(
        &self,
        groups: ArrayView2<'_, i64>,
        grid: &Array2<i64>,
        out: &mut Array2<i64>,
    ) {
        let (h, w) = grid.dim();
        let mut row_prefix = Array2::<i64>::zeros((h, w + 1));
        let mut col_prefix = Array2::<i64>::zeros((h + 1, w));
        for i in 0..h {
            for j in 0..w {
                row_prefix[[i, j + 1]] = row_prefix[[i, j]].saturating_add(grid[[i, j]]);
                col_prefix[[i + 1, j]] = col_prefix[[i, j]].saturating_add(grid[[i, j]]);
            }
        }
        // inclusive strips in padded coordinates
        let row_strip = |i: usize, j0: usize, j1: usize| row_prefix[[i, j1 + 1]] - row_prefix[[i, j0]];
        let col_strip = |j: usize, i0: usize, i1: usize| col_prefix[[i1 + 1, j]] - col_prefix[[i0, j]];

        let total: i64 = groups.iter().fold(0i64, |a, &v| a.saturating_add(v));
        let swept = if self.total_minus_inner {
            self.radii.len() - 1
        } else {
            self.radii.len()
        };
        let r_sweep = if swept == 0 { 0 } else { self.radii[swept - 1] as usize };

        for y in 0..self.groups_y {
            for x in 0..self.groups_x {
                let g = y * self.groups_x + x;
                let (py, px) = (y + self.pad_y, x + self.pad_x);
                let mut boxed = grid[[py, px]];
                out[[g, 0]] = boxed;
                let mut band = 1;
                let mut inner_box = boxed;
                let mut prev = Extents::default();
                for r in 1..=r_sweep {
                    let e = self.extents(r);
                    if e.left > prev.left {
                        boxed += col_strip(px - e.left, py - prev.up, py + prev.down);
                    }
                    if e.right > prev.right {
                        boxed += col_strip(px + e.right, py - prev.up, py + prev.down);
                    }
                    if e.up > prev.up {
                        boxed += row_strip(py - e.up, px - e.left, px + e.right);
                    }
                    if e.down > prev.down {
                        boxed += row_strip(py + e.down, px - e.left, px + e.right);
                    }
                    prev = e;
                    if r == self.radii[band - 1] as usize {
                        out[[g, band]] = boxed - inner_box;
                        inner_box = boxed;
                        band += 1;
                    }
                }
                if self.total_minus_inner {
                    out[[g, band]] = total.saturating_sub(inner_box);
                }
            }
        }
    }

    fn compute_square_max(&self, grid: &Array2<i64>, out: &mut Array2<i64>) {
        let r_max = self.radii.last().copied().unwrap_or(0) as usize;
        for y in 0..self.groups_y {
            for x in 0..self.groups_x {
                let g = y * self.groups_x + x;
                let (py, px) = (y + self.pad_y, x + self.pad_x);
                out[[g, 0]] = grid[[py, px]];
                let mut band = 1;
                let mut ring_max: Option<i64> = None;
                let mut prev = Extents::default();
                let fold_max = |v: i64, m: &mut Option<i64>| *m = Some(m.map_or(v, |c| c.max(v)));
                for r in 1..=r_max {
                    let e = self.extents(r);
                    if e.left > prev.left {
                        for i in py - prev.up..=py + prev.down {
                            fold_max(grid[[i, px - e.left]], &mut ring_max);
                        }
                    }
                    if e.right > prev.right {
                        for i in py - prev.up..=py + prev.down {
                            fold_max(grid[[i, px + e.right]], &mut ring_max);
                        }
                    }
                    if e.up > prev.up {
                        for j in px - e.left..=px + e.right {
                            fold_max(grid[[py - e.up, j]], &mut ring_max);
                        }
                    }
                    if e.down > prev.down {
                        for j in px - e.left..=px + e.right {
                            fold_max(grid[[py + e.down, j]], &mut ring_max);
                        }
                    }
                    prev = e;
                    if r == self.radii[band - 1] as usize {
                        out[[g, band]] = ring_max.take().unwrap_or(0);
                        band += 1;
                    }
                }
            }
        }
    }

    fn compute_disc(
        &self,
        groups: ArrayView2<'_, i64>,
        grid: &Array2<i64>,
        disc: &DiscOffsets,
        out: &mut Array2<i64>,
    ) {
        let additive = self.reduction.is_additive();
        let torus = self.boundary.is_torus();
        let total: i64 = groups.iter().fold(0i64, |a, &v| a.saturating_add(v));
        let last = disc.band_count() - 1;
        for y in 0..self.groups_y {
            for x in 0..self.groups_x {
                let g = y * self.groups_x + x;
                let read = |dx: i32, dy: i32| -> i64 {
                    if torus {
                        let yy = wrap(y as i64 + dy as i64, self.groups_y as i64) as usize;
                        let xx = wrap(x as i64 + dx as i64, self.groups_x as i64) as usize;
                        groups[[yy, xx]]
                    } else {
                        let i = (y + self.pad_y) as i64 + dy as i64;
                        let j = (x + self.pad_x) as i64 + dx as i64;
                        grid[[i as usize, j as usize]]
                    }
                };
                let mut inner_box = 0i64;
                for k in 0..disc.band_count() {
                    let offsets = disc.band(k);
                    let value = if self.total_minus_inner && k == last {
                        total.saturating_sub(inner_box)
                    } else if additive {
                        offsets.iter().fold(0i64, |a, &(dx, dy)| a.saturating_add(read(dx, dy)))
                    } else {
                        offsets.iter().map(|&(dx, dy)| read(dx, dy)).max().unwrap_or(0)
                    };
                    inner_box = inner_box.saturating_add(value);
                    out[[g, k]] = value;
                }
            }
        }
    }

    /// Band value rescaled by nominal over in-grid footprint; identity
    /// unless the boundary is Normalize. A band with no in-grid group is 0.
    #[inline]
    pub fn normalized(&self, group: usize, band: usize, raw: i64) -> i64 {
        let Some(actual) = &self.actual else {
            return raw;
        };
        let a = actual[[group, band]];
        if a == 0 {
            return 0;
        }
        let n = self.nominal[band];
        if a == n {
            return raw;
        }
        let num = raw as i128 * n as i128;
        let half = a as i128 / 2;
        let q = if num >= 0 { (num + half) / a as i128 } else { -((-num + half) / a as i128) };
        q.clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }
}
