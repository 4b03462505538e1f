// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Exact-disc neighbourhoods as precomputed offset lists.
//!
//! Band `k` holds the offsets inside the ellipse of radius `r_k` but outside
//! that of `r_{k-1}`; the ellipse has semi-axes `r * aspect_x` and
//! `r * aspect_y`. On a torus an offset that wraps onto a group already
//! listed is dropped, inner bands first.

use ahash::AHashSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscOffsets {
    bands: Vec<Vec<(i32, i32)>>,
    extent: (u32, u32),
}

#[inline]
fn inside(dx: i64, dy: i64, r: i64, ax: i64, ay: i64) -> bool {
    let lhs = (dx * ay).pow(2) + (dy * ax).pow(2);
    lhs <= (r * ax * ay).pow(2)
}

impl DiscOffsets {
    /// `torus` is `(groups_x, groups_y)` when offsets wrap.
    pub fn build(radii: &[u32], aspect_x: u32, aspect_y: u32, torus: Option<(u32, u32)>) -> Self {
        let (ax, ay) = (aspect_x.max(1) as i64, aspect_y.max(1) as i64);
        let mut seen = AHashSet::new();
        let mut key = |dx: i64, dy: i64| match torus {
            Some((gx, gy)) => seen.insert((dx.rem_euclid(gx as i64), dy.rem_euclid(gy as i64))),
            None => true,
        };
        key(0, 0);
        let mut bands = vec![vec![(0, 0)]];
        let mut extent = (0u32, 0u32);
        let mut inner = 0i64;
        for &r in radii {
            let r = r as i64;
            let mut band = Vec::new();
            for dy in -r * ay..=r * ay {
                for dx in -r * ax..=r * ax {
                    if inside(dx, dy, r, ax, ay) && !inside(dx, dy, inner, ax, ay) && key(dx, dy) {
                        band.push((dx as i32, dy as i32));
                        extent.0 = extent.0.max(dx.unsigned_abs() as u32);
                        extent.1 = extent.1.max(dy.unsigned_abs() as u32);
                    }
                }
            }
            bands.push(band);
            inner = r;
        }
        Self { bands, extent }
    }

    pub fn band(&self, k: usize) -> &[(i32, i32)] {
        &self.bands[k]
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    /// Largest `|dx|`, `|dy|` over every band
    pub fn extent(&self) -> (u32, u32) {
        self.extent
    }
}
