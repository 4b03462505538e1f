// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Boundary policies and the padded group grid they produce.
//!
//! The padding is filled completely before any ring is summed, so every
//! read inside the padded extent is defined whatever the radius.

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use neurosim_npu_neural::fixed::mul_round_shift;
use neurosim_npu_neural::{OverflowCounter, Seed, S16};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Boundary {
    /// Outside groups hold 0
    Zero,
    /// Outside groups hold 0; band sums are rescaled by nominal/actual area
    Normalize,
    /// Outside groups hold a fresh uniform value in `[0, amplitude]` each cycle
    Noise { amplitude: i32 },
    /// Nearest edge group
    Edge,
    /// Reflection about the edge groups (`dcb|abcd|cba`)
    Mirror,
    /// Wrap-around; rings are clipped so no group is counted twice
    Torus,
}

impl Boundary {
    pub fn is_torus(&self) -> bool {
        matches!(self, Boundary::Torus)
    }

    /// Boundaries under which `outer = total - inner` is well-defined
    pub fn supports_total_minus_inner(&self) -> bool {
        matches!(self, Boundary::Zero | Boundary::Normalize | Boundary::Torus)
    }
}

#[inline]
pub fn wrap(i: i64, n: i64) -> i64 {
    i.rem_euclid(n)
}

#[inline]
pub fn reflect_101(i: i64, n: i64) -> i64 {
    if n <= 1 {
        return 0;
    }
    let period = 2 * (n - 1);
    let m = i.rem_euclid(period);
    if m >= n {
        period - m
    } else {
        m
    }
}

/// Copy of `values` (rows = y) with `pad_y` rows and `pad_x` columns of
/// boundary fill on every side. Noise fill draws once per synthetic cell in
/// row-major order.
pub fn padded(
    values: ArrayView2<'_, i64>,
    pad_y: usize,
    pad_x: usize,
    boundary: Boundary,
    noise: &mut Seed,
) -> Array2<i64> {
    let (gy, gx) = values.dim();
    let (h, w) = (gy + 2 * pad_y, gx + 2 * pad_x);
    let mut out = Array2::<i64>::zeros((h, w));
    let mut ov = OverflowCounter::new();
    for i in 0..h {
        let y = i as i64 - pad_y as i64;
        for j in 0..w {
            let x = j as i64 - pad_x as i64;
            let inside = (0..gy as i64).contains(&y) && (0..gx as i64).contains(&x);
            out[[i, j]] = if inside {
                values[[y as usize, x as usize]]
            } else {
                match boundary {
                    Boundary::Zero | Boundary::Normalize => 0,
                    Boundary::Noise { amplitude } => {
                        let u = noise.uniform_s16() as i64;
                        mul_round_shift(u, amplitude as i64, S16, &mut ov) as i64
                    }
                    Boundary::Edge => {
                        let yy = y.clamp(0, gy as i64 - 1) as usize;
                        let xx = x.clamp(0, gx as i64 - 1) as usize;
                        values[[yy, xx]]
                    }
                    Boundary::Mirror => {
                        let yy = reflect_101(y, gy as i64) as usize;
                        let xx = reflect_101(x, gx as i64) as usize;
                        values[[yy, xx]]
                    }
                    Boundary::Torus => {
                        let yy = wrap(y, gy as i64) as usize;
                        let xx = wrap(x, gx as i64) as usize;
                        values[[yy, xx]]
                    }
                }
            };
        }
    }
    out
}
