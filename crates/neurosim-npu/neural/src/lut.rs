// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Interpolated fixed-point lookup tables.
//!
//! Transcendental functions used by response models are tabulated once and
//! then evaluated with pure integer interpolation, so every worker computing
//! the same input gets the same bits.

use std::sync::OnceLock;

use crate::fixed::{OverflowCounter, S16};
use crate::types::{NeuralError, Result};

/// Uniformly sampled table with linear interpolation between samples.
#[derive(Debug, Clone)]
pub struct FixedLut {
    x_min: i64,
    x_max: i64,
    /// log2 of the sample spacing, in input units
    shift: u32,
    values: Vec<i32>,
}

impl FixedLut {
    /// Tabulate `f` on `[x_min, x_max]` (input at `in_scale`) with sample
    /// spacing `2^shift` input units; outputs are stored at `out_scale`.
    pub fn build(
        x_min: i64,
        x_max: i64,
        shift: u32,
        in_scale: u32,
        out_scale: u32,
        f: impl Fn(f64) -> f64,
    ) -> Result<Self> {
        if x_max <= x_min {
            return Err(NeuralError::EmptyTableRange { min: x_min, max: x_max });
        }
        let step = 1i64 << shift;
        let samples = ((x_max - x_min + step - 1) >> shift) as usize + 1;
        let in_unit = (1u64 << in_scale) as f64;
        let out_unit = (1u64 << out_scale) as f64;
        let values = (0..samples)
            .map(|i| {
                let x = (x_min + i as i64 * step) as f64 / in_unit;
                let y = f(x) * out_unit;
                let r = if y >= 0.0 { y + 0.5 } else { y - 0.5 };
                r.clamp(i32::MIN as f64, i32::MAX as f64) as i32
            })
            .collect();
        Ok(Self {
            x_min,
            x_max: x_min + (samples as i64 - 1) * step,
            shift,
            values,
        })
    }

    #[inline]
    pub fn domain(&self) -> (i64, i64) {
        (self.x_min, self.x_max)
    }

    /// Evaluate, saturating at the ends of the table.
    #[inline]
    pub fn eval(&self, x: i64) -> i32 {
        let x = x.clamp(self.x_min, self.x_max);
        let offset = x - self.x_min;
        let idx = (offset >> self.shift) as usize;
        let frac = offset & ((1i64 << self.shift) - 1);
        let v0 = self.values[idx] as i64;
        if frac == 0 || idx + 1 >= self.values.len() {
            return v0 as i32;
        }
        let v1 = self.values[idx + 1] as i64;
        let delta = (v1 - v0) * frac;
        let half = 1i64 << (self.shift - 1);
        let step = if delta >= 0 {
            (delta + half) >> self.shift
        } else {
            -((-delta + half) >> self.shift)
        };
        (v0 + step) as i32
    }

    /// Evaluate, counting an input above the table as a range loss.
    #[inline]
    pub fn eval_counted(&self, x: i64, ov: &mut OverflowCounter) -> i32 {
        if x > self.x_max {
            ov.bump();
        }
        self.eval(x)
    }
}

/// Tables shared by all response models. Built once, read-only afterwards.
#[derive(Debug, Clone)]
pub struct ModelTables {
    /// `tanh(x)`, input S16 on [-8, 8], output S16
    pub tanh: FixedLut,
    /// `exp(x)`, input S16 on [-16, 8], output S16
    pub exp: FixedLut,
}

impl ModelTables {
    pub fn build() -> Result<Self> {
        let one = 1i64 << S16;
        Ok(Self {
            tanh: FixedLut::build(-8 * one, 8 * one, 8, S16, S16, f64::tanh)?,
            exp: FixedLut::build(-16 * one, 8 * one, 8, S16, S16, f64::exp)?,
        })
    }
}

/// Process-wide immutable tables.
pub fn model_tables() -> &'static ModelTables {
    static TABLES: OnceLock<ModelTables> = OnceLock::new();
    TABLES.get_or_init(|| match ModelTables::build() {
        Ok(t) => t,
        // Both ranges are compile-time constants and non-empty.
        Err(e) => unreachable!("model tables: {}", e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tanh_table_accuracy() {
        let t = &model_tables().tanh;
        for i in -800..=800 {
            let x = i as f64 / 100.0;
            let got = t.eval((x * 65536.0) as i64) as f64 / 65536.0;
            assert!((got - x.tanh()).abs() < 2e-4, "x={} got={}", x, got);
        }
    }

    #[test]
    fn test_tanh_table_odd_at_zero_and_saturates() {
        let t = &model_tables().tanh;
        assert_eq!(t.eval(0), 0);
        assert_eq!(t.eval(100 << 16), t.eval(8 << 16));
        assert_eq!(t.eval(-(3 << 16)), -t.eval(3 << 16));
    }

    #[test]
    fn test_exp_table_accuracy() {
        let t = &model_tables().exp;
        for i in -160..=80 {
            let x = i as f64 / 10.0;
            let got = t.eval((x * 65536.0) as i64) as f64 / 65536.0;
            let want = x.exp();
            assert!((got - want).abs() <= want * 1e-4 + 2.0 / 65536.0, "x={}", x);
        }
    }

    #[test]
    fn test_eval_counted_flags_above_range() {
        let t = &model_tables().exp;
        let mut ov = OverflowCounter::new();
        t.eval_counted(9 << 16, &mut ov);
        assert_eq!(ov.count(), 1);
        t.eval_counted(-(20 << 16), &mut ov);
        assert_eq!(ov.count(), 1);
    }

    #[test]
    fn test_empty_range_rejected() {
        assert!(FixedLut::build(5, 5, 0, 0, 0, |x| x).is_err());
    }
}
