// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Scaled Fixed-Point Arithmetic
//!
//! Analog quantities are plain integers with an implicit power-of-two scale.
//! The scale is tracked by convention and named with an `S<n>` suffix:
//!
//! ```text
//! responses          i32  S14   (1.0 = 16384)
//! weights            i16  S14   [-32767, 32767]
//! w * s products     i64  S28
//! scaled afference   i32  S20
//! rates / decays     i32  S16
//! ```
//!
//! Every primitive that can lose range clamps to the representable extreme,
//! bumps the caller's [`OverflowCounter`] by exactly one and returns. Whether
//! a non-zero count is fatal is decided far above this module.
//!
//! Rounding is half-away-from-zero so that negating an input negates the
//! output exactly.

#[cfg(feature = "std")]
use serde::{Deserialize, Serialize};

pub const S14: u32 = 14;
pub const S16: u32 = 16;
pub const S20: u32 = 20;
pub const S24: u32 = 24;
pub const S28: u32 = 28;

pub const S14_ONE: i32 = 1 << S14;
pub const S16_ONE: i32 = 1 << S16;
pub const S20_ONE: i32 = 1 << S20;

/// Largest storable synaptic weight (S14). The range is symmetric.
pub const WEIGHT_MAX: i16 = i16::MAX;
pub const WEIGHT_MIN: i16 = -i16::MAX;

/// Count of range losses for one named quantity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Serialize, Deserialize))]
pub struct OverflowCounter(u64);

impl OverflowCounter {
    pub const fn new() -> Self {
        Self(0)
    }

    #[inline]
    pub fn count(&self) -> u64 {
        self.0
    }

    #[inline]
    pub fn bump(&mut self) {
        self.0 = self.0.saturating_add(1);
    }

    #[inline]
    pub fn merge(&mut self, other: OverflowCounter) {
        self.0 = self.0.saturating_add(other.0);
    }

    pub fn reset(&mut self) {
        self.0 = 0;
    }
}

/// Round-half-away-from-zero right shift on a wide intermediate.
#[inline]
fn round_shift_i128(value: i128, shift: u32) -> i128 {
    if shift == 0 {
        return value;
    }
    let half = 1i128 << (shift - 1);
    if value >= 0 {
        (value + half) >> shift
    } else {
        -((-value + half) >> shift)
    }
}

/// Round-half-away-from-zero right shift.
///
/// Never overflows: the result magnitude is at most the input magnitude.
#[inline]
pub fn round_shift(value: i64, shift: u32) -> i64 {
    round_shift_i128(value as i128, shift) as i64
}

#[inline]
fn saturate_i32(value: i128, ov: &mut OverflowCounter) -> i32 {
    if value > i32::MAX as i128 {
        ov.bump();
        i32::MAX
    } else if value < i32::MIN as i128 {
        ov.bump();
        i32::MIN
    } else {
        value as i32
    }
}

#[inline]
fn saturate_i64(value: i128, ov: &mut OverflowCounter) -> i64 {
    if value > i64::MAX as i128 {
        ov.bump();
        i64::MAX
    } else if value < i64::MIN as i128 {
        ov.bump();
        i64::MIN
    } else {
        value as i64
    }
}

/// `round((a * b) / 2^shift)` saturated to `i32`.
///
/// # Example
/// ```
/// use neurosim_npu_neural::fixed::{mul_round_shift, OverflowCounter, S16_ONE};
///
/// let mut ov = OverflowCounter::new();
/// // 3 * 0.5 in S16
/// assert_eq!(mul_round_shift(3, (S16_ONE / 2) as i64, 16, &mut ov), 2); // 1.5 rounds away
/// assert_eq!(mul_round_shift(-3, (S16_ONE / 2) as i64, 16, &mut ov), -2);
/// assert_eq!(ov.count(), 0);
/// ```
#[inline]
pub fn mul_round_shift(a: i64, b: i64, shift: u32, ov: &mut OverflowCounter) -> i32 {
    saturate_i32(round_shift_i128(a as i128 * b as i128, shift), ov)
}

/// Wide variant of [`mul_round_shift`] saturating to `i64`.
#[inline]
pub fn mul_round_shift_wide(a: i64, b: i64, shift: u32, ov: &mut OverflowCounter) -> i64 {
    saturate_i64(round_shift_i128(a as i128 * b as i128, shift), ov)
}

/// Product of several factors, rounded and shifted once at the end.
///
/// Used by three-term plasticity rules so intermediate rounding cannot
/// introduce drift. Factors are limited to four so the `i128` product of
/// 32-bit magnitudes cannot wrap.
pub fn product_round_shift(factors: &[i64], shift: u32, ov: &mut OverflowCounter) -> i32 {
    debug_assert!(factors.len() <= 4);
    let mut acc: i128 = 1;
    for &f in factors {
        if f == 0 {
            return 0;
        }
        acc = match acc.checked_mul(f as i128) {
            Some(v) => v,
            None => {
                ov.bump();
                return if (acc < 0) ^ (f < 0) { i32::MIN } else { i32::MAX };
            }
        };
    }
    saturate_i32(round_shift_i128(acc, shift), ov)
}

/// `round(num / den)` saturated to `i32`.
///
/// A zero denominator saturates toward the sign of the numerator and counts
/// as an overflow; `0 / 0` is zero.
pub fn div_round(num: i64, den: i64, ov: &mut OverflowCounter) -> i32 {
    if den == 0 {
        return match num.signum() {
            0 => 0,
            1 => {
                ov.bump();
                i32::MAX
            }
            _ => {
                ov.bump();
                i32::MIN
            }
        };
    }
    let n = num as i128;
    let d = den as i128;
    let q = (n.abs() * 2 + d.abs()) / (d.abs() * 2);
    let q = if (n < 0) ^ (d < 0) { -q } else { q };
    saturate_i32(q, ov)
}

/// `round((num << shift) / den)` saturated to `i32`, used for scaled division.
pub fn div_shift_round(num: i64, den: i64, shift: u32, ov: &mut OverflowCounter) -> i32 {
    if den == 0 {
        return div_round(num, 0, ov);
    }
    let n = (num as i128) << shift;
    let d = den as i128;
    let q = (n.abs() * 2 + d.abs()) / (d.abs() * 2);
    let q = if (n < 0) ^ (d < 0) { -q } else { q };
    saturate_i32(q, ov)
}

#[inline]
pub fn add_sat(a: i32, b: i32, ov: &mut OverflowCounter) -> i32 {
    saturate_i32(a as i128 + b as i128, ov)
}

#[inline]
pub fn sub_sat(a: i32, b: i32, ov: &mut OverflowCounter) -> i32 {
    saturate_i32(a as i128 - b as i128, ov)
}

#[inline]
pub fn add_sat_wide(a: i64, b: i64, ov: &mut OverflowCounter) -> i64 {
    saturate_i64(a as i128 + b as i128, ov)
}

/// Narrow to `i32`, flagging range loss.
#[inline]
pub fn narrow_i32(value: i64, ov: &mut OverflowCounter) -> i32 {
    saturate_i32(value as i128, ov)
}

/// Narrow a weight candidate to the symmetric weight range.
#[inline]
pub fn narrow_weight(value: i64, ov: &mut OverflowCounter) -> i16 {
    clamp_counted(value, WEIGHT_MIN as i64, WEIGHT_MAX as i64, ov) as i16
}

/// Clamp into `[lo, hi]`, counting a clamp as an overflow.
#[inline]
pub fn clamp_counted(value: i64, lo: i64, hi: i64, ov: &mut OverflowCounter) -> i64 {
    if value > hi {
        ov.bump();
        hi
    } else if value < lo {
        ov.bump();
        lo
    } else {
        value
    }
}

/// Left shift with saturation.
#[inline]
pub fn shift_left_sat(value: i32, shift: u32, ov: &mut OverflowCounter) -> i32 {
    saturate_i32((value as i128) << shift, ov)
}

/// `avg + (sample - avg) * omega`, the exponential running average used for
/// fast/slow activity averages (`omega` S16).
#[inline]
pub fn exp_average(avg: i32, sample: i32, omega: i32, ov: &mut OverflowCounter) -> i32 {
    let step = mul_round_shift(sample as i64 - avg as i64, omega as i64, S16, ov);
    add_sat(avg, step, ov)
}

/// Convert a real number to a scaled integer (configuration time only).
pub fn to_fixed(value: f64, scale: u32) -> i32 {
    let scaled = value * (1u64 << scale) as f64;
    let rounded = if scaled >= 0.0 { scaled + 0.5 } else { scaled - 0.5 };
    rounded.clamp(i32::MIN as f64, i32::MAX as f64) as i32
}

/// Convert a scaled integer back to a real number (reporting only).
pub fn to_real(value: i64, scale: u32) -> f64 {
    value as f64 / (1u64 << scale) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_shift_symmetric() {
        assert_eq!(round_shift(3, 1), 2);
        assert_eq!(round_shift(-3, 1), -2);
        assert_eq!(round_shift(5, 2), 1);
        assert_eq!(round_shift(6, 2), 2);
        assert_eq!(round_shift(-6, 2), -2);
        assert_eq!(round_shift(7, 0), 7);
    }

    #[test]
    fn test_mul_round_shift_saturates_once() {
        let mut ov = OverflowCounter::new();
        let r = mul_round_shift(1 << 30, 1 << 30, 0, &mut ov);
        assert_eq!(r, i32::MAX);
        assert_eq!(ov.count(), 1);

        let r = mul_round_shift(-(1 << 30), 1 << 30, 0, &mut ov);
        assert_eq!(r, i32::MIN);
        assert_eq!(ov.count(), 2);
    }

    #[test]
    fn test_mul_round_shift_in_range_leaves_counter() {
        let mut ov = OverflowCounter::new();
        // 0.75 * 0.5 = 0.375 in S14
        let a = 3 * S14_ONE / 4;
        let b = S16_ONE / 2;
        assert_eq!(mul_round_shift(a as i64, b as i64, S16, &mut ov), 6144);
        assert_eq!(ov.count(), 0);
    }

    #[test]
    fn test_div_round() {
        let mut ov = OverflowCounter::new();
        assert_eq!(div_round(7, 2, &mut ov), 4);
        assert_eq!(div_round(-7, 2, &mut ov), -4);
        assert_eq!(div_round(7, -2, &mut ov), -4);
        assert_eq!(div_round(6, 4, &mut ov), 2);
        assert_eq!(div_round(0, 0, &mut ov), 0);
        assert_eq!(ov.count(), 0);
        assert_eq!(div_round(5, 0, &mut ov), i32::MAX);
        assert_eq!(ov.count(), 1);
    }

    #[test]
    fn test_div_shift_round() {
        let mut ov = OverflowCounter::new();
        // 1 / 4 at S16
        assert_eq!(div_shift_round(1, 4, 16, &mut ov), S16_ONE / 4);
    }

    #[test]
    fn test_add_sat() {
        let mut ov = OverflowCounter::new();
        assert_eq!(add_sat(i32::MAX - 1, 5, &mut ov), i32::MAX);
        assert_eq!(sub_sat(i32::MIN + 1, 5, &mut ov), i32::MIN);
        assert_eq!(ov.count(), 2);
        assert_eq!(add_sat(2, 3, &mut ov), 5);
        assert_eq!(ov.count(), 2);
    }

    #[test]
    fn test_narrow_weight() {
        let mut ov = OverflowCounter::new();
        assert_eq!(narrow_weight(40_000, &mut ov), WEIGHT_MAX);
        assert_eq!(narrow_weight(-40_000, &mut ov), WEIGHT_MIN);
        assert_eq!(narrow_weight(-32_768, &mut ov), WEIGHT_MIN);
        assert_eq!(ov.count(), 3);
        assert_eq!(narrow_weight(123, &mut ov), 123);
        assert_eq!(ov.count(), 3);
    }

    #[test]
    fn test_product_round_shift_zero_factor_is_exact() {
        let mut ov = OverflowCounter::new();
        assert_eq!(product_round_shift(&[12345, 0, 999_999], 30, &mut ov), 0);
        assert_eq!(product_round_shift(&[S14_ONE as i64, S14_ONE as i64], 14, &mut ov), S14_ONE);
        assert_eq!(ov.count(), 0);
    }

    #[test]
    fn test_exp_average_converges() {
        let mut ov = OverflowCounter::new();
        let mut avg = 0;
        for _ in 0..200 {
            avg = exp_average(avg, S14_ONE, S16_ONE / 8, &mut ov);
        }
        assert!((avg - S14_ONE).abs() <= 4);
    }

    #[test]
    fn test_to_fixed_round_trip() {
        assert_eq!(to_fixed(0.5, S14), S14_ONE / 2);
        assert_eq!(to_fixed(-1.0, S16), -S16_ONE);
        assert!((to_real(to_fixed(0.3, S20) as i64, S20) - 0.3).abs() < 1e-6);
    }
}
