// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Seeded Deterministic Generator
//!
//! Park–Miller "minimal standard" multiplicative generator:
//!
//! ```text
//! next(s)    = 16807 * s          mod (2^31 - 1)
//! skip(s, n) = 16807^n * s        mod (2^31 - 1)
//! ```
//!
//! Because the generator is a pure multiplication, `n` draws collapse into
//! one modular exponentiation (at most 64 squarings, independent of how the
//! cells are spread across workers). Every loop that *would* consume draws
//! under some other partitioning must still advance its seed by the same
//! amount; [`SeedCursor`] makes that bookkeeping explicit.

#[cfg(feature = "std")]
use serde::{Deserialize, Serialize};

use crate::fixed::S24;
use crate::types::{NeuralError, Result};

/// Generator modulus, the Mersenne prime 2^31 - 1.
pub const MODULUS: u64 = 0x7FFF_FFFF;
/// Park–Miller multiplier.
pub const MULTIPLIER: u64 = 16_807;

/// `sqrt(3)` at S24, for scaling an Irwin–Hall sum of four uniforms.
const SQRT3_S24: i128 = 29_058_990;

/// Draws consumed by one [`Seed::gaussian_s24`].
pub const GAUSSIAN_DRAWS: u64 = 4;

/// Multiplier raised to `n`, modulo the generator modulus.
pub fn multiplier_power(mut n: u64) -> u64 {
    let mut base = MULTIPLIER;
    let mut acc = 1u64;
    while n > 0 {
        if n & 1 == 1 {
            acc = acc * base % MODULUS;
        }
        base = base * base % MODULUS;
        n >>= 1;
    }
    acc
}

/// Generator state. Always in `[1, 2^31 - 2]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "std", derive(Serialize, Deserialize))]
pub struct Seed(u32);

impl Seed {
    /// Fold an arbitrary value into the generator's state space.
    pub fn new(value: u64) -> Self {
        let folded = value % (MODULUS - 1);
        Self(if folded == 0 { 1 } else { folded as u32 })
    }

    #[inline]
    pub fn value(self) -> u32 {
        self.0
    }

    /// One sequential step.
    #[inline]
    pub fn next(self) -> Seed {
        Seed((self.0 as u64 * MULTIPLIER % MODULUS) as u32)
    }

    /// Equivalent to `n` calls of [`Seed::next`].
    ///
    /// # Example
    /// ```
    /// use neurosim_npu_neural::Seed;
    ///
    /// let s = Seed::new(12345);
    /// assert_eq!(s.skip(1), s.next());
    /// assert_eq!(s.skip(3).skip(4), s.skip(7));
    /// ```
    #[inline]
    pub fn skip(self, n: u64) -> Seed {
        if n == 0 {
            return self;
        }
        Seed((self.0 as u64 * multiplier_power(n) % MODULUS) as u32)
    }

    /// Advance and return the new raw value in `[1, 2^31 - 2]`.
    #[inline]
    pub fn draw(&mut self) -> u32 {
        *self = self.next();
        self.0
    }

    /// Advance and return a uniform deviate in `[0, 2^16)`.
    #[inline]
    pub fn uniform_s16(&mut self) -> i32 {
        ((self.draw() as u64 - 1) * (1 << 16) / (MODULUS - 1)) as i32
    }

    /// Advance and return an integer in `[0, n)`. `n == 0` yields 0.
    #[inline]
    pub fn below(&mut self, n: u32) -> u32 {
        ((self.draw() as u64 - 1) * n as u64 / (MODULUS - 1)) as u32
    }

    /// Bernoulli trial with probability `p` (S16). Always consumes one draw.
    #[inline]
    pub fn chance(&mut self, p_s16: i32) -> bool {
        self.uniform_s16() < p_s16
    }

    /// Approximately standard normal deviate at S24.
    ///
    /// Consumes exactly [`GAUSSIAN_DRAWS`] draws. The Irwin–Hall sum of four
    /// uniforms has mean `2` and variance `1/3`; rescaling by `sqrt(3)` gives
    /// unit variance with tails bounded at ±`2·sqrt(3)`.
    pub fn gaussian_s24(&mut self) -> i32 {
        let m = (MODULUS - 1) as i128;
        let mut sum: i128 = 0;
        for _ in 0..GAUSSIAN_DRAWS {
            sum += self.draw() as i128 - 1;
        }
        let centered = 2 * sum - 4 * m;
        // centered / (2m) is U-sum minus 2; times sqrt(3)
        ((centered * SQRT3_S24) / (2 * m)) as i32
    }
}

impl Default for Seed {
    fn default() -> Self {
        Seed(1)
    }
}

/// Seed plus a count of draws consumed since a fixed starting point.
///
/// A loop visiting work that is budgeted at `budget` draws calls
/// [`SeedCursor::finish`] on every exit path; the result is the start seed
/// advanced by exactly `budget` whether or not every draw was used.
#[derive(Debug, Clone, Copy)]
pub struct SeedCursor {
    seed: Seed,
    consumed: u64,
}

impl SeedCursor {
    pub fn new(seed: Seed) -> Self {
        Self { seed, consumed: 0 }
    }

    #[inline]
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    #[inline]
    pub fn seed(&self) -> Seed {
        self.seed
    }

    #[inline]
    pub fn draw(&mut self) -> u32 {
        self.consumed += 1;
        self.seed.draw()
    }

    #[inline]
    pub fn uniform_s16(&mut self) -> i32 {
        self.consumed += 1;
        self.seed.uniform_s16()
    }

    #[inline]
    pub fn below(&mut self, n: u32) -> u32 {
        self.consumed += 1;
        self.seed.below(n)
    }

    #[inline]
    pub fn chance(&mut self, p_s16: i32) -> bool {
        self.consumed += 1;
        self.seed.chance(p_s16)
    }

    pub fn gaussian_s24(&mut self) -> i32 {
        self.consumed += GAUSSIAN_DRAWS;
        self.seed.gaussian_s24()
    }

    /// Skip `n` draws without producing values.
    #[inline]
    pub fn pass(&mut self, n: u64) {
        self.consumed += n;
        self.seed = self.seed.skip(n);
    }

    /// Advance to exactly `budget` draws past the starting point.
    ///
    /// Overdrawing is an internal-consistency bug; in release builds the
    /// cursor is returned as-is rather than rewound.
    #[inline]
    pub fn finish(self, budget: u64) -> Seed {
        debug_assert!(
            self.consumed <= budget,
            "seed overdrawn: consumed {} of {}",
            self.consumed,
            budget
        );
        self.seed.skip(budget.saturating_sub(self.consumed))
    }

    /// Checked variant of [`SeedCursor::finish`].
    pub fn try_finish(self, budget: u64) -> Result<Seed> {
        if self.consumed > budget {
            return Err(NeuralError::SeedOverdrawn {
                consumed: self.consumed,
                budget,
            });
        }
        Ok(self.seed.skip(budget - self.consumed))
    }
}

/// Irwin–Hall tails never exceed this magnitude (S24).
pub const GAUSSIAN_LIMIT_S24: i32 = (2 * SQRT3_S24 as i64 + (1 << S24) / 1000) as i32;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_one_is_next() {
        for v in [1u64, 2, 42, 16807, 2_147_483_646, 987_654_321] {
            let s = Seed::new(v);
            assert_eq!(s.skip(1), s.next());
        }
    }

    #[test]
    fn test_skip_homomorphism() {
        let s = Seed::new(20260101);
        for (a, b) in [(0u64, 0u64), (1, 2), (17, 1000), (123_456, 7_890_123), (1 << 40, 3)] {
            assert_eq!(s.skip(a).skip(b), s.skip(a + b), "a={} b={}", a, b);
        }
    }

    #[test]
    fn test_skip_matches_sequential() {
        let mut s = Seed::new(777);
        let start = s;
        for _ in 0..1000 {
            s.draw();
        }
        assert_eq!(start.skip(1000), s);
    }

    #[test]
    fn test_skip_full_period_returns() {
        let s = Seed::new(99);
        assert_eq!(s.skip(MODULUS - 1), s);
    }

    #[test]
    fn test_known_sequence() {
        // Park–Miller check value: seed 1 after 10000 steps
        assert_eq!(Seed::new(1).skip(10_000).value(), 1_043_618_065);
    }

    #[test]
    fn test_seed_folding() {
        assert_eq!(Seed::new(0).value(), 1);
        assert_eq!(Seed::new(5).value(), 5);
        assert_eq!(Seed::new(MODULUS - 1).value(), 1);
    }

    #[test]
    fn test_uniform_ranges() {
        let mut s = Seed::new(31337);
        for _ in 0..10_000 {
            let u = s.uniform_s16();
            assert!((0..1 << 16).contains(&u));
            assert!(s.below(7) < 7);
        }
    }

    #[test]
    fn test_gaussian_moments() {
        let mut s = Seed::new(5);
        let n = 20_000;
        let mut sum = 0f64;
        let mut sum2 = 0f64;
        for _ in 0..n {
            let g = s.gaussian_s24();
            assert!(g.abs() <= GAUSSIAN_LIMIT_S24);
            let x = g as f64 / (1 << 24) as f64;
            sum += x;
            sum2 += x * x;
        }
        let mean = sum / n as f64;
        let var = sum2 / n as f64 - mean * mean;
        assert!(mean.abs() < 0.05, "mean {}", mean);
        assert!((var - 1.0).abs() < 0.1, "var {}", var);
    }

    #[test]
    fn test_cursor_finish_skips_unused() {
        let start = Seed::new(4242);
        let mut cursor = SeedCursor::new(start);
        cursor.draw();
        cursor.gaussian_s24();
        assert_eq!(cursor.consumed(), 5);
        assert_eq!(cursor.finish(12), start.skip(12));
    }

    #[test]
    fn test_cursor_try_finish_rejects_overdraw() {
        let mut cursor = SeedCursor::new(Seed::new(8));
        cursor.pass(10);
        assert!(matches!(
            cursor.try_finish(3),
            Err(NeuralError::SeedOverdrawn { consumed: 10, budget: 3 })
        ));
    }
}
