//! Seeded randomness for one tick.
//!
//! The caller supplies a seed with every tick; the engine never self-seeds.
//! Each phase draws from its own ChaCha stream, so adding a roll to the AI
//! does not shift the rolls combat sees.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::math::Fixed;

/// Deterministic random source scoped to one phase of one tick.
#[derive(Debug, Clone)]
pub struct TickRng {
    inner: ChaCha8Rng,
}

impl TickRng {
    /// Create the generator for `stream` (one per phase) under `seed`.
    #[must_use]
    pub fn new(seed: u64, stream: u64) -> Self {
        let mut inner = ChaCha8Rng::seed_from_u64(seed);
        inner.set_stream(stream);
        Self { inner }
    }

    /// Uniform fraction in `[0, 1)`.
    pub fn fraction(&mut self) -> Fixed {
        Fixed::from_bits(i64::from(self.inner.gen::<u32>()))
    }

    /// Returns `true` with probability `p` (clamped to `[0, 1]`).
    pub fn roll(&mut self, p: Fixed) -> bool {
        if p >= Fixed::ONE {
            // One draw per roll, whatever p is.
            let _ = self.fraction();
            return true;
        }
        self.fraction() < p
    }

    /// Returns `true` with probability `percent`/100.
    pub fn chance(&mut self, percent: u32) -> bool {
        self.roll(crate::math::percent(i64::from(percent)))
    }

    /// Returns `true` with probability 1/`n`. `n == 0` never succeeds.
    pub fn one_in(&mut self, n: u32) -> bool {
        if n == 0 {
            return false;
        }
        self.inner.gen_range(0..n) == 0
    }

    /// Uniform integer in `[lo, hi]`.
    pub fn range_u32(&mut self, lo: u32, hi: u32) -> u32 {
        if hi <= lo {
            return lo;
        }
        self.inner.gen_range(lo..=hi)
    }

    /// Uniform fixed-point value in `[lo, hi]`.
    pub fn uniform(&mut self, lo: Fixed, hi: Fixed) -> Fixed {
        if hi <= lo {
            return lo;
        }
        Fixed::from_bits(self.inner.gen_range(lo.to_bits()..=hi.to_bits()))
    }

    /// Pick an index in `0..len`.
    pub fn index(&mut self, len: usize) -> usize {
        if len <= 1 {
            return 0;
        }
        self.inner.gen_range(0..len)
    }
}
