//! Seeded run RNG
//!
//! Every stochastic decision in a run draws from here. The generator is a
//! PCG32 stream seeded from the 32-bit run seed; it serializes as
//! `(seed, draws)` and restores by jumping the stream ahead `draws` steps.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::lerp;

/// Serialized form of [`RunRng`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RngState {
    pub seed: u32,
    pub draws: u64,
}

/// Deterministic per-run random source
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "RngState", into = "RngState")]
pub struct RunRng {
    seed: u32,
    draws: u64,
    inner: Pcg32,
}

impl RunRng {
    pub fn new(seed: u32) -> Self {
        Self {
            seed,
            draws: 0,
            inner: Pcg32::seed_from_u64(u64::from(seed)),
        }
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// Number of values drawn since seeding
    pub fn draws(&self) -> u64 {
        self.draws
    }

    /// Uniform float in `[0, 1)`
    pub fn next_f32(&mut self) -> f32 {
        self.draws += 1;
        self.inner.random::<f32>()
    }

    /// Uniform float between `a` and `b`
    pub fn range(&mut self, a: f32, b: f32) -> f32 {
        lerp(a, b, self.next_f32())
    }

    /// Uniform float in `[-half, half)`
    pub fn spread(&mut self, half: f32) -> f32 {
        (self.next_f32() - 0.5) * 2.0 * half
    }

    /// True with probability `p`
    pub fn chance(&mut self, p: f32) -> bool {
        self.next_f32() < p
    }

    /// Uniform index in `0..len` (`len` must be non-zero)
    pub fn index(&mut self, len: usize) -> usize {
        ((self.next_f32() * len as f32) as usize).min(len.saturating_sub(1))
    }

    /// Pick one element uniformly
    pub fn pick<T: Copy>(&mut self, items: &[T]) -> Option<T> {
        if items.is_empty() {
            return None;
        }
        Some(items[self.index(items.len())])
    }
}

impl From<RngState> for RunRng {
    fn from(state: RngState) -> Self {
        // every f32 draw consumes exactly one 32-bit output
        let mut inner = Pcg32::seed_from_u64(u64::from(state.seed));
        inner.advance(state.draws);
        RunRng {
            seed: state.seed,
            draws: state.draws,
            inner,
        }
    }
}

impl From<RunRng> for RngState {
    fn from(rng: RunRng) -> Self {
        RngState {
            seed: rng.seed,
            draws: rng.draws,
        }
    }
}
