//! Randomness sources for selection.
//!
//! Not thread-safe on their own; every picker guards its source with the
//! same lock it uses for the tree.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Uniform randomness as consumed by the selector.
pub trait RandomSource {
    /// A uniform `f64` in `[0, 1)`.
    fn unit(&mut self) -> f64;

    /// A uniform `usize` in `[0, n)`. Callers guarantee `n > 0`.
    fn index(&mut self, n: usize) -> usize;
}

/// The default source, seeded from the operating system.
#[derive(Debug)]
pub struct DefaultRandom {
    rng: StdRng,
}

impl DefaultRandom {
    #[must_use]
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }
}

impl Default for DefaultRandom {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomSource for DefaultRandom {
    fn unit(&mut self) -> f64 {
        self.rng.random()
    }

    fn index(&mut self, n: usize) -> usize {
        self.rng.random_range(0..n)
    }
}

/// A deterministic source that cycles through fixed sequences.
///
/// Intended for tests that need reproducible selections. Empty sequences
/// yield zeros, which corresponds to "always the leftmost, oldest" picks.
#[derive(Debug, Clone, Default)]
pub struct CycleRandom {
    units: Vec<f64>,
    indexes: Vec<usize>,
    next_unit: usize,
    next_index: usize,
}

impl CycleRandom {
    #[must_use]
    pub fn new(indexes: Vec<usize>, units: Vec<f64>) -> Self {
        Self {
            units,
            indexes,
            next_unit: 0,
            next_index: 0,
        }
    }

    /// A source that always picks index 0 and threshold offset 0, selecting
    /// the leftmost of the oldest keys.
    #[must_use]
    pub fn leftmost_oldest() -> Self {
        Self::new(vec![0], vec![0.0])
    }
}

impl RandomSource for CycleRandom {
    fn unit(&mut self) -> f64 {
        if self.units.is_empty() {
            return 0.0;
        }
        let out = self.units[self.next_unit];
        self.next_unit = (self.next_unit + 1) % self.units.len();
        out
    }

    fn index(&mut self, _n: usize) -> usize {
        if self.indexes.is_empty() {
            return 0;
        }
        let out = self.indexes[self.next_index];
        self.next_index = (self.next_index + 1) % self.indexes.len();
        out
    }
}
