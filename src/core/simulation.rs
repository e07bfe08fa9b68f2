//! Simulation Generator: stand-in classifier when the real one cannot load
//!
//! One uniform draw `r` per tick:
//! - r < 0.2        → neutral ("no clear face")
//! - 0.2 ≤ r < 0.4  → uniformly random label (spurious detection)
//! - otherwise      → label after `previous` in enumeration order (drift)
//!
//! Output is already final; it does not go through the smoother.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::types::Label;
use crate::{SIM_NEUTRAL_CUTOFF, SIM_RANDOM_CUTOFF};

/// Seedable label generator
#[derive(Debug, Clone)]
pub struct SimulationGenerator {
    rng: StdRng,
}

impl SimulationGenerator {
    /// Generator seeded from entropy
    pub fn new() -> Self {
        Self { rng: StdRng::from_entropy() }
    }

    /// Reproducible generator
    pub fn seeded(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed) }
    }

    /// Next label given the previous one
    pub fn next(&mut self, previous: Label) -> Label {
        let r: f64 = self.rng.gen();
        if (SIM_NEUTRAL_CUTOFF..SIM_RANDOM_CUTOFF).contains(&r) {
            let spurious = Label::ALL[self.rng.gen_range(0..Label::ALL.len())];
            return Self::next_with_draw(previous, r, spurious);
        }
        Self::next_with_draw(previous, r, previous)
    }

    /// Deterministic core: `r` picks the branch, `spurious` is the random-branch label
    pub fn next_with_draw(previous: Label, r: f64, spurious: Label) -> Label {
        if r < SIM_NEUTRAL_CUTOFF {
            Label::Neutral
        } else if r < SIM_RANDOM_CUTOFF {
            spurious
        } else {
            previous.next()
        }
    }
}

impl Default for SimulationGenerator {
    fn default() -> Self {
        Self::new()
    }
}
