//! Experiment Allocator: picks the arm that governs the served ad
//!
//! - A/B off → signal arm, serve the candidate
//! - A/B on  → coin flip; random arm serves a uniform label, signal arm the candidate
//!
//! The last decision is kept so that a later click can be attributed to the
//! arm that actually produced the ad on screen.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::types::{AllocationDecision, Arm, ExperimentConfig, Label};
use crate::RANDOM_ARM_PROBABILITY;

/// Arm allocator with a one-slot memory of the last served decision
#[derive(Debug, Clone)]
pub struct ExperimentAllocator {
    rng: StdRng,
    pending: Option<AllocationDecision>,
    allocations: u64,
}

impl ExperimentAllocator {
    /// Allocator seeded from entropy
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Reproducible allocator
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            rng,
            pending: None,
            allocations: 0,
        }
    }

    /// Decide the arm for this tick and remember it as the served decision
    pub fn allocate(&mut self, candidate: Label, config: &ExperimentConfig) -> AllocationDecision {
        let decision = if config.ab_testing_enabled {
            let coin: f64 = self.rng.gen();
            let random_label = if coin < RANDOM_ARM_PROBABILITY {
                Label::ALL[self.rng.gen_range(0..Label::ALL.len())]
            } else {
                candidate
            };
            Self::decide(candidate, config, coin, random_label)
        } else {
            Self::decide(candidate, config, 1.0, candidate)
        };
        self.pending = Some(decision);
        self.allocations += 1;
        decision
    }

    /// Deterministic core: `coin` below 0.5 selects the random arm
    pub fn decide(
        candidate: Label,
        config: &ExperimentConfig,
        coin: f64,
        random_label: Label,
    ) -> AllocationDecision {
        if config.ab_testing_enabled && coin < RANDOM_ARM_PROBABILITY {
            AllocationDecision::new(Arm::Random, random_label)
        } else {
            AllocationDecision::new(Arm::Signal, candidate)
        }
    }

    /// Take the decision for the ad on screen, leaving nothing pending
    pub fn take_served(&mut self) -> Option<AllocationDecision> {
        self.pending.take()
    }

    /// Decision for the ad on screen, if not yet consumed
    pub fn served(&self) -> Option<AllocationDecision> {
        self.pending
    }

    /// Number of decisions made
    pub fn allocations(&self) -> u64 {
        self.allocations
    }
}

impl Default for ExperimentAllocator {
    fn default() -> Self {
        Self::new()
    }
}
