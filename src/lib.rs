//! Moodlab: emotion-signal smoothing and A/B ad allocation
//!
//! Pipeline per tick: classifier (or simulation) → smoother → allocator →
//! metrics → subscribers.

pub mod core;
pub mod types;

// =============================================================================
// SMOOTHING DEFAULTS
// =============================================================================

/// A reading must be strictly more confident than this to move the state
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.3;

/// Number of recent readings the smoother votes over
pub const DEFAULT_SMOOTHING_WINDOW: usize = 3;

/// Share of the history the mode must strictly exceed to be accepted
pub const CONSISTENCY_THRESHOLD: f64 = 0.6;

// =============================================================================
// SIMULATION BRANCHES
// =============================================================================

/// Draws below this emit neutral ("no clear face")
pub const SIM_NEUTRAL_CUTOFF: f64 = 0.2;

/// Draws below this (and above the neutral cutoff) emit a random label
pub const SIM_RANDOM_CUTOFF: f64 = 0.4;

// =============================================================================
// SESSION TIMING
// =============================================================================

/// Fixed polling interval between ticks (milliseconds)
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 2000;

/// Shortest tick interval a session accepts (milliseconds)
pub const MIN_TICK_INTERVAL_MS: u64 = 100;

/// Budget for classifier setup before falling back (milliseconds)
pub const DEFAULT_LOAD_TIMEOUT_MS: u64 = 15000;

/// Probability that an A/B tick is served from the random arm
pub const RANDOM_ARM_PROBABILITY: f64 = 0.5;

// =============================================================================
// VERSION
// =============================================================================

pub const VERSION: &str = "0.1.0";
