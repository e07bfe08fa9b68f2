//! Experiment and session configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::ConfigError;
use crate::{
    DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_LOAD_TIMEOUT_MS, DEFAULT_SMOOTHING_WINDOW,
    DEFAULT_TICK_INTERVAL_MS, MIN_TICK_INTERVAL_MS,
};

/// Operator-tunable knobs, read on every tick (last write wins)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExperimentConfig {
    pub ab_testing_enabled: bool,
    pub confidence_threshold: f64,
    pub smoothing_window: usize,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            ab_testing_enabled: false,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            smoothing_window: DEFAULT_SMOOTHING_WINDOW,
        }
    }
}

impl ExperimentConfig {
    /// Reject values the smoother cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = self.confidence_threshold;
        if !t.is_finite() || !(0.0..=1.0).contains(&t) {
            return Err(ConfigError::ThresholdOutOfRange(t));
        }
        if self.smoothing_window == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        Ok(())
    }
}

/// Everything fixed at session start
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub experiment: ExperimentConfig,
    /// Fixed polling cadence
    pub tick_interval: Duration,
    /// Budget for classifier setup
    pub load_timeout: Duration,
    /// Use the simulation generator when the classifier cannot load
    pub fallback_to_simulation: bool,
    /// Seed for every random draw; `None` seeds from entropy
    pub seed: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            experiment: ExperimentConfig::default(),
            tick_interval: Duration::from_millis(DEFAULT_TICK_INTERVAL_MS),
            load_timeout: Duration::from_millis(DEFAULT_LOAD_TIMEOUT_MS),
            fallback_to_simulation: true,
            seed: None,
        }
    }
}

impl SessionConfig {
    /// Experiment knobs plus a floor on the tick cadence
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.experiment.validate()?;
        let min = Duration::from_millis(MIN_TICK_INTERVAL_MS);
        if self.tick_interval < min {
            return Err(ConfigError::TickIntervalTooShort { got: self.tick_interval, min });
        }
        Ok(())
    }
}
