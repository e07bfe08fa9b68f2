//! Emotion Smoother: debounced label from a noisy per-frame stream
//!
//! Decision rule per accepted reading:
//! - push (raw, confidence) into the ring history
//! - mode = most frequent label in history (tie: most recent occurrence)
//! - accept mode only if confidence > threshold AND mode share > 0.6
//! - otherwise keep the previous label

use tracing::debug;

use crate::types::{ConfidenceVector, DetectionEvent, EmotionHistory, ExperimentConfig, Label};
use crate::CONSISTENCY_THRESHOLD;

/// Result of one smoothing step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothingOutcome {
    /// Label after this step
    pub label: Label,
    /// Most frequent label in history
    pub mode: Label,
    /// `mode_count / history_len`
    pub consistency: f64,
    /// Whether the mode was accepted this step
    pub accepted: bool,
}

/// Debouncing state machine
#[derive(Debug, Clone)]
pub struct EmotionSmoother {
    history: EmotionHistory,
    current: Label,
    update_count: u64,
}

impl Default for EmotionSmoother {
    fn default() -> Self {
        Self::new(crate::DEFAULT_SMOOTHING_WINDOW)
    }
}

impl EmotionSmoother {
    /// Create a smoother voting over `window` readings
    pub fn new(window: usize) -> Self {
        Self {
            history: EmotionHistory::new(window),
            current: Label::Neutral,
            update_count: 0,
        }
    }

    /// Feed one raw reading; returns the debounced label
    pub fn accept(
        &mut self,
        raw: Label,
        confidences: &ConfidenceVector,
        config: &ExperimentConfig,
    ) -> Label {
        self.step(raw, confidences, config).label
    }

    /// Feed one raw reading; returns the full outcome
    pub fn step(
        &mut self,
        raw: Label,
        confidences: &ConfidenceVector,
        config: &ExperimentConfig,
    ) -> SmoothingOutcome {
        if self.history.capacity() != config.smoothing_window.max(1) {
            self.history.resize(config.smoothing_window);
        }

        let confidence = confidences.get(raw);
        self.history.push(DetectionEvent::new(raw, confidence));
        self.update_count += 1;

        let (mode, mode_count) = self.mode();
        let consistency = mode_count as f64 / self.history.len() as f64;
        let accepted =
            confidence > config.confidence_threshold && consistency > CONSISTENCY_THRESHOLD;

        if accepted && mode != self.current {
            debug!(from = %self.current, to = %mode, consistency, "smoothed label changed");
            self.current = mode;
        }

        SmoothingOutcome {
            label: self.current,
            mode,
            consistency,
            accepted,
        }
    }

    /// Most frequent label in history with its count.
    ///
    /// Scans newest to oldest so that on a tie the most recently seen label wins.
    fn mode(&self) -> (Label, usize) {
        let mut counts = [0usize; Label::ALL.len()];
        for event in self.history.iter() {
            counts[event.label.index()] += 1;
        }

        let mut best = self.current;
        let mut best_count = 0;
        let mut seen = [false; Label::ALL.len()];
        for event in self.history.iter().rev() {
            let i = event.label.index();
            if seen[i] {
                continue;
            }
            seen[i] = true;
            if counts[i] > best_count {
                best = event.label;
                best_count = counts[i];
            }
        }
        (best, best_count)
    }

    /// Current debounced label
    pub fn current(&self) -> Label {
        self.current
    }

    /// History, oldest first
    pub fn history(&self) -> &EmotionHistory {
        &self.history
    }

    /// Number of readings accepted into history
    pub fn update_count(&self) -> u64 {
        self.update_count
    }

    /// Apply a new window size, keeping the most recent readings
    pub fn resize(&mut self, window: usize) {
        self.history.resize(window);
    }

    /// Reset to the initial state
    pub fn reset(&mut self) {
        *self = Self::new(self.history.capacity());
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(threshold: f64, window: usize) -> ExperimentConfig {
        ExperimentConfig {
            ab_testing_enabled: false,
            confidence_threshold: threshold,
            smoothing_window: window,
        }
    }

    fn reading(label: Label, score: f64) -> ConfidenceVector {
        ConfidenceVector::new().with(label, score)
    }

    #[test]
    fn test_initial_label_is_neutral() {
        let s = EmotionSmoother::new(3);
        assert_eq!(s.current(), Label::Neutral);
        assert!(s.history().is_empty());
    }

    #[test]
    fn test_low_confidence_never_moves_state() {
        let mut s = EmotionSmoother::new(3);
        let c = cfg(0.3, 3);
        for _ in 0..5 {
            assert_eq!(s.accept(Label::Angry, &reading(Label::Angry, 0.3), &c), Label::Neutral);
        }
        // Readings still land in history
        assert_eq!(s.history().len(), 3);
    }

    #[test]
    fn test_single_outlier_does_not_flip_state() {
        let mut s = EmotionSmoother::new(3);
        let c = cfg(0.3, 3);
        s.accept(Label::Happy, &reading(Label::Happy, 0.9), &c);
        s.accept(Label::Happy, &reading(Label::Happy, 0.9), &c);
        s.accept(Label::Happy, &reading(Label::Happy, 0.9), &c);

        // history: happy happy sad → mode happy at 2/3, state stays happy
        let out = s.step(Label::Sad, &reading(Label::Sad, 0.9), &c);
        assert_eq!(out.label, Label::Happy);
        assert_eq!(out.mode, Label::Happy);

        // history: happy sad sad → mode sad at 2/3 > 0.6
        let out = s.step(Label::Sad, &reading(Label::Sad, 0.9), &c);
        assert_eq!(out.label, Label::Sad);
    }

    #[test]
    fn test_split_history_is_rejected() {
        let mut s = EmotionSmoother::new(2);
        let c = cfg(0.3, 2);
        s.accept(Label::Happy, &reading(Label::Happy, 0.9), &c);
        let out = s.step(Label::Sad, &reading(Label::Sad, 0.9), &c);

        // 1/2 does not exceed 0.6; the tie goes to the newest label
        assert_eq!(out.mode, Label::Sad);
        assert!(!out.accepted);
        assert_eq!(out.label, Label::Happy);
    }

    #[test]
    fn test_window_of_one_depends_only_on_threshold() {
        let mut s = EmotionSmoother::new(1);
        let c = cfg(0.5, 1);

        let out = s.step(Label::Sad, &reading(Label::Sad, 0.6), &c);
        assert_eq!(out.consistency, 1.0);
        assert_eq!(out.label, Label::Sad);

        let out = s.step(Label::Angry, &reading(Label::Angry, 0.4), &c);
        assert_eq!(out.consistency, 1.0);
        assert_eq!(out.label, Label::Sad);
    }

    #[test]
    fn test_config_change_resizes_history() {
        let mut s = EmotionSmoother::new(3);
        for _ in 0..3 {
            s.accept(Label::Happy, &reading(Label::Happy, 0.9), &cfg(0.3, 3));
        }
        s.accept(Label::Sad, &reading(Label::Sad, 0.9), &cfg(0.3, 1));
        assert_eq!(s.history().capacity(), 1);
        assert_eq!(s.current(), Label::Sad);
    }

    #[test]
    fn test_reset_restores_neutral() {
        let mut s = EmotionSmoother::new(3);
        s.accept(Label::Happy, &reading(Label::Happy, 0.9), &cfg(0.3, 3));
        s.reset();
        assert_eq!(s.current(), Label::Neutral);
        assert_eq!(s.update_count(), 0);
        assert_eq!(s.history().capacity(), 3);
    }
}
