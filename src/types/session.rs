//! Session lifecycle states and per-tick messages

use serde::{Deserialize, Serialize};

use crate::types::{Ad, AllocationDecision, Arm, ConfidenceVector, Counters, Label};

/// The four states of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    /// Classifier setup in progress
    Initializing,
    /// Ticks are flowing
    Running,
    /// Ticks suspended by the operator
    Paused,
    /// Terminal; needs an external restart
    Failed,
}

impl SessionState {
    /// Get ANSI color code for terminal display
    pub fn color_code(&self) -> &'static str {
        match self {
            SessionState::Initializing => "\x1b[90m", // Gray
            SessionState::Running => "\x1b[32m",      // Green
            SessionState::Paused => "\x1b[33m",       // Yellow
            SessionState::Failed => "\x1b[31m",       // Red
        }
    }

    /// Reset ANSI color
    pub fn color_reset() -> &'static str {
        "\x1b[0m"
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Initializing => "INITIALIZING",
            SessionState::Running => "RUNNING",
            SessionState::Paused => "PAUSED",
            SessionState::Failed => "FAILED",
        };
        write!(f, "{}", name)
    }
}

/// Where this session's readings come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalSource {
    /// A real classifier adapter
    Classifier,
    /// The simulation generator
    Simulation,
}

/// What one tick produced before smoothing
#[derive(Debug, Clone, PartialEq)]
pub enum TickInput {
    /// Classifier reading; the raw label is its dominant entry
    Reading(ConfidenceVector),
    /// No face / no usable signal
    NoDetection,
    /// Final label from the simulation generator
    Simulated(Label),
}

/// How the tick's label was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelOrigin {
    Smoothed,
    NoDetection,
    Simulated,
}

/// Sent to subscribers after every completed tick
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickNotification {
    /// Monotonic tick number within the session
    pub tick: u64,
    /// Label after smoothing (or forced / simulated)
    pub label: Label,
    pub origin: LabelOrigin,
    pub decision: AllocationDecision,
    /// Creative for the served label
    pub ad: Ad,
    pub counters: Counters,
}

impl TickNotification {
    /// Format for terminal display (with colors)
    pub fn to_terminal_string(&self) -> String {
        let color = match self.decision.arm {
            Arm::Signal => "\x1b[32m",
            Arm::Random => "\x1b[35m",
        };
        let reset = SessionState::color_reset();
        format!(
            "{}{} #{} {} | arm={} | ad={} | views={} clicks={}{}",
            color,
            self.label.emoji(),
            self.tick,
            self.label.display_name(),
            self.decision.arm,
            self.decision.served_label,
            self.counters.total_views,
            self.counters.total_clicks,
            reset
        )
    }

    /// Format for parseable output (no colors)
    pub fn to_parseable_string(&self) -> String {
        format!(
            "tick={} | label={} | origin={:?} | arm={} | served={} | views={} | clicks={}",
            self.tick,
            self.label,
            self.origin,
            self.decision.arm,
            self.decision.served_label,
            self.counters.total_views,
            self.counters.total_clicks
        )
    }
}

/// Result of recording a click
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickOutcome {
    /// Arm credited with the click, if a served decision was pending
    pub attributed_to: Option<Arm>,
    pub total_clicks: u64,
}
