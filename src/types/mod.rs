//! Core types for Moodlab

mod label;
mod history;
mod decision;
mod counters;
mod config;
mod session;
mod error;

pub use label::{Label, ConfidenceVector};
pub use history::{DetectionEvent, EmotionHistory};
pub use decision::{Arm, AllocationDecision, Ad};
pub use counters::{Counters, ArmCounters, ExportRecord, AbTestingExport, ArmExport, rate, format_rate};
pub use config::{ExperimentConfig, SessionConfig};
pub use session::{SessionState, SignalSource, TickInput, LabelOrigin, TickNotification, ClickOutcome};
pub use error::{ClassifierError, ConfigError, SessionError, Result};
