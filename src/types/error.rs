//! Error taxonomy

use std::time::Duration;
use thiserror::Error;

use crate::types::SessionState;

/// Failures at the classifier boundary
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ClassifierError {
    /// Model or classifier could not be set up
    #[error("classifier unavailable: {0}")]
    AdapterUnavailable(String),
    /// The frame source (camera) could not be acquired
    #[error("capture unavailable: {0}")]
    CaptureUnavailable(String),
    /// A call did not finish within its budget
    #[error("classifier timed out after {0:?}")]
    Timeout(Duration),
    /// Inference ran but failed
    #[error("inference failed: {0}")]
    Inference(String),
}

/// Rejected configuration values
#[derive(Debug, Clone, Copy, Error, PartialEq)]
pub enum ConfigError {
    #[error("confidence threshold must be within [0, 1], got {0}")]
    ThresholdOutOfRange(f64),
    #[error("smoothing window must be at least 1")]
    ZeroWindow,
    #[error("tick interval must be at least {min:?}, got {got:?}")]
    TickIntervalTooShort { got: Duration, min: Duration },
}

/// Errors surfaced by the session controller
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session is not running (state: {0})")]
    NotRunning(SessionState),
    #[error("session failed: {0}")]
    Failed(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("export serialization failed: {0}")]
    Export(#[from] serde_json::Error),
    #[error("export write failed: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SessionError>;
