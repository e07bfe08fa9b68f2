//! Core modules for Moodlab

pub mod smoother;
pub mod simulation;
pub mod allocator;
pub mod metrics;
pub mod classifier;
pub mod controller;
pub mod scheduler;
pub mod telemetry;
pub mod api;

pub use smoother::{EmotionSmoother, SmoothingOutcome};
pub use simulation::SimulationGenerator;
pub use allocator::ExperimentAllocator;
pub use metrics::MetricsAggregator;
pub use classifier::{Classifier, ClassifyResult, ScriptedClassifier, classify_within, load_with_timeout, to_tick_input};
pub use controller::{SessionController, TickTicket};
pub use scheduler::{SessionHandle, SharedController, TickScheduler, run_tick};
pub use telemetry::{init_tracing, DEFAULT_LOG_LEVEL};
pub use api::{create_router, run_server};
