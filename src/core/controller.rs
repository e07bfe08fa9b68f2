//! Session Controller: lifecycle and the per-tick pipeline
//!
//! State transitions:
//! - INITIALIZING → RUNNING: classifier loaded, or fallback to simulation
//! - INITIALIZING → FAILED: capture lost, or load failed without fallback
//! - RUNNING ⇄ PAUSED: operator request (idempotent)
//!
//! Tick: classify → smooth → allocate → aggregate → notify.
//! A tick is split into `begin_tick` and `complete_tick` so the (possibly
//! slow) classification can be awaited without holding the controller.

use std::path::{Path, PathBuf};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::core::{EmotionSmoother, ExperimentAllocator, MetricsAggregator, SimulationGenerator};
use crate::types::{
    Ad, ClassifierError, ClickOutcome, Counters, ExperimentConfig, ExportRecord, Label,
    LabelOrigin, Result, SessionConfig, SessionError, SessionState, SignalSource,
    TickInput, TickNotification,
};

/// Capacity of the notification channel
const NOTIFY_CAPACITY: usize = 100;

/// Proof that a tick was started in a given epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickTicket {
    epoch: u64,
    seq: u64,
}

/// One experiment session
#[derive(Debug)]
pub struct SessionController {
    config: SessionConfig,
    state: SessionState,
    source: Option<SignalSource>,
    smoother: EmotionSmoother,
    simulation: SimulationGenerator,
    allocator: ExperimentAllocator,
    metrics: MetricsAggregator,
    /// Label of the last completed tick
    last_label: Label,
    /// Bumped on pause; results from an older epoch are dropped
    epoch: u64,
    next_seq: u64,
    in_flight: Option<TickTicket>,
    ticks: u64,
    failure: Option<String>,
    update_tx: broadcast::Sender<TickNotification>,
}

impl SessionController {
    /// Create a session in INITIALIZING.
    ///
    /// The experiment config is not validated here; use
    /// [`SessionController::try_new`] for operator input.
    pub fn new(config: SessionConfig) -> Self {
        let (simulation, allocator) = match config.seed {
            Some(seed) => (
                SimulationGenerator::seeded(seed),
                ExperimentAllocator::seeded(seed.wrapping_add(1)),
            ),
            None => (SimulationGenerator::new(), ExperimentAllocator::new()),
        };
        let mut metrics = MetricsAggregator::new();
        if config.experiment.ab_testing_enabled {
            metrics.mark_ab_testing_used();
        }
        let (update_tx, _) = broadcast::channel(NOTIFY_CAPACITY);

        Self {
            smoother: EmotionSmoother::new(config.experiment.smoothing_window),
            config,
            state: SessionState::Initializing,
            source: None,
            simulation,
            allocator,
            metrics,
            last_label: Label::Neutral,
            epoch: 0,
            next_seq: 0,
            in_flight: None,
            ticks: 0,
            failure: None,
            update_tx,
        }
    }

    /// Create a session after validating its config
    pub fn try_new(config: SessionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config))
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Resolve classifier setup: RUNNING on success or fallback, FAILED otherwise
    pub fn on_classifier_loaded(
        &mut self,
        result: std::result::Result<(), ClassifierError>,
    ) -> Result<SignalSource> {
        if self.state != SessionState::Initializing {
            return Err(SessionError::NotRunning(self.state));
        }
        match result {
            Ok(()) => self.activate(SignalSource::Classifier),
            Err(err @ ClassifierError::CaptureUnavailable(_)) => Err(self.fail(err.to_string())),
            Err(err) if self.config.fallback_to_simulation => {
                warn!(error = %err, "classifier unavailable, falling back to simulation");
                self.activate(SignalSource::Simulation)
            }
            Err(err) => Err(self.fail(err.to_string())),
        }
    }

    fn activate(&mut self, source: SignalSource) -> Result<SignalSource> {
        self.source = Some(source);
        self.state = SessionState::Running;
        info!(?source, "session running");
        Ok(source)
    }

    fn fail(&mut self, reason: String) -> SessionError {
        warn!(%reason, "session failed");
        self.state = SessionState::Failed;
        self.in_flight = None;
        self.failure = Some(reason.clone());
        SessionError::Failed(reason)
    }

    /// RUNNING → PAUSED. Pausing a paused session is a no-op.
    pub fn pause(&mut self) -> Result<()> {
        match self.state {
            SessionState::Running => {
                self.state = SessionState::Paused;
                self.epoch += 1;
                self.in_flight = None;
                info!("session paused");
                Ok(())
            }
            SessionState::Paused => Ok(()),
            other => Err(SessionError::NotRunning(other)),
        }
    }

    /// PAUSED → RUNNING. Resuming a running session is a no-op.
    pub fn resume(&mut self) -> Result<()> {
        match self.state {
            SessionState::Paused => {
                self.state = SessionState::Running;
                info!("session resumed");
                Ok(())
            }
            SessionState::Running => Ok(()),
            other => Err(SessionError::NotRunning(other)),
        }
    }

    // =========================================================================
    // Ticks
    // =========================================================================

    /// Start a tick. `None` when not running or a tick is already in flight.
    pub fn begin_tick(&mut self) -> Option<TickTicket> {
        if self.state != SessionState::Running {
            debug!(state = %self.state, "tick skipped, session not running");
            return None;
        }
        if self.in_flight.is_some() {
            debug!("tick skipped, previous tick still in flight");
            return None;
        }
        let ticket = TickTicket { epoch: self.epoch, seq: self.next_seq };
        self.next_seq += 1;
        self.in_flight = Some(ticket);
        Some(ticket)
    }

    /// Input for a tick of a simulated session
    pub fn simulate_input(&mut self) -> TickInput {
        TickInput::Simulated(self.simulation.next(self.last_label))
    }

    /// Finish a tick; stale or late results are discarded
    pub fn complete_tick(&mut self, ticket: TickTicket, input: TickInput) -> Option<TickNotification> {
        if self.in_flight == Some(ticket) {
            self.in_flight = None;
        }
        if ticket.epoch != self.epoch || self.state != SessionState::Running {
            debug!(tick = ticket.seq, state = %self.state, "late tick result discarded");
            return None;
        }
        Some(self.run_pipeline(input))
    }

    /// Begin and complete a tick with an input already at hand
    pub fn tick(&mut self, input: TickInput) -> Option<TickNotification> {
        let ticket = self.begin_tick()?;
        self.complete_tick(ticket, input)
    }

    fn run_pipeline(&mut self, input: TickInput) -> TickNotification {
        let experiment = self.config.experiment;

        let (label, origin) = match input {
            TickInput::Reading(vector) => {
                let raw = vector.dominant();
                let label = self.smoother.accept(raw, &vector, &experiment);
                (label, LabelOrigin::Smoothed)
            }
            // History untouched: a dropped frame must not vote
            TickInput::NoDetection => (Label::Neutral, LabelOrigin::NoDetection),
            TickInput::Simulated(label) => (label, LabelOrigin::Simulated),
        };

        if experiment.ab_testing_enabled {
            self.metrics.mark_ab_testing_used();
        }
        let decision = self.allocator.allocate(label, &experiment);
        self.metrics.record_view(&decision, label);
        self.last_label = label;
        self.ticks += 1;

        let notification = TickNotification {
            tick: self.ticks,
            label,
            origin,
            decision,
            ad: Ad::for_label(decision.served_label),
            counters: self.metrics.snapshot(),
        };
        // No subscribers is fine
        let _ = self.update_tx.send(notification.clone());
        notification
    }

    // =========================================================================
    // Outcomes and operator surface
    // =========================================================================

    /// Count a click on the ad on screen, crediting the arm that served it
    pub fn record_click(&mut self) -> Result<ClickOutcome> {
        match self.state {
            SessionState::Running => {}
            other => return Err(SessionError::NotRunning(other)),
        }
        let attributed_to = self.allocator.take_served().map(|d| d.arm);
        if attributed_to.is_none() {
            debug!("click with no pending served decision, counted in total only");
        }
        self.metrics.record_click(attributed_to);
        Ok(ClickOutcome {
            attributed_to,
            total_clicks: self.metrics.counters().total_clicks,
        })
    }

    /// Replace the experiment config; rejected configs leave the old one in place
    pub fn set_config(&mut self, experiment: ExperimentConfig) -> Result<()> {
        experiment.validate()?;
        if experiment.smoothing_window != self.config.experiment.smoothing_window {
            self.smoother.resize(experiment.smoothing_window);
        }
        if experiment.ab_testing_enabled {
            self.metrics.mark_ab_testing_used();
        }
        self.config.experiment = experiment;
        Ok(())
    }

    /// Point-in-time export
    pub fn export(&self) -> ExportRecord {
        self.metrics.export()
    }

    /// Write the export record as pretty JSON into `dir`
    pub fn export_to_dir(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let record = self.export();
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let stamp = record.timestamp.replace(&[':', '.'][..], "-");
        let path = dir.join(format!("moodlab-export-{}.json", stamp));
        std::fs::write(&path, serde_json::to_string_pretty(&record)?)?;
        Ok(path)
    }

    /// Subscribe to per-tick notifications
    pub fn subscribe(&self) -> broadcast::Receiver<TickNotification> {
        self.update_tx.subscribe()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn source(&self) -> Option<SignalSource> {
        self.source
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Label of the last completed tick
    pub fn current_label(&self) -> Label {
        self.last_label
    }

    pub fn smoother(&self) -> &EmotionSmoother {
        &self.smoother
    }

    pub fn counters(&self) -> Counters {
        self.metrics.snapshot()
    }

    /// Completed ticks
    pub fn tick_count(&self) -> u64 {
        self.ticks
    }

    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Arm, ConfidenceVector};

    fn seeded(experiment: ExperimentConfig) -> SessionController {
        SessionController::new(SessionConfig { experiment, seed: Some(11), ..Default::default() })
    }

    fn running(experiment: ExperimentConfig) -> SessionController {
        let mut c = seeded(experiment);
        c.on_classifier_loaded(Ok(())).unwrap();
        c
    }

    fn happy(score: f64) -> TickInput {
        TickInput::Reading(ConfidenceVector::new().with(Label::Happy, score))
    }

    #[test]
    fn test_starts_initializing_and_neutral() {
        let c = seeded(ExperimentConfig::default());
        assert_eq!(c.state(), SessionState::Initializing);
        assert_eq!(c.current_label(), Label::Neutral);
    }

    #[test]
    fn test_no_ticks_before_running() {
        let mut c = seeded(ExperimentConfig::default());
        assert!(c.tick(happy(0.9)).is_none());
        assert_eq!(c.counters().total_views, 0);
    }

    #[test]
    fn test_fallback_to_simulation() {
        let mut c = seeded(ExperimentConfig::default());
        let source = c
            .on_classifier_loaded(Err(ClassifierError::AdapterUnavailable("weights".into())))
            .unwrap();
        assert_eq!(source, SignalSource::Simulation);
        assert_eq!(c.state(), SessionState::Running);
    }

    #[test]
    fn test_capture_loss_is_fatal_even_with_fallback() {
        let mut c = seeded(ExperimentConfig::default());
        let err = c.on_classifier_loaded(Err(ClassifierError::CaptureUnavailable("denied".into())));
        assert!(matches!(err, Err(SessionError::Failed(_))));
        assert_eq!(c.state(), SessionState::Failed);
        assert!(c.failure().unwrap().contains("denied"));
        assert!(c.resume().is_err());
    }

    #[test]
    fn test_no_fallback_fails() {
        let mut c = SessionController::new(SessionConfig {
            fallback_to_simulation: false,
            ..Default::default()
        });
        let err = c.on_classifier_loaded(Err(ClassifierError::Timeout(std::time::Duration::from_secs(15))));
        assert!(err.is_err());
        assert_eq!(c.state(), SessionState::Failed);
    }

    #[test]
    fn test_pause_resume_idempotent() {
        let mut c = running(ExperimentConfig::default());
        c.resume().unwrap();
        assert_eq!(c.state(), SessionState::Running);
        c.pause().unwrap();
        c.pause().unwrap();
        assert_eq!(c.state(), SessionState::Paused);
        c.resume().unwrap();
        assert_eq!(c.state(), SessionState::Running);
    }

    #[test]
    fn test_overlapping_tick_is_skipped() {
        let mut c = running(ExperimentConfig::default());
        let first = c.begin_tick().unwrap();
        assert!(c.begin_tick().is_none());
        c.complete_tick(first, happy(0.9)).unwrap();
        assert!(c.begin_tick().is_some());
    }

    #[test]
    fn test_result_after_pause_is_discarded() {
        let mut c = running(ExperimentConfig::default());
        let ticket = c.begin_tick().unwrap();
        c.pause().unwrap();
        c.resume().unwrap();
        assert!(c.complete_tick(ticket, happy(0.9)).is_none());
        assert_eq!(c.counters().total_views, 0);
        assert_eq!(c.smoother().history().len(), 0);
    }

    #[test]
    fn test_no_detection_skips_history() {
        let mut c = running(ExperimentConfig::default());
        c.tick(happy(0.9)).unwrap();
        let n = c.tick(TickInput::NoDetection).unwrap();
        assert_eq!(n.label, Label::Neutral);
        assert_eq!(n.origin, LabelOrigin::NoDetection);
        assert_eq!(c.smoother().history().len(), 1);
        assert_eq!(c.counters().total_views, 2);
    }

    #[test]
    fn test_click_goes_to_served_arm_once() {
        let mut c = running(ExperimentConfig::default());
        assert_eq!(c.record_click().unwrap().attributed_to, None);

        c.tick(happy(0.9)).unwrap();
        let first = c.record_click().unwrap();
        assert_eq!(first.attributed_to, Some(Arm::Signal));
        let second = c.record_click().unwrap();
        assert_eq!(second.attributed_to, None);
        assert_eq!(second.total_clicks, 3);
        assert_eq!(c.counters().arm(Arm::Signal).clicks, 1);
    }

    #[test]
    fn test_click_rejected_while_paused() {
        let mut c = running(ExperimentConfig::default());
        c.tick(happy(0.9)).unwrap();
        c.pause().unwrap();

        for _ in 0..5 {
            assert!(matches!(
                c.record_click(),
                Err(SessionError::NotRunning(SessionState::Paused))
            ));
        }
        assert_eq!(c.counters().total_clicks, 0);
        assert_eq!(c.counters().arm(Arm::Signal).clicks, 0);

        // The ad served before the pause is still on screen
        c.resume().unwrap();
        assert_eq!(c.record_click().unwrap().attributed_to, Some(Arm::Signal));
    }

    #[test]
    fn test_ab_arms_account_for_every_view() {
        let mut c = running(ExperimentConfig { ab_testing_enabled: true, ..Default::default() });
        for _ in 0..40 {
            c.tick(happy(0.9)).unwrap();
        }
        let counters = c.counters();
        assert_eq!(
            counters.arm(Arm::Signal).views + counters.arm(Arm::Random).views,
            counters.total_views
        );
        assert!(counters.arm(Arm::Random).views > 0);
        assert!(c.export().ab_testing.is_some());
    }

    #[test]
    fn test_invalid_config_rejected_and_kept() {
        let mut c = running(ExperimentConfig::default());
        let bad = ExperimentConfig { smoothing_window: 0, ..Default::default() };
        assert!(matches!(c.set_config(bad), Err(SessionError::Config(_))));
        assert_eq!(c.config().experiment.smoothing_window, 3);
    }

    #[test]
    fn test_enabling_ab_later_shows_in_export() {
        let mut c = running(ExperimentConfig::default());
        assert!(c.export().ab_testing.is_none());
        c.set_config(ExperimentConfig { ab_testing_enabled: true, ..Default::default() }).unwrap();
        c.set_config(ExperimentConfig::default()).unwrap();
        assert!(c.export().ab_testing.is_some());
    }

    #[test]
    fn test_subscribers_see_each_tick() {
        let mut c = running(ExperimentConfig::default());
        let mut rx = c.subscribe();
        c.tick(happy(0.9)).unwrap();
        let n = rx.try_recv().unwrap();
        assert_eq!(n.tick, 1);
        assert_eq!(n.label, Label::Happy);
        assert_eq!(n.ad, Ad::for_label(Label::Happy));
    }

    #[test]
    fn test_simulated_ticks_drive_pipeline() {
        let mut c = seeded(ExperimentConfig::default());
        c.on_classifier_loaded(Err(ClassifierError::AdapterUnavailable("none".into()))).unwrap();
        for _ in 0..10 {
            let input = c.simulate_input();
            let n = c.tick(input).unwrap();
            assert_eq!(n.origin, LabelOrigin::Simulated);
        }
        assert_eq!(c.tick_count(), 10);
        assert!(c.smoother().history().is_empty());
    }
}
