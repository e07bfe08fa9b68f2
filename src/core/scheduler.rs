//! Tick scheduler: drives a session at a fixed interval
//!
//! - first tick one interval after start; missed ticks are skipped, never replayed
//! - one tick body at a time; the controller lock is released while classifying
//! - pause holds the loop, resume re-arms the interval from now

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::core::classifier::{classify_within, load_with_timeout, Classifier};
use crate::core::SessionController;
use crate::types::{
    ClassifierError, Result, SessionConfig, SessionError, SessionState, SignalSource,
    TickInput, TickNotification,
};

/// Controller shared between the scheduler and its operators
pub type SharedController = Arc<Mutex<SessionController>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunControl {
    Run,
    Hold,
    Stop,
}

/// Handle to a running tick loop
#[derive(Debug)]
pub struct TickScheduler {
    control: watch::Sender<RunControl>,
    handle: JoinHandle<()>,
}

impl TickScheduler {
    /// Spawn the tick loop. Without a classifier, a classifier-backed session
    /// reads as no-detection on every tick.
    pub fn start(
        controller: SharedController,
        classifier: Option<Box<dyn Classifier>>,
        interval: Duration,
    ) -> Self {
        let (control, rx) = watch::channel(RunControl::Run);
        let handle = tokio::spawn(tick_loop(controller, classifier, interval, rx));
        Self { control, handle }
    }

    /// Hold the loop; in-flight results will be discarded by the controller
    pub fn hold(&self) {
        let _ = self.control.send(RunControl::Hold);
    }

    /// Restart the loop; next tick one full interval from now
    pub fn release(&self) {
        let _ = self.control.send(RunControl::Run);
    }

    /// Stop the loop and wait for it to exit
    pub async fn shutdown(self) {
        let _ = self.control.send(RunControl::Stop);
        let _ = self.handle.await;
    }
}

async fn tick_loop(
    controller: SharedController,
    mut classifier: Option<Box<dyn Classifier>>,
    interval: Duration,
    mut control: watch::Receiver<RunControl>,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        // Control first: a resume must reset the ticker before a due tick runs
        tokio::select! {
            biased;
            changed = control.changed() => {
                if changed.is_err() {
                    break;
                }
                match *control.borrow_and_update() {
                    RunControl::Stop => break,
                    RunControl::Run => ticker.reset(),
                    RunControl::Hold => {}
                }
            }
            _ = ticker.tick() => {
                if *control.borrow() != RunControl::Run {
                    continue;
                }
                run_tick(&controller, classifier.as_deref_mut(), interval).await;
            }
        }
    }
    debug!("tick loop stopped");
}

/// Run one tick end to end. The classifier call is bounded by `budget`.
pub async fn run_tick(
    controller: &SharedController,
    classifier: Option<&mut (dyn Classifier + 'static)>,
    budget: Duration,
) -> Option<TickNotification> {
    let (ticket, simulated) = {
        let mut c = controller.lock().await;
        let ticket = c.begin_tick()?;
        let simulated = match c.source() {
            Some(SignalSource::Simulation) => Some(c.simulate_input()),
            _ => None,
        };
        (ticket, simulated)
    };

    let input = match (simulated, classifier) {
        (Some(input), _) => input,
        (None, Some(classifier)) => classify_within(classifier, budget).await,
        (None, None) => TickInput::NoDetection,
    };

    controller.lock().await.complete_tick(ticket, input)
}

/// A started session: shared controller plus its tick loop, if any
#[derive(Debug)]
pub struct SessionHandle {
    pub controller: SharedController,
    scheduler: Option<TickScheduler>,
}

impl SessionHandle {
    /// Load the classifier under the configured timeout, resolve the
    /// session state, and start ticking.
    pub async fn launch<F>(config: SessionConfig, loader: F) -> Result<Self>
    where
        F: Future<Output = std::result::Result<Box<dyn Classifier>, ClassifierError>>,
    {
        let mut controller = SessionController::try_new(config)?;
        let config = controller.config().clone();

        let (loaded, classifier) = match load_with_timeout(loader, config.load_timeout).await {
            Ok(classifier) => {
                info!(classifier = classifier.name(), "classifier loaded");
                (Ok(()), Some(classifier))
            }
            Err(err) => (Err(err), None),
        };
        controller.on_classifier_loaded(loaded)?;

        let controller = Arc::new(Mutex::new(controller));
        let scheduler = TickScheduler::start(controller.clone(), classifier, config.tick_interval);
        Ok(Self { controller, scheduler: Some(scheduler) })
    }

    /// Session fed by readings pushed from outside; no tick loop
    pub fn external(config: SessionConfig) -> Result<Self> {
        let mut controller = SessionController::try_new(config)?;
        controller.on_classifier_loaded(Ok(()))?;
        Ok(Self {
            controller: Arc::new(Mutex::new(controller)),
            scheduler: None,
        })
    }

    pub async fn pause(&self) -> Result<()> {
        self.controller.lock().await.pause()?;
        if let Some(scheduler) = &self.scheduler {
            scheduler.hold();
        }
        Ok(())
    }

    pub async fn resume(&self) -> Result<()> {
        let mut c = self.controller.lock().await;
        let was_paused = c.state() == SessionState::Paused;
        c.resume()?;
        if was_paused {
            if let Some(scheduler) = &self.scheduler {
                scheduler.release();
            }
        }
        Ok(())
    }

    /// Push one externally produced tick
    pub async fn push(&self, input: TickInput) -> Result<Option<TickNotification>> {
        let mut c = self.controller.lock().await;
        match c.state() {
            SessionState::Running => Ok(c.tick(input)),
            SessionState::Failed => Err(SessionError::Failed(c.failure().unwrap_or_default().to_string())),
            other => Err(SessionError::NotRunning(other)),
        }
    }

    /// Whether a tick loop drives this session
    pub fn is_scheduled(&self) -> bool {
        self.scheduler.is_some()
    }

    /// Stop the tick loop
    pub async fn shutdown(self) {
        if let Some(scheduler) = self.scheduler {
            scheduler.shutdown().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::classifier::ScriptedClassifier;
    use crate::types::{ConfidenceVector, ExperimentConfig, Label, LabelOrigin};

    fn config() -> SessionConfig {
        SessionConfig { seed: Some(5), ..Default::default() }
    }

    async fn no_classifier() -> std::result::Result<Box<dyn Classifier>, ClassifierError> {
        Err(ClassifierError::AdapterUnavailable("no model".into()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulated_session_ticks_on_interval() {
        let session = SessionHandle::launch(config(), no_classifier()).await.unwrap();
        let mut rx = session.controller.lock().await.subscribe();

        tokio::time::sleep(Duration::from_millis(6500)).await;

        let c = session.controller.lock().await;
        assert_eq!(c.source(), Some(SignalSource::Simulation));
        assert_eq!(c.tick_count(), 3);
        drop(c);
        assert_eq!(rx.recv().await.unwrap().origin, LabelOrigin::Simulated);
        session.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_stops_counters() {
        let session = SessionHandle::launch(config(), no_classifier()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(2500)).await;
        session.pause().await.unwrap();
        let views = session.controller.lock().await.counters().total_views;

        tokio::time::sleep(Duration::from_millis(10_000)).await;
        assert_eq!(session.controller.lock().await.counters().total_views, views);

        session.resume().await.unwrap();
        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(session.controller.lock().await.counters().total_views, views + 1);
        session.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_on_due_tick_waits_full_interval() {
        let session = SessionHandle::launch(config(), no_classifier()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(2500)).await;
        session.pause().await.unwrap();

        // Resume exactly when the next tick is due
        tokio::time::sleep(Duration::from_millis(1500)).await;
        session.resume().await.unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(session.controller.lock().await.tick_count(), 1);
        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert_eq!(session.controller.lock().await.tick_count(), 2);
        session.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_result_after_pause_is_dropped() {
        let reading = ConfidenceVector::new().with(Label::Happy, 0.9);
        let loader = async move {
            let c = ScriptedClassifier::new([Ok(Some(reading))])
                .with_delay(Duration::from_millis(1500));
            Ok::<Box<dyn Classifier>, ClassifierError>(Box::new(c))
        };
        let session = SessionHandle::launch(config(), loader).await.unwrap();

        // tick fires at 2000ms, classifier answers at 3500ms
        tokio::time::sleep(Duration::from_millis(2500)).await;
        session.pause().await.unwrap();
        tokio::time::sleep(Duration::from_millis(2000)).await;

        let c = session.controller.lock().await;
        assert_eq!(c.state(), SessionState::Paused);
        assert_eq!(c.counters().total_views, 0);
        assert!(c.smoother().history().is_empty());
        drop(c);
        session.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_loader_timeout_falls_back() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<Box<dyn Classifier>, ClassifierError>(Box::new(ScriptedClassifier::default()))
        };
        let session = SessionHandle::launch(config(), slow).await.unwrap();
        assert_eq!(session.controller.lock().await.source(), Some(SignalSource::Simulation));
        session.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_loader_timeout_without_fallback_fails() {
        let cfg = SessionConfig { fallback_to_simulation: false, ..config() };
        let slow = async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<Box<dyn Classifier>, ClassifierError>(Box::new(ScriptedClassifier::default()))
        };
        let err = SessionHandle::launch(cfg, slow).await.unwrap_err();
        assert!(matches!(err, SessionError::Failed(_)));
    }

    #[tokio::test]
    async fn test_external_session_push() {
        let cfg = SessionConfig {
            experiment: ExperimentConfig { smoothing_window: 1, ..Default::default() },
            ..config()
        };
        let session = SessionHandle::external(cfg).unwrap();
        assert!(!session.is_scheduled());

        let n = session
            .push(TickInput::Reading(ConfidenceVector::new().with(Label::Angry, 0.9)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(n.label, Label::Angry);

        session.pause().await.unwrap();
        assert!(session.push(TickInput::NoDetection).await.is_err());
    }
}
