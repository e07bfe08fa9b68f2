//! Classifier boundary
//!
//! The real adapter (camera + expression model) lives outside this crate.
//! It plugs in through [`Classifier`]; everything it returns is funneled into
//! a [`TickInput`] so that no adapter error ever reaches the counters.

use futures_util::future::BoxFuture;
use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::types::{ClassifierError, ConfidenceVector, TickInput};

/// `Ok(None)` means the frame had no usable face
pub type ClassifyResult = Result<Option<ConfidenceVector>, ClassifierError>;

/// One classification attempt per call
pub trait Classifier: Send {
    fn classify(&mut self) -> BoxFuture<'_, ClassifyResult>;

    /// Name used in logs
    fn name(&self) -> &str {
        "classifier"
    }
}

/// Run adapter setup under a deadline
pub async fn load_with_timeout<F, C>(loader: F, timeout: Duration) -> Result<C, ClassifierError>
where
    F: Future<Output = Result<C, ClassifierError>>,
{
    match tokio::time::timeout(timeout, loader).await {
        Ok(result) => result,
        Err(_) => Err(ClassifierError::Timeout(timeout)),
    }
}

/// Classify once under a deadline, downgrading every failure to no-detection
pub async fn classify_within(classifier: &mut dyn Classifier, budget: Duration) -> TickInput {
    let result = match tokio::time::timeout(budget, classifier.classify()).await {
        Ok(result) => result,
        Err(_) => Err(ClassifierError::Timeout(budget)),
    };
    to_tick_input(result)
}

/// Map a classifier result onto the pipeline input
pub fn to_tick_input(result: ClassifyResult) -> TickInput {
    match result {
        Ok(Some(vector)) if !vector.is_empty() => TickInput::Reading(vector),
        Ok(_) => TickInput::NoDetection,
        Err(err) => {
            warn!(error = %err, "classifier error downgraded to no-detection");
            TickInput::NoDetection
        }
    }
}

/// Replays a fixed script of results, then reports no detection.
///
/// Useful for offline replays of a recorded session and for tests.
#[derive(Debug, Default)]
pub struct ScriptedClassifier {
    script: VecDeque<ClassifyResult>,
    delay: Option<Duration>,
}

impl ScriptedClassifier {
    pub fn new<I>(script: I) -> Self
    where
        I: IntoIterator<Item = ClassifyResult>,
    {
        Self {
            script: script.into_iter().collect(),
            delay: None,
        }
    }

    /// Make every call take `delay` before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Results not yet replayed
    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl Classifier for ScriptedClassifier {
    fn classify(&mut self) -> BoxFuture<'_, ClassifyResult> {
        Box::pin(async move {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.script.pop_front().unwrap_or(Ok(None))
        })
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Label;

    #[test]
    fn test_errors_become_no_detection() {
        let input = to_tick_input(Err(ClassifierError::Inference("nan".into())));
        assert_eq!(input, TickInput::NoDetection);
    }

    #[test]
    fn test_empty_vector_is_no_detection() {
        assert_eq!(to_tick_input(Ok(Some(ConfidenceVector::new()))), TickInput::NoDetection);
        assert_eq!(to_tick_input(Ok(None)), TickInput::NoDetection);
    }

    #[test]
    fn test_reading_passes_through() {
        let v = ConfidenceVector::new().with(Label::Happy, 0.8);
        assert_eq!(to_tick_input(Ok(Some(v.clone()))), TickInput::Reading(v));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_classifier_times_out() {
        let v = ConfidenceVector::new().with(Label::Sad, 0.9);
        let mut c = ScriptedClassifier::new([Ok(Some(v))]).with_delay(Duration::from_secs(5));
        let input = classify_within(&mut c, Duration::from_secs(1)).await;
        assert_eq!(input, TickInput::NoDetection);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loader_timeout() {
        let loader = async {
            tokio::time::sleep(Duration::from_secs(20)).await;
            Ok::<_, ClassifierError>(())
        };
        let err = load_with_timeout(loader, Duration::from_secs(15)).await.unwrap_err();
        assert_eq!(err, ClassifierError::Timeout(Duration::from_secs(15)));
    }

    #[tokio::test]
    async fn test_script_runs_dry_into_no_detection() {
        let v = ConfidenceVector::new().with(Label::Angry, 0.7);
        let mut c = ScriptedClassifier::new([Ok(Some(v.clone()))]);
        assert_eq!(classify_within(&mut c, Duration::from_secs(1)).await, TickInput::Reading(v));
        assert_eq!(classify_within(&mut c, Duration::from_secs(1)).await, TickInput::NoDetection);
        assert_eq!(c.remaining(), 0);
    }
}
