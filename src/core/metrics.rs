//! Metrics Aggregator: views, clicks and the per-label histogram

use chrono::Utc;

use crate::types::{AllocationDecision, Arm, Counters, ExportRecord, Label};

/// Owns the session counters
#[derive(Debug, Clone, Default)]
pub struct MetricsAggregator {
    counters: Counters,
    ab_testing_used: bool,
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one served ad. `label` is the tick's label, not the served one.
    pub fn record_view(&mut self, decision: &AllocationDecision, label: Label) {
        self.counters.total_views += 1;
        self.counters.per_arm.entry(decision.arm).or_default().views += 1;
        *self.counters.per_label.entry(label).or_insert(0) += 1;
    }

    /// Count one click, crediting `arm` when known
    pub fn record_click(&mut self, arm: Option<Arm>) {
        self.counters.total_clicks += 1;
        if let Some(arm) = arm {
            self.counters.per_arm.entry(arm).or_default().clicks += 1;
        }
    }

    /// Note that A/B testing was on at some point (sticky)
    pub fn mark_ab_testing_used(&mut self) {
        self.ab_testing_used = true;
    }

    pub fn ab_testing_used(&self) -> bool {
        self.ab_testing_used
    }

    /// Live view of the counters
    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    /// Owned copy for export or notification
    pub fn snapshot(&self) -> Counters {
        self.counters.clone()
    }

    /// Point-in-time export record
    pub fn export(&self) -> ExportRecord {
        ExportRecord::new(&self.counters, self.ab_testing_used, Utc::now())
    }
}
