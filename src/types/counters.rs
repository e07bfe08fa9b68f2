//! Outcome counters and the exported session record

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{Arm, Label};

/// Views and clicks for one arm
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArmCounters {
    pub views: u64,
    pub clicks: u64,
}

/// Session-lifetime counters; every field only grows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Counters {
    pub total_views: u64,
    pub total_clicks: u64,
    pub per_arm: BTreeMap<Arm, ArmCounters>,
    pub per_label: BTreeMap<Label, u64>,
}

impl Default for Counters {
    fn default() -> Self {
        Self {
            total_views: 0,
            total_clicks: 0,
            per_arm: Arm::ALL.into_iter().map(|arm| (arm, ArmCounters::default())).collect(),
            per_label: Label::ALL.into_iter().map(|label| (label, 0)).collect(),
        }
    }
}

impl Counters {
    /// Counters for one arm
    pub fn arm(&self, arm: Arm) -> ArmCounters {
        self.per_arm.get(&arm).copied().unwrap_or_default()
    }

    /// Count for one label
    pub fn label(&self, label: Label) -> u64 {
        self.per_label.get(&label).copied().unwrap_or(0)
    }
}

/// `numerator / denominator * 100`, or 0 when there is no denominator
pub fn rate(numerator: u64, denominator: u64) -> f64 {
    if denominator > 0 {
        numerator as f64 / denominator as f64 * 100.0
    } else {
        0.0
    }
}

/// Rate rendered to one decimal place ("33.3%"), or "0%" with no denominator
pub fn format_rate(numerator: u64, denominator: u64) -> String {
    if denominator > 0 {
        format!("{:.1}%", rate(numerator, denominator))
    } else {
        "0%".to_string()
    }
}

/// One arm in the exported record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArmExport {
    pub views: u64,
    pub clicks: u64,
    pub rate: String,
}

impl From<ArmCounters> for ArmExport {
    fn from(c: ArmCounters) -> Self {
        Self {
            views: c.views,
            clicks: c.clicks,
            rate: format_rate(c.clicks, c.views),
        }
    }
}

/// Both arms in the exported record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbTestingExport {
    pub mood_based: ArmExport,
    pub random: ArmExport,
}

/// Point-in-time export of a session's counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRecord {
    /// ISO-8601, millisecond precision
    pub timestamp: String,
    pub total_views: u64,
    pub total_clicks: u64,
    pub click_rate: String,
    pub emotion_counts: BTreeMap<Label, u64>,
    /// Absent (null) unless A/B testing was enabled at some point
    pub ab_testing: Option<AbTestingExport>,
}

impl ExportRecord {
    /// Build from a snapshot of counters
    pub fn new(counters: &Counters, ab_testing_used: bool, at: DateTime<Utc>) -> Self {
        let ab_testing = ab_testing_used.then(|| AbTestingExport {
            mood_based: counters.arm(Arm::Signal).into(),
            random: counters.arm(Arm::Random).into(),
        });
        Self {
            timestamp: at.to_rfc3339_opts(SecondsFormat::Millis, true),
            total_views: counters.total_views,
            total_clicks: counters.total_clicks,
            click_rate: format_rate(counters.total_clicks, counters.total_views),
            emotion_counts: counters.per_label.clone(),
            ab_testing,
        }
    }
}
