//! Detection events and the fixed-capacity history the smoother votes over
//!
//! - DetectionEvent = one accepted raw reading
//! - EmotionHistory = ring buffer of the last `capacity` events, oldest evicted first

use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::types::Label;

/// A single raw reading, as seen by the smoother
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionEvent {
    /// Raw (per-frame) label
    pub label: Label,
    /// Confidence of the raw label, in `[0, 1]`
    pub confidence: f64,
    /// When the reading was accepted (not serialized)
    #[serde(skip)]
    pub timestamp: Option<Instant>,
}

impl DetectionEvent {
    /// Create a new event stamped now
    pub fn new(label: Label, confidence: f64) -> Self {
        Self {
            label,
            confidence: confidence.clamp(0.0, 1.0),
            timestamp: Some(Instant::now()),
        }
    }
}

/// Ring buffer of detection events.
///
/// Slots are overwritten in place once full; `start` marks the oldest.
#[derive(Debug, Clone)]
pub struct EmotionHistory {
    slots: Vec<DetectionEvent>,
    start: usize,
    capacity: usize,
}

impl EmotionHistory {
    /// Create a history holding at most `capacity` events (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: Vec::with_capacity(capacity),
            start: 0,
            capacity,
        }
    }

    /// Append an event, evicting the oldest when full
    pub fn push(&mut self, event: DetectionEvent) {
        if self.slots.len() < self.capacity {
            self.slots.push(event);
        } else {
            self.slots[self.start] = event;
            self.start = (self.start + 1) % self.capacity;
        }
    }

    /// Events from oldest to newest
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &DetectionEvent> + '_ {
        let len = self.slots.len();
        (0..len).map(move |i| &self.slots[(self.start + i) % len])
    }

    /// Most recent event
    pub fn latest(&self) -> Option<&DetectionEvent> {
        self.iter().next_back()
    }

    /// Change capacity, keeping the most recent events
    pub fn resize(&mut self, capacity: usize) {
        let capacity = capacity.max(1);
        if capacity == self.capacity {
            return;
        }
        let keep = self.slots.len().min(capacity);
        let skip = self.slots.len() - keep;
        let slots: Vec<DetectionEvent> = self.iter().skip(skip).cloned().collect();
        self.slots = slots;
        self.start = 0;
        self.capacity = capacity;
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Labels from oldest to newest
    pub fn labels(&self) -> Vec<Label> {
        self.iter().map(|e| e.label).collect()
    }
}
