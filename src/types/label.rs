//! Emotion labels and per-label confidence vectors

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The closed set of emotions the pipeline understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Happy,
    Sad,
    Angry,
    Neutral,
}

impl Default for Label {
    fn default() -> Self {
        Label::Neutral
    }
}

impl Label {
    /// Every label, in enumeration order (drives cyclic drift in simulation)
    pub const ALL: [Label; 4] = [Label::Happy, Label::Sad, Label::Angry, Label::Neutral];

    /// Position in [`Label::ALL`]
    pub fn index(self) -> usize {
        match self {
            Label::Happy => 0,
            Label::Sad => 1,
            Label::Angry => 2,
            Label::Neutral => 3,
        }
    }

    /// The label after this one, wrapping at the end
    pub fn next(self) -> Label {
        Label::ALL[(self.index() + 1) % Label::ALL.len()]
    }

    /// Lowercase wire name
    pub fn as_str(self) -> &'static str {
        match self {
            Label::Happy => "happy",
            Label::Sad => "sad",
            Label::Angry => "angry",
            Label::Neutral => "neutral",
        }
    }

    /// Parse a known label name (case-insensitive)
    pub fn parse(name: &str) -> Option<Label> {
        Label::ALL
            .into_iter()
            .find(|label| label.as_str().eq_ignore_ascii_case(name.trim()))
    }

    /// Map an arbitrary expression name onto a label.
    ///
    /// Face models report more expressions than we serve ads for
    /// (surprised, fearful, disgusted); those all read as neutral.
    pub fn from_expression(name: &str) -> Label {
        Label::parse(name).unwrap_or(Label::Neutral)
    }

    /// Capitalized name for display ("Happy")
    pub fn display_name(self) -> &'static str {
        match self {
            Label::Happy => "Happy",
            Label::Sad => "Sad",
            Label::Angry => "Angry",
            Label::Neutral => "Neutral",
        }
    }

    /// Emoji for the label
    pub fn emoji(self) -> &'static str {
        match self {
            Label::Happy => "😄",
            Label::Sad => "😢",
            Label::Angry => "😠",
            Label::Neutral => "😐",
        }
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-label confidence for one classification attempt.
///
/// Scores are clamped to `[0, 1]` on the way in; they need not sum to 1.
/// A label missing from the vector reads as 0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfidenceVector {
    scores: BTreeMap<Label, f64>,
}

impl ConfidenceVector {
    /// Empty vector (every label reads 0)
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter
    pub fn with(mut self, label: Label, score: f64) -> Self {
        self.set(label, score);
        self
    }

    /// Set one label's score, clamped to `[0, 1]`; NaN becomes 0
    pub fn set(&mut self, label: Label, score: f64) {
        let score = if score.is_nan() { 0.0 } else { score.clamp(0.0, 1.0) };
        self.scores.insert(label, score);
    }

    /// Score for a label
    pub fn get(&self, label: Label) -> f64 {
        self.scores.get(&label).copied().unwrap_or(0.0)
    }

    /// Build from a raw expression map, keeping only known labels.
    ///
    /// Unknown expression names are dropped rather than folded into neutral,
    /// so a strong "surprised" score cannot masquerade as a neutral reading.
    pub fn from_expressions<'a, I>(expressions: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let mut vector = Self::new();
        for (name, score) in expressions {
            if let Some(label) = Label::parse(name) {
                vector.set(label, score);
            }
        }
        vector
    }

    /// Arg-max label; ties go to the earlier label in enumeration order
    pub fn dominant(&self) -> Label {
        let mut best = Label::Neutral;
        let mut best_score = f64::NEG_INFINITY;
        for label in Label::ALL {
            let score = self.get(label);
            if score > best_score {
                best = label;
                best_score = score;
            }
        }
        best
    }

    /// Whether any label carries a positive score
    pub fn is_empty(&self) -> bool {
        self.scores.values().all(|score| *score <= 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cyclic_order_wraps() {
        assert_eq!(Label::Happy.next(), Label::Sad);
        assert_eq!(Label::Angry.next(), Label::Neutral);
        assert_eq!(Label::Neutral.next(), Label::Happy);
    }

    #[test]
    fn test_unknown_expression_is_neutral() {
        assert_eq!(Label::from_expression("surprised"), Label::Neutral);
        assert_eq!(Label::from_expression("Happy"), Label::Happy);
    }

    #[test]
    fn test_scores_are_clamped() {
        let v = ConfidenceVector::new().with(Label::Sad, 1.7).with(Label::Angry, -0.2);
        assert_eq!(v.get(Label::Sad), 1.0);
        assert_eq!(v.get(Label::Angry), 0.0);
        assert_eq!(v.get(Label::Happy), 0.0);
    }

    #[test]
    fn test_dominant_picks_argmax() {
        let v = ConfidenceVector::from_expressions([
            ("happy", 0.1),
            ("sad", 0.7),
            ("surprised", 0.9),
            ("neutral", 0.2),
        ]);
        assert_eq!(v.dominant(), Label::Sad);
    }

    #[test]
    fn test_dominant_tie_prefers_enumeration_order() {
        let v = ConfidenceVector::new().with(Label::Angry, 0.5).with(Label::Sad, 0.5);
        assert_eq!(v.dominant(), Label::Sad);
    }

    #[test]
    fn test_label_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Label::Angry).unwrap(), "\"angry\"");
    }
}
