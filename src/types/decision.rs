//! Experiment arms, allocation decisions and the ad catalog

use serde::{Deserialize, Serialize};

use crate::types::Label;

/// Treatment branch of the A/B experiment
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Arm {
    /// Ad follows the detected emotion
    #[serde(rename = "moodBased")]
    Signal,
    /// Ad drawn uniformly, ignoring the signal
    Random,
}

impl Arm {
    pub const ALL: [Arm; 2] = [Arm::Signal, Arm::Random];
}

impl std::fmt::Display for Arm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Arm::Signal => "SIGNAL",
            Arm::Random => "RANDOM",
        };
        write!(f, "{}", name)
    }
}

/// Outcome of one allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationDecision {
    pub arm: Arm,
    pub served_label: Label,
}

impl AllocationDecision {
    pub fn new(arm: Arm, served_label: Label) -> Self {
        Self { arm, served_label }
    }
}

/// A creative shown to the viewer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Ad {
    pub image: &'static str,
    pub text: &'static str,
}

const HAPPY_AD: Ad = Ad {
    image: "https://via.placeholder.com/200x100/FFD700/000000?text=Happy+Ad",
    text: "Celebrate your good mood with our fun products! 🎉",
};

const SAD_AD: Ad = Ad {
    image: "https://via.placeholder.com/200x100/4169E1/FFFFFF?text=Sad+Ad",
    text: "Cheer up with our comforting deals! 😊",
};

const ANGRY_AD: Ad = Ad {
    image: "https://via.placeholder.com/200x100/FF0000/FFFFFF?text=Angry+Ad",
    text: "Channel that energy into our exciting offers! 🔥",
};

const NEUTRAL_AD: Ad = Ad {
    image: "https://via.placeholder.com/200x100/808080/FFFFFF?text=Neutral+Ad",
    text: "Discover something new today! 🌟",
};

impl Ad {
    /// Creative for a served label
    pub fn for_label(label: Label) -> Ad {
        match label {
            Label::Happy => HAPPY_AD,
            Label::Sad => SAD_AD,
            Label::Angry => ANGRY_AD,
            Label::Neutral => NEUTRAL_AD,
        }
    }

    /// Creative for a raw expression name; unknown names get the neutral ad
    pub fn for_expression(name: &str) -> Ad {
        Ad::for_label(Label::from_expression(name))
    }
}
