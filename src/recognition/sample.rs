//! Prediction samples and label comparison
//!
//! Features:
//! - `Label` with an explicit no-hand sentinel
//! - Case-insensitive sign matching (numeric targets compare by value)
//! - Confidence tiers shared by vote-share gating and raw display

use std::fmt;
use tokio::time::Instant;

/// Wire text the backend uses when no hand is in frame
pub const NO_HAND_TEXT: &str = "No hand detected";

/// One classifier output label
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Label {
    /// No hand detected in the frame
    NoHand,
    /// A recognized sign (letter, digit or special character)
    Sign(String),
}

impl Label {
    /// Parse backend text. Empty text and the no-hand sentinel both map to
    /// `Label::NoHand`.
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.is_empty() || trimmed == NO_HAND_TEXT {
            Label::NoHand
        } else {
            Label::Sign(trimmed.to_string())
        }
    }

    pub fn as_sign(&self) -> Option<&str> {
        match self {
            Label::Sign(s) => Some(s),
            Label::NoHand => None,
        }
    }

    pub fn is_no_hand(&self) -> bool {
        matches!(self, Label::NoHand)
    }

    /// Does this label satisfy `target`?
    pub fn matches(&self, target: &str) -> bool {
        self.as_sign()
            .map(|sign| labels_match(sign, target))
            .unwrap_or(false)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::NoHand => f.write_str(NO_HAND_TEXT),
            Label::Sign(s) => f.write_str(s),
        }
    }
}

/// Compare a detected sign with a target.
///
/// Numbers compare by value ("07" == "7"); everything else ignores case.
pub fn labels_match(detected: &str, target: &str) -> bool {
    let detected = detected.trim();
    let target = target.trim();

    match (detected.parse::<u32>(), target.parse::<u32>()) {
        (Ok(a), Ok(b)) => a == b,
        _ => detected.to_lowercase() == target.to_lowercase(),
    }
}

/// Raw classifier output for one capture cycle
#[derive(Clone, Debug, PartialEq)]
pub struct PredictionSample {
    pub label: Label,
    /// Classifier-reported confidence (0.0-1.0)
    pub confidence: f32,
    pub timestamp: Instant,
}

impl PredictionSample {
    pub fn new(label: Label, confidence: f32) -> Self {
        PredictionSample {
            label,
            confidence: confidence.clamp(0.0, 1.0),
            timestamp: Instant::now(),
        }
    }

    pub fn sign(text: &str, confidence: f32) -> Self {
        Self::new(Label::parse(text), confidence)
    }

    pub fn no_hand() -> Self {
        Self::new(Label::NoHand, 0.0)
    }
}

/// Accept / low-confidence cut-offs
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Thresholds {
    /// At or above: accepted silently (default 0.7)
    pub accept: f32,
    /// At or above (but below `accept`): low-confidence tier (default 0.4)
    pub low: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            accept: 0.7,
            low: 0.4,
        }
    }
}

/// Where a confidence value falls relative to `Thresholds`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfidenceTier {
    High,
    Low,
    Rejected,
}

impl ConfidenceTier {
    pub fn classify(value: f32, thresholds: &Thresholds) -> Self {
        if value >= thresholds.accept {
            ConfidenceTier::High
        } else if value >= thresholds.low {
            ConfidenceTier::Low
        } else {
            ConfidenceTier::Rejected
        }
    }
}
