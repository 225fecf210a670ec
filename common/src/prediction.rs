//! Per-class predictions and the verdict derived from the best one.
//!
use std::fmt;

use serde::{Deserialize, Serialize};

/// Probability from which the best class is reported with high confidence.
pub const HIGH_CONFIDENCE_THRESHOLD: f32 = 0.5;

/// Probability of a single class for one frame.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ClassPrediction {
    pub label: String,
    pub probability: f32,
}

impl ClassPrediction {
    pub fn new(label: impl Into<String>, probability: f32) -> Self {
        Self {
            label: label.into(),
            probability,
        }
    }
}

/// Human-readable outcome for the best class.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Verdict {
    Recyclable,
    NotRecyclable,
    /// Label that matched neither heuristic, uppercased.
    Other(String),
}

impl Verdict {
    /// Map a class label to a verdict.
    ///
    /// Matching is case-insensitive on substrings: a label mentioning "recycl" together with
    /// "no" is not recyclable, "recycl" alone is recyclable, and anything else is shown as is.
    pub fn from_label(label: &str) -> Verdict {
        let name = label.to_lowercase();
        match (name.contains("recycl"), name.contains("no")) {
            (true, true) => Verdict::NotRecyclable,
            (true, false) => Verdict::Recyclable,
            (false, _) => Verdict::Other(label.to_uppercase()),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Recyclable => f.write_str("RECYCLABLE"),
            Verdict::NotRecyclable => f.write_str("NOT RECYCLABLE"),
            Verdict::Other(label) => f.write_str(label),
        }
    }
}

/// Confidence badge shown next to the verdict.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Badge {
    #[serde(rename = "high confidence")]
    High,
    #[serde(rename = "low confidence")]
    Low,
}

impl Badge {
    pub fn from_probability(probability: f32) -> Badge {
        if probability >= HIGH_CONFIDENCE_THRESHOLD {
            Badge::High
        } else {
            Badge::Low
        }
    }
}

impl fmt::Display for Badge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Badge::High => f.write_str("high confidence"),
            Badge::Low => f.write_str("low confidence"),
        }
    }
}

/// Find the class with the highest probability.
///
/// Linear scan where only a strictly greater probability replaces the current best, so the
/// first of several equal maxima wins. Returns `None` for an empty prediction.
pub fn best_prediction(predictions: &[ClassPrediction]) -> Option<&ClassPrediction> {
    let mut iter = predictions.iter();
    let mut best = iter.next()?;
    for candidate in iter {
        if candidate.probability > best.probability {
            best = candidate;
        }
    }

    Some(best)
}

/// Text of the best-label region, e.g. `RECYCLABLE (87.5%)`.
pub fn best_label_text(best: &ClassPrediction) -> String {
    format!(
        "{} ({:.1}%)",
        Verdict::from_label(&best.label),
        best.probability * 100.0
    )
}
