//! State of the on-screen surface as seen by the web view.
//!
use serde::{Deserialize, Serialize};

use crate::prediction::Badge;

/// Enablement of the three control buttons.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Controls {
    pub start: bool,
    pub stop: bool,
    pub flip: bool,
}

impl Controls {
    pub fn new(start: bool, stop: bool, flip: bool) -> Self {
        Self { start, stop, flip }
    }

    /// Nothing is running, only starting is possible. Also used after a failure.
    pub fn idle() -> Self {
        Self::new(true, false, false)
    }

    /// The camera and the inference loop are active.
    pub fn running() -> Self {
        Self::new(false, true, true)
    }
}

impl Default for Controls {
    fn default() -> Self {
        Self::idle()
    }
}

/// One confidence meter.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct BarView {
    pub label: String,
    /// Probability with two decimals.
    pub pct: String,
    /// Fill of the meter in percent.
    pub fill: u8,
}

impl Default for BarView {
    fn default() -> Self {
        Self {
            label: "Class".into(),
            pct: "0.00".into(),
            fill: 0,
        }
    }
}

/// Everything the page shows apart from the canvas.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct UiSnapshot {
    pub status: String,
    pub controls: Controls,
    pub bars: Vec<BarView>,
    pub best_label: String,
    pub badge: Option<Badge>,
}
