//! Types and decision rules shared between the `ecocheck` server and its web view.
pub mod prediction;
pub mod ui;

/// Error type.
pub type Error = Box<dyn std::error::Error>;
