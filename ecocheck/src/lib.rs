pub mod bars;
pub mod camera;
pub mod canvas;
pub mod config;
pub mod endpoints;
pub mod fake;
pub mod inference;
pub mod meter;
pub mod model;
pub mod session;
pub mod ui;
pub mod utils;
