//! Command line and environment configuration.
//!
use std::path::PathBuf;

use clap::{ArgAction, Parser};

#[derive(Parser, Clone, Debug)]
#[clap(author, version, about = "Classify webcam frames as recyclable or not")]
pub struct Config {
    /// Base URL serving `metadata.json` and an ONNX export of the model, required unless `--demo`
    #[clap(long, env = "ECOCHECK_MODEL_URL", required_unless_present = "demo")]
    pub model_url: Option<String>,

    /// Name of the ONNX model file below the base URL
    #[clap(long, env = "ECOCHECK_MODEL_FILE", default_value = "model.onnx")]
    pub model_file: String,

    /// Directory for downloaded models, defaults to the user cache directory
    #[clap(long, env = "ECOCHECK_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Download the model again even if it is cached
    #[clap(long, env = "ECOCHECK_REFRESH_MODEL")]
    pub refresh_model: bool,

    /// Video device of the front-facing camera
    #[clap(long, env = "ECOCHECK_FRONT_DEVICE", default_value = "/dev/video0")]
    pub front_device: String,

    /// Video device of the rear-facing camera
    #[clap(long, env = "ECOCHECK_BACK_DEVICE", default_value = "/dev/video2")]
    pub back_device: String,

    /// Frame and canvas width in pixels
    #[clap(long, env = "ECOCHECK_WIDTH", default_value_t = 480)]
    pub width: u32,

    /// Frame and canvas height in pixels
    #[clap(long, env = "ECOCHECK_HEIGHT", default_value_t = 360)]
    pub height: u32,

    /// Upper bound of classified frames per second
    #[clap(long, env = "ECOCHECK_FPS", default_value_t = 30, value_parser = clap::value_parser!(u32).range(1..))]
    pub fps: u32,

    /// Mirror frames horizontally
    #[clap(long, env = "ECOCHECK_MIRROR", default_value_t = true, action = ArgAction::Set)]
    pub mirror: bool,

    /// Run with a simulated camera and model instead of real ones
    #[clap(long, env = "ECOCHECK_DEMO")]
    pub demo: bool,

    /// Address of the HTTP server
    #[clap(long, env = "ECOCHECK_SERVER_ADDRESS", default_value = "127.0.0.1:3000")]
    pub server_address: String,
}

impl Config {
    /// Frame size requested from the camera and used for the canvas.
    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Directory below which downloaded models are cached.
    pub fn model_cache_root(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .or_else(dirs::cache_dir)
            .unwrap_or_else(std::env::temp_dir)
            .join("ecocheck")
    }
}
