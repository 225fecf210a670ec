//! Control handlers for start, stop and flip.
//!
//! `Session` owns the classifier handle, the facing mode, the camera session and the running
//! loop. Handlers drive the page through three states: idle (only start enabled), running
//! (stop and flip enabled) and error (like idle, with a message in the status line).
use std::sync::{Arc, Mutex};

use common::ui::Controls;
use thiserror::Error;

use crate::{
    camera::{CameraProvider, FacingMode},
    config::Config,
    inference::{spawn_inference_loop, stop_camera, CameraSession, RunningLoop},
    model::{Classifier, ModelLoader},
    ui::UiBinder,
};

pub const STATUS_LOADING_MODEL: &str = "Loading model…";
pub const STATUS_MODEL_READY: &str = "Model ready";
pub const STATUS_REQUESTING_CAMERA: &str = "Requesting camera access…";
pub const STATUS_CAMERA_ACTIVE: &str = "Camera active";
pub const STATUS_CAMERA_STOPPED: &str = "Camera stopped";
pub const STATUS_START_FAILED: &str = "Error starting the camera. Check camera permissions.";
pub const STATUS_FLIP_FAILED: &str = "Could not switch camera";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to load the model: {0:#}")]
    Load(anyhow::Error),
    #[error("failed to open the {facing} camera: {cause:#}")]
    Camera {
        facing: FacingMode,
        cause: anyhow::Error,
    },
}

/// Camera and loop parameters.
#[derive(Clone, Copy, Debug)]
pub struct LoopSettings {
    pub resolution: (u32, u32),
    pub fps: u32,
}

impl From<&Config> for LoopSettings {
    fn from(config: &Config) -> Self {
        Self {
            resolution: config.resolution(),
            fps: config.fps,
        }
    }
}

struct Active {
    camera: CameraSession,
    inference: RunningLoop,
}

pub struct Session {
    ui: Arc<UiBinder>,
    loader: Box<dyn ModelLoader>,
    cameras: Box<dyn CameraProvider>,
    settings: LoopSettings,
    classifier: Option<Arc<dyn Classifier>>,
    facing: FacingMode,
    active: Option<Active>,
}

impl Session {
    pub fn new(
        ui: Arc<UiBinder>,
        loader: Box<dyn ModelLoader>,
        cameras: Box<dyn CameraProvider>,
        settings: LoopSettings,
    ) -> Self {
        ui.enable_controls(Controls::idle());
        Self {
            ui,
            loader,
            cameras,
            settings,
            classifier: None,
            facing: FacingMode::default(),
            active: None,
        }
    }

    pub fn ui(&self) -> &Arc<UiBinder> {
        &self.ui
    }

    pub fn facing(&self) -> FacingMode {
        self.facing
    }

    pub fn is_model_loaded(&self) -> bool {
        self.classifier.is_some()
    }

    /// Whether the inference loop is scheduling frames.
    pub fn is_running(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| !active.inference.is_finished())
    }

    /// Load the model if needed, open the camera and start the loop.
    pub async fn start(&mut self) -> Result<(), SessionError> {
        if self.is_running() {
            log::debug!("Start requested while running");
            return Ok(());
        }
        // A loop that ended on its own still holds its camera session.
        self.halt().await;

        match self.try_start().await {
            Ok(()) => {
                self.ui.enable_controls(Controls::running());
                Ok(())
            }
            Err(err) => {
                log::error!("{}", err);
                self.ui.set_status(STATUS_START_FAILED);
                self.ui.enable_controls(Controls::idle());
                Err(err)
            }
        }
    }

    /// Stop the loop and release the camera. The classifier stays loaded.
    pub async fn stop(&mut self) {
        self.halt().await;
        self.ui.set_status(STATUS_CAMERA_STOPPED);
        self.ui.enable_controls(Controls::idle());
    }

    /// Switch between front and back camera.
    ///
    /// While idle only the preference is toggled and used by the next start.
    pub async fn flip(&mut self) -> Result<(), SessionError> {
        if !self.is_running() {
            self.facing = self.facing.toggle();
            log::info!("Next start uses the {} camera", self.facing);
            return Ok(());
        }

        self.halt().await;
        self.facing = self.facing.toggle();

        match self.open_and_run().await {
            Ok(()) => {
                self.ui.enable_controls(Controls::running());
                Ok(())
            }
            Err(err) => {
                log::error!("{}", err);
                self.ui.set_status(STATUS_FLIP_FAILED);
                self.ui.enable_controls(Controls::idle());
                Err(err)
            }
        }
    }

    async fn try_start(&mut self) -> Result<(), SessionError> {
        if self.classifier.is_none() {
            self.ui.set_status(STATUS_LOADING_MODEL);
            let classifier = self.loader.load().await.map_err(SessionError::Load)?;
            self.ui
                .ensure_bars(classifier.total_classes())
                .map_err(SessionError::Load)?;
            self.classifier = Some(classifier);
            self.ui.set_status(STATUS_MODEL_READY);
        }

        self.open_and_run().await
    }

    async fn open_and_run(&mut self) -> Result<(), SessionError> {
        let Some(classifier) = self.classifier.clone() else {
            return Err(SessionError::Load(anyhow::anyhow!("no model loaded")));
        };

        self.ui.set_status(STATUS_REQUESTING_CAMERA);
        let facing = self.facing;
        let source = self
            .cameras
            .open(facing, self.settings.resolution)
            .await
            .map_err(|cause| SessionError::Camera { facing, cause })?;
        self.ui.set_status(STATUS_CAMERA_ACTIVE);

        let camera: CameraSession = Arc::new(Mutex::new(source));
        let inference = spawn_inference_loop(
            Arc::clone(&self.ui),
            classifier,
            Arc::clone(&camera),
            self.settings.fps,
        );
        self.active = Some(Active { camera, inference });

        Ok(())
    }

    /// Cancel the loop, wait for its current frame and release the camera.
    async fn halt(&mut self) {
        if let Some(Active { camera, inference }) = self.active.take() {
            inference.cancel().await;
            if let Err(err) = stop_camera(&camera) {
                log::warn!("Error stopping camera: {:#}", err);
            }
        }
    }
}
