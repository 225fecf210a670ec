//! Per-frame classification loop.
//!
//! Every tick the loop captures a frame, paints it, classifies it and updates the bars, the
//! best label and the badge. Cancellation is only observed between frames, so a frame that
//! is being classified is always finished.
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use anyhow::{anyhow, Result};
use common::{
    prediction::{best_label_text, best_prediction, Badge, ClassPrediction, Verdict},
    ui::Controls,
};
use tokio::{
    task::{self, JoinHandle},
    time::{interval, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{camera::FrameSource, meter::METER, model::Classifier, ui::UiBinder};

pub const STATUS_CAMERA_LOST: &str = "Camera stopped unexpectedly";

/// Camera session shared between the loop and the control handlers.
pub type CameraSession = Arc<Mutex<Box<dyn FrameSource>>>;

/// Handle of a spawned loop.
pub struct RunningLoop {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl RunningLoop {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop scheduling frames and wait until the current one is done.
    pub async fn cancel(self) {
        self.token.cancel();
        if let Err(err) = self.handle.await {
            log::error!("Inference loop failed: {}", err);
        }
    }
}

/// Spawn the loop, classifying at most `fps` frames per second.
pub fn spawn_inference_loop(
    ui: Arc<UiBinder>,
    classifier: Arc<dyn Classifier>,
    camera: CameraSession,
    fps: u32,
) -> RunningLoop {
    let token = CancellationToken::new();
    let handle = {
        let token = token.clone();
        tokio::spawn(async move { run(ui, classifier, camera, fps, token).await })
    };

    RunningLoop { token, handle }
}

async fn run(
    ui: Arc<UiBinder>,
    classifier: Arc<dyn Classifier>,
    camera: CameraSession,
    fps: u32,
    token: CancellationToken,
) {
    let mut frame_interval = interval(Duration::from_secs_f64(1.0 / f64::from(fps.max(1))));
    // A slow frame delays the next one instead of causing a burst.
    frame_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = frame_interval.tick() => {}
        }

        if let Err(err) = process_frame(&ui, &classifier, &camera).await {
            log::error!("Inference loop stopped: {:#}", err);
            if let Err(err) = stop_camera(&camera) {
                log::warn!("{:#}", err);
            }
            ui.set_status(STATUS_CAMERA_LOST);
            ui.enable_controls(Controls::idle());
            break;
        }
    }

    log::debug!("Inference loop finished");
}

/// Release the device behind a camera session.
pub fn stop_camera(camera: &CameraSession) -> Result<()> {
    camera
        .lock()
        .map_err(|_| anyhow!("camera session lock poisoned"))?
        .stop()
}

async fn process_frame(
    ui: &Arc<UiBinder>,
    classifier: &Arc<dyn Classifier>,
    camera: &CameraSession,
) -> Result<()> {
    let frame = {
        let ui = Arc::clone(ui);
        let camera = Arc::clone(camera);
        task::spawn_blocking(move || {
            let frame = camera
                .lock()
                .map_err(|_| anyhow!("camera session lock poisoned"))?
                .capture()?;
            METER.tick_captured();
            ui.paint(&frame)?;
            Ok::<_, anyhow::Error>(frame)
        })
        .await??
    };

    let predictions = {
        let classifier = Arc::clone(classifier);
        task::spawn_blocking(move || classifier.predict(&frame)).await??
    };
    let verdict = show_predictions(ui, &predictions)?;
    METER.tick_classified(verdict.as_ref());

    Ok(())
}

/// Update bars, best label and badge for one prediction, returning the best class verdict.
pub fn show_predictions(
    ui: &UiBinder,
    predictions: &[ClassPrediction],
) -> Result<Option<Verdict>> {
    for (idx, prediction) in predictions.iter().enumerate() {
        ui.update_bar(idx, &prediction.label, prediction.probability)?;
    }

    let Some(best) = best_prediction(predictions) else {
        return Ok(None);
    };
    ui.set_best(best_label_text(best))?;
    ui.set_badge(Badge::from_probability(best.probability))?;

    Ok(Some(Verdict::from_label(&best.label)))
}
