//! In-memory stand-ins for the model and the camera.
//!
//! Used by the tests and for trying the page without a camera or network access.
use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use anyhow::{bail, Result};
use common::prediction::ClassPrediction;
use futures::{future::BoxFuture, FutureExt};
use image::{Rgb, RgbImage};

use crate::{
    camera::{CameraProvider, FacingMode, FrameSource},
    model::{Classifier, ModelLoader},
};

/// Classifier returning the same prediction for every frame.
pub struct FakeClassifier {
    predictions: Vec<ClassPrediction>,
    calls: AtomicUsize,
}

impl FakeClassifier {
    pub fn new(predictions: &[(&str, f32)]) -> Self {
        Self {
            predictions: predictions
                .iter()
                .map(|(label, p)| ClassPrediction::new(*label, *p))
                .collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Wait until at least `count` frames were classified, for at most five seconds.
    pub async fn wait_for_predictions(&self, count: usize) {
        let waited = tokio::time::timeout(Duration::from_secs(5), async {
            while self.calls() < count {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await;

        if waited.is_err() {
            log::warn!("Timed out waiting for {} predictions", count);
        }
    }
}

impl Classifier for FakeClassifier {
    fn total_classes(&self) -> usize {
        self.predictions.len()
    }

    fn predict(&self, _frame: &RgbImage) -> Result<Vec<ClassPrediction>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.predictions.clone())
    }
}

/// Loader handing out a fixed classifier, or failing like an unreachable model host.
pub struct FakeModelLoader {
    classifier: Option<Arc<FakeClassifier>>,
    loads: Arc<AtomicUsize>,
}

impl FakeModelLoader {
    pub fn new(classifier: Arc<FakeClassifier>) -> Self {
        Self {
            classifier: Some(classifier),
            loads: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing() -> Self {
        Self {
            classifier: None,
            loads: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of load attempts so far.
    pub fn loads(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.loads)
    }
}

impl ModelLoader for FakeModelLoader {
    fn load(&self) -> BoxFuture<'_, Result<Arc<dyn Classifier>>> {
        async move {
            self.loads.fetch_add(1, Ordering::SeqCst);
            match &self.classifier {
                Some(classifier) => Ok(Arc::clone(classifier) as Arc<dyn Classifier>),
                None => bail!("model host unreachable"),
            }
        }
        .boxed()
    }
}

/// Camera producing solid frames.
pub struct FakeFrameSource {
    resolution: (u32, u32),
    captured: Arc<AtomicUsize>,
    stopped: Arc<AtomicBool>,
    fail_after: Option<usize>,
}

impl FakeFrameSource {
    pub fn new(resolution: (u32, u32)) -> Self {
        Self {
            resolution,
            captured: Arc::new(AtomicUsize::new(0)),
            stopped: Arc::new(AtomicBool::new(false)),
            fail_after: None,
        }
    }

    /// Camera that disconnects after delivering `frames` frames.
    pub fn failing_after(resolution: (u32, u32), frames: usize) -> Self {
        Self {
            fail_after: Some(frames),
            ..Self::new(resolution)
        }
    }

    pub fn captured(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.captured)
    }

    pub fn stopped(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stopped)
    }
}

impl FrameSource for FakeFrameSource {
    fn capture(&mut self) -> Result<RgbImage> {
        if self.stopped.load(Ordering::SeqCst) {
            bail!("camera is stopped");
        }
        let captured = self.captured.fetch_add(1, Ordering::SeqCst);
        if matches!(self.fail_after, Some(frames) if captured >= frames) {
            bail!("camera disconnected");
        }

        let shade = (captured % 256) as u8;
        Ok(RgbImage::from_pixel(
            self.resolution.0,
            self.resolution.1,
            Rgb([shade, 128, 64]),
        ))
    }

    fn stop(&mut self) -> Result<()> {
        self.stopped.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Record of one camera opened by `FakeCameraProvider`.
#[derive(Clone, Debug)]
pub struct OpenedCamera {
    pub facing: FacingMode,
    pub resolution: (u32, u32),
    pub stopped: Arc<AtomicBool>,
}

impl OpenedCamera {
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// Camera provider that can deny access, like a refused permission prompt.
#[derive(Clone, Default)]
pub struct FakeCameraProvider {
    denied: Arc<AtomicBool>,
    opened: Arc<Mutex<Vec<OpenedCamera>>>,
}

impl FakeCameraProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn denied() -> Self {
        let provider = Self::default();
        provider.set_denied(true);
        provider
    }

    pub fn set_denied(&self, denied: bool) {
        self.denied.store(denied, Ordering::SeqCst);
    }

    /// Cameras opened so far, oldest first.
    pub fn opened(&self) -> Vec<OpenedCamera> {
        self.opened
            .lock()
            .map(|opened| opened.clone())
            .unwrap_or_default()
    }
}

impl CameraProvider for FakeCameraProvider {
    fn open(
        &self,
        facing: FacingMode,
        resolution: (u32, u32),
    ) -> BoxFuture<'_, Result<Box<dyn FrameSource>>> {
        async move {
            if self.denied.load(Ordering::SeqCst) {
                bail!("permission to use the {} camera denied", facing);
            }

            let source = FakeFrameSource::new(resolution);
            if let Ok(mut opened) = self.opened.lock() {
                opened.push(OpenedCamera {
                    facing,
                    resolution,
                    stopped: source.stopped(),
                });
            }

            Ok(Box::new(source) as Box<dyn FrameSource>)
        }
        .boxed()
    }
}
