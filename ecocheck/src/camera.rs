//! Camera manager.
//!
//! A `CameraProvider` opens a `FrameSource` for a facing mode. The V4L2 provider maps the two
//! facing modes onto two video devices and decodes MJPG frames into RGB.
use std::fmt;

use anyhow::{Context, Result};
use futures::{future::BoxFuture, FutureExt};
use image::{imageops, RgbImage};
use rscam::{Camera, Config};
use simple_error::simple_error;

const FORMAT: &[u8] = b"MJPG";

/// Which way the camera looks.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum FacingMode {
    /// Towards the user.
    Front,
    /// Away from the user, preferred on phones and tablets.
    #[default]
    Back,
}

impl FacingMode {
    pub fn toggle(self) -> FacingMode {
        match self {
            FacingMode::Front => FacingMode::Back,
            FacingMode::Back => FacingMode::Front,
        }
    }
}

impl fmt::Display for FacingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FacingMode::Front => f.write_str("front"),
            FacingMode::Back => f.write_str("back"),
        }
    }
}

/// Active camera session delivering frames.
pub trait FrameSource: Send {
    /// Capture the next frame. Blocks until the device delivers one.
    fn capture(&mut self) -> Result<RgbImage>;

    /// Release the device. Calling it again is a no-op.
    fn stop(&mut self) -> Result<()>;
}

/// Opens camera sessions.
pub trait CameraProvider: Send + Sync {
    fn open(
        &self,
        facing: FacingMode,
        resolution: (u32, u32),
    ) -> BoxFuture<'_, Result<Box<dyn FrameSource>>>;
}

/// Camera on a Linux video device.
pub struct V4lCamera {
    cam: Option<Camera>,
    device: String,
    mirror: bool,
}

impl V4lCamera {
    /// Open `device` and start streaming MJPG at `resolution`.
    pub fn open(device: &str, resolution: (u32, u32), mirror: bool) -> Result<Self> {
        let mut cam = Camera::new(device).with_context(|| format!("opening {device}"))?;

        ensure_resolution(&cam, resolution)?;
        let frame_rate = get_max_frame_rate(&cam, resolution)?;
        log::debug!("Starting {} at {:?}, interval {:?}", device, resolution, frame_rate);

        cam.start(&Config {
            interval: frame_rate,
            resolution,
            format: FORMAT,
            ..Default::default()
        })
        .with_context(|| format!("starting {device}"))?;

        log::info!("Using camera {}", device);

        Ok(Self {
            cam: Some(cam),
            device: device.to_owned(),
            mirror,
        })
    }
}

impl FrameSource for V4lCamera {
    fn capture(&mut self) -> Result<RgbImage> {
        let cam = self
            .cam
            .as_ref()
            .ok_or_else(|| simple_error!("camera {} is stopped", self.device))?;
        let frame = cam.capture()?;
        let image: RgbImage = turbojpeg::decompress_image(&frame[..])?;

        Ok(if self.mirror {
            imageops::flip_horizontal(&image)
        } else {
            image
        })
    }

    fn stop(&mut self) -> Result<()> {
        if let Some(mut cam) = self.cam.take() {
            cam.stop()?;
            log::info!("Released camera {}", self.device);
        }
        Ok(())
    }
}

impl Drop for V4lCamera {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            log::warn!("Error releasing camera {}: {}", self.device, err);
        }
    }
}

/// Maps facing modes onto front and back video devices.
#[derive(Clone, Debug)]
pub struct V4lCameraProvider {
    front_device: String,
    back_device: String,
    mirror: bool,
}

impl V4lCameraProvider {
    pub fn new(config: &crate::config::Config) -> Self {
        Self {
            front_device: config.front_device.clone(),
            back_device: config.back_device.clone(),
            mirror: config.mirror,
        }
    }

    fn open_blocking(&self, facing: FacingMode, resolution: (u32, u32)) -> Result<V4lCamera> {
        match facing {
            FacingMode::Front => V4lCamera::open(&self.front_device, resolution, self.mirror),
            // The back camera is only a preference, any camera will do.
            FacingMode::Back => V4lCamera::open(&self.back_device, resolution, self.mirror)
                .or_else(|err| {
                    log::warn!(
                        "Back camera unavailable ({:#}), falling back to {}",
                        err,
                        &self.front_device
                    );
                    V4lCamera::open(&self.front_device, resolution, self.mirror)
                }),
        }
    }
}

impl CameraProvider for V4lCameraProvider {
    fn open(
        &self,
        facing: FacingMode,
        resolution: (u32, u32),
    ) -> BoxFuture<'_, Result<Box<dyn FrameSource>>> {
        let provider = self.clone();
        async move {
            let camera =
                tokio::task::spawn_blocking(move || provider.open_blocking(facing, resolution))
                    .await??;
            Ok(Box::new(camera) as Box<dyn FrameSource>)
        }
        .boxed()
    }
}

/// Fail unless the device supports `resolution` for MJPG.
fn ensure_resolution(cam: &Camera, resolution: (u32, u32)) -> Result<()> {
    let resolution_info = cam.resolutions(FORMAT)?;
    log::debug!("Found resolutions: {:?}", &resolution_info);
    let supported = match resolution_info {
        rscam::ResolutionInfo::Discretes(resolutions) => resolutions.contains(&resolution),
        rscam::ResolutionInfo::Stepwise { min, max, step: _ } => {
            (min.0..=max.0).contains(&resolution.0) && (min.1..=max.1).contains(&resolution.1)
        }
    };

    if supported {
        Ok(())
    } else {
        Err(simple_error!("Resolution {:?} not supported", resolution).into())
    }
}

/// Get the maximum supported frame rate for the given resolution.
fn get_max_frame_rate(cam: &Camera, resolution: (u32, u32)) -> Result<(u32, u32)> {
    let interval_info = cam.intervals(FORMAT, resolution)?;
    log::debug!("Found frame rates: {:?}", &interval_info);
    match interval_info {
        rscam::IntervalInfo::Discretes(frame_rates) => frame_rates
            .iter()
            // Map discrete values to real frame rate
            .map(|(numerator, denominator)| ((numerator, denominator), denominator / numerator))
            // Get the highest frame rate
            .max_by(|a, b| a.1.cmp(&b.1))
            .map(|((&n, &d), _)| (n, d)),
        rscam::IntervalInfo::Stepwise { min, .. } => Some(min),
    }
    .ok_or_else(|| simple_error!("No frame rate found").into())
}
