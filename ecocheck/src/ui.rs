//! Binding between the application and the page it is shown on.
//!
//! `UiBinder` holds the text regions, control enablement and bars, plus the canvas. The canvas
//! is published as JPEG stream items on a broadcast channel; the latest item is kept so new
//! viewers see the current picture right away.
use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, Result};
use bytes::Bytes;
use common::{
    prediction::Badge,
    ui::{Controls, UiSnapshot},
};
use image::RgbImage;
use tokio::sync::broadcast;

use crate::{
    bars::BarRenderer,
    canvas::{as_jpeg_stream_item, blank_canvas, encode_jpeg, paint_frame},
};

pub const STATUS_READY: &str = "Ready to start";

pub type CanvasSender = broadcast::Sender<Bytes>;
pub type CanvasReceiver = broadcast::Receiver<Bytes>;

#[derive(Debug, Default)]
struct Screen {
    status: String,
    controls: Controls,
    bars: BarRenderer,
    best_label: String,
    badge: Option<Badge>,
}

pub struct UiBinder {
    screen: Mutex<Screen>,
    canvas_size: (u32, u32),
    canvas_tx: CanvasSender,
    latest_canvas: Mutex<Bytes>,
}

impl UiBinder {
    /// Create the surface with a blank canvas of `canvas_size`.
    pub fn new(canvas_size: (u32, u32)) -> Result<Self> {
        let (canvas_tx, _rx) = broadcast::channel(4);
        let blank = encode_jpeg(&blank_canvas(canvas_size.0, canvas_size.1))?;

        Ok(Self {
            screen: Mutex::new(Screen {
                status: STATUS_READY.into(),
                ..Default::default()
            }),
            canvas_size,
            canvas_tx,
            latest_canvas: Mutex::new(as_jpeg_stream_item(&blank)),
        })
    }

    fn screen(&self) -> Result<MutexGuard<'_, Screen>> {
        self.screen
            .lock()
            .map_err(|_| anyhow!("ui state lock poisoned"))
    }

    pub fn set_status(&self, msg: &str) {
        log::info!("Status: {}", msg);
        if let Ok(mut screen) = self.screen() {
            screen.status = msg.to_owned();
        }
    }

    pub fn enable_controls(&self, controls: Controls) {
        if let Ok(mut screen) = self.screen() {
            screen.controls = controls;
        }
    }

    pub fn ensure_bars(&self, count: usize) -> Result<()> {
        self.screen()?.bars.ensure_bars(count);
        Ok(())
    }

    pub fn update_bar(&self, idx: usize, label: &str, probability: f32) -> Result<()> {
        self.screen()?.bars.update_bar(idx, label, probability)
    }

    pub fn set_best(&self, text: String) -> Result<()> {
        self.screen()?.best_label = text;
        Ok(())
    }

    pub fn set_badge(&self, badge: Badge) -> Result<()> {
        self.screen()?.badge = Some(badge);
        Ok(())
    }

    /// Draw a frame on the canvas and publish it to all viewers.
    pub fn paint(&self, frame: &RgbImage) -> Result<()> {
        let (width, height) = self.canvas_size;
        let jpeg = encode_jpeg(&paint_frame(frame, width, height))?;
        let item = as_jpeg_stream_item(&jpeg);

        *self
            .latest_canvas
            .lock()
            .map_err(|_| anyhow!("canvas lock poisoned"))? = item.clone();
        // No receivers is not an error, nobody is watching.
        self.canvas_tx.send(item).ok();

        Ok(())
    }

    /// Latest canvas and a receiver for every following one.
    pub fn subscribe_canvas(&self) -> (Bytes, CanvasReceiver) {
        let rx = self.canvas_tx.subscribe();
        let latest = self
            .latest_canvas
            .lock()
            .map(|latest| latest.clone())
            .unwrap_or_default();

        (latest, rx)
    }

    pub fn snapshot(&self) -> UiSnapshot {
        match self.screen() {
            Ok(screen) => UiSnapshot {
                status: screen.status.clone(),
                controls: screen.controls,
                bars: screen.bars.bars().to_vec(),
                best_label: screen.best_label.clone(),
                badge: screen.badge,
            },
            Err(err) => {
                log::error!("{:#}", err);
                UiSnapshot::default()
            }
        }
    }
}
