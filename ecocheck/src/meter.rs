//! Frame and verdict meter for the inference loop.
//!
use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};

use common::prediction::Verdict;
use tokio::{task::JoinHandle, time::interval};

pub static METER: Meter = Meter::new();

#[derive(Default)]
pub struct Meter {
    captured_frames: AtomicU64,
    classified_frames: AtomicU64,
    recyclable: AtomicU64,
    not_recyclable: AtomicU64,
}

/// Counts taken from the meter over one logging window.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MeterWindow {
    pub captured: u64,
    pub classified: u64,
    pub recyclable: u64,
    pub not_recyclable: u64,
}

impl Meter {
    pub const fn new() -> Meter {
        Meter {
            captured_frames: AtomicU64::new(0),
            classified_frames: AtomicU64::new(0),
            recyclable: AtomicU64::new(0),
            not_recyclable: AtomicU64::new(0),
        }
    }

    pub fn tick_captured(&self) {
        self.captured_frames.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a classified frame and the verdict of its best class, if there was one.
    pub fn tick_classified(&self, verdict: Option<&Verdict>) {
        self.classified_frames.fetch_add(1, Ordering::Relaxed);
        match verdict {
            Some(Verdict::Recyclable) => {
                self.recyclable.fetch_add(1, Ordering::Relaxed);
            }
            Some(Verdict::NotRecyclable) => {
                self.not_recyclable.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }
    }

    /// Read all counters and start a new window.
    pub fn take(&self) -> MeterWindow {
        MeterWindow {
            captured: self.captured_frames.swap(0, Ordering::Relaxed),
            classified: self.classified_frames.swap(0, Ordering::Relaxed),
            recyclable: self.recyclable.swap(0, Ordering::Relaxed),
            not_recyclable: self.not_recyclable.swap(0, Ordering::Relaxed),
        }
    }
}

impl MeterWindow {
    pub fn is_idle(&self) -> bool {
        self.captured == 0 && self.classified == 0
    }

    /// Share of captured frames that made it through the classifier, in percent.
    pub fn classified_pct(&self) -> f32 {
        if self.captured == 0 {
            return 0.0;
        }
        self.classified as f32 * 100.0 / self.captured as f32
    }

    pub fn other(&self) -> u64 {
        self.classified.saturating_sub(self.recyclable + self.not_recyclable)
    }

    pub fn report(&self, elapsed: Duration) -> WindowReport<'_> {
        WindowReport {
            window: self,
            secs: elapsed.as_secs_f32().max(f32::EPSILON),
        }
    }
}

/// Log line of a window over its elapsed time.
pub struct WindowReport<'a> {
    window: &'a MeterWindow,
    secs: f32,
}

impl fmt::Display for WindowReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let window = self.window;
        write!(
            f,
            "{:.2} fps captured, {:.2} fps classified ({:.0}%), verdicts: {} recyclable / {} not recyclable / {} other",
            window.captured as f32 / self.secs,
            window.classified as f32 / self.secs,
            window.classified_pct(),
            window.recyclable,
            window.not_recyclable,
            window.other(),
        )
    }
}

pub fn spawn_meter_logger() -> JoinHandle<()> {
    tokio::spawn(async {
        let mut log_interval = interval(Duration::from_secs(2));
        log_interval.tick().await;

        loop {
            let start = Instant::now();
            log_interval.tick().await;

            let window = METER.take();
            if !window.is_idle() {
                log::info!("{}", window.report(start.elapsed()));
            }
        }
    })
}
