use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::shared::constants::FPS_SAMPLE_WINDOW_MS;

/// Source of display-refresh timing.
pub trait RefreshClock: Send {
    /// Current high-resolution time in milliseconds.
    fn now_ms(&self) -> f64;

    /// Blocks until the next refresh slot and returns its timestamp in ms.
    fn wait_for_refresh(&mut self) -> f64;
}

/// One iteration of the frame loop.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tick {
    /// Zero-based position in this run.
    pub index: u64,
    pub time_ms: f64,
    /// Time since the previous tick (since `start` for the first one).
    pub delta_ms: f64,
    /// Most recent fps sample, 0 until the first window closes.
    pub fps: u32,
    /// True on the tick that produced a new fps sample.
    pub fps_updated: bool,
}

/// Frame-rate sampler over a fixed window.
///
/// Counts ticks and, once at least [`FPS_SAMPLE_WINDOW_MS`] has passed since
/// the last sample, turns the count into a whole-number rate. Between samples
/// the reported value holds steady.
#[derive(Clone, Debug)]
pub struct FpsMeter {
    frame_counter: u32,
    last_sample_ms: f64,
    current_fps: u32,
}

impl FpsMeter {
    pub fn new(start_ms: f64) -> Self {
        Self {
            frame_counter: 0,
            last_sample_ms: start_ms,
            current_fps: 0,
        }
    }

    /// Counts one tick at `now_ms`; returns the new rate if a sample was taken.
    pub fn record_tick(&mut self, now_ms: f64) -> Option<u32> {
        self.frame_counter += 1;
        let elapsed = now_ms - self.last_sample_ms;
        if elapsed < FPS_SAMPLE_WINDOW_MS {
            return None;
        }
        self.current_fps = (self.frame_counter as f64 * 1000.0 / elapsed).round() as u32;
        self.frame_counter = 0;
        self.last_sample_ms = now_ms;
        Some(self.current_fps)
    }

    pub fn current_fps(&self) -> u32 {
        self.current_fps
    }
}

/// Cancels a [`FrameScheduler`] from another thread.
#[derive(Clone, Debug)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    /// Idempotent. A tick already running completes; no further tick starts.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Outcome of one scheduler run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SchedulerReport {
    pub ticks: u64,
    pub failed_ticks: u64,
    pub last_fps: u32,
}

/// Drives the per-frame callback at the display refresh cadence.
///
/// Ticks run strictly one after another on the thread that calls
/// [`start`](Self::start); the next refresh is requested as soon as a tick
/// returns. Cancellation is sticky, so a scheduler cancelled before it starts
/// never ticks.
pub struct FrameScheduler {
    clock: Box<dyn RefreshClock>,
    cancelled: Arc<AtomicBool>,
}

impl FrameScheduler {
    pub fn new(clock: Box<dyn RefreshClock>) -> Self {
        Self {
            clock,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle(self.cancelled.clone())
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Runs `on_tick` once per refresh until cancelled.
    ///
    /// A failing tick is logged and counted; the loop carries on with the
    /// next refresh.
    pub fn start<F>(&mut self, mut on_tick: F) -> SchedulerReport
    where
        F: FnMut(&Tick) -> Result<(), Box<dyn std::error::Error>>,
    {
        let mut report = SchedulerReport::default();
        if self.is_cancelled() {
            log::debug!("Frame scheduler cancelled before start");
            return report;
        }

        let start_ms = self.clock.now_ms();
        let mut meter = FpsMeter::new(start_ms);
        let mut previous_tick_ms = start_ms;
        log::debug!("Frame scheduler started");

        loop {
            let now_ms = self.clock.wait_for_refresh();
            if self.is_cancelled() {
                break;
            }

            let sample = meter.record_tick(now_ms);
            let tick = Tick {
                index: report.ticks,
                time_ms: now_ms,
                delta_ms: now_ms - previous_tick_ms,
                fps: meter.current_fps(),
                fps_updated: sample.is_some(),
            };
            previous_tick_ms = now_ms;

            if let Err(e) = on_tick(&tick) {
                log::warn!("Tick {} failed: {e}", tick.index);
                report.failed_ticks += 1;
            }
            report.ticks += 1;
            report.last_fps = meter.current_fps();
        }

        log::debug!(
            "Frame scheduler stopped after {} ticks ({} failed)",
            report.ticks,
            report.failed_ticks
        );
        report
    }
}
