use std::time::{Duration, Instant};

use crate::pipeline::frame_scheduler::RefreshClock;

/// Paces ticks to a fixed refresh rate with `Instant` and `thread::sleep`.
///
/// Slots are laid out back to back from the first wait. A caller that overran
/// its slot is released immediately and the grid restarts from there, so a
/// slow loop is never throttled further.
pub struct IntervalRefreshClock {
    origin: Instant,
    interval: Duration,
    next_slot: Option<Instant>,
}

impl IntervalRefreshClock {
    /// Rates that do not yield a representable interval fall back to 60 Hz.
    pub fn new(refresh_hz: f64) -> Self {
        let interval = Some(refresh_hz)
            .filter(|hz| hz.is_finite() && *hz > 0.0)
            .and_then(|hz| Duration::try_from_secs_f64(1.0 / hz).ok())
            .filter(|interval| !interval.is_zero())
            .unwrap_or_else(|| {
                log::warn!("Invalid refresh rate {refresh_hz}, using 60 Hz");
                Duration::from_secs_f64(1.0 / 60.0)
            });
        Self {
            origin: Instant::now(),
            interval,
            next_slot: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl RefreshClock for IntervalRefreshClock {
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }

    fn wait_for_refresh(&mut self) -> f64 {
        let now = Instant::now();
        let slot = self.next_slot.unwrap_or(now + self.interval);
        if slot > now {
            std::thread::sleep(slot - now);
            self.next_slot = Some(slot + self.interval);
        } else {
            self.next_slot = Some(now + self.interval);
        }
        self.now_ms()
    }
}
