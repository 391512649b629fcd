//! Duration timers.

use std::time::Duration;

use crate::clock::ClockMillis;
use crate::histogram::{Histogram, HistogramSnapshot};
use crate::meter::Meter;

/// A meter of timed events plus a histogram of their durations.
///
/// Durations are stored in nanoseconds; the report cycle converts them to
/// its duration unit when encoding.
#[derive(Debug)]
pub struct Timer {
    meter: Meter,
    histogram: Histogram,
}

impl Timer {
    /// Create a timer on the system clock.
    pub fn new() -> Self {
        Self {
            meter: Meter::new(),
            histogram: Histogram::new(),
        }
    }

    /// Create a timer whose rate meter runs on a caller-supplied clock.
    pub fn with_clock(clock: ClockMillis) -> Self {
        Self {
            meter: Meter::with_clock(clock),
            histogram: Histogram::new(),
        }
    }

    /// Record one timed event.
    pub fn update(&self, duration: Duration) {
        self.histogram.update(duration.as_nanos() as f64);
        self.meter.mark();
    }

    /// Time a closure and record its duration.
    pub fn time<T>(&self, f: impl FnOnce() -> T) -> T {
        let start = std::time::Instant::now();
        let result = f();
        self.update(start.elapsed());
        result
    }

    /// Lifetime number of timed events.
    pub fn count(&self) -> u64 {
        self.meter.count()
    }

    /// Duration statistics, in nanoseconds.
    pub fn snapshot(&self) -> HistogramSnapshot {
        self.histogram.snapshot()
    }

    /// The underlying rate meter.
    pub fn meter(&self) -> &Meter {
        &self.meter
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
