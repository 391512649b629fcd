//! Rate meters
//!
//! A [`Meter`] tracks a lifetime count plus exponentially-decaying rate
//! estimates over one, five, and fifteen minutes, and an overall mean rate.
//! Rates are per second. Decay works in 5-second ticks: marks accumulate in
//! an uncounted bucket, and each tick folds the bucket's instantaneous rate
//! into the moving average (`rate += alpha * (instant - rate)`). A reader
//! arriving late catches the meter up by replaying the missed ticks.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::clock::{system_clock, ClockMillis};

/// Tick interval for the decaying rates, in milliseconds.
const TICK_MILLIS: u64 = 5_000;

/// Tick interval in seconds, for instantaneous-rate computation.
const TICK_SECS: f64 = 5.0;

/// One exponentially-weighted moving average.
#[derive(Debug)]
struct Ewma {
    alpha: f64,
    uncounted: AtomicU64,
    rate: Mutex<Option<f64>>,
}

impl Ewma {
    /// Alpha for an average decaying over `minutes`, ticked every 5 seconds.
    fn over_minutes(minutes: f64) -> Self {
        Self {
            alpha: 1.0 - (-TICK_SECS / (minutes * 60.0)).exp(),
            uncounted: AtomicU64::new(0),
            rate: Mutex::new(None),
        }
    }

    fn update(&self, n: u64) {
        self.uncounted.fetch_add(n, Ordering::Relaxed);
    }

    fn tick(&self) {
        let count = self.uncounted.swap(0, Ordering::Relaxed);
        let instant = count as f64 / TICK_SECS;
        let mut rate = self.rate.lock();
        match *rate {
            Some(current) => *rate = Some(current + self.alpha * (instant - current)),
            None => *rate = Some(instant),
        }
    }

    /// Current rate in events per second.
    fn rate(&self) -> f64 {
        (*self.rate.lock()).unwrap_or(0.0)
    }
}

/// A meter of event rates.
pub struct Meter {
    clock: ClockMillis,
    start_millis: u64,
    last_tick: AtomicU64,
    count: AtomicU64,
    m1: Ewma,
    m5: Ewma,
    m15: Ewma,
}

impl Meter {
    /// Create a meter on the system clock.
    pub fn new() -> Self {
        Self::with_clock(system_clock())
    }

    /// Create a meter on a caller-supplied millisecond clock.
    pub fn with_clock(clock: ClockMillis) -> Self {
        let start = clock();
        Self {
            clock,
            start_millis: start,
            last_tick: AtomicU64::new(start),
            count: AtomicU64::new(0),
            m1: Ewma::over_minutes(1.0),
            m5: Ewma::over_minutes(5.0),
            m15: Ewma::over_minutes(15.0),
        }
    }

    /// Mark one event.
    pub fn mark(&self) {
        self.mark_n(1);
    }

    /// Mark `n` events.
    pub fn mark_n(&self, n: u64) {
        self.tick_if_necessary();
        self.count.fetch_add(n, Ordering::Relaxed);
        self.m1.update(n);
        self.m5.update(n);
        self.m15.update(n);
    }

    /// Lifetime number of marked events.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Mean rate since creation, events per second.
    pub fn mean_rate(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            return 0.0;
        }
        let elapsed_millis = (self.clock)().saturating_sub(self.start_millis);
        if elapsed_millis == 0 {
            return 0.0;
        }
        count as f64 / (elapsed_millis as f64 / 1000.0)
    }

    /// One-minute decaying rate, events per second.
    pub fn one_minute_rate(&self) -> f64 {
        self.tick_if_necessary();
        self.m1.rate()
    }

    /// Five-minute decaying rate, events per second.
    pub fn five_minute_rate(&self) -> f64 {
        self.tick_if_necessary();
        self.m5.rate()
    }

    /// Fifteen-minute decaying rate, events per second.
    pub fn fifteen_minute_rate(&self) -> f64 {
        self.tick_if_necessary();
        self.m15.rate()
    }

    /// Replay any 5-second ticks that have elapsed since the last one.
    ///
    /// The compare-exchange makes exactly one caller responsible for a given
    /// batch of missed ticks.
    fn tick_if_necessary(&self) {
        let now = (self.clock)();
        let old = self.last_tick.load(Ordering::Relaxed);
        let age = now.saturating_sub(old);
        if age < TICK_MILLIS {
            return;
        }
        let new_tick = now - age % TICK_MILLIS;
        if self
            .last_tick
            .compare_exchange(old, new_tick, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
        {
            for _ in 0..(age / TICK_MILLIS) {
                self.m1.tick();
                self.m5.tick();
                self.m15.tick();
            }
        }
    }
}

impl Default for Meter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Meter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Meter").field("count", &self.count()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64 as Clock;
    use std::sync::Arc;

    fn manual_clock(now: Arc<Clock>) -> ClockMillis {
        Arc::new(move || now.load(Ordering::Relaxed))
    }

    #[test]
    fn test_count_accumulates() {
        let meter = Meter::new();
        meter.mark();
        meter.mark_n(9);
        assert_eq!(meter.count(), 10);
    }

    #[test]
    fn test_mean_rate_uses_elapsed_time() {
        let now = Arc::new(Clock::new(0));
        let meter = Meter::with_clock(manual_clock(Arc::clone(&now)));

        meter.mark_n(100);
        now.store(10_000, Ordering::Relaxed);
        assert!((meter.mean_rate() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_first_tick_seeds_instant_rate() {
        let now = Arc::new(Clock::new(0));
        let meter = Meter::with_clock(manual_clock(Arc::clone(&now)));

        meter.mark_n(60);
        now.store(5_000, Ordering::Relaxed);
        // 60 events over one 5s tick = 12 events/sec.
        assert!((meter.one_minute_rate() - 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_rates_decay_toward_zero_when_idle() {
        let now = Arc::new(Clock::new(0));
        let meter = Meter::with_clock(manual_clock(Arc::clone(&now)));

        meter.mark_n(60);
        now.store(5_000, Ordering::Relaxed);
        let seeded = meter.one_minute_rate();

        now.store(65_000, Ordering::Relaxed);
        let decayed = meter.one_minute_rate();
        assert!(decayed < seeded);
        assert!(decayed > 0.0);

        // The slower averages decay less over the same idle period.
        assert!(meter.fifteen_minute_rate() > meter.one_minute_rate());
    }

    #[test]
    fn test_zero_marks_zero_rates() {
        let meter = Meter::new();
        assert_eq!(meter.mean_rate(), 0.0);
        assert_eq!(meter.one_minute_rate(), 0.0);
        assert_eq!(meter.five_minute_rate(), 0.0);
        assert_eq!(meter.fifteen_minute_rate(), 0.0);
    }
}
