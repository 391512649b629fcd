//! Counter instruments
//!
//! [`Counter`] is an adjustable signed total reported as-is every cycle.
//! [`DeltaCounter`] accumulates increments between reports; the report cycle
//! drains it with [`DeltaCounter::subtract`] using the same value it read,
//! so increments racing with a drain land in the next report window instead
//! of being lost or double-counted.

use std::sync::atomic::{AtomicI64, Ordering};

/// An adjustable integer total.
///
/// All operations use relaxed ordering; counters carry no ordering
/// obligations toward other memory.
#[derive(Debug, Default)]
pub struct Counter {
    count: AtomicI64,
}

impl Counter {
    /// Create a counter at zero.
    pub const fn new() -> Self {
        Self {
            count: AtomicI64::new(0),
        }
    }

    /// Increment by 1.
    #[inline]
    pub fn inc(&self) {
        self.add(1);
    }

    /// Increment by `n`.
    #[inline]
    pub fn add(&self, n: i64) {
        self.count.fetch_add(n, Ordering::Relaxed);
    }

    /// Decrement by 1.
    #[inline]
    pub fn dec(&self) {
        self.add(-1);
    }

    /// Decrement by `n`.
    #[inline]
    pub fn sub(&self, n: i64) {
        self.count.fetch_sub(n, Ordering::Relaxed);
    }

    /// Current total.
    #[inline]
    pub fn count(&self) -> i64 {
        self.count.load(Ordering::Relaxed)
    }
}

/// A counter whose reported value is the increment since the last report.
///
/// The registry normalizes its name with the reserved delta prefix so the
/// sink can tell delta points from absolute totals.
#[derive(Debug, Default)]
pub struct DeltaCounter {
    inner: Counter,
}

impl DeltaCounter {
    /// Create a delta counter at zero.
    pub const fn new() -> Self {
        Self {
            inner: Counter::new(),
        }
    }

    /// Increment by 1.
    #[inline]
    pub fn inc(&self) {
        self.inner.inc();
    }

    /// Increment by `n`.
    #[inline]
    pub fn add(&self, n: i64) {
        self.inner.add(n);
    }

    /// Value accumulated since the last drain.
    #[inline]
    pub fn count(&self) -> i64 {
        self.inner.count()
    }

    /// Subtract exactly `n` from the accumulated value.
    ///
    /// The drain protocol is: read `d = count()`, report `d`, then
    /// `subtract(d)` on success. `fetch_sub` of the snapshot value keeps any
    /// increment that raced in between for the next cycle.
    #[inline]
    pub fn subtract(&self, n: i64) {
        self.inner.sub(n);
    }
}
