//! Statistical summary histogram
//!
//! Keeps a bounded circular window of recent samples plus a lifetime count.
//! Statistics are computed on demand by sorting a snapshot of the window;
//! quantiles use the nearest-rank method. Old samples are overwritten once
//! the window is full.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

/// Default number of samples retained in the window.
pub const DEFAULT_WINDOW: usize = 1024;

/// A histogram over a bounded window of recent samples.
#[derive(Debug)]
pub struct Histogram {
    count: AtomicU64,
    inner: Mutex<Window>,
}

#[derive(Debug)]
struct Window {
    buf: Vec<f64>,
    pos: usize,
    capacity: usize,
}

/// Point-in-time statistics derived from a histogram.
///
/// `count` is the lifetime update count; every other field describes the
/// retained sample window. All fields are zero when no samples were recorded.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HistogramSnapshot {
    pub count: u64,
    pub max: f64,
    pub mean: f64,
    pub min: f64,
    pub stddev: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
    pub p98: f64,
    pub p99: f64,
    pub p999: f64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    /// Create a histogram with the default window size.
    pub fn new() -> Self {
        Self::with_window(DEFAULT_WINDOW)
    }

    /// Create a histogram retaining up to `capacity` samples.
    pub fn with_window(capacity: usize) -> Self {
        Self {
            count: AtomicU64::new(0),
            inner: Mutex::new(Window {
                buf: Vec::with_capacity(capacity),
                pos: 0,
                capacity: capacity.max(1),
            }),
        }
    }

    /// Record one sample.
    pub fn update(&self, value: f64) {
        self.count.fetch_add(1, Ordering::Relaxed);
        let mut inner = self.inner.lock();
        let pos = inner.pos;
        if inner.buf.len() < inner.capacity {
            inner.buf.push(value);
        } else {
            inner.buf[pos] = value;
        }
        inner.pos = (pos + 1) % inner.capacity;
    }

    /// Lifetime number of recorded samples.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Compute statistics from the current window.
    pub fn snapshot(&self) -> HistogramSnapshot {
        let sorted = {
            let inner = self.inner.lock();
            let mut copy = inner.buf.clone();
            copy.sort_unstable_by(|a, b| a.total_cmp(b));
            copy
        };

        let count = self.count();
        if sorted.is_empty() {
            return HistogramSnapshot {
                count,
                ..HistogramSnapshot::default()
            };
        }

        let n = sorted.len();
        let mean = sorted.iter().sum::<f64>() / n as f64;
        let stddev = if n > 1 {
            let variance =
                sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n as f64 - 1.0);
            variance.sqrt()
        } else {
            0.0
        };

        HistogramSnapshot {
            count,
            max: sorted[n - 1],
            mean,
            min: sorted[0],
            stddev,
            p50: quantile(&sorted, 0.50),
            p75: quantile(&sorted, 0.75),
            p95: quantile(&sorted, 0.95),
            p98: quantile(&sorted, 0.98),
            p99: quantile(&sorted, 0.99),
            p999: quantile(&sorted, 0.999),
        }
    }
}

/// Nearest-rank quantile over a sorted slice: `index = ceil(q * len) - 1`,
/// clamped to the valid range.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (q * sorted.len() as f64).ceil() as usize;
    sorted[rank.saturating_sub(1).min(sorted.len() - 1)]
}
