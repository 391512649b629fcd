//! Time-binned distribution histogram
//!
//! Buffers raw samples into wall-clock minute bins. A bin stays open for its
//! whole minute; [`TimeBinnedHistogram::flush_closed`] drains every bin whose
//! minute has passed into `(timestamp, centroids)` pairs and removes them, so
//! a drained distribution is never reported twice and an open bin is never
//! reported early. At most [`MAX_BINS`] bins are retained; when a burst of
//! distinct minutes exceeds that, the oldest bin is dropped.

use parking_lot::Mutex;
use std::collections::BTreeMap;

use crate::clock::{system_clock, ClockMillis};

/// Width of one bin in milliseconds.
const BIN_MILLIS: u64 = 60_000;

/// Maximum number of minute bins retained between flushes.
pub const MAX_BINS: usize = 10;

/// Maximum number of centroids per flushed distribution.
pub const MAX_CENTROIDS: usize = 100;

/// A compressed `(value, weight)` summary point inside a distribution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Centroid {
    pub value: f64,
    pub count: u64,
}

/// One closed minute of samples, ready to send.
#[derive(Debug, Clone, PartialEq)]
pub struct Distribution {
    /// Start of the minute, seconds since the Unix epoch.
    pub timestamp_secs: u64,
    /// Centroid-compressed samples recorded during that minute.
    pub centroids: Vec<Centroid>,
}

/// Histogram that aggregates samples per wall-clock minute.
pub struct TimeBinnedHistogram {
    clock: ClockMillis,
    bins: Mutex<BTreeMap<u64, Vec<f64>>>,
}

impl TimeBinnedHistogram {
    /// Create a histogram on the system clock.
    pub fn new() -> Self {
        Self::with_clock(system_clock())
    }

    /// Create a histogram on a caller-supplied millisecond clock.
    pub fn with_clock(clock: ClockMillis) -> Self {
        Self {
            clock,
            bins: Mutex::new(BTreeMap::new()),
        }
    }

    /// Record one sample into the current minute's bin.
    pub fn update(&self, value: f64) {
        let bin_start = ((self.clock)() / BIN_MILLIS) * BIN_MILLIS;
        let mut bins = self.bins.lock();
        bins.entry(bin_start).or_default().push(value);
        while bins.len() > MAX_BINS {
            let oldest = *bins.keys().next().unwrap_or(&0);
            bins.remove(&oldest);
        }
    }

    /// Drain every bin whose minute has closed.
    ///
    /// The current minute's bin is left in place. Drained bins are removed,
    /// so a subsequent flush never sees them again.
    pub fn flush_closed(&self) -> Vec<Distribution> {
        let open_bin_start = ((self.clock)() / BIN_MILLIS) * BIN_MILLIS;
        let closed: Vec<(u64, Vec<f64>)> = {
            let mut bins = self.bins.lock();
            let keys: Vec<u64> = bins.range(..open_bin_start).map(|(k, _)| *k).collect();
            keys.into_iter()
                .filter_map(|k| bins.remove(&k).map(|samples| (k, samples)))
                .collect()
        };

        closed
            .into_iter()
            .map(|(bin_start, samples)| Distribution {
                timestamp_secs: bin_start / 1000,
                centroids: compress(samples),
            })
            .collect()
    }
}

impl Default for TimeBinnedHistogram {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TimeBinnedHistogram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeBinnedHistogram")
            .field("open_bins", &self.bins.lock().len())
            .finish()
    }
}

/// Collapse raw samples into at most [`MAX_CENTROIDS`] centroids.
///
/// Duplicate values merge into one weighted centroid; if the distinct values
/// still exceed the cap, adjacent centroids are merged chunk-wise by weighted
/// mean.
fn compress(mut samples: Vec<f64>) -> Vec<Centroid> {
    samples.sort_unstable_by(|a, b| a.total_cmp(b));

    let mut centroids: Vec<Centroid> = Vec::new();
    for value in samples {
        match centroids.last_mut() {
            Some(last) if last.value == value => last.count += 1,
            _ => centroids.push(Centroid { value, count: 1 }),
        }
    }

    if centroids.len() <= MAX_CENTROIDS {
        return centroids;
    }

    let chunk = centroids.len().div_ceil(MAX_CENTROIDS);
    centroids
        .chunks(chunk)
        .map(|group| {
            let count: u64 = group.iter().map(|c| c.count).sum();
            let weighted: f64 = group.iter().map(|c| c.value * c.count as f64).sum();
            Centroid {
                value: weighted / count as f64,
                count,
            }
        })
        .collect()
}
