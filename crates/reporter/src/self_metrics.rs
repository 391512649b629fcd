//! Self-monitoring counters
//!
//! The engine counts how many instruments of each kind it reported and how
//! many cycles failed. These counters bypass the main registry entirely:
//! a separate lightweight task flushes them straight to the sender, so
//! reporting failures stay observable even when the main cycle is degraded.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::sender::Sender;
use crate::unix_now_secs;

/// Name prefix for the self-monitoring point names.
pub(crate) const SELF_METRIC_PREFIX: &str = "~flare.internal_reporter";

/// A monotonically increasing internal counter.
#[derive(Debug, Default)]
pub(crate) struct SelfCounter(AtomicU64);

impl SelfCounter {
    #[inline]
    pub(crate) fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// The fixed set of self-monitoring counters.
#[derive(Debug)]
pub(crate) struct SelfMetrics {
    pub gauges_reported: Arc<SelfCounter>,
    pub counters_reported: Arc<SelfCounter>,
    pub delta_counters_reported: Arc<SelfCounter>,
    pub histograms_reported: Arc<SelfCounter>,
    pub binned_histograms_reported: Arc<SelfCounter>,
    pub meters_reported: Arc<SelfCounter>,
    pub timers_reported: Arc<SelfCounter>,
    pub report_errors: Arc<SelfCounter>,
}

impl SelfMetrics {
    pub(crate) fn new() -> Self {
        Self {
            gauges_reported: Arc::new(SelfCounter::default()),
            counters_reported: Arc::new(SelfCounter::default()),
            delta_counters_reported: Arc::new(SelfCounter::default()),
            histograms_reported: Arc::new(SelfCounter::default()),
            binned_histograms_reported: Arc::new(SelfCounter::default()),
            meters_reported: Arc::new(SelfCounter::default()),
            timers_reported: Arc::new(SelfCounter::default()),
            report_errors: Arc::new(SelfCounter::default()),
        }
    }

    /// Wire name and handle for every counter, in flush order.
    pub(crate) fn named(&self) -> Vec<(&'static str, Arc<SelfCounter>)> {
        vec![
            ("gauges.reported", Arc::clone(&self.gauges_reported)),
            ("counters.reported", Arc::clone(&self.counters_reported)),
            (
                "delta_counters.reported",
                Arc::clone(&self.delta_counters_reported),
            ),
            ("histograms.reported", Arc::clone(&self.histograms_reported)),
            (
                "binned_histograms.reported",
                Arc::clone(&self.binned_histograms_reported),
            ),
            ("meters.reported", Arc::clone(&self.meters_reported)),
            ("timers.reported", Arc::clone(&self.timers_reported)),
            ("errors", Arc::clone(&self.report_errors)),
        ]
    }
}

/// Background flusher for the self-monitoring counters.
pub(crate) struct SelfReporter {
    sender: Arc<dyn Sender>,
    source: String,
    tags: BTreeMap<String, String>,
    counters: Vec<(&'static str, Arc<SelfCounter>)>,
}

impl SelfReporter {
    pub(crate) fn new(
        sender: Arc<dyn Sender>,
        source: String,
        tags: BTreeMap<String, String>,
        metrics: &SelfMetrics,
    ) -> Self {
        Self {
            sender,
            source,
            tags,
            counters: metrics.named(),
        }
    }

    /// Run until cancellation, flushing every `period`.
    pub(crate) async fn run(self, period: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick of a tokio interval fires immediately; skip it so
        // the first flush happens one full period after start.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => self.flush(unix_now_secs()).await,
            }
        }
    }

    /// Send every counter's current total as one point.
    ///
    /// A failed send is logged and does not stop the remaining counters:
    /// this path exists to stay alive when the main cycle cannot.
    pub(crate) async fn flush(&self, now_secs: u64) {
        for (name, counter) in &self.counters {
            let point = format!("{SELF_METRIC_PREFIX}.{name}.count");
            if let Err(e) = self
                .sender
                .send_metric(&point, counter.get() as f64, now_secs, &self.source, &self.tags)
                .await
            {
                debug!(metric = %point, error = %e, "failed to flush self-monitoring counter");
            }
        }
    }
}
