//! Report-cycle engine
//!
//! [`Reporter`] owns the instrument registry and a sender, and periodically
//! converts every registered instrument into its wire encoding:
//!
//! - gauges and counters become single points
//! - delta counters become delta points and are drained by exactly the
//!   reported amount
//! - histograms, meters, and timers expand into per-attribute points
//! - time-binned histograms flush their closed minute bins as distributions
//!
//! All sends of one cycle run under a single guarded scope: the first sink
//! failure aborts the rest of that cycle, bumps the `errors` self-counter,
//! and is logged. It never propagates out of the cycle and never stops the
//! schedule. The sender is closed only by [`Reporter::stop`], never from
//! inside a cycle.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use flare_registry::{
    Counter, DeltaCounter, Gauge, Histogram, Instrument, Meter, MetricName, Registry,
    Result as RegistryResult, TimeBinnedHistogram, Timer, DELTA_PREFIX,
};

use crate::attribute::MetricAttribute;
use crate::config::ReporterConfig;
use crate::runtime::register_runtime_gauges;
use crate::sanitize::prefix_and_sanitize;
use crate::self_metrics::{SelfMetrics, SelfReporter};
use crate::sender::{Granularity, Sender, SinkError};
use crate::unix_now_secs;

/// Nanoseconds per millisecond; timer durations are reported in
/// milliseconds.
const DURATION_FACTOR: f64 = 1_000_000.0;

/// Builder for [`Reporter`] instances.
///
/// Defaults to no prefix, the crate's default source, no reporter tags, no
/// distribution granularities, and no runtime gauges.
#[derive(Default)]
pub struct ReporterBuilder {
    config: ReporterConfig,
    registry: Option<Registry>,
}

impl ReporterBuilder {
    /// Create a builder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder from a deserialized [`ReporterConfig`].
    pub fn from_config(config: ReporterConfig) -> Self {
        Self {
            config,
            registry: None,
        }
    }

    /// Prefix all metric names with the given string.
    pub fn prefixed_with(mut self, prefix: impl Into<String>) -> Self {
        self.config.prefix = Some(prefix.into());
        self
    }

    /// Set the source attached to every point.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.config.source = source.into();
        self
    }

    /// Add one reporter-level tag.
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.tags.insert(key.into(), value.into());
        self
    }

    /// Add reporter-level tags.
    pub fn with_tags(mut self, tags: BTreeMap<String, String>) -> Self {
        self.config.tags.extend(tags);
        self
    }

    /// Report distribution histograms aggregated into minute intervals.
    pub fn report_minute_distribution(mut self) -> Self {
        self.config.granularities.insert(Granularity::Minute);
        self
    }

    /// Report distribution histograms aggregated into hour intervals.
    pub fn report_hour_distribution(mut self) -> Self {
        self.config.granularities.insert(Granularity::Hour);
        self
    }

    /// Report distribution histograms aggregated into day intervals.
    pub fn report_day_distribution(mut self) -> Self {
        self.config.granularities.insert(Granularity::Day);
        self
    }

    /// Skip the given attribute when expanding histograms, meters, timers.
    pub fn disable_attribute(mut self, attribute: MetricAttribute) -> Self {
        self.config.disabled_attributes.insert(attribute);
        self
    }

    /// Replace the disabled-attribute set.
    pub fn disabled_attributes(mut self, attributes: BTreeSet<MetricAttribute>) -> Self {
        self.config.disabled_attributes = attributes;
        self
    }

    /// Register process-runtime gauges into the registry at build time.
    pub fn include_runtime_metrics(mut self) -> Self {
        self.config.include_runtime_metrics = true;
        self
    }

    /// Period between self-monitoring counter flushes.
    pub fn self_report_interval(mut self, period: Duration) -> Self {
        self.config.self_report_interval = period;
        self
    }

    /// Use a caller-owned registry instead of a fresh one.
    pub fn with_registry(mut self, registry: Registry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Build the reporter around the given sender.
    pub fn build(self, sender: Arc<dyn Sender>) -> Reporter {
        let registry = self.registry.unwrap_or_default();
        if self.config.include_runtime_metrics {
            register_runtime_gauges(&registry);
        }

        Reporter {
            inner: Arc::new(Inner {
                registry,
                sender,
                prefix: self.config.prefix,
                source: self.config.source,
                tags: self.config.tags,
                granularities: self.config.granularities,
                disabled: self.config.disabled_attributes,
                self_metrics: SelfMetrics::new(),
            }),
            enabled: self.config.enabled,
            self_report_interval: self.config.self_report_interval,
            cancel: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }
}

/// The periodic telemetry reporter.
pub struct Reporter {
    inner: Arc<Inner>,
    enabled: bool,
    self_report_interval: Duration,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
    closed: AtomicBool,
}

impl Reporter {
    /// Create a new builder.
    pub fn builder() -> ReporterBuilder {
        ReporterBuilder::new()
    }

    /// The registry owned by this reporter.
    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    /// Get or create a counter.
    pub fn new_counter(&self, name: impl Into<MetricName>) -> RegistryResult<Arc<Counter>> {
        self.inner.registry.counter(name)
    }

    /// Get or create a delta counter.
    pub fn new_delta_counter(
        &self,
        name: impl Into<MetricName>,
    ) -> RegistryResult<Arc<DeltaCounter>> {
        self.inner.registry.delta_counter(name)
    }

    /// Get or create a gauge.
    pub fn new_gauge(
        &self,
        name: impl Into<MetricName>,
        value_fn: impl Fn() -> Option<f64> + Send + Sync + 'static,
    ) -> RegistryResult<Arc<Gauge>> {
        self.inner.registry.gauge(name, value_fn)
    }

    /// Get or create a summary histogram.
    pub fn new_histogram(&self, name: impl Into<MetricName>) -> RegistryResult<Arc<Histogram>> {
        self.inner.registry.histogram(name)
    }

    /// Get or create a time-binned distribution histogram.
    pub fn new_time_binned_histogram(
        &self,
        name: impl Into<MetricName>,
    ) -> RegistryResult<Arc<TimeBinnedHistogram>> {
        self.inner.registry.time_binned_histogram(name)
    }

    /// Get or create a meter.
    pub fn new_meter(&self, name: impl Into<MetricName>) -> RegistryResult<Arc<Meter>> {
        self.inner.registry.meter(name)
    }

    /// Get or create a timer.
    pub fn new_timer(&self, name: impl Into<MetricName>) -> RegistryResult<Arc<Timer>> {
        self.inner.registry.timer(name)
    }

    /// Total number of failed report cycles observed so far.
    pub fn failure_count(&self) -> u64 {
        self.inner.self_metrics.report_errors.get()
    }

    /// Run one report cycle immediately, outside the schedule.
    pub async fn report_now(&self) {
        self.inner.report_once(unix_now_secs()).await;
    }

    /// Start the periodic cycle and the self-monitoring flush.
    ///
    /// The first cycle fires one full `period` after this call. Calling
    /// `start` a second time is a logged no-op.
    pub fn start(&self, period: Duration) {
        if !self.enabled {
            info!("telemetry reporting disabled");
            return;
        }
        if self.started.swap(true, Ordering::SeqCst) {
            warn!("telemetry reporter already started");
            return;
        }

        info!(period_secs = period.as_secs(), "telemetry reporter started");

        let inner = Arc::clone(&self.inner);
        let cancel = self.cancel.clone();
        let cycle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // Consume the interval's immediate first tick so the first
            // report happens after one full period.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => inner.report_once(unix_now_secs()).await,
                }
            }
        });

        let self_reporter = SelfReporter::new(
            Arc::clone(&self.inner.sender),
            self.inner.source.clone(),
            self.inner.tags.clone(),
            &self.inner.self_metrics,
        );
        let flush = tokio::spawn(self_reporter.run(self.self_report_interval, self.cancel.clone()));

        self.tasks.lock().extend([cycle, flush]);
    }

    /// Halt future cycles, wait for in-flight work, and close the sender.
    ///
    /// The sender is closed exactly once; calling `stop` again is safe.
    pub async fn stop(&self) {
        self.cancel.cancel();

        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            let _ = task.await;
        }

        if !self.closed.swap(true, Ordering::SeqCst) {
            if let Err(e) = self.inner.sender.close().await {
                warn!(error = %e, "failed to close sender");
            }
            info!("telemetry reporter stopped");
        }
    }
}

/// Shared engine state, owned behind an `Arc` by the reporter and its task.
struct Inner {
    registry: Registry,
    sender: Arc<dyn Sender>,
    prefix: Option<String>,
    source: String,
    tags: BTreeMap<String, String>,
    granularities: BTreeSet<Granularity>,
    disabled: BTreeSet<MetricAttribute>,
    self_metrics: SelfMetrics,
}

impl Inner {
    /// One report cycle at the given wall-clock second.
    async fn report_once(&self, now_secs: u64) {
        let snapshot = self.registry.snapshot();
        if let Err(e) = self.report_all(&snapshot, now_secs).await {
            self.self_metrics.report_errors.inc();
            warn!(error = %e, "report cycle failed, remaining sends skipped");
        }
    }

    /// Encode and send every instrument, in kind-grouped passes over the
    /// sorted snapshot: gauges, counters, histograms, meters, timers.
    async fn report_all(
        &self,
        snapshot: &[(MetricName, Instrument)],
        now: u64,
    ) -> Result<(), SinkError> {
        for (name, instrument) in snapshot {
            if let Instrument::Gauge(gauge) = instrument {
                if self.report_gauge(name, gauge, now).await? {
                    self.self_metrics.gauges_reported.inc();
                }
            }
        }

        for (name, instrument) in snapshot {
            match instrument {
                Instrument::Counter(counter) => {
                    self.report_counter(name, counter, now).await?;
                    self.self_metrics.counters_reported.inc();
                }
                Instrument::DeltaCounter(counter) => {
                    self.report_delta_counter(name, counter).await?;
                    self.self_metrics.delta_counters_reported.inc();
                }
                _ => {}
            }
        }

        for (name, instrument) in snapshot {
            match instrument {
                Instrument::Histogram(histogram) => {
                    self.report_histogram(name, histogram, now).await?;
                    self.self_metrics.histograms_reported.inc();
                }
                Instrument::TimeBinnedHistogram(histogram) => {
                    self.report_binned_histogram(name, histogram).await?;
                    self.self_metrics.binned_histograms_reported.inc();
                }
                _ => {}
            }
        }

        for (name, instrument) in snapshot {
            if let Instrument::Meter(meter) = instrument {
                self.report_meter(name, meter, now).await?;
                self.self_metrics.meters_reported.inc();
            }
        }

        for (name, instrument) in snapshot {
            if let Instrument::Timer(timer) = instrument {
                self.report_timer(name, timer, now).await?;
                self.self_metrics.timers_reported.inc();
            }
        }

        Ok(())
    }

    /// Returns false when the gauge had no numeric value and was skipped.
    async fn report_gauge(
        &self,
        name: &MetricName,
        gauge: &Gauge,
        now: u64,
    ) -> Result<bool, SinkError> {
        let Some(value) = gauge.value() else {
            return Ok(false);
        };
        let point = self.prefixed(&[name.key()]);
        self.sender
            .send_metric(&point, value, now, &self.source, &self.merged_tags(name))
            .await?;
        Ok(true)
    }

    async fn report_counter(
        &self,
        name: &MetricName,
        counter: &Counter,
        now: u64,
    ) -> Result<(), SinkError> {
        let point = self.prefixed(&[name.key(), "count"]);
        self.sender
            .send_metric(
                &point,
                counter.count() as f64,
                now,
                &self.source,
                &self.merged_tags(name),
            )
            .await
    }

    /// Send the accumulated delta, then drain exactly that amount.
    ///
    /// A failed send returns before the subtraction, leaving the value to be
    /// retried next cycle. The delta prefix sits outside the sanitized name
    /// so it reaches the sink intact.
    async fn report_delta_counter(
        &self,
        name: &MetricName,
        counter: &DeltaCounter,
    ) -> Result<(), SinkError> {
        let delta = counter.count();
        let point = format!(
            "{DELTA_PREFIX}{}",
            self.prefixed(&[name.key_without_delta_prefix(), "count"])
        );
        self.sender
            .send_delta_counter(&point, delta as f64, &self.source, &self.merged_tags(name))
            .await?;
        counter.subtract(delta);
        Ok(())
    }

    async fn report_histogram(
        &self,
        name: &MetricName,
        histogram: &Histogram,
        now: u64,
    ) -> Result<(), SinkError> {
        let snapshot = histogram.snapshot();
        use MetricAttribute::*;
        self.send_if_enabled(Count, name, snapshot.count as f64, now).await?;
        self.send_if_enabled(Max, name, snapshot.max, now).await?;
        self.send_if_enabled(Mean, name, snapshot.mean, now).await?;
        self.send_if_enabled(Min, name, snapshot.min, now).await?;
        self.send_if_enabled(StdDev, name, snapshot.stddev, now).await?;
        self.send_if_enabled(P50, name, snapshot.p50, now).await?;
        self.send_if_enabled(P75, name, snapshot.p75, now).await?;
        self.send_if_enabled(P95, name, snapshot.p95, now).await?;
        self.send_if_enabled(P98, name, snapshot.p98, now).await?;
        self.send_if_enabled(P99, name, snapshot.p99, now).await?;
        self.send_if_enabled(P999, name, snapshot.p999, now).await
    }

    /// Flush closed minute bins and send one distribution per bin, stamped
    /// with the bin's own timestamp rather than the cycle's.
    async fn report_binned_histogram(
        &self,
        name: &MetricName,
        histogram: &TimeBinnedHistogram,
    ) -> Result<(), SinkError> {
        let point = self.prefixed(&[name.key()]);
        let tags = self.merged_tags(name);
        for distribution in histogram.flush_closed() {
            self.sender
                .send_distribution(
                    &point,
                    &distribution.centroids,
                    &self.granularities,
                    distribution.timestamp_secs,
                    &self.source,
                    &tags,
                )
                .await?;
        }
        Ok(())
    }

    async fn report_meter(
        &self,
        name: &MetricName,
        meter: &Meter,
        now: u64,
    ) -> Result<(), SinkError> {
        use MetricAttribute::*;
        self.send_if_enabled(Count, name, meter.count() as f64, now).await?;
        self.send_if_enabled(M1Rate, name, meter.one_minute_rate(), now).await?;
        self.send_if_enabled(M5Rate, name, meter.five_minute_rate(), now).await?;
        self.send_if_enabled(M15Rate, name, meter.fifteen_minute_rate(), now).await?;
        self.send_if_enabled(MeanRate, name, meter.mean_rate(), now).await
    }

    /// Duration attributes in milliseconds, then the meter attributes.
    async fn report_timer(
        &self,
        name: &MetricName,
        timer: &Timer,
        now: u64,
    ) -> Result<(), SinkError> {
        let snapshot = timer.snapshot();
        let ms = |nanos: f64| nanos / DURATION_FACTOR;
        use MetricAttribute::*;
        self.send_if_enabled(Max, name, ms(snapshot.max), now).await?;
        self.send_if_enabled(Mean, name, ms(snapshot.mean), now).await?;
        self.send_if_enabled(Min, name, ms(snapshot.min), now).await?;
        self.send_if_enabled(StdDev, name, ms(snapshot.stddev), now).await?;
        self.send_if_enabled(P50, name, ms(snapshot.p50), now).await?;
        self.send_if_enabled(P75, name, ms(snapshot.p75), now).await?;
        self.send_if_enabled(P95, name, ms(snapshot.p95), now).await?;
        self.send_if_enabled(P98, name, ms(snapshot.p98), now).await?;
        self.send_if_enabled(P99, name, ms(snapshot.p99), now).await?;
        self.send_if_enabled(P999, name, ms(snapshot.p999), now).await?;

        self.report_meter(name, timer.meter(), now).await
    }

    /// Send one attribute point unless that attribute is disabled.
    async fn send_if_enabled(
        &self,
        attribute: MetricAttribute,
        name: &MetricName,
        value: f64,
        now: u64,
    ) -> Result<(), SinkError> {
        if self.disabled.contains(&attribute) {
            return Ok(());
        }
        let point = self.prefixed(&[name.key(), attribute.code()]);
        self.sender
            .send_metric(&point, value, now, &self.source, &self.merged_tags(name))
            .await
    }

    fn prefixed(&self, segments: &[&str]) -> String {
        prefix_and_sanitize(self.prefix.as_deref(), segments)
    }

    /// Merge reporter-level and instrument-level tags; on key collision the
    /// instrument's value wins.
    fn merged_tags(&self, name: &MetricName) -> BTreeMap<String, String> {
        if self.tags.is_empty() {
            return name.tags().clone();
        }
        let mut merged = self.tags.clone();
        for (key, value) in name.tags() {
            merged.insert(key.clone(), value.clone());
        }
        merged
    }
}

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;
