use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use flare_registry::{Centroid, ClockMillis, MetricName, Registry};

use super::*;
use crate::attribute::MetricAttribute;
use crate::config::ReporterConfig;
use crate::sender::{Granularity, Sender, SinkError};

/// One call recorded by the mock sender.
#[derive(Debug, Clone, PartialEq)]
enum Sent {
    Metric {
        name: String,
        value: f64,
        timestamp: u64,
        source: String,
        tags: BTreeMap<String, String>,
    },
    Delta {
        name: String,
        value: f64,
        source: String,
        tags: BTreeMap<String, String>,
    },
    Distribution {
        name: String,
        centroids: Vec<Centroid>,
        granularities: BTreeSet<Granularity>,
        timestamp: u64,
        tags: BTreeMap<String, String>,
    },
}

/// In-memory sender that records successful sends and can be scripted to
/// fail from a given attempt index onward.
#[derive(Default)]
struct MockSender {
    sent: parking_lot::Mutex<Vec<Sent>>,
    attempts: AtomicUsize,
    fail_from: parking_lot::Mutex<Option<usize>>,
    closes: AtomicUsize,
}

impl MockSender {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// All send attempts with index >= `n` fail until cleared.
    fn fail_from(&self, n: usize) {
        *self.fail_from.lock() = Some(n);
    }

    fn clear_failures(&self) {
        *self.fail_from.lock() = None;
    }

    fn record(&self, entry: Sent) -> Result<(), SinkError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(n) = *self.fail_from.lock() {
            if attempt >= n {
                return Err(SinkError::Network("scripted failure".to_string()));
            }
        }
        self.sent.lock().push(entry);
        Ok(())
    }

    fn sent(&self) -> Vec<Sent> {
        self.sent.lock().clone()
    }

    fn metric_names(&self) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .map(|s| match s {
                Sent::Metric { name, .. }
                | Sent::Delta { name, .. }
                | Sent::Distribution { name, .. } => name.clone(),
            })
            .collect()
    }

    fn metric_value(&self, wanted: &str) -> Option<f64> {
        self.sent.lock().iter().find_map(|s| match s {
            Sent::Metric { name, value, .. } if name == wanted => Some(*value),
            _ => None,
        })
    }

    fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Sender for MockSender {
    async fn send_metric(
        &self,
        name: &str,
        value: f64,
        timestamp_secs: u64,
        source: &str,
        tags: &BTreeMap<String, String>,
    ) -> Result<(), SinkError> {
        self.record(Sent::Metric {
            name: name.to_string(),
            value,
            timestamp: timestamp_secs,
            source: source.to_string(),
            tags: tags.clone(),
        })
    }

    async fn send_delta_counter(
        &self,
        name: &str,
        value: f64,
        source: &str,
        tags: &BTreeMap<String, String>,
    ) -> Result<(), SinkError> {
        self.record(Sent::Delta {
            name: name.to_string(),
            value,
            source: source.to_string(),
            tags: tags.clone(),
        })
    }

    async fn send_distribution(
        &self,
        name: &str,
        centroids: &[Centroid],
        granularities: &BTreeSet<Granularity>,
        timestamp_secs: u64,
        _source: &str,
        tags: &BTreeMap<String, String>,
    ) -> Result<(), SinkError> {
        self.record(Sent::Distribution {
            name: name.to_string(),
            centroids: centroids.to_vec(),
            granularities: granularities.clone(),
            timestamp: timestamp_secs,
            tags: tags.clone(),
        })
    }

    async fn close(&self) -> Result<(), SinkError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn manual_clock(now: Arc<AtomicU64>) -> ClockMillis {
    Arc::new(move || now.load(Ordering::Relaxed))
}

#[tokio::test]
async fn test_gauge_point_encoding() {
    let sender = MockSender::new();
    let reporter = Reporter::builder()
        .prefixed_with("app")
        .with_source("host-1")
        .with_tag("env", "staging")
        .with_tag("region", "us")
        .build(sender.clone());

    reporter
        .new_gauge(MetricName::new("queue depth").tag("env", "prod"), || {
            Some(42.0)
        })
        .unwrap();

    reporter.inner.report_once(1_700_000_000).await;

    let sent = sender.sent();
    assert_eq!(sent.len(), 1);
    match &sent[0] {
        Sent::Metric {
            name,
            value,
            timestamp,
            source,
            tags,
        } => {
            assert_eq!(name, "app.queue_depth");
            assert_eq!(*value, 42.0);
            assert_eq!(*timestamp, 1_700_000_000);
            assert_eq!(source, "host-1");
            // Instrument tag wins on collision; reporter tag fills the rest.
            assert_eq!(tags.get("env").map(String::as_str), Some("prod"));
            assert_eq!(tags.get("region").map(String::as_str), Some("us"));
        }
        other => panic!("expected metric, got {other:?}"),
    }
}

#[tokio::test]
async fn test_non_numeric_gauge_skipped_silently() {
    let sender = MockSender::new();
    let reporter = Reporter::builder().build(sender.clone());
    reporter.new_gauge("unavailable", || None).unwrap();

    reporter.report_now().await;

    assert!(sender.sent().is_empty());
    assert_eq!(reporter.inner.self_metrics.gauges_reported.get(), 0);
    assert_eq!(reporter.failure_count(), 0);
}

#[tokio::test]
async fn test_counter_reports_running_total_without_reset() {
    let sender = MockSender::new();
    let reporter = Reporter::builder().build(sender.clone());
    let counter = reporter.new_counter("requests").unwrap();
    counter.add(5);

    reporter.report_now().await;
    reporter.report_now().await;

    assert_eq!(sender.metric_names(), vec!["requests.count", "requests.count"]);
    assert_eq!(counter.count(), 5);
    assert_eq!(sender.metric_value("requests.count"), Some(5.0));
}

#[tokio::test]
async fn test_delta_counter_round_trip() {
    let sender = MockSender::new();
    let reporter = Reporter::builder().build(sender.clone());
    let delta = reporter.new_delta_counter("hits").unwrap();

    delta.add(3);
    delta.add(4);
    reporter.report_now().await;

    // One more cycle with no increments: sends a zero delta, never resends 7.
    reporter.report_now().await;

    let sent = sender.sent();
    assert_eq!(sent.len(), 2);
    match (&sent[0], &sent[1]) {
        (
            Sent::Delta {
                name: first_name,
                value: first,
                ..
            },
            Sent::Delta { value: second, .. },
        ) => {
            assert_eq!(first_name, "\u{2206}hits.count");
            assert_eq!(*first, 7.0);
            assert_eq!(*second, 0.0);
        }
        other => panic!("expected two deltas, got {other:?}"),
    }
    assert_eq!(delta.count(), 0);
}

#[tokio::test]
async fn test_delta_prefix_survives_sanitization_with_prefix() {
    let sender = MockSender::new();
    let reporter = Reporter::builder().prefixed_with("app").build(sender.clone());
    reporter.new_delta_counter("hits").unwrap();

    reporter.report_now().await;

    // The prefix is inside the sanitized name; the delta marker is outside.
    assert_eq!(sender.metric_names(), vec!["\u{2206}app.hits.count"]);
}

#[tokio::test]
async fn test_failed_delta_send_keeps_value_for_retry() {
    let sender = MockSender::new();
    let reporter = Reporter::builder().build(sender.clone());
    let delta = reporter.new_delta_counter("hits").unwrap();
    delta.add(7);

    sender.fail_from(0);
    reporter.report_now().await;
    assert_eq!(reporter.failure_count(), 1);
    assert_eq!(delta.count(), 7);

    sender.clear_failures();
    reporter.report_now().await;
    let sent = sender.sent();
    assert_eq!(sent.len(), 1);
    assert!(matches!(&sent[0], Sent::Delta { value, .. } if *value == 7.0));
    assert_eq!(delta.count(), 0);
}

#[tokio::test]
async fn test_histogram_expands_into_eleven_points() {
    let sender = MockSender::new();
    let reporter = Reporter::builder().build(sender.clone());
    let histogram = reporter.new_histogram("latency").unwrap();
    for v in 1..=100 {
        histogram.update(v as f64);
    }

    reporter.report_now().await;

    let names = sender.metric_names();
    assert_eq!(names.len(), 11);
    for suffix in [
        "count", "max", "mean", "min", "stddev", "p50", "p75", "p95", "p98", "p99", "p999",
    ] {
        assert!(
            names.iter().any(|n| n == &format!("latency.{suffix}")),
            "missing latency.{suffix}"
        );
    }
    assert_eq!(sender.metric_value("latency.count"), Some(100.0));
    assert_eq!(sender.metric_value("latency.p50"), Some(50.0));
    assert_eq!(sender.metric_value("latency.max"), Some(100.0));
}

#[tokio::test]
async fn test_disabled_attributes_are_skipped_not_zeroed() {
    let sender = MockSender::new();
    let reporter = Reporter::builder()
        .disable_attribute(MetricAttribute::StdDev)
        .disable_attribute(MetricAttribute::P999)
        .build(sender.clone());
    let histogram = reporter.new_histogram("latency").unwrap();
    histogram.update(1.0);

    reporter.report_now().await;

    let names = sender.metric_names();
    assert_eq!(names.len(), 9);
    assert!(!names.iter().any(|n| n == "latency.stddev"));
    assert!(!names.iter().any(|n| n == "latency.p999"));
}

#[tokio::test]
async fn test_binned_histogram_flushes_closed_bins_only() {
    let now = Arc::new(AtomicU64::new(60_000));
    let registry = Registry::new();
    let histogram = registry
        .time_binned_histogram_with_clock("payload.size", manual_clock(Arc::clone(&now)))
        .unwrap();

    let sender = MockSender::new();
    let reporter = Reporter::builder()
        .report_minute_distribution()
        .with_registry(registry)
        .build(sender.clone());

    // Minute 1, then minute 3 still open at flush time.
    histogram.update(8.0);
    histogram.update(8.0);
    now.store(180_000, Ordering::Relaxed);
    histogram.update(99.0);

    reporter.report_now().await;

    let sent = sender.sent();
    assert_eq!(sent.len(), 1);
    match &sent[0] {
        Sent::Distribution {
            name,
            centroids,
            granularities,
            timestamp,
            ..
        } => {
            assert_eq!(name, "payload.size");
            assert_eq!(*timestamp, 60);
            assert_eq!(
                centroids,
                &vec![Centroid {
                    value: 8.0,
                    count: 2
                }]
            );
            assert!(granularities.contains(&Granularity::Minute));
        }
        other => panic!("expected distribution, got {other:?}"),
    }

    // The drained bin is gone; the still-open bin stays buffered.
    reporter.report_now().await;
    assert_eq!(sender.sent().len(), 1);
    assert_eq!(reporter.inner.self_metrics.binned_histograms_reported.get(), 2);
}

#[tokio::test]
async fn test_meter_expands_into_five_points() {
    let sender = MockSender::new();
    let reporter = Reporter::builder().build(sender.clone());
    let meter = reporter.new_meter("events").unwrap();
    meter.mark_n(10);

    reporter.report_now().await;

    let names = sender.metric_names();
    assert_eq!(names.len(), 5);
    for suffix in ["count", "m1_rate", "m5_rate", "m15_rate", "mean_rate"] {
        assert!(names.iter().any(|n| n == &format!("events.{suffix}")));
    }
    assert_eq!(sender.metric_value("events.count"), Some(10.0));
}

#[tokio::test]
async fn test_timer_reports_durations_in_millis_then_meter() {
    let sender = MockSender::new();
    let reporter = Reporter::builder().build(sender.clone());
    let timer = reporter.new_timer("request.time").unwrap();
    timer.update(Duration::from_millis(10));
    timer.update(Duration::from_millis(30));

    reporter.report_now().await;

    let names = sender.metric_names();
    // Ten duration attributes followed by five meter attributes.
    assert_eq!(names.len(), 15);
    assert_eq!(names[0], "request.time.max");
    assert_eq!(names[10], "request.time.count");
    assert_eq!(sender.metric_value("request.time.max"), Some(30.0));
    assert_eq!(sender.metric_value("request.time.min"), Some(10.0));
    assert_eq!(sender.metric_value("request.time.count"), Some(2.0));
}

#[tokio::test]
async fn test_cycle_failure_aborts_remaining_sends() {
    let sender = MockSender::new();
    let reporter = Reporter::builder().build(sender.clone());
    for name in ["c1", "c2", "c3", "c4", "c5"] {
        reporter.new_counter(name).unwrap();
    }

    // Third send fails; the 4th and 5th are skipped for this cycle.
    sender.fail_from(2);
    reporter.report_now().await;

    assert_eq!(sender.metric_names(), vec!["c1.count", "c2.count"]);
    assert_eq!(reporter.failure_count(), 1);
    assert_eq!(reporter.inner.self_metrics.counters_reported.get(), 2);

    // The next cycle proceeds normally once the sink recovers.
    sender.clear_failures();
    reporter.report_now().await;
    assert_eq!(sender.sent().len(), 7);
    assert_eq!(reporter.failure_count(), 1);
}

#[tokio::test]
async fn test_self_metrics_count_each_reported_kind() {
    let sender = MockSender::new();
    let reporter = Reporter::builder().build(sender.clone());

    reporter.new_gauge("g", || Some(1.0)).unwrap();
    reporter.new_counter("c").unwrap();
    reporter.new_delta_counter("d").unwrap();
    reporter.new_histogram("h").unwrap();
    reporter.new_time_binned_histogram("w").unwrap();
    reporter.new_meter("m").unwrap();
    reporter.new_timer("t").unwrap();

    reporter.report_now().await;

    let metrics = &reporter.inner.self_metrics;
    assert_eq!(metrics.gauges_reported.get(), 1);
    assert_eq!(metrics.counters_reported.get(), 1);
    assert_eq!(metrics.delta_counters_reported.get(), 1);
    assert_eq!(metrics.histograms_reported.get(), 1);
    assert_eq!(metrics.binned_histograms_reported.get(), 1);
    assert_eq!(metrics.meters_reported.get(), 1);
    assert_eq!(metrics.timers_reported.get(), 1);
    assert_eq!(metrics.report_errors.get(), 0);
}

#[tokio::test]
async fn test_self_reporter_flushes_all_counters() {
    use crate::self_metrics::{SelfMetrics, SelfReporter};

    let sender = MockSender::new();
    let metrics = SelfMetrics::new();
    metrics.counters_reported.inc();
    metrics.counters_reported.inc();
    metrics.report_errors.inc();

    let flusher = SelfReporter::new(
        sender.clone(),
        "host-1".to_string(),
        BTreeMap::new(),
        &metrics,
    );
    flusher.flush(1_000).await;

    let names = sender.metric_names();
    assert_eq!(names.len(), 8);
    assert!(names
        .iter()
        .all(|n| n.starts_with("~flare.internal_reporter.")));
    assert_eq!(
        sender.metric_value("~flare.internal_reporter.counters.reported.count"),
        Some(2.0)
    );
    assert_eq!(
        sender.metric_value("~flare.internal_reporter.errors.count"),
        Some(1.0)
    );
}

#[tokio::test]
async fn test_stop_closes_sender_exactly_once() {
    let sender = MockSender::new();
    let reporter = Reporter::builder().build(sender.clone());
    reporter.start(Duration::from_secs(3600));

    reporter.stop().await;
    reporter.stop().await;

    assert_eq!(sender.close_count(), 1);
}

#[tokio::test]
async fn test_stop_without_start_still_closes_once() {
    let sender = MockSender::new();
    let reporter = Reporter::builder().build(sender.clone());
    reporter.stop().await;
    assert_eq!(sender.close_count(), 1);
}

#[tokio::test]
async fn test_disabled_reporter_never_starts() {
    let config = ReporterConfig {
        enabled: false,
        ..Default::default()
    };
    let sender = MockSender::new();
    let reporter = ReporterBuilder::from_config(config).build(sender.clone());
    let counter = reporter.new_counter("c").unwrap();
    counter.inc();

    reporter.start(Duration::from_millis(10));
    tokio::time::sleep(Duration::from_millis(50)).await;
    reporter.stop().await;

    assert!(sender.sent().is_empty());
    assert_eq!(sender.close_count(), 1);
}

#[tokio::test]
async fn test_scheduled_cycles_run_until_stopped() {
    let sender = MockSender::new();
    let reporter = Reporter::builder().build(sender.clone());
    let counter = reporter.new_counter("ticks").unwrap();
    counter.inc();

    reporter.start(Duration::from_millis(20));
    tokio::time::sleep(Duration::from_millis(90)).await;
    reporter.stop().await;

    let after_stop = sender.sent().len();
    assert!(after_stop >= 2, "expected at least two cycles, got {after_stop}");

    // No further cycles fire after stop.
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(sender.sent().len(), after_stop);
}

#[tokio::test]
async fn test_runtime_metrics_register_under_process_namespace() {
    let sender = MockSender::new();
    let reporter = Reporter::builder()
        .include_runtime_metrics()
        .build(sender.clone());

    assert_eq!(reporter.registry().len(), 6);

    reporter.report_now().await;
    // On Linux every probe yields a value; elsewhere the gauges are
    // skipped, so just assert nothing failed.
    assert_eq!(reporter.failure_count(), 0);
}

#[test]
fn test_merged_tags_instrument_wins() {
    let sender = MockSender::new();
    let reporter = Reporter::builder()
        .with_tag("env", "staging")
        .with_tag("region", "us")
        .build(sender);

    let name = MetricName::new("m").tag("env", "prod");
    let merged = reporter.inner.merged_tags(&name);

    assert_eq!(merged.get("env").map(String::as_str), Some("prod"));
    assert_eq!(merged.get("region").map(String::as_str), Some("us"));
    assert_eq!(merged.len(), 2);
}

#[test]
fn test_merged_tags_empty_when_both_empty() {
    let sender = MockSender::new();
    let reporter = Reporter::builder().build(sender);
    let merged = reporter.inner.merged_tags(&MetricName::new("m"));
    assert!(merged.is_empty());
}
