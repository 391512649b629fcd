//! Metric attributes
//!
//! The per-attribute points a histogram, meter, or timer expands into. Each
//! attribute has a wire code used as the metric-name suffix, and any
//! attribute can be disabled at engine construction: a disabled attribute is
//! skipped outright, never sent as zero.

use serde::Deserialize;

/// One reportable attribute of a statistical instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricAttribute {
    Count,
    Max,
    Mean,
    Min,
    #[serde(rename = "stddev")]
    StdDev,
    P50,
    P75,
    P95,
    P98,
    P99,
    P999,
    M1Rate,
    M5Rate,
    M15Rate,
    MeanRate,
}

impl MetricAttribute {
    /// The wire code, appended to the metric name as its final segment.
    pub fn code(&self) -> &'static str {
        match self {
            MetricAttribute::Count => "count",
            MetricAttribute::Max => "max",
            MetricAttribute::Mean => "mean",
            MetricAttribute::Min => "min",
            MetricAttribute::StdDev => "stddev",
            MetricAttribute::P50 => "p50",
            MetricAttribute::P75 => "p75",
            MetricAttribute::P95 => "p95",
            MetricAttribute::P98 => "p98",
            MetricAttribute::P99 => "p99",
            MetricAttribute::P999 => "p999",
            MetricAttribute::M1Rate => "m1_rate",
            MetricAttribute::M5Rate => "m5_rate",
            MetricAttribute::M15Rate => "m15_rate",
            MetricAttribute::MeanRate => "mean_rate",
        }
    }
}
