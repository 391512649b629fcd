//! Reporter configuration
//!
//! Deserializable mirror of the [`ReporterBuilder`](crate::ReporterBuilder)
//! knobs, for hosts that drive the engine from a config file. Loading the
//! file itself is the host's concern; this crate only defines the shape.
//!
//! # Defaults
//!
//! - `enabled`: true
//! - `interval`: 60s
//! - `source`: "flare-internal-reporter"
//! - `granularities`: empty (distribution reporting is opt-in)
//! - `self_report_interval`: 60s

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use serde::Deserialize;

use crate::attribute::MetricAttribute;
use crate::sender::Granularity;

/// Source name used when the host does not supply one.
pub const DEFAULT_SOURCE: &str = "flare-internal-reporter";

/// Report-engine configuration
///
/// # Example
///
/// ```toml
/// [reporter]
/// # All fields optional
/// enabled = true
/// interval = "30s"
/// prefix = "myapp"
/// source = "host-42"
/// granularities = ["minute"]
/// disabled_attributes = ["stddev", "p999"]
/// include_runtime_metrics = true
///
/// [reporter.tags]
/// env = "prod"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReporterConfig {
    /// Enable the periodic report cycle
    /// Default: true
    pub enabled: bool,

    /// Period between report cycles
    /// Default: 60s
    #[serde(with = "humantime_serde")]
    pub interval: Duration,

    /// Prefix prepended to every reported metric name
    /// Default: none
    pub prefix: Option<String>,

    /// Source attached to every point
    pub source: String,

    /// Reporter-level tags, merged under instrument-level tags
    pub tags: BTreeMap<String, String>,

    /// Granularities attached to distribution sends; distributions only
    /// reach the sink meaningfully when at least one is enabled
    pub granularities: BTreeSet<Granularity>,

    /// Attributes skipped when expanding histograms, meters, and timers
    pub disabled_attributes: BTreeSet<MetricAttribute>,

    /// Register process-runtime gauges (uptime, memory, threads, fds)
    /// Default: false
    pub include_runtime_metrics: bool,

    /// Period between self-monitoring counter flushes
    /// Default: 60s
    #[serde(with = "humantime_serde")]
    pub self_report_interval: Duration,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(60),
            prefix: None,
            source: DEFAULT_SOURCE.to_string(),
            tags: BTreeMap::new(),
            granularities: BTreeSet::new(),
            disabled_attributes: BTreeSet::new(),
            include_runtime_metrics: false,
            self_report_interval: Duration::from_secs(60),
        }
    }
}
