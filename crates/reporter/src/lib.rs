//! flare - Report engine
//!
//! Periodic telemetry reporting: a background task snapshots an instrument
//! registry on a fixed period, encodes every instrument into its canonical
//! wire form, and forwards the points to a remote sink through the
//! [`Sender`] capability.
//!
//! # Overview
//!
//! - [`Sender`]: the sink-facing trait this engine consumes; transports are
//!   implemented elsewhere
//! - [`Reporter`] / [`ReporterBuilder`]: the engine itself, owning the
//!   registry, the cycle schedule, and the sender's shutdown
//! - [`MetricAttribute`]: the per-attribute expansion of histograms, meters,
//!   and timers, with a configurable disabled set
//! - [`ReporterConfig`]: deserializable mirror of the builder for
//!   config-driven hosts
//!
//! # Failure model
//!
//! A sink failure aborts the remainder of that cycle, is counted in the
//! self-monitoring `errors` counter, and is logged; the schedule keeps
//! running and the sender stays open. Self-monitoring counters are flushed
//! by an independent task so degradation of the main path stays visible.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use flare_reporter::{Reporter, MetricName};
//!
//! let reporter = Reporter::builder()
//!     .prefixed_with("myapp")
//!     .with_source("host-42")
//!     .with_tag("env", "prod")
//!     .report_minute_distribution()
//!     .build(sender);
//!
//! let requests = reporter
//!     .new_delta_counter(MetricName::new("requests").tag("endpoint", "/api"))
//!     .unwrap();
//! requests.inc();
//!
//! reporter.start(Duration::from_secs(30));
//! // ... later
//! reporter.stop().await;
//! ```

mod attribute;
mod config;
mod engine;
mod runtime;
mod sanitize;
mod self_metrics;
mod sender;

pub use attribute::MetricAttribute;
pub use config::{ReporterConfig, DEFAULT_SOURCE};
pub use engine::{Reporter, ReporterBuilder};
pub use sanitize::{prefix_and_sanitize, sanitize};
pub use sender::{Granularity, Sender, SinkError};

// Re-exported so hosts can name instruments without a direct registry
// dependency.
pub use flare_registry::{MetricName, Registry};

use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds since the Unix epoch.
pub(crate) fn unix_now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
