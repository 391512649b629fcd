//! The sink-facing sender capability.
//!
//! The engine does not know how points travel to the telemetry backend; it
//! talks to an [`Sender`] trait object handed to it at construction. The
//! sender accepts already-encoded points, deltas, and distributions, may
//! fail with a [`SinkError`], and is closed exactly once by the engine's
//! shutdown path.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use flare_registry::Centroid;

/// Time-bucket width at which a distribution's samples are aggregated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Minute,
    Hour,
    Day,
}

/// Errors surfaced by a sender.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Transport-level I/O failure
    #[error("sink io error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error described by the transport
    #[error("sink network error: {0}")]
    Network(String),

    /// The backend rejected the payload
    #[error("sink rejected payload: HTTP {0}")]
    Rejected(u16),

    /// The sender was already closed
    #[error("sink already closed")]
    Closed,
}

/// Capability for forwarding encoded telemetry to a remote sink.
///
/// Implementations live outside this crate; tests use an in-memory mock.
#[async_trait]
pub trait Sender: Send + Sync {
    /// Send one absolute point.
    async fn send_metric(
        &self,
        name: &str,
        value: f64,
        timestamp_secs: u64,
        source: &str,
        tags: &BTreeMap<String, String>,
    ) -> Result<(), SinkError>;

    /// Send one delta point (increment since the previous report).
    async fn send_delta_counter(
        &self,
        name: &str,
        value: f64,
        source: &str,
        tags: &BTreeMap<String, String>,
    ) -> Result<(), SinkError>;

    /// Send one closed distribution bin.
    async fn send_distribution(
        &self,
        name: &str,
        centroids: &[Centroid],
        granularities: &BTreeSet<Granularity>,
        timestamp_secs: u64,
        source: &str,
        tags: &BTreeMap<String, String>,
    ) -> Result<(), SinkError>;

    /// Release the sender. Called exactly once, by the engine's `stop()`.
    async fn close(&self) -> Result<(), SinkError>;
}
