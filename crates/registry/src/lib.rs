//! flare - Instrument registry
//!
//! The instrument model behind the flare reporting engine: named, tagged
//! measurement instruments and the thread-safe registry that owns them.
//!
//! # Overview
//!
//! This crate provides:
//! - [`MetricName`]: immutable (key, tags) identifiers with value equality
//! - Seven instrument kinds: [`Counter`], [`DeltaCounter`], [`Gauge`],
//!   [`Histogram`], [`TimeBinnedHistogram`], [`Meter`], [`Timer`]
//! - [`Registry`]: get-or-create per kind, kind-conflict detection, and
//!   sorted point-in-time snapshots for the report cycle
//!
//! # Design Principles
//!
//! - **Lock-free updates**: instruments use atomics on their hot paths;
//!   locks guard only sample buffers and the registry map
//! - **Closed kind set**: instruments are a tagged enum so the report cycle
//!   dispatches exhaustively, not an open trait hierarchy
//! - **Owned, not global**: the registry is a plain value whose lifetime is
//!   bound to its owner (normally the engine), never a process-wide static
//! - **Drain-then-reset**: delta counters and time-binned histograms are
//!   drained by the report cycle with snapshot-exact arithmetic, so racing
//!   updates are deferred to the next cycle instead of lost
//!
//! # Example
//!
//! ```
//! use flare_registry::{MetricName, Registry};
//!
//! let registry = Registry::new();
//!
//! let requests = registry
//!     .counter(MetricName::new("http.requests").tag("env", "prod"))
//!     .unwrap();
//! requests.inc();
//!
//! let latency = registry.histogram("http.latency").unwrap();
//! latency.update(12.5);
//!
//! assert_eq!(registry.len(), 2);
//! ```

mod clock;
mod counter;
mod distribution;
mod error;
mod gauge;
mod histogram;
mod meter;
mod name;
mod registry;
mod timer;

pub use clock::{system_clock, ClockMillis};
pub use counter::{Counter, DeltaCounter};
pub use distribution::{Centroid, Distribution, TimeBinnedHistogram, MAX_BINS, MAX_CENTROIDS};
pub use error::{RegistryError, Result};
pub use gauge::Gauge;
pub use histogram::{Histogram, HistogramSnapshot, DEFAULT_WINDOW};
pub use meter::Meter;
pub use name::{MetricName, DELTA_PREFIX, DELTA_PREFIX_ALT};
pub use registry::{Instrument, InstrumentKind, Registry};
pub use timer::Timer;
