//! Instrument registry
//!
//! Process-wide mapping from [`MetricName`] to instrument, owned by whoever
//! constructs it (typically the report engine) rather than living in a
//! static. Creation is get-or-create per kind: concurrent calls for the same
//! name and kind return the same `Arc`, and a name already bound to a
//! different kind fails with [`RegistryError::KindConflict`] without
//! disturbing the entry.
//!
//! The map is a `BTreeMap` behind an `RwLock`, so [`Registry::snapshot`]
//! yields a sorted, point-in-time copy (cheap `Arc` clones) while unrelated
//! creation proceeds on other keys, and never observes a half-built entry.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::clock::ClockMillis;
use crate::counter::{Counter, DeltaCounter};
use crate::distribution::TimeBinnedHistogram;
use crate::error::{RegistryError, Result};
use crate::gauge::Gauge;
use crate::histogram::Histogram;
use crate::meter::Meter;
use crate::name::MetricName;
use crate::timer::Timer;

/// The closed set of instrument kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstrumentKind {
    Counter,
    DeltaCounter,
    Gauge,
    Histogram,
    TimeBinnedHistogram,
    Meter,
    Timer,
}

impl fmt::Display for InstrumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InstrumentKind::Counter => "counter",
            InstrumentKind::DeltaCounter => "delta counter",
            InstrumentKind::Gauge => "gauge",
            InstrumentKind::Histogram => "histogram",
            InstrumentKind::TimeBinnedHistogram => "time-binned histogram",
            InstrumentKind::Meter => "meter",
            InstrumentKind::Timer => "timer",
        };
        write!(f, "{name}")
    }
}

/// A registered instrument. The report cycle dispatches exhaustively on this.
#[derive(Debug, Clone)]
pub enum Instrument {
    Counter(Arc<Counter>),
    DeltaCounter(Arc<DeltaCounter>),
    Gauge(Arc<Gauge>),
    Histogram(Arc<Histogram>),
    TimeBinnedHistogram(Arc<TimeBinnedHistogram>),
    Meter(Arc<Meter>),
    Timer(Arc<Timer>),
}

impl Instrument {
    /// The kind tag for this instrument.
    pub fn kind(&self) -> InstrumentKind {
        match self {
            Instrument::Counter(_) => InstrumentKind::Counter,
            Instrument::DeltaCounter(_) => InstrumentKind::DeltaCounter,
            Instrument::Gauge(_) => InstrumentKind::Gauge,
            Instrument::Histogram(_) => InstrumentKind::Histogram,
            Instrument::TimeBinnedHistogram(_) => InstrumentKind::TimeBinnedHistogram,
            Instrument::Meter(_) => InstrumentKind::Meter,
            Instrument::Timer(_) => InstrumentKind::Timer,
        }
    }
}

/// Thread-safe instrument registry.
#[derive(Debug, Default)]
pub struct Registry {
    instruments: RwLock<BTreeMap<MetricName, Instrument>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create a counter.
    pub fn counter(&self, name: impl Into<MetricName>) -> Result<Arc<Counter>> {
        self.get_or_create(
            name.into(),
            InstrumentKind::Counter,
            || {
                let handle = Arc::new(Counter::new());
                (Arc::clone(&handle), Instrument::Counter(handle))
            },
            |entry| match entry {
                Instrument::Counter(c) => Some(Arc::clone(c)),
                _ => None,
            },
        )
    }

    /// Get or create a delta counter.
    ///
    /// The name is normalized with the reserved delta prefix before lookup,
    /// so `delta_counter("x")` and a plain `counter("x")` occupy distinct
    /// registry entries; conflicts are detected at the prefixed key.
    pub fn delta_counter(&self, name: impl Into<MetricName>) -> Result<Arc<DeltaCounter>> {
        let name = name.into();
        if name.key_without_delta_prefix().is_empty() {
            return Err(RegistryError::EmptyName);
        }
        self.get_or_create(
            name.into_delta(),
            InstrumentKind::DeltaCounter,
            || {
                let handle = Arc::new(DeltaCounter::new());
                (Arc::clone(&handle), Instrument::DeltaCounter(handle))
            },
            |entry| match entry {
                Instrument::DeltaCounter(c) => Some(Arc::clone(c)),
                _ => None,
            },
        )
    }

    /// Get or create a gauge.
    ///
    /// Idempotent: if a gauge already exists under the name, the existing
    /// one is returned and the new callback is dropped.
    pub fn gauge(
        &self,
        name: impl Into<MetricName>,
        value_fn: impl Fn() -> Option<f64> + Send + Sync + 'static,
    ) -> Result<Arc<Gauge>> {
        self.get_or_create(
            name.into(),
            InstrumentKind::Gauge,
            move || {
                let handle = Arc::new(Gauge::new(value_fn));
                (Arc::clone(&handle), Instrument::Gauge(handle))
            },
            |entry| match entry {
                Instrument::Gauge(g) => Some(Arc::clone(g)),
                _ => None,
            },
        )
    }

    /// Get or create a summary histogram.
    pub fn histogram(&self, name: impl Into<MetricName>) -> Result<Arc<Histogram>> {
        self.get_or_create(
            name.into(),
            InstrumentKind::Histogram,
            || {
                let handle = Arc::new(Histogram::new());
                (Arc::clone(&handle), Instrument::Histogram(handle))
            },
            |entry| match entry {
                Instrument::Histogram(h) => Some(Arc::clone(h)),
                _ => None,
            },
        )
    }

    /// Get or create a time-binned distribution histogram.
    pub fn time_binned_histogram(
        &self,
        name: impl Into<MetricName>,
    ) -> Result<Arc<TimeBinnedHistogram>> {
        self.get_or_create(
            name.into(),
            InstrumentKind::TimeBinnedHistogram,
            || {
                let handle = Arc::new(TimeBinnedHistogram::new());
                (Arc::clone(&handle), Instrument::TimeBinnedHistogram(handle))
            },
            |entry| match entry {
                Instrument::TimeBinnedHistogram(h) => Some(Arc::clone(h)),
                _ => None,
            },
        )
    }

    /// Get or create a time-binned histogram on a caller-supplied clock.
    ///
    /// The clock only applies if this call creates the instrument; an
    /// existing histogram keeps the clock it was built with.
    pub fn time_binned_histogram_with_clock(
        &self,
        name: impl Into<MetricName>,
        clock: ClockMillis,
    ) -> Result<Arc<TimeBinnedHistogram>> {
        self.get_or_create(
            name.into(),
            InstrumentKind::TimeBinnedHistogram,
            move || {
                let handle = Arc::new(TimeBinnedHistogram::with_clock(clock));
                (Arc::clone(&handle), Instrument::TimeBinnedHistogram(handle))
            },
            |entry| match entry {
                Instrument::TimeBinnedHistogram(h) => Some(Arc::clone(h)),
                _ => None,
            },
        )
    }

    /// Get or create a meter.
    pub fn meter(&self, name: impl Into<MetricName>) -> Result<Arc<Meter>> {
        self.get_or_create(
            name.into(),
            InstrumentKind::Meter,
            || {
                let handle = Arc::new(Meter::new());
                (Arc::clone(&handle), Instrument::Meter(handle))
            },
            |entry| match entry {
                Instrument::Meter(m) => Some(Arc::clone(m)),
                _ => None,
            },
        )
    }

    /// Get or create a timer.
    pub fn timer(&self, name: impl Into<MetricName>) -> Result<Arc<Timer>> {
        self.get_or_create(
            name.into(),
            InstrumentKind::Timer,
            || {
                let handle = Arc::new(Timer::new());
                (Arc::clone(&handle), Instrument::Timer(handle))
            },
            |entry| match entry {
                Instrument::Timer(t) => Some(Arc::clone(t)),
                _ => None,
            },
        )
    }

    /// Sorted, point-in-time copy of the registry contents.
    pub fn snapshot(&self) -> Vec<(MetricName, Instrument)> {
        self.instruments
            .read()
            .iter()
            .map(|(name, instrument)| (name.clone(), instrument.clone()))
            .collect()
    }

    /// Number of registered instruments.
    pub fn len(&self) -> usize {
        self.instruments.read().len()
    }

    /// Whether the registry has no instruments.
    pub fn is_empty(&self) -> bool {
        self.instruments.read().is_empty()
    }

    /// Double-checked get-or-create: a read-lock fast path for the common
    /// lookup, then a write lock that re-checks before inserting.
    fn get_or_create<T>(
        &self,
        name: MetricName,
        kind: InstrumentKind,
        make: impl FnOnce() -> (Arc<T>, Instrument),
        extract: impl Fn(&Instrument) -> Option<Arc<T>>,
    ) -> Result<Arc<T>> {
        if name.key().is_empty() {
            return Err(RegistryError::EmptyName);
        }

        let conflict = |existing: &Instrument| RegistryError::KindConflict {
            name: name.key().to_string(),
            existing: existing.kind(),
            requested: kind,
        };

        {
            let instruments = self.instruments.read();
            if let Some(existing) = instruments.get(&name) {
                return extract(existing).ok_or_else(|| conflict(existing));
            }
        }

        let mut instruments = self.instruments.write();
        if let Some(existing) = instruments.get(&name) {
            return extract(existing).ok_or_else(|| conflict(existing));
        }

        let (handle, instrument) = make();
        instruments.insert(name, instrument);
        Ok(handle)
    }
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod registry_test;
