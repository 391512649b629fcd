//! Pull-based gauges.

/// A gauge computed on demand from a caller-supplied callback.
///
/// The callback returns `Option<f64>`: `None` means the value is currently
/// non-numeric or unavailable, and the report cycle skips the gauge without
/// treating it as an error.
pub struct Gauge {
    value_fn: Box<dyn Fn() -> Option<f64> + Send + Sync>,
}

impl Gauge {
    /// Create a gauge from a value callback.
    pub fn new(value_fn: impl Fn() -> Option<f64> + Send + Sync + 'static) -> Self {
        Self {
            value_fn: Box::new(value_fn),
        }
    }

    /// Evaluate the callback.
    pub fn value(&self) -> Option<f64> {
        (self.value_fn)()
    }
}

impl std::fmt::Debug for Gauge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gauge").finish_non_exhaustive()
    }
}
