//! Wall-clock abstraction.
//!
//! Time-windowed instruments take an injectable millisecond clock so tests
//! can pin bins to known minutes instead of sleeping across minute edges.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// A shared clock yielding milliseconds since the Unix epoch.
pub type ClockMillis = Arc<dyn Fn() -> u64 + Send + Sync>;

/// The default clock, backed by [`SystemTime`].
pub fn system_clock() -> ClockMillis {
    Arc::new(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    })
}
