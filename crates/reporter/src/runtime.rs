//! Process-runtime gauges
//!
//! Optional pass-through registrations into the engine's registry: uptime,
//! wall-clock time, memory, thread count, and file-descriptor pressure.
//! Values come from `/proc` on Linux; elsewhere the gauges report `None`
//! and are skipped by the cycle like any non-numeric gauge.
//!
//! A name that collides with a pre-existing instrument is logged and
//! ignored: hosts that already export their own process metrics must not
//! lose them to this convenience layer.

use std::time::Instant;

use tracing::info;

use flare_registry::Registry;

/// Register the `process.*` gauge set.
pub(crate) fn register_runtime_gauges(registry: &Registry) {
    let start = Instant::now();
    try_register(registry, "process.uptime", move || {
        Some(start.elapsed().as_millis() as f64)
    });
    try_register(registry, "process.current_time", || {
        Some(crate::unix_now_secs() as f64 * 1000.0)
    });
    try_register(registry, "process.memory.rss_bytes", rss_bytes);
    try_register(registry, "process.memory.vsize_bytes", vsize_bytes);
    try_register(registry, "process.threads", thread_count);
    try_register(registry, "process.fd_usage", fd_usage);
}

fn try_register(
    registry: &Registry,
    name: &str,
    value_fn: impl Fn() -> Option<f64> + Send + Sync + 'static,
) {
    if let Err(e) = registry.gauge(name, value_fn) {
        info!(metric = name, error = %e, "skipping runtime gauge registration");
    }
}

#[cfg(target_os = "linux")]
fn rss_bytes() -> Option<f64> {
    statm_field(1)
}

#[cfg(target_os = "linux")]
fn vsize_bytes() -> Option<f64> {
    statm_field(0)
}

/// Read one page-count field from `/proc/self/statm` as bytes.
#[cfg(target_os = "linux")]
fn statm_field(index: usize) -> Option<f64> {
    const PAGE_SIZE: u64 = 4096;
    let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
    let pages: u64 = statm.split_whitespace().nth(index)?.parse().ok()?;
    Some((pages * PAGE_SIZE) as f64)
}

#[cfg(target_os = "linux")]
fn thread_count() -> Option<f64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    status
        .lines()
        .find(|line| line.starts_with("Threads:"))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|n| n.parse::<f64>().ok())
}

/// Open file descriptors as a fraction of the soft limit.
#[cfg(target_os = "linux")]
fn fd_usage() -> Option<f64> {
    let used = std::fs::read_dir("/proc/self/fd").ok()?.count() as f64;
    let limits = std::fs::read_to_string("/proc/self/limits").ok()?;
    let limit: f64 = limits
        .lines()
        .find(|line| line.starts_with("Max open files"))
        .and_then(|line| line.split_whitespace().nth(3))
        .and_then(|n| n.parse().ok())?;
    if limit > 0.0 {
        Some(used / limit)
    } else {
        None
    }
}

#[cfg(not(target_os = "linux"))]
fn rss_bytes() -> Option<f64> {
    None
}

#[cfg(not(target_os = "linux"))]
fn vsize_bytes() -> Option<f64> {
    None
}

#[cfg(not(target_os = "linux"))]
fn thread_count() -> Option<f64> {
    None
}

#[cfg(not(target_os = "linux"))]
fn fd_usage() -> Option<f64> {
    None
}
