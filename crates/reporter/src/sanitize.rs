//! Metric-name sanitization.
//!
//! Sink-bound names may only contain `[A-Za-z0-9_.\-~]`; everything else is
//! replaced with `_`. Sanitization is pure, total, and idempotent.

/// Replace every character outside the allowed charset with `_`.
pub fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-' | '~') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Join the optional prefix and the given segments with dots, skipping empty
/// segments, then sanitize the result.
pub fn prefix_and_sanitize(prefix: Option<&str>, segments: &[&str]) -> String {
    let joined: Vec<&str> = prefix
        .into_iter()
        .chain(segments.iter().copied())
        .filter(|s| !s.is_empty())
        .collect();
    sanitize(&joined.join("."))
}
