//! Metric identifiers
//!
//! A [`MetricName`] is an immutable (key, tags) pair with structural
//! equality. The key is a dot-delimited hierarchical string; tags are an
//! unordered string mapping stored in a `BTreeMap` so that two names built
//! from the same tags in any insertion order compare equal, and so that
//! registry iteration is deterministic.

use std::collections::BTreeMap;
use std::fmt;

/// Reserved prefix marking delta-counter semantics (U+2206, increment).
///
/// A sink that sees this prefix treats the point as an increment since the
/// previous report rather than an absolute total.
pub const DELTA_PREFIX: &str = "\u{2206}";

/// Alternate delta prefix (U+0394, Greek capital delta) accepted on input.
pub const DELTA_PREFIX_ALT: &str = "\u{0394}";

/// Immutable metric identifier: hierarchical key plus point tags.
///
/// Used as the registry map key. Ordering is key-first, then the full tag
/// set, which gives the report cycle a stable, sorted iteration order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MetricName {
    key: String,
    tags: BTreeMap<String, String>,
}

impl MetricName {
    /// Create a name with no tags.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            tags: BTreeMap::new(),
        }
    }

    /// Create a name with the given tag mapping.
    pub fn with_tags(key: impl Into<String>, tags: BTreeMap<String, String>) -> Self {
        Self {
            key: key.into(),
            tags,
        }
    }

    /// Add one tag, consuming and returning the name (builder style).
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// The hierarchical key, including any delta prefix.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The tag mapping.
    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    /// Whether the key carries a recognized delta prefix.
    pub fn has_delta_prefix(&self) -> bool {
        self.key.starts_with(DELTA_PREFIX) || self.key.starts_with(DELTA_PREFIX_ALT)
    }

    /// The key with any delta prefix stripped.
    pub fn key_without_delta_prefix(&self) -> &str {
        self.key
            .strip_prefix(DELTA_PREFIX)
            .or_else(|| self.key.strip_prefix(DELTA_PREFIX_ALT))
            .unwrap_or(&self.key)
    }

    /// Normalize the name for delta-counter registration: prepend the
    /// canonical delta prefix unless one is already present.
    pub fn into_delta(self) -> Self {
        if self.has_delta_prefix() {
            self
        } else {
            Self {
                key: format!("{DELTA_PREFIX}{}", self.key),
                tags: self.tags,
            }
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key)?;
        if !self.tags.is_empty() {
            write!(f, " {:?}", self.tags)?;
        }
        Ok(())
    }
}

impl From<&str> for MetricName {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for MetricName {
    fn from(key: String) -> Self {
        Self::new(key)
    }
}
