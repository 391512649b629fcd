//! Registry error types.

use thiserror::Error;

use crate::registry::InstrumentKind;

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Errors that can occur when creating or looking up instruments.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The name is already bound to an instrument of a different kind.
    ///
    /// The registry entry is left untouched; only the offending call fails.
    #[error("metric '{name}' is already registered as {existing}, requested {requested}")]
    KindConflict {
        /// The conflicting metric key
        name: String,
        /// Kind currently bound to the name
        existing: InstrumentKind,
        /// Kind the caller asked for
        requested: InstrumentKind,
    },

    /// A creation call was made with an empty metric key.
    #[error("metric name must not be empty")]
    EmptyName,
}
