//! Error types for pixint-core.

use thiserror::Error;

/// Result type alias for pixint operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for pixint operations.
///
/// Only setup mistakes surface here. Data-dependent conditions such as an
/// empty bin or a zero-width range are absorbed by the binning engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Invalid integration configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An array does not match the shape it has to be paired with.
    #[error("shape mismatch: {what} has shape {actual:?}, expected {expected:?}")]
    ShapeMismatch {
        /// Which array was rejected.
        what: &'static str,
        /// Shape it had to match, as (rows, cols).
        expected: (usize, usize),
        /// Shape it actually had, as (rows, cols).
        actual: (usize, usize),
    },
}

impl Error {
    /// Shorthand for a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Returns `Ok(())` when `actual` equals `expected`.
    ///
    /// # Errors
    /// Returns [`Error::ShapeMismatch`] naming `what` otherwise.
    pub fn check_shape(
        what: &'static str,
        expected: (usize, usize),
        actual: (usize, usize),
    ) -> Result<()> {
        if expected == actual {
            Ok(())
        } else {
            Err(Self::ShapeMismatch {
                what,
                expected,
                actual,
            })
        }
    }
}
