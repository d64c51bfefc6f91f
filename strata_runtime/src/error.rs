//! Errors surfaced to the embedded program.
//!
//! Cache misses, assumption invalidations and typed-path mismatches are
//! resolved inside the property-access core and never appear here. Only
//! genuine language errors (and values thrown by user code reached through
//! accessors, proxy traps or host members) propagate.

use crate::value::Value;
use thiserror::Error;

/// A language-level error produced by a property or element operation.
#[derive(Debug, Clone, Error)]
pub enum RuntimeError {
    /// A `TypeError` (null receiver, read-only write in strict mode, detached buffer, ...).
    #[error("TypeError: {0}")]
    TypeError(String),

    /// A `ReferenceError` (unresolvable required/global reference).
    #[error("ReferenceError: {0}")]
    ReferenceError(String),

    /// A `RangeError` (invalid array length, ...).
    #[error("RangeError: {0}")]
    RangeError(String),

    /// A value thrown by user code (getter, setter, trap, host method).
    #[error("uncaught exception: {0:?}")]
    Thrown(Value),
}

impl RuntimeError {
    /// Build a `TypeError`.
    #[inline]
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::TypeError(message.into())
    }

    /// Build a `ReferenceError`.
    #[inline]
    pub fn reference_error(message: impl Into<String>) -> Self {
        Self::ReferenceError(message.into())
    }

    /// Build a `RangeError`.
    #[inline]
    pub fn range_error(message: impl Into<String>) -> Self {
        Self::RangeError(message.into())
    }

    /// Check if this is a `TypeError`.
    #[inline]
    pub fn is_type_error(&self) -> bool {
        matches!(self, Self::TypeError(_))
    }

    /// Check if this is a `ReferenceError`.
    #[inline]
    pub fn is_reference_error(&self) -> bool {
        matches!(self, Self::ReferenceError(_))
    }
}

/// Convenient `Result` alias for fallible runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
