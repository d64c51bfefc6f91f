//! Property access inline caches.
//!
//! # Architecture
//!
//! Each named property access site owns one cache: [`PropertyGetCache`],
//! [`PropertySetCache`] or [`PropertyHasCache`]. A cache is a
//! [`CacheChain`] of `(ReceiverCheck, kind)` entries produced by
//! [`resolve`](self::resolve) on a miss. Entries are tried newest first; the
//! first accepting entry performs the operation.
//!
//! - [`chain`]: the shared chain state machine
//! - `resolve`: prototype-chain resolution into checks and holders
//! - [`get`], [`set`], [`has`]: the three operations and their entry kinds

pub mod chain;
pub mod get;
pub mod has;
pub(crate) mod resolve;
pub mod set;

pub use chain::{CacheChain, CacheState, CacheStats, ChainEntry};
pub use get::{GetEntry, GetKind, PropertyGetCache};
pub use has::{HasEntry, HasKind, PropertyHasCache};
pub use set::{PropertySetCache, SetEntry, SetKind};

use std::sync::atomic::{AtomicU8, Ordering};

// =============================================================================
// Typed Access
// =============================================================================

/// Result of a typed read.
#[derive(Debug, Clone, PartialEq)]
pub enum Typed<T> {
    /// The value had the requested type.
    Exact(T),
    /// The value had another type; the boxed value is returned instead.
    Mismatch(strata_runtime::Value),
}

impl<T> Typed<T> {
    /// The exact value, if any.
    #[inline]
    pub fn exact(self) -> Option<T> {
        match self {
            Typed::Exact(v) => Some(v),
            Typed::Mismatch(_) => None,
        }
    }

    /// Check for a mismatch.
    #[inline]
    pub fn is_mismatch(&self) -> bool {
        matches!(self, Typed::Mismatch(_))
    }
}

/// Primitive read types a site has been asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TypedSlot {
    Int = 1 << 0,
    Double = 1 << 1,
    Boolean = 1 << 2,
    Long = 1 << 3,
}

/// Per-site record of typed reads that produced a different type.
///
/// Once a typed read at a site mismatches, later typed reads of that type
/// skip the exact path and return the boxed value directly.
#[derive(Debug, Default)]
pub struct TypeFeedback(AtomicU8);

impl TypeFeedback {
    /// Create empty feedback.
    pub const fn new() -> Self {
        Self(AtomicU8::new(0))
    }

    /// Check if typed reads of `slot` are still attempted.
    #[inline]
    pub fn is_enabled(&self, slot: TypedSlot) -> bool {
        self.0.load(Ordering::Relaxed) & slot as u8 == 0
    }

    /// Record a mismatch for `slot`.
    #[inline]
    pub fn record_mismatch(&self, slot: TypedSlot) {
        self.0.fetch_or(slot as u8, Ordering::Relaxed);
    }

    /// Enable every typed read again.
    #[inline]
    pub fn reset(&self) {
        self.0.store(0, Ordering::Relaxed);
    }
}
