//! Epoch-based assumptions.
//!
//! An [`Assumption`] is a globally visible invariant ("this shape has no
//! transitions", "this property has been written at most once") that cached
//! code may rely on. Instead of an object with an explicit `invalidate()`
//! callback list, each assumption is a monotonically increasing generation
//! counter. A cache entry captures an [`AssumptionToken`] (the generation it
//! observed) and treats any later generation as "assumption broken".
//!
//! # Ordering
//!
//! Invalidation is a `Release` increment and validation an `Acquire` load, so
//! a thread that observes the effects of a mutation published after
//! `invalidate()` also observes the invalidation.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// A single tracked invariant.
pub struct Assumption {
    /// Human-readable name for diagnostics.
    name: &'static str,
    /// Generation counter; 0 means never invalidated.
    generation: AtomicU64,
}

impl Assumption {
    /// Create a new, valid assumption.
    #[inline]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            generation: AtomicU64::new(0),
        }
    }

    /// Create a new shared assumption.
    #[inline]
    pub fn shared(name: &'static str) -> Arc<Self> {
        Arc::new(Self::new(name))
    }

    /// Diagnostic name.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Current generation.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Check if the assumption has never been invalidated.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.generation() == 0
    }

    /// Invalidate the assumption.
    ///
    /// Returns `true` if this call performed the first invalidation.
    #[inline]
    pub fn invalidate(&self) -> bool {
        self.generation.fetch_add(1, Ordering::AcqRel) == 0
    }
}

impl fmt::Debug for Assumption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Assumption")
            .field("name", &self.name)
            .field("generation", &self.generation())
            .finish()
    }
}

/// A captured view of an assumption at a given generation.
#[derive(Clone)]
pub struct AssumptionToken {
    assumption: Arc<Assumption>,
    generation: u64,
}

impl AssumptionToken {
    /// Capture the current generation of `assumption`.
    #[inline]
    pub fn capture(assumption: &Arc<Assumption>) -> Self {
        Self {
            generation: assumption.generation(),
            assumption: Arc::clone(assumption),
        }
    }

    /// Check that the assumption has not changed since capture.
    #[inline(always)]
    pub fn is_current(&self) -> bool {
        self.assumption.generation() == self.generation
    }

    /// Check that the assumption is current and was valid when captured.
    #[inline]
    pub fn holds(&self) -> bool {
        self.generation == 0 && self.is_current()
    }

    /// The underlying assumption.
    #[inline]
    pub fn assumption(&self) -> &Arc<Assumption> {
        &self.assumption
    }
}

impl fmt::Debug for AssumptionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssumptionToken")
            .field("name", &self.assumption.name())
            .field("generation", &self.generation)
            .field("current", &self.is_current())
            .finish()
    }
}
