//! Per-site cache chains.
//!
//! ```text
//!   Uninitialized ──first access──▶ Monomorphic
//!         ▲                             │ new receiver class
//!         │ all entries evicted         ▼
//!         └──────────────────────── Polymorphic (up to the limit)
//!                                       │ one more
//!                                       ▼
//!                                  Megamorphic (generic entry only, final)
//! ```
//!
//! Readers take a snapshot of the entry list (`Arc<[E]>`) under a short read
//! lock and scan it without holding any lock. Writers serialize on a
//! per-site mutex and publish a complete new list, so a reader sees either
//! the whole old chain or the whole new one.

use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use strata_runtime::RuntimeResult;
use tracing::{debug, trace};

/// Cache state of one site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// No entries.
    Uninitialized,
    /// One specialized entry.
    Monomorphic,
    /// Several specialized entries.
    Polymorphic,
    /// A single generic entry; never leaves this state.
    Megamorphic,
}

/// An entry that can live in a [`CacheChain`].
pub trait ChainEntry: Clone + Send + Sync {
    /// The entry that handles every receiver.
    fn generic() -> Self;

    /// Whether the entry can no longer apply to any receiver.
    fn is_stale(&self) -> bool;
}

/// Outcome of applying one entry to a receiver.
pub(crate) enum Applied<T> {
    /// The entry handled the access.
    Done(RuntimeResult<T>),
    /// The entry does not apply; try the next one.
    Skip,
    /// The entry can never apply again.
    Stale,
}

/// Hit/miss counters of one site.
#[derive(Debug, Default)]
pub struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl CacheCounters {
    #[inline]
    pub(crate) fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot of the counters.
    pub fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

/// Counters of one site at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl CacheStats {
    /// Get hit rate as a percentage (0.0-100.0).
    pub fn hit_rate(&self) -> f32 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f32 / total as f32) * 100.0
        }
    }
}

/// The entry list of one site.
pub struct CacheChain<E: ChainEntry> {
    entries: RwLock<Arc<[E]>>,
    writer: Mutex<()>,
    limit: usize,
    megamorphic: AtomicBool,
    counters: CacheCounters,
}

impl<E: ChainEntry> CacheChain<E> {
    /// Create an empty chain holding at most `limit` specialized entries.
    pub fn new(limit: usize) -> Self {
        Self {
            entries: RwLock::new(Arc::from(Vec::new())),
            writer: Mutex::new(()),
            limit: limit.max(1),
            megamorphic: AtomicBool::new(false),
            counters: CacheCounters::default(),
        }
    }

    /// Current entries, most recently installed first.
    #[inline]
    pub fn snapshot(&self) -> Arc<[E]> {
        Arc::clone(&self.entries.read())
    }

    /// Number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if the chain has no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if the chain collapsed to its generic entry.
    #[inline]
    pub fn is_megamorphic(&self) -> bool {
        self.megamorphic.load(Ordering::Acquire)
    }

    /// Specialization limit.
    #[inline]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Current state.
    pub fn state(&self) -> CacheState {
        if self.is_megamorphic() {
            return CacheState::Megamorphic;
        }
        match self.len() {
            0 => CacheState::Uninitialized,
            1 => CacheState::Monomorphic,
            _ => CacheState::Polymorphic,
        }
    }

    /// Counters of this site.
    #[inline]
    pub fn counters(&self) -> &CacheCounters {
        &self.counters
    }

    /// Install a specialized entry in front of the chain.
    ///
    /// A chain already at its limit is replaced by the generic entry.
    pub fn install(&self, entry: E) {
        let _writer = self.writer.lock();
        if self.is_megamorphic() {
            return;
        }
        let current = self.snapshot();
        let next: Arc<[E]> = if current.len() >= self.limit {
            self.megamorphic.store(true, Ordering::Release);
            debug!(limit = self.limit, "cache chain collapsed to megamorphic");
            Arc::from(vec![E::generic()])
        } else {
            trace!(len = current.len() + 1, "cache entry installed");
            std::iter::once(entry).chain(current.iter().cloned()).collect()
        };
        *self.entries.write() = next;
    }

    /// Drop every entry that can no longer apply.
    pub fn evict_stale(&self) {
        let _writer = self.writer.lock();
        let current = self.snapshot();
        let kept: Vec<E> = current.iter().filter(|e| !e.is_stale()).cloned().collect();
        let evicted = current.len() - kept.len();
        if evicted == 0 {
            return;
        }
        self.counters
            .evictions
            .fetch_add(evicted as u64, Ordering::Relaxed);
        trace!(evicted, "stale cache entries evicted");
        *self.entries.write() = Arc::from(kept);
    }

    /// Try the entries newest first. `None` is a miss.
    ///
    /// Entries reporting [`Applied::Stale`] are evicted before returning.
    pub(crate) fn dispatch<T>(&self, mut apply: impl FnMut(&E) -> Applied<T>) -> Option<RuntimeResult<T>> {
        let entries = self.snapshot();
        let mut stale = false;
        let mut result = None;
        for entry in entries.iter() {
            match apply(entry) {
                Applied::Done(r) => {
                    result = Some(r);
                    break;
                }
                Applied::Skip => {}
                Applied::Stale => stale = true,
            }
        }
        if stale {
            self.evict_stale();
        }
        match result {
            Some(_) => self.counters.hit(),
            None => self.counters.miss(),
        }
        result
    }

    /// Force the megamorphic state.
    pub fn make_megamorphic(&self) {
        let _writer = self.writer.lock();
        self.megamorphic.store(true, Ordering::Release);
        *self.entries.write() = Arc::from(vec![E::generic()]);
    }
}

impl<E: ChainEntry + std::fmt::Debug> std::fmt::Debug for CacheChain<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheChain")
            .field("state", &self.state())
            .field("entries", &self.snapshot())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    #[derive(Debug, Clone)]
    enum TestEntry {
        Special(u32, Arc<AtomicBool>),
        Generic,
    }

    impl ChainEntry for TestEntry {
        fn generic() -> Self {
            TestEntry::Generic
        }

        fn is_stale(&self) -> bool {
            match self {
                TestEntry::Special(_, stale) => stale.load(Ordering::Relaxed),
                TestEntry::Generic => false,
            }
        }
    }

    fn special(n: u32) -> TestEntry {
        TestEntry::Special(n, Arc::new(AtomicBool::new(false)))
    }

    #[test]
    fn test_state_transitions() {
        let chain = CacheChain::new(2);
        assert_eq!(chain.state(), CacheState::Uninitialized);
        chain.install(special(1));
        assert_eq!(chain.state(), CacheState::Monomorphic);
        chain.install(special(2));
        assert_eq!(chain.state(), CacheState::Polymorphic);
        chain.install(special(3));
        assert_eq!(chain.state(), CacheState::Megamorphic);
        assert_eq!(chain.len(), 1);
        chain.install(special(4));
        assert_eq!(chain.len(), 1);
        assert!(matches!(chain.snapshot()[0], TestEntry::Generic));
    }

    #[test]
    fn test_newest_first() {
        let chain = CacheChain::new(4);
        chain.install(special(1));
        chain.install(special(2));
        assert!(matches!(chain.snapshot()[0], TestEntry::Special(2, _)));
    }

    #[test]
    fn test_evict_stale() {
        let chain = CacheChain::new(4);
        let flag = Arc::new(AtomicBool::new(false));
        chain.install(TestEntry::Special(1, Arc::clone(&flag)));
        chain.install(special(2));
        flag.store(true, Ordering::Relaxed);
        chain.evict_stale();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain.state(), CacheState::Monomorphic);
        assert_eq!(chain.counters().snapshot().evictions, 1);
    }

    #[test]
    fn test_dispatch_evicts_stale() {
        let chain = CacheChain::new(4);
        let flag = Arc::new(AtomicBool::new(true));
        chain.install(TestEntry::Special(1, Arc::clone(&flag)));
        let result: Option<RuntimeResult<u32>> = chain.dispatch(|entry| match entry {
            TestEntry::Special(_, f) if f.load(Ordering::Relaxed) => Applied::Stale,
            TestEntry::Special(n, _) => Applied::Done(Ok(*n)),
            TestEntry::Generic => Applied::Skip,
        });
        assert!(result.is_none());
        assert!(chain.is_empty());
        assert_eq!(chain.counters().snapshot().misses, 1);
    }

    #[test]
    fn test_dispatch_hit() {
        let chain = CacheChain::new(4);
        chain.install(special(7));
        let result = chain.dispatch(|entry| match entry {
            TestEntry::Special(n, _) => Applied::Done(Ok(*n)),
            TestEntry::Generic => Applied::Skip,
        });
        assert!(matches!(result, Some(Ok(7))));
        assert_eq!(chain.counters().snapshot().hits, 1);
    }

    #[test]
    fn test_megamorphic_is_final() {
        let chain: CacheChain<TestEntry> = CacheChain::new(4);
        chain.make_megamorphic();
        chain.evict_stale();
        assert_eq!(chain.state(), CacheState::Megamorphic);
    }
}
