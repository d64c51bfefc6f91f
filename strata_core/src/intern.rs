//! Global string interner.
//!
//! Property names are interned once so that shape lookups and cache keys
//! compare by pointer instead of by content.

use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, LazyLock};

/// An interned, immutable string.
///
/// Two `InternedString`s are equal iff they point at the same allocation,
/// which the interner guarantees for equal contents.
#[derive(Clone)]
pub struct InternedString(Arc<str>);

impl InternedString {
    /// Get the string contents.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Address of the interned allocation.
    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        self.0.as_ptr()
    }

    /// Length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the string is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl PartialEq for InternedString {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for InternedString {}

impl Hash for InternedString {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        (self.0.as_ptr() as usize).hash(state);
    }
}

impl PartialOrd for InternedString {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for InternedString {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl fmt::Debug for InternedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl fmt::Display for InternedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for InternedString {
    fn from(s: &str) -> Self {
        intern(s)
    }
}

// =============================================================================
// Interner
// =============================================================================

struct Interner {
    strings: Mutex<FxHashSet<Arc<str>>>,
}

impl Interner {
    fn new() -> Self {
        Self {
            strings: Mutex::new(FxHashSet::default()),
        }
    }

    fn intern(&self, s: &str) -> InternedString {
        let mut strings = self.strings.lock();
        if let Some(existing) = strings.get(s) {
            return InternedString(Arc::clone(existing));
        }
        let arc: Arc<str> = Arc::from(s);
        strings.insert(Arc::clone(&arc));
        InternedString(arc)
    }

    fn len(&self) -> usize {
        self.strings.lock().len()
    }
}

static INTERNER: LazyLock<Interner> = LazyLock::new(Interner::new);

/// Intern a string, returning the canonical instance.
pub fn intern(s: &str) -> InternedString {
    INTERNER.intern(s)
}

/// Number of distinct strings interned so far.
pub fn interned_count() -> usize {
    INTERNER.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_same_pointer() {
        let a = intern("length");
        let b = intern("length");
        assert_eq!(a, b);
        assert_eq!(a.as_ptr(), b.as_ptr());
    }

    #[test]
    fn test_intern_distinct() {
        assert_ne!(intern("x"), intern("y"));
    }

    #[test]
    fn test_intern_empty_and_unicode() {
        let empty = intern("");
        assert!(empty.is_empty());
        let name = intern("名前");
        assert_eq!(name.as_str(), "名前");
        assert_eq!(name, intern("名前"));
    }

    #[test]
    fn test_interned_count_grows() {
        let before = interned_count();
        let _ = intern("strata_intern_count_probe_unique");
        assert!(interned_count() > before);
    }
}
