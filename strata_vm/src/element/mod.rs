//! Indexed element access caches.
//!
//! An element site (`receiver[key]`) keeps two caches:
//!
//! - a chain of [`ElementGuard`] entries for index keys, one per receiver
//!   representation seen, collapsing to the generic lookup past
//!   `element_cache_limit`;
//! - a bounded map of named property caches for non-index keys, one per
//!   distinct key, after which the site reads and writes generically.
//!
//! Guards classify by representation only. The per-access work (bounds, hole
//! and kind checks) happens under the object's lock inside
//! [`JsObject::read_element`](strata_runtime::JsObject::read_element) and
//! [`JsObject::write_element_in_place`](strata_runtime::JsObject::write_element_in_place).

pub mod read;
pub mod write;

pub use read::ReadElementCache;
pub use write::WriteElementCache;

use crate::property::ChainEntry;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use strata_runtime::array::ArrayKind;
use strata_runtime::ops;
use strata_runtime::{ObjectKind, PropertyKey, Realm, RuntimeResult, Value};

// =============================================================================
// Guards
// =============================================================================

/// Receiver class of an element entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementGuard {
    /// An object whose element store currently has this representation.
    ArrayClass(ArrayKind),
    /// A primitive string.
    String,
    Proxy,
    Foreign,
}

impl ElementGuard {
    /// Classify `receiver`. Nullish receivers have no guard.
    pub fn of(receiver: &Value) -> Option<Self> {
        match receiver {
            Value::String(_) => Some(ElementGuard::String),
            Value::Object(object) => Some(match object.kind() {
                ObjectKind::Proxy(_) => ElementGuard::Proxy,
                ObjectKind::Foreign(_) => ElementGuard::Foreign,
                _ => ElementGuard::ArrayClass(object.array_kind()),
            }),
            _ => None,
        }
    }

    /// Whether `receiver` belongs to this class right now.
    #[inline]
    pub fn matches(self, receiver: &Value) -> bool {
        Self::of(receiver) == Some(self)
    }
}

/// One element cache entry. The entry without a guard is the generic one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementEntry {
    guard: Option<ElementGuard>,
}

impl ElementEntry {
    pub(crate) fn new(guard: ElementGuard) -> Self {
        Self { guard: Some(guard) }
    }

    /// The receiver class, `None` for the generic entry.
    pub fn guard(&self) -> Option<ElementGuard> {
        self.guard
    }
}

impl ChainEntry for ElementEntry {
    fn generic() -> Self {
        Self { guard: None }
    }

    // Representation guards never go stale; a receiver that changed
    // representation simply stops matching.
    fn is_stale(&self) -> bool {
        false
    }
}

// =============================================================================
// Keys
// =============================================================================

/// Array index of a primitive key, without user-visible coercion.
#[inline]
pub(crate) fn fast_index(key: &Value) -> Option<u32> {
    match key {
        Value::Int(i) if *i >= 0 => Some(*i as u32),
        Value::Int(_) | Value::Object(_) => None,
        other => PropertyKey::from_primitive(other).and_then(|k| k.as_index()),
    }
}

/// Named property caches of an element site, one per distinct key.
pub(crate) struct KeyedCaches<C> {
    caches: RwLock<FxHashMap<PropertyKey, Arc<C>>>,
    limit: usize,
}

impl<C> KeyedCaches<C> {
    pub(crate) fn new(limit: usize) -> Self {
        Self {
            caches: RwLock::new(FxHashMap::default()),
            limit,
        }
    }

    /// The cache for `key`, created on first use. `None` once the site has
    /// seen `limit` distinct keys.
    pub(crate) fn get_or_create(&self, key: &PropertyKey, create: impl FnOnce() -> C) -> Option<Arc<C>> {
        if let Some(cache) = self.caches.read().get(key) {
            return Some(Arc::clone(cache));
        }
        let mut caches = self.caches.write();
        if let Some(cache) = caches.get(key) {
            return Some(Arc::clone(cache));
        }
        if caches.len() >= self.limit {
            return None;
        }
        let cache = Arc::new(create());
        caches.insert(key.clone(), Arc::clone(&cache));
        Some(cache)
    }

    /// Number of distinct keys cached.
    pub(crate) fn len(&self) -> usize {
        self.caches.read().len()
    }
}

impl<C> std::fmt::Debug for KeyedCaches<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyedCaches")
            .field("keys", &self.len())
            .field("limit", &self.limit)
            .finish()
    }
}

// =============================================================================
// Uncached Element Operations
// =============================================================================

/// `key in receiver` for a computed key.
pub fn has_element(receiver: &Value, key: &Value, realm: &Realm) -> RuntimeResult<bool> {
    let key = ops::to_key(realm, receiver, key)?;
    ops::has(realm, receiver, &key)
}

/// `delete receiver[key]`.
pub fn delete_element(receiver: &Value, key: &Value, strict: bool, realm: &Realm) -> RuntimeResult<bool> {
    let key = ops::to_key(realm, receiver, key)?;
    ops::delete(realm, receiver, &key, strict)
}
