//! Property has cache (`key in receiver`).

use super::chain::{Applied, CacheChain, CacheState, CacheStats, ChainEntry};
use super::resolve::{Resolution, resolve};
use crate::receiver::{CheckOutcome, ClassGuard, ReceiverCheck};
use std::sync::Arc;
use strata_core::RuntimeConfig;
use strata_runtime::object::ObjectKind;
use strata_runtime::ops;
use strata_runtime::{PropertyKey, Realm, RuntimeResult, Value};

/// Answer for an accepted receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HasKind {
    Present,
    Absent,
    Proxy,
    Foreign,
    /// Generic lookup, with or without a receiver check.
    Generic,
}

/// One has cache entry.
#[derive(Debug, Clone)]
pub struct HasEntry {
    check: Option<ReceiverCheck>,
    kind: HasKind,
}

impl HasEntry {
    /// The receiver check; `None` accepts every receiver.
    pub fn check(&self) -> Option<&ReceiverCheck> {
        self.check.as_ref()
    }

    /// The entry kind.
    pub fn kind(&self) -> HasKind {
        self.kind
    }
}

impl ChainEntry for HasEntry {
    fn generic() -> Self {
        Self {
            check: None,
            kind: HasKind::Generic,
        }
    }

    fn is_stale(&self) -> bool {
        self.check.as_ref().is_some_and(ReceiverCheck::is_stale)
    }
}

/// Inline cache for the `in` operator with one constant key.
#[derive(Debug)]
pub struct PropertyHasCache {
    key: PropertyKey,
    chain: CacheChain<HasEntry>,
}

impl PropertyHasCache {
    pub fn new(key: PropertyKey, config: &RuntimeConfig) -> Self {
        Self {
            key,
            chain: CacheChain::new(config.property_cache_limit),
        }
    }

    #[inline]
    pub fn key(&self) -> &PropertyKey {
        &self.key
    }

    #[inline]
    pub fn state(&self) -> CacheState {
        self.chain.state()
    }

    pub fn stats(&self) -> CacheStats {
        self.chain.counters().snapshot()
    }

    pub fn entries(&self) -> Arc<[HasEntry]> {
        self.chain.snapshot()
    }

    pub fn make_megamorphic(&self) {
        self.chain.make_megamorphic();
    }

    /// Check whether `receiver` has the property, own or inherited.
    pub fn has(&self, receiver: &Value, realm: &Realm) -> RuntimeResult<bool> {
        if let Some(result) = self.chain.dispatch(|entry| self.apply(entry, receiver, realm)) {
            return result;
        }
        if let Some(entry) = self.specialize(receiver, realm) {
            self.chain.install(entry);
        }
        ops::has(realm, receiver, &self.key)
    }

    fn apply(&self, entry: &HasEntry, receiver: &Value, realm: &Realm) -> Applied<bool> {
        if let Some(check) = &entry.check {
            match check.accept(receiver) {
                CheckOutcome::Accept(_) => {}
                CheckOutcome::Reject => return Applied::Skip,
                CheckOutcome::Invalidated => return Applied::Stale,
            }
        }
        match entry.kind {
            HasKind::Present => Applied::Done(Ok(true)),
            HasKind::Absent => Applied::Done(Ok(false)),
            HasKind::Proxy => match receiver.as_object().and_then(|o| o.proxy()) {
                Some(proxy) => Applied::Done(proxy.handler().has(realm, proxy.target(), &self.key)),
                None => Applied::Skip,
            },
            HasKind::Foreign => match receiver.as_object().and_then(|o| o.foreign()) {
                Some(foreign) => Applied::Done(Ok(
                    realm.config().foreign_interop && foreign.has_member(&self.key)
                )),
                None => Applied::Skip,
            },
            HasKind::Generic => Applied::Done(ops::has(realm, receiver, &self.key)),
        }
    }

    fn specialize(&self, receiver: &Value, realm: &Realm) -> Option<HasEntry> {
        // `in` on a primitive throws; nothing to cache.
        let Value::Object(object) = receiver else {
            return None;
        };
        if self.key.is_index() {
            return None;
        }
        let (check, kind) = match object.kind() {
            ObjectKind::Proxy(_) => (ReceiverCheck::Class(ClassGuard::Proxy), HasKind::Proxy),
            ObjectKind::Foreign(_) => (ReceiverCheck::Class(ClassGuard::Foreign), HasKind::Foreign),
            _ => match resolve(realm, receiver, &self.key) {
                Resolution::Own { check, .. } | Resolution::Inherited { check, .. } => {
                    (check, HasKind::Present)
                }
                Resolution::Absent { check } => {
                    let host_member = realm.config().host_interop && object.host().is_some();
                    (check, if host_member { HasKind::Generic } else { HasKind::Absent })
                }
                Resolution::Slow { check } => (check, HasKind::Generic),
                Resolution::Unguarded => return None,
            },
        };
        Some(HasEntry {
            check: Some(check),
            kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> PropertyKey {
        PropertyKey::from_name(s)
    }

    #[test]
    fn test_has_own_and_inherited() {
        let realm = Realm::new();
        let proto = realm.new_object();
        proto.set_own_value(&key("p"), Value::Int(1), &realm).unwrap();
        let obj = realm.new_object_with_proto(Some(&proto));
        obj.set_own_value(&key("o"), Value::Int(1), &realm).unwrap();
        let recv = Value::Object(obj);

        let own = PropertyHasCache::new(key("o"), realm.config());
        let inherited = PropertyHasCache::new(key("p"), realm.config());
        let missing = PropertyHasCache::new(key("m"), realm.config());
        for _ in 0..2 {
            assert!(own.has(&recv, &realm).unwrap());
            assert!(inherited.has(&recv, &realm).unwrap());
            assert!(!missing.has(&recv, &realm).unwrap());
        }
        assert_eq!(missing.entries()[0].kind(), HasKind::Absent);
    }

    #[test]
    fn test_has_sees_later_additions() {
        let realm = Realm::new();
        let proto = realm.new_object();
        let recv = Value::Object(realm.new_object_with_proto(Some(&proto)));
        let cache = PropertyHasCache::new(key("late"), realm.config());
        assert!(!cache.has(&recv, &realm).unwrap());
        proto.set_own_value(&key("late"), Value::Undefined, &realm).unwrap();
        assert!(cache.has(&recv, &realm).unwrap());
    }

    #[test]
    fn test_has_primitive_throws() {
        let realm = Realm::new();
        let cache = PropertyHasCache::new(key("x"), realm.config());
        assert!(cache.has(&Value::string("s"), &realm).unwrap_err().is_type_error());
        assert_eq!(cache.state(), CacheState::Uninitialized);
    }
}
