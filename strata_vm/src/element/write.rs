//! Element write cache.

use super::{ElementEntry, ElementGuard, KeyedCaches, fast_index};
use crate::property::PropertySetCache;
use crate::property::chain::{Applied, CacheChain, CacheState, CacheStats};
use std::sync::Arc;
use strata_core::RuntimeConfig;
use strata_runtime::array::ArrayKind;
use strata_runtime::ops;
use strata_runtime::{PropertyKey, Realm, RuntimeResult, Value};

/// Inline cache for `receiver[key] = value`.
#[derive(Debug)]
pub struct WriteElementCache {
    strict: bool,
    chain: CacheChain<ElementEntry>,
    keyed: KeyedCaches<PropertySetCache>,
    config: RuntimeConfig,
}

impl WriteElementCache {
    pub fn new(strict: bool, config: &RuntimeConfig) -> Self {
        Self {
            strict,
            chain: CacheChain::new(config.element_cache_limit),
            keyed: KeyedCaches::new(config.property_cache_limit),
            config: config.clone(),
        }
    }

    #[inline]
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    #[inline]
    pub fn state(&self) -> CacheState {
        self.chain.state()
    }

    pub fn stats(&self) -> CacheStats {
        self.chain.counters().snapshot()
    }

    pub fn entries(&self) -> Arc<[ElementEntry]> {
        self.chain.snapshot()
    }

    /// Number of distinct named keys with their own property cache.
    pub fn keyed_len(&self) -> usize {
        self.keyed.len()
    }

    pub fn make_megamorphic(&self) {
        self.chain.make_megamorphic();
    }

    /// Perform `receiver[key] = value`.
    pub fn write(&self, receiver: &Value, key: &Value, value: Value, realm: &Realm) -> RuntimeResult<()> {
        let Some(index) = fast_index(key) else {
            return self.write_named(receiver, key, value, realm);
        };
        if let Some(result) = self
            .chain
            .dispatch(|entry| self.write_index(entry, receiver, index, &value, realm))
        {
            return result;
        }
        if let Some(guard) = ElementGuard::of(receiver) {
            self.chain.install(ElementEntry::new(guard));
        }
        ops::set(realm, receiver, &PropertyKey::Index(index), value, self.strict)
    }

    fn write_named(&self, receiver: &Value, key: &Value, value: Value, realm: &Realm) -> RuntimeResult<()> {
        let key = ops::to_key(realm, receiver, key)?;
        if key.is_index() {
            return ops::set(realm, receiver, &key, value, self.strict);
        }
        match self
            .keyed
            .get_or_create(&key, || PropertySetCache::new(key.clone(), self.strict, &self.config))
        {
            Some(cache) => cache.set(receiver, value, realm),
            None => ops::set(realm, receiver, &key, value, self.strict),
        }
    }

    fn write_index(
        &self,
        entry: &ElementEntry,
        receiver: &Value,
        index: u32,
        value: &Value,
        realm: &Realm,
    ) -> Applied<()> {
        let generic = || ops::set(realm, receiver, &PropertyKey::Index(index), value.clone(), self.strict);
        let Some(guard) = entry.guard() else {
            return Applied::Done(generic());
        };
        if !guard.matches(receiver) {
            return Applied::Skip;
        }
        let (ElementGuard::ArrayClass(kind), Value::Object(object)) = (guard, receiver) else {
            return Applied::Done(generic());
        };
        if let ArrayKind::Typed(_) = kind {
            let Some(view) = object.typed_view() else {
                return Applied::Skip;
            };
            let written = realm
                .coercion()
                .to_number(realm, value)
                .and_then(|number| view.set(index, number));
            return Applied::Done(written);
        }
        if kind.is_constant() {
            return Applied::Done(generic());
        }
        if object.write_element_in_place(kind, index, value, false) {
            return Applied::Done(Ok(()));
        }
        // Filling a hole or appending consults the prototype chain, which is
        // known to be empty of elements while the assumption holds.
        if realm.no_prototype_elements().is_valid() && object.write_element_in_place(kind, index, value, true) {
            return Applied::Done(Ok(()));
        }
        Applied::Done(generic())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::ReadElementCache;
    use strata_runtime::array::{ElementKind, ElementStore, TypedKind};
    use strata_runtime::{OwnProperty, PropertyFlags};

    fn read(realm: &Realm, recv: &Value, index: i32) -> Value {
        ReadElementCache::new(realm.config())
            .read(recv, &Value::Int(index), realm)
            .unwrap()
    }

    // -------------------------------------------------------------------------
    // Dense Stores
    // -------------------------------------------------------------------------

    #[test]
    fn test_write_in_bounds_and_append() {
        let realm = Realm::new();
        let cache = WriteElementCache::new(false, realm.config());
        let arr = realm.new_array(vec![Value::Int(1), Value::Int(2)]);
        let recv = Value::Object(Arc::clone(&arr));
        cache.write(&recv, &Value::Int(0), Value::Int(7), &realm).unwrap();
        cache.write(&recv, &Value::Int(1), Value::Int(8), &realm).unwrap();
        cache.write(&recv, &Value::Int(2), Value::Int(9), &realm).unwrap();
        assert_eq!(arr.element_len(), 3);
        assert_eq!(read(&realm, &recv, 2), Value::Int(9));
        assert_eq!(arr.array_kind(), ArrayKind::Writable(ElementKind::Int));
        assert_eq!(cache.state(), CacheState::Monomorphic);
        assert_eq!(cache.stats().hits, 2);
    }

    #[test]
    fn test_write_widens_representation() {
        let realm = Realm::new();
        let cache = WriteElementCache::new(false, realm.config());
        let arr = realm.new_array(vec![Value::Int(1), Value::Int(2)]);
        let recv = Value::Object(Arc::clone(&arr));
        cache.write(&recv, &Value::Int(0), Value::Int(3), &realm).unwrap();
        cache.write(&recv, &Value::Int(1), Value::Double(2.5), &realm).unwrap();
        assert_eq!(arr.array_kind(), ArrayKind::Writable(ElementKind::Double));
        cache.write(&recv, &Value::Int(0), Value::string("s"), &realm).unwrap();
        assert_eq!(arr.array_kind(), ArrayKind::Writable(ElementKind::Object));
        assert_eq!(read(&realm, &recv, 0), Value::string("s"));
        assert_eq!(read(&realm, &recv, 1), Value::Double(2.5));
    }

    #[test]
    fn test_write_far_goes_sparse() {
        let realm = Realm::new();
        let cache = WriteElementCache::new(false, realm.config());
        let arr = realm.new_array(vec![Value::Int(1)]);
        let recv = Value::Object(Arc::clone(&arr));
        let far = realm.config().sparse_gap_threshold as i32 + 10;
        cache.write(&recv, &Value::Int(far), Value::Int(5), &realm).unwrap();
        assert_eq!(arr.array_kind(), ArrayKind::Sparse);
        assert_eq!(arr.element_len(), far as u32 + 1);
        assert_eq!(read(&realm, &recv, far), Value::Int(5));
    }

    #[test]
    fn test_hole_fill_respects_prototype_setter() {
        let realm = Realm::new();
        let cache = WriteElementCache::new(false, realm.config());
        let arr = realm.new_array_from_store(ElementStore::from_slots(vec![Some(Value::Int(1)), None]));
        let recv = Value::Object(Arc::clone(&arr));
        let setter = realm.new_native_function(false, |_, _, _| Ok(Value::Undefined));
        realm
            .array_prototype()
            .define_own_property(
                PropertyKey::Index(1),
                OwnProperty::accessor(None, Some(Value::Object(setter)), PropertyFlags::CONFIGURABLE),
                &realm,
            )
            .unwrap();
        assert!(!realm.no_prototype_elements().is_valid());
        cache.write(&recv, &Value::Int(1), Value::Int(2), &realm).unwrap();
        // The inherited setter swallowed the write.
        assert!(!arr.has_own_property(&PropertyKey::Index(1)));
    }

    #[test]
    fn test_frozen_array_rejects() {
        let realm = Realm::new();
        let arr = realm.new_array(vec![Value::Int(1)]);
        arr.freeze(&realm);
        let recv = Value::Object(Arc::clone(&arr));
        let sloppy = WriteElementCache::new(false, realm.config());
        sloppy.write(&recv, &Value::Int(0), Value::Int(2), &realm).unwrap();
        assert_eq!(read(&realm, &recv, 0), Value::Int(1));
        let strict = WriteElementCache::new(true, realm.config());
        let err = strict.write(&recv, &Value::Int(0), Value::Int(2), &realm).unwrap_err();
        assert!(err.is_type_error());
    }

    // -------------------------------------------------------------------------
    // Typed Arrays
    // -------------------------------------------------------------------------

    #[test]
    fn test_typed_write_and_out_of_range() {
        let realm = Realm::new();
        let cache = WriteElementCache::new(true, realm.config());
        let typed = realm.new_typed_array(TypedKind::Int8, 2);
        let recv = Value::Object(Arc::clone(&typed));
        cache.write(&recv, &Value::Int(0), Value::Int(200), &realm).unwrap();
        cache.write(&recv, &Value::Int(5), Value::Int(1), &realm).unwrap();
        assert_eq!(read(&realm, &recv, 0), Value::Int(-56));
        assert_eq!(typed.element_len(), 2);
    }

    #[test]
    fn test_typed_write_detached_throws() {
        let realm = Realm::new();
        let cache = WriteElementCache::new(false, realm.config());
        let typed = realm.new_typed_array(TypedKind::Float32, 1);
        let recv = Value::Object(Arc::clone(&typed));
        cache.write(&recv, &Value::Int(0), Value::Double(1.0), &realm).unwrap();
        typed.typed_view().unwrap().buffer().detach();
        let err = cache.write(&recv, &Value::Int(0), Value::Double(1.0), &realm).unwrap_err();
        assert!(err.is_type_error());
    }

    // -------------------------------------------------------------------------
    // Named Keys
    // -------------------------------------------------------------------------

    #[test]
    fn test_named_key_uses_property_cache() {
        let realm = Realm::new();
        let cache = WriteElementCache::new(false, realm.config());
        let obj = realm.new_object();
        let recv = Value::Object(Arc::clone(&obj));
        cache.write(&recv, &Value::string("x"), Value::Int(1), &realm).unwrap();
        cache.write(&recv, &Value::string("x"), Value::Int(2), &realm).unwrap();
        assert_eq!(cache.keyed_len(), 1);
        assert_eq!(
            ops::get_value(&realm, &recv, &PropertyKey::from_name("x")).unwrap(),
            Value::Int(2)
        );
    }

    #[test]
    fn test_string_receiver_strict() {
        let realm = Realm::new();
        let cache = WriteElementCache::new(true, realm.config());
        let err = cache
            .write(&Value::string("abc"), &Value::Int(0), Value::string("z"), &realm)
            .unwrap_err();
        assert!(err.is_type_error());
    }
}
