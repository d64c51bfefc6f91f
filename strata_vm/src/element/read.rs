//! Element read cache.

use super::{ElementEntry, ElementGuard, KeyedCaches, fast_index};
use crate::property::chain::{Applied, CacheChain, CacheState, CacheStats};
use crate::property::PropertyGetCache;
use std::sync::Arc;
use strata_core::RuntimeConfig;
use strata_runtime::array::{ArrayKind, ElementRead};
use strata_runtime::ops;
use strata_runtime::{PropertyKey, Realm, RuntimeResult, Value};

/// Inline cache for `receiver[key]` reads.
#[derive(Debug)]
pub struct ReadElementCache {
    chain: CacheChain<ElementEntry>,
    keyed: KeyedCaches<PropertyGetCache>,
    config: RuntimeConfig,
}

impl ReadElementCache {
    pub fn new(config: &RuntimeConfig) -> Self {
        Self {
            chain: CacheChain::new(config.element_cache_limit),
            keyed: KeyedCaches::new(config.property_cache_limit),
            config: config.clone(),
        }
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

    /// Read `receiver[key]`.
    pub fn read(&self, receiver: &Value, key: &Value, realm: &Realm) -> RuntimeResult<Value> {
        let Some(index) = fast_index(key) else {
            return self.read_named(receiver, key, realm);
        };
        if let Some(result) = self.chain.dispatch(|entry| read_index(entry, receiver, index, realm)) {
            return result;
        }
        if let Some(guard) = ElementGuard::of(receiver) {
            self.chain.install(ElementEntry::new(guard));
        }
        ops::get_value(realm, receiver, &PropertyKey::Index(index))
    }

    fn read_named(&self, receiver: &Value, key: &Value, realm: &Realm) -> RuntimeResult<Value> {
        let key = ops::to_key(realm, receiver, key)?;
        if key.is_index() {
            return ops::get_value(realm, receiver, &key);
        }
        match self
            .keyed
            .get_or_create(&key, || PropertyGetCache::new(key.clone(), &self.config))
        {
            Some(cache) => cache.get(receiver, realm),
            None => ops::get_value(realm, receiver, &key),
        }
    }
}

fn read_index(entry: &ElementEntry, receiver: &Value, index: u32, realm: &Realm) -> Applied<Value> {
    let Some(guard) = entry.guard() else {
        return Applied::Done(ops::get_value(realm, receiver, &PropertyKey::Index(index)));
    };
    if !guard.matches(receiver) {
        return Applied::Skip;
    }
    match (guard, receiver) {
        (ElementGuard::ArrayClass(kind), Value::Object(object)) => match object.read_element(index) {
            ElementRead::Value(value) => Applied::Done(Ok(value)),
            ElementRead::Accessor(pair) => Applied::Done(ops::call_getter(realm, pair.getter.as_ref(), receiver)),
            // Typed arrays own every index; nothing is inherited.
            ElementRead::Hole | ElementRead::OutOfBounds if matches!(kind, ArrayKind::Typed(_)) => {
                Applied::Done(Ok(Value::Undefined))
            }
            ElementRead::Hole | ElementRead::OutOfBounds => {
                Applied::Done(ops::get_value(realm, receiver, &PropertyKey::Index(index)))
            }
        },
        (ElementGuard::String, Value::String(s)) => match s.code_unit_at(index) {
            Some(unit) => Applied::Done(Ok(Value::String(unit))),
            None => Applied::Done(ops::get_value(realm, receiver, &PropertyKey::Index(index))),
        },
        _ => Applied::Done(ops::get_value(realm, receiver, &PropertyKey::Index(index))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_runtime::array::{ElementKind, ElementStore, TypedKind};

    fn int_array(realm: &Realm, values: &[i32]) -> Value {
        Value::Object(realm.new_array(values.iter().map(|&v| Value::Int(v)).collect()))
    }

    // -------------------------------------------------------------------------
    // Index Reads
    // -------------------------------------------------------------------------

    #[test]
    fn test_read_in_bounds() {
        let realm = Realm::new();
        let cache = ReadElementCache::new(realm.config());
        let arr = int_array(&realm, &[10, 20, 30]);
        assert_eq!(cache.read(&arr, &Value::Int(1), &realm).unwrap(), Value::Int(20));
        assert_eq!(cache.read(&arr, &Value::Double(2.0), &realm).unwrap(), Value::Int(30));
        assert_eq!(cache.state(), CacheState::Monomorphic);
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_hole_reads_prototype() {
        let realm = Realm::new();
        let cache = ReadElementCache::new(realm.config());
        let arr = Value::Object(realm.new_array_from_store(ElementStore::from_slots(vec![
            Some(Value::Int(1)),
            None,
            Some(Value::Int(3)),
        ])));
        assert_eq!(cache.read(&arr, &Value::Int(1), &realm).unwrap(), Value::Undefined);
        realm
            .array_prototype()
            .set_own_value(&PropertyKey::Index(1), Value::string("proto"), &realm)
            .unwrap();
        assert_eq!(cache.read(&arr, &Value::Int(1), &realm).unwrap(), Value::string("proto"));
        assert_eq!(cache.read(&arr, &Value::Int(7), &realm).unwrap(), Value::Undefined);
    }

    #[test]
    fn test_typed_out_of_bounds_is_undefined() {
        let realm = Realm::new();
        let cache = ReadElementCache::new(realm.config());
        let typed = realm.new_typed_array(TypedKind::Float64, 2);
        typed.typed_view().unwrap().set(0, 1.5).unwrap();
        let recv = Value::Object(Arc::clone(&typed));
        assert_eq!(cache.read(&recv, &Value::Int(0), &realm).unwrap(), Value::Double(1.5));
        assert_eq!(cache.read(&recv, &Value::Int(5), &realm).unwrap(), Value::Undefined);
        typed.typed_view().unwrap().buffer().detach();
        assert_eq!(cache.read(&recv, &Value::Int(0), &realm).unwrap(), Value::Undefined);
    }

    #[test]
    fn test_string_index() {
        let realm = Realm::new();
        let cache = ReadElementCache::new(realm.config());
        let s = Value::string("abc");
        assert_eq!(cache.read(&s, &Value::Int(2), &realm).unwrap(), Value::string("c"));
        assert_eq!(cache.read(&s, &Value::Int(3), &realm).unwrap(), Value::Undefined);
        assert_eq!(cache.entries()[0].guard(), Some(ElementGuard::String));
    }

    #[test]
    fn test_representation_change_adds_entry() {
        let realm = Realm::new();
        let cache = ReadElementCache::new(realm.config());
        let arr = realm.new_array(vec![Value::Int(1), Value::Int(2)]);
        let recv = Value::Object(Arc::clone(&arr));
        cache.read(&recv, &Value::Int(0), &realm).unwrap();
        arr.set_own_value(&PropertyKey::Index(0), Value::Double(0.5), &realm).unwrap();
        assert_eq!(cache.read(&recv, &Value::Int(0), &realm).unwrap(), Value::Double(0.5));
        assert_eq!(cache.state(), CacheState::Polymorphic);
        assert_eq!(
            cache.entries()[0].guard(),
            Some(ElementGuard::ArrayClass(ArrayKind::Writable(ElementKind::Double)))
        );
    }

    #[test]
    fn test_limit_goes_generic() {
        let realm = Realm::new();
        let cache = ReadElementCache::new(realm.config());
        let receivers = [
            int_array(&realm, &[1]),
            Value::Object(realm.new_array(vec![Value::Double(0.5)])),
            Value::Object(realm.new_array(vec![Value::string("x")])),
            Value::string("s"),
            Value::Object(realm.new_typed_array(TypedKind::Uint8, 1)),
        ];
        for recv in &receivers {
            cache.read(recv, &Value::Int(0), &realm).unwrap();
        }
        assert_eq!(cache.state(), CacheState::Megamorphic);
        assert_eq!(cache.read(&receivers[0], &Value::Int(0), &realm).unwrap(), Value::Int(1));
    }

    // -------------------------------------------------------------------------
    // Named Keys
    // -------------------------------------------------------------------------

    #[test]
    fn test_named_key_uses_property_cache() {
        let realm = Realm::new();
        let cache = ReadElementCache::new(realm.config());
        let obj = realm.new_object();
        obj.set_own_value(&PropertyKey::from_name("x"), Value::Int(4), &realm).unwrap();
        let recv = Value::Object(obj);
        assert_eq!(cache.read(&recv, &Value::string("x"), &realm).unwrap(), Value::Int(4));
        assert_eq!(cache.read(&recv, &Value::string("x"), &realm).unwrap(), Value::Int(4));
        assert_eq!(cache.keyed_len(), 1);
        assert_eq!(cache.state(), CacheState::Uninitialized);
    }

    #[test]
    fn test_nullish_receiver() {
        let realm = Realm::new();
        let cache = ReadElementCache::new(realm.config());
        assert!(cache.read(&Value::Null, &Value::Int(0), &realm).unwrap_err().is_type_error());
        assert!(cache.read(&Value::Undefined, &Value::string("x"), &realm).unwrap_err().is_type_error());
    }
}
