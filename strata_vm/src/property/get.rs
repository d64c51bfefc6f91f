//! Property get cache.
//!
//! A [`PropertyGetCache`] serves `receiver.key` for one call site. The absent
//! policy is fixed when the site is created: ordinary reads produce
//! `undefined`, required reads (unresolved globals) throw a
//! `ReferenceError`, and opted-in sites call the receiver's
//! `__noSuchProperty__` hook.

use super::chain::{Applied, CacheChain, CacheState, CacheStats, ChainEntry};
use super::resolve::{Resolution, resolve};
use super::{TypeFeedback, Typed, TypedSlot};
use crate::receiver::{CheckOutcome, ClassGuard, ReceiverCheck};
use std::any::TypeId;
use std::sync::Arc;
use strata_core::RuntimeConfig;
use strata_core::assumption::AssumptionToken;
use strata_runtime::interop::{HostMember, host_class_of};
use strata_runtime::key::names;
use strata_runtime::object::{Location, ObjectKind, ObjectRef, Property, Shape};
use strata_runtime::ops::{self, AbsentPolicy};
use strata_runtime::{PropertyKey, Realm, RuntimeError, RuntimeResult, Value};

// =============================================================================
// Entry Kinds
// =============================================================================

/// How an accepted receiver is read.
#[derive(Debug, Clone)]
pub enum GetKind {
    /// Primitive location on the holder.
    TypedLocation { shape: Arc<Shape>, location: Location },
    /// Object location on the holder.
    GenericLocation { shape: Arc<Shape>, location: Location },
    /// Accessor on the holder; the getter runs with the receiver as `this`.
    Accessor { shape: Arc<Shape>, location: Location },
    /// Non-writable, non-configurable value on a fixed holder.
    FinalConstant {
        value: Value,
        shape: Arc<Shape>,
        location: Location,
    },
    /// Value that has not been overwritten since it was stored.
    AssumedFinal {
        value: Value,
        finality: AssumptionToken,
    },
    AbsentUndefined,
    AbsentReferenceError,
    AbsentNoSuchProperty,
    /// Virtual `length` of an array or typed array.
    ArrayLength,
    /// A function's `prototype`, created on first read.
    ClassPrototype { shape: Arc<Shape>, location: Location },
    StringLength,
    Proxy,
    Foreign,
    /// Member of a host class, found after the prototype chain.
    HostMember { class: TypeId, member: HostMember },
    /// Classified receiver whose lookup is not cacheable.
    Dictionary,
    /// Every receiver; megamorphic state.
    Generic,
}

/// One get cache entry.
#[derive(Debug, Clone)]
pub struct GetEntry {
    check: Option<ReceiverCheck>,
    kind: GetKind,
}

impl GetEntry {
    /// The receiver check; `None` accepts every receiver.
    pub fn check(&self) -> Option<&ReceiverCheck> {
        self.check.as_ref()
    }

    /// The entry kind.
    pub fn kind(&self) -> &GetKind {
        &self.kind
    }

    fn new(check: ReceiverCheck, kind: GetKind) -> Self {
        Self {
            check: Some(check),
            kind,
        }
    }
}

impl ChainEntry for GetEntry {
    fn generic() -> Self {
        Self {
            check: None,
            kind: GetKind::Generic,
        }
    }

    fn is_stale(&self) -> bool {
        if let GetKind::AssumedFinal { finality, .. } = &self.kind {
            if !finality.holds() {
                return true;
            }
        }
        self.check.as_ref().is_some_and(ReceiverCheck::is_stale)
    }
}

// =============================================================================
// Property Get Cache
// =============================================================================

/// Inline cache for reading one named property.
#[derive(Debug)]
pub struct PropertyGetCache {
    key: PropertyKey,
    policy: AbsentPolicy,
    chain: CacheChain<GetEntry>,
    feedback: TypeFeedback,
}

impl PropertyGetCache {
    /// A site reading `key` with `undefined` for absent properties.
    pub fn new(key: PropertyKey, config: &RuntimeConfig) -> Self {
        Self::with_policy(key, AbsentPolicy::Undefined, config)
    }

    /// A site reading `key` with an explicit absent policy.
    pub fn with_policy(key: PropertyKey, policy: AbsentPolicy, config: &RuntimeConfig) -> Self {
        Self {
            key,
            policy,
            chain: CacheChain::new(config.property_cache_limit),
            feedback: TypeFeedback::new(),
        }
    }

    /// The property key.
    #[inline]
    pub fn key(&self) -> &PropertyKey {
        &self.key
    }

    /// The absent policy.
    #[inline]
    pub fn policy(&self) -> AbsentPolicy {
        self.policy
    }

    /// Current cache state.
    #[inline]
    pub fn state(&self) -> CacheState {
        self.chain.state()
    }

    /// Hit/miss counters.
    pub fn stats(&self) -> CacheStats {
        self.chain.counters().snapshot()
    }

    /// Snapshot of the entries, newest first.
    pub fn entries(&self) -> Arc<[GetEntry]> {
        self.chain.snapshot()
    }

    /// Collapse to the generic entry.
    pub fn make_megamorphic(&self) {
        self.chain.make_megamorphic();
    }

    /// Read the property.
    pub fn get(&self, receiver: &Value, realm: &Realm) -> RuntimeResult<Value> {
        if let Some(result) = self.chain.dispatch(|entry| self.apply(entry, receiver, realm)) {
            return result;
        }
        if let Some(entry) = self.specialize(receiver, realm) {
            self.chain.install(entry);
            // Typed reads are retried once per re-specialization.
            self.feedback.reset();
        }
        ops::get_with_policy(realm, receiver, &self.key, self.policy)
    }

    // -------------------------------------------------------------------------
    // Typed reads
    // -------------------------------------------------------------------------

    fn typed<T>(
        &self,
        slot: TypedSlot,
        receiver: &Value,
        realm: &Realm,
        exact: impl FnOnce(&Value) -> Option<T>,
    ) -> RuntimeResult<Typed<T>> {
        let value = self.get(receiver, realm)?;
        if !self.feedback.is_enabled(slot) {
            return Ok(Typed::Mismatch(value));
        }
        match exact(&value) {
            Some(v) => Ok(Typed::Exact(v)),
            None => {
                self.feedback.record_mismatch(slot);
                Ok(Typed::Mismatch(value))
            }
        }
    }

    /// Read an `int`.
    pub fn get_int(&self, receiver: &Value, realm: &Realm) -> RuntimeResult<Typed<i32>> {
        self.typed(TypedSlot::Int, receiver, realm, |v| match v {
            Value::Int(i) => Some(*i),
            _ => None,
        })
    }

    /// Read a `double`. Integers are exact doubles.
    pub fn get_double(&self, receiver: &Value, realm: &Realm) -> RuntimeResult<Typed<f64>> {
        self.typed(TypedSlot::Double, receiver, realm, |v| match v {
            Value::Double(d) => Some(*d),
            Value::Int(i) => Some(f64::from(*i)),
            _ => None,
        })
    }

    /// Read a `boolean`.
    pub fn get_boolean(&self, receiver: &Value, realm: &Realm) -> RuntimeResult<Typed<bool>> {
        self.typed(TypedSlot::Boolean, receiver, realm, |v| match v {
            Value::Boolean(b) => Some(*b),
            _ => None,
        })
    }

    /// Read a `long`. Integers are exact longs.
    pub fn get_long(&self, receiver: &Value, realm: &Realm) -> RuntimeResult<Typed<i64>> {
        self.typed(TypedSlot::Long, receiver, realm, |v| match v {
            Value::Long(l) => Some(*l),
            Value::Int(i) => Some(i64::from(*i)),
            _ => None,
        })
    }

    // -------------------------------------------------------------------------
    // Entry application
    // -------------------------------------------------------------------------

    fn apply(&self, entry: &GetEntry, receiver: &Value, realm: &Realm) -> Applied<Value> {
        let holder = match &entry.check {
            None => None,
            Some(check) => match check.accept(receiver) {
                CheckOutcome::Accept(holder) => holder,
                CheckOutcome::Reject => return Applied::Skip,
                CheckOutcome::Invalidated => return Applied::Stale,
            },
        };

        match &entry.kind {
            GetKind::TypedLocation { shape, location } => {
                let Some(target) = holder else {
                    return Applied::Skip;
                };
                match target.read_bits(shape, *location) {
                    Some(bits) => Applied::Done(Ok(location.kind().decode(bits))),
                    None => Applied::Skip,
                }
            }
            GetKind::GenericLocation { shape, location }
            | GetKind::ClassPrototype { shape, location } => {
                let Some(target) = holder else {
                    return Applied::Skip;
                };
                match target.read_data(shape, *location, realm) {
                    Some(value) => Applied::Done(Ok(value)),
                    None => Applied::Skip,
                }
            }
            GetKind::Accessor { shape, location } => {
                let Some(target) = holder else {
                    return Applied::Skip;
                };
                match target.read_accessor(shape, *location) {
                    Some(pair) => Applied::Done(ops::call_getter(realm, pair.getter.as_ref(), receiver)),
                    None => Applied::Skip,
                }
            }
            GetKind::FinalConstant {
                value,
                shape,
                location,
            } => {
                debug_assert!(
                    holder
                        .and_then(|h| h.read_data(shape, *location, realm))
                        .is_none_or(|current| current.same_value_zero(value)),
                    "final property '{}' changed",
                    self.key
                );
                Applied::Done(Ok(value.clone()))
            }
            GetKind::AssumedFinal { value, finality } => {
                if finality.holds() {
                    Applied::Done(Ok(value.clone()))
                } else {
                    Applied::Stale
                }
            }
            GetKind::AbsentUndefined => Applied::Done(Ok(Value::Undefined)),
            GetKind::AbsentReferenceError => Applied::Done(Err(RuntimeError::reference_error(
                format!("{} is not defined", self.key),
            ))),
            GetKind::AbsentNoSuchProperty => Applied::Done(ops::absent_value(
                realm,
                receiver,
                &self.key,
                AbsentPolicy::NoSuchProperty,
            )),
            GetKind::ArrayLength => match receiver.as_object() {
                Some(array) => Applied::Done(Ok(Value::number(f64::from(array.element_len())))),
                None => Applied::Skip,
            },
            GetKind::StringLength => match receiver.as_string() {
                Some(s) => Applied::Done(Ok(Value::number(s.len() as f64))),
                None => Applied::Skip,
            },
            GetKind::Proxy => match receiver.as_object().and_then(|o| o.proxy()) {
                Some(proxy) => Applied::Done(
                    proxy
                        .handler()
                        .get(realm, proxy.target(), &self.key, receiver),
                ),
                None => Applied::Skip,
            },
            GetKind::Foreign => match receiver.as_object().and_then(|o| o.foreign()) {
                Some(foreign) => Applied::Done(self.read_foreign(foreign.as_ref(), receiver, realm)),
                None => Applied::Skip,
            },
            GetKind::HostMember { class, member } => {
                let Some(object) = receiver.as_object() else {
                    return Applied::Skip;
                };
                match object.host() {
                    Some(host) if host_class_of(host.as_ref()) == *class => {
                        Applied::Done(ops::read_host_member(realm, object, member))
                    }
                    _ => Applied::Skip,
                }
            }
            GetKind::Dictionary | GetKind::Generic => Applied::Done(ops::get_with_policy(
                realm,
                receiver,
                &self.key,
                self.policy,
            )),
        }
    }

    fn read_foreign(
        &self,
        foreign: &dyn strata_runtime::interop::ForeignObject,
        receiver: &Value,
        realm: &Realm,
    ) -> RuntimeResult<Value> {
        if realm.config().foreign_interop {
            if let Some(value) = foreign.read(&self.key)? {
                return Ok(value);
            }
        }
        ops::absent_value(realm, receiver, &self.key, self.policy)
    }

    // -------------------------------------------------------------------------
    // Specialization
    // -------------------------------------------------------------------------

    fn absent_kind(&self) -> GetKind {
        match self.policy {
            AbsentPolicy::Undefined => GetKind::AbsentUndefined,
            AbsentPolicy::ReferenceError => GetKind::AbsentReferenceError,
            AbsentPolicy::NoSuchProperty => GetKind::AbsentNoSuchProperty,
        }
    }

    /// Build an entry for `receiver`, or `None` if no check applies.
    fn specialize(&self, receiver: &Value, realm: &Realm) -> Option<GetEntry> {
        if self.key.is_index() {
            return None;
        }
        match receiver {
            Value::String(_) if &self.key == names::length() => {
                return Some(GetEntry::new(
                    ReceiverCheck::Class(ClassGuard::String),
                    GetKind::StringLength,
                ));
            }
            Value::Object(object) => match object.kind() {
                ObjectKind::Proxy(_) => {
                    return Some(GetEntry::new(ReceiverCheck::Class(ClassGuard::Proxy), GetKind::Proxy));
                }
                ObjectKind::Foreign(_) => {
                    return Some(GetEntry::new(
                        ReceiverCheck::Class(ClassGuard::Foreign),
                        GetKind::Foreign,
                    ));
                }
                _ if &self.key == names::length() && object.flavor().has_virtual_length() => {
                    let shape = object.ensure_current_shape(realm);
                    return Some(GetEntry::new(ReceiverCheck::Shape(shape), GetKind::ArrayLength));
                }
                _ => {}
            },
            _ => {}
        }

        let resolution = resolve(realm, receiver, &self.key);
        let fixed = resolution.holder_is_fixed();
        match resolution {
            Resolution::Own {
                check,
                shape,
                property,
                ..
            } => {
                let target = receiver.as_object()?;
                let kind = self.located_kind(target, shape, &property, fixed, realm);
                Some(GetEntry::new(check, kind))
            }
            Resolution::Inherited {
                check,
                holder,
                shape,
                property,
            } => {
                let kind = self.located_kind(&holder, shape, &property, fixed, realm);
                Some(GetEntry::new(check, kind))
            }
            Resolution::Absent { check } => {
                let host = receiver.as_object().filter(|o| o.host().is_some());
                let kind = match host {
                    Some(object) if realm.config().host_interop => {
                        match (ops::resolve_host_member(realm, object, &self.key), object.host()) {
                            (Some(member), Some(h)) => GetKind::HostMember {
                                class: host_class_of(h.as_ref()),
                                member,
                            },
                            _ => GetKind::Dictionary,
                        }
                    }
                    _ => self.absent_kind(),
                };
                Some(GetEntry::new(check, kind))
            }
            Resolution::Slow { check } => Some(GetEntry::new(check, GetKind::Dictionary)),
            Resolution::Unguarded => None,
        }
    }

    fn located_kind(
        &self,
        target: &ObjectRef,
        shape: Arc<Shape>,
        property: &Property,
        fixed: bool,
        realm: &Realm,
    ) -> GetKind {
        let location = property.location();
        if property.is_accessor() {
            return GetKind::Accessor { shape, location };
        }
        if &self.key == names::prototype() && target.is_callable() {
            return GetKind::ClassPrototype { shape, location };
        }
        if fixed && location.is_final() {
            if let Some(value) = target.read_data(&shape, location, realm) {
                return GetKind::FinalConstant {
                    value,
                    shape,
                    location,
                };
            }
        } else if fixed && realm.config().assumed_final_locations && property.assumed_final() {
            let finality = AssumptionToken::capture(property.finality());
            if let Some(value) = target.read_data(&shape, location, realm) {
                if finality.holds() {
                    return GetKind::AssumedFinal { value, finality };
                }
            }
        }
        if location.is_primitive() {
            GetKind::TypedLocation { shape, location }
        } else {
            GetKind::GenericLocation { shape, location }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_runtime::object::{OwnProperty, PropertyFlags};

    fn key(s: &str) -> PropertyKey {
        PropertyKey::from_name(s)
    }

    fn object_with(realm: &Realm, name: &str, value: Value) -> ObjectRef {
        let obj = realm.new_object();
        obj.set_own_value(&key(name), value, realm).unwrap();
        obj
    }

    // -------------------------------------------------------------------------
    // State machine
    // -------------------------------------------------------------------------

    #[test]
    fn test_get_monomorphic() {
        let realm = Realm::new();
        let cache = PropertyGetCache::new(key("x"), realm.config());
        let obj = Value::Object(object_with(&realm, "x", Value::Int(7)));
        assert_eq!(cache.state(), CacheState::Uninitialized);
        assert_eq!(cache.get(&obj, &realm).unwrap(), Value::Int(7));
        assert_eq!(cache.state(), CacheState::Monomorphic);
        assert_eq!(cache.get(&obj, &realm).unwrap(), Value::Int(7));
        assert!(matches!(cache.entries()[0].kind(), GetKind::TypedLocation { .. }));
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (1, 1));
    }

    #[test]
    fn test_get_polymorphic() {
        let realm = Realm::new();
        let cache = PropertyGetCache::new(key("x"), realm.config());
        let a = Value::Object(object_with(&realm, "x", Value::Int(1)));
        let b = object_with(&realm, "y", Value::Int(0));
        b.set_own_value(&key("x"), Value::string("b"), &realm).unwrap();
        let b = Value::Object(b);
        cache.get(&a, &realm).unwrap();
        cache.get(&b, &realm).unwrap();
        assert_eq!(cache.state(), CacheState::Polymorphic);
        assert_eq!(cache.get(&a, &realm).unwrap(), Value::Int(1));
        assert_eq!(cache.get(&b, &realm).unwrap(), Value::string("b"));
    }

    #[test]
    fn test_get_megamorphic_collapse() {
        let config = RuntimeConfig {
            property_cache_limit: 2,
            ..Default::default()
        };
        let realm = Realm::with_config(config).unwrap();
        let cache = PropertyGetCache::new(key("x"), realm.config());
        for (i, extra) in ["a", "b", "c", "d"].iter().enumerate() {
            let obj = object_with(&realm, extra, Value::Int(0));
            obj.set_own_value(&key("x"), Value::Int(i as i32), &realm).unwrap();
            assert_eq!(cache.get(&Value::Object(obj), &realm).unwrap(), Value::Int(i as i32));
        }
        assert_eq!(cache.state(), CacheState::Megamorphic);
        assert_eq!(cache.entries().len(), 1);
    }

    #[test]
    fn test_get_evicts_after_generalization() {
        let realm = Realm::new();
        let cache = PropertyGetCache::new(key("x"), realm.config());
        let obj = object_with(&realm, "x", Value::Int(1));
        let recv = Value::Object(obj.clone());
        cache.get(&recv, &realm).unwrap();
        obj.set_own_value(&key("x"), Value::Double(2.5), &realm).unwrap();
        assert_eq!(cache.get(&recv, &realm).unwrap(), Value::Double(2.5));
        assert_eq!(cache.get(&recv, &realm).unwrap(), Value::Double(2.5));
        assert_eq!(cache.state(), CacheState::Monomorphic);
    }

    // -------------------------------------------------------------------------
    // Entry kinds
    // -------------------------------------------------------------------------

    #[test]
    fn test_get_inherited_tracks_prototype_writes() {
        let realm = Realm::new();
        let proto = object_with(&realm, "m", Value::Int(1));
        let obj = Value::Object(realm.new_object_with_proto(Some(&proto)));
        let cache = PropertyGetCache::new(key("m"), realm.config());
        assert_eq!(cache.get(&obj, &realm).unwrap(), Value::Int(1));
        assert!(matches!(cache.entries()[0].kind(), GetKind::AssumedFinal { .. }));
        proto.set_own_value(&key("m"), Value::Int(2), &realm).unwrap();
        assert_eq!(cache.get(&obj, &realm).unwrap(), Value::Int(2));
        assert_eq!(cache.get(&obj, &realm).unwrap(), Value::Int(2));
        assert!(matches!(cache.entries()[0].kind(), GetKind::TypedLocation { .. }));
    }

    #[test]
    fn test_get_shadowing_invalidates() {
        let realm = Realm::new();
        let proto = object_with(&realm, "m", Value::Int(1));
        let child = realm.new_object_with_proto(Some(&proto));
        let grandchild = Value::Object(realm.new_object_with_proto(Some(&child)));
        let cache = PropertyGetCache::new(key("m"), realm.config());
        assert_eq!(cache.get(&grandchild, &realm).unwrap(), Value::Int(1));
        child.set_own_value(&key("m"), Value::Int(5), &realm).unwrap();
        assert_eq!(cache.get(&grandchild, &realm).unwrap(), Value::Int(5));
    }

    #[test]
    fn test_get_final_constant_on_prototype() {
        let realm = Realm::new();
        let proto = realm.new_object();
        let flags = PropertyFlags::DATA | PropertyFlags::ENUMERABLE;
        proto
            .define_own_property(key("k"), OwnProperty::data(Value::Int(3), flags), &realm)
            .unwrap();
        let obj = Value::Object(realm.new_object_with_proto(Some(&proto)));
        let cache = PropertyGetCache::new(key("k"), realm.config());
        assert_eq!(cache.get(&obj, &realm).unwrap(), Value::Int(3));
        assert!(matches!(cache.entries()[0].kind(), GetKind::FinalConstant { .. }));
        assert_eq!(cache.get(&obj, &realm).unwrap(), Value::Int(3));
    }

    #[test]
    fn test_get_accessor() {
        let realm = Realm::new();
        let getter = realm.new_native_function(false, |_, this, _| {
            Ok(Value::Boolean(matches!(this, Value::Object(_))))
        });
        let obj = realm.new_object();
        obj.define_own_property(
            key("g"),
            OwnProperty::accessor(Some(Value::Object(getter)), None, PropertyFlags::accessor()),
            &realm,
        )
        .unwrap();
        let cache = PropertyGetCache::new(key("g"), realm.config());
        let recv = Value::Object(obj);
        assert_eq!(cache.get(&recv, &realm).unwrap(), Value::Boolean(true));
        assert_eq!(cache.get(&recv, &realm).unwrap(), Value::Boolean(true));
        assert!(matches!(cache.entries()[0].kind(), GetKind::Accessor { .. }));
    }

    #[test]
    fn test_get_absent_policies() {
        let realm = Realm::new();
        let obj = Value::Object(realm.new_object());
        let plain = PropertyGetCache::new(key("nope"), realm.config());
        assert_eq!(plain.get(&obj, &realm).unwrap(), Value::Undefined);
        assert_eq!(plain.get(&obj, &realm).unwrap(), Value::Undefined);
        assert!(matches!(plain.entries()[0].kind(), GetKind::AbsentUndefined));

        let required =
            PropertyGetCache::with_policy(key("nope"), AbsentPolicy::ReferenceError, realm.config());
        let global = Value::Object(realm.global().clone());
        assert!(required.get(&global, &realm).unwrap_err().is_reference_error());
        assert!(required.get(&global, &realm).unwrap_err().is_reference_error());
    }

    #[test]
    fn test_get_absent_then_added() {
        let realm = Realm::new();
        let proto = realm.new_object();
        let obj = Value::Object(realm.new_object_with_proto(Some(&proto)));
        let cache = PropertyGetCache::new(key("late"), realm.config());
        assert_eq!(cache.get(&obj, &realm).unwrap(), Value::Undefined);
        proto.set_own_value(&key("late"), Value::Int(9), &realm).unwrap();
        assert_eq!(cache.get(&obj, &realm).unwrap(), Value::Int(9));
    }

    #[test]
    fn test_get_lengths() {
        let realm = Realm::new();
        let arr = Value::Object(realm.new_array(vec![Value::Int(1), Value::Int(2)]));
        let cache = PropertyGetCache::new(key("length"), realm.config());
        assert_eq!(cache.get(&arr, &realm).unwrap(), Value::Int(2));
        assert_eq!(cache.get(&arr, &realm).unwrap(), Value::Int(2));
        assert_eq!(cache.get(&Value::string("abc"), &realm).unwrap(), Value::Int(3));
        assert_eq!(cache.get(&Value::string("abcd"), &realm).unwrap(), Value::Int(4));
        assert!(cache.entries().iter().any(|e| matches!(e.kind(), GetKind::StringLength)));
        let wide = Value::string(&"x".repeat(70_000));
        assert_eq!(
            cache.get(&wide, &realm).unwrap(),
            ops::get_value(&realm, &wide, &key("length")).unwrap()
        );
    }

    #[test]
    fn test_get_class_prototype() {
        let realm = Realm::new();
        let ctor = Value::Object(realm.new_native_function(true, |_, _, _| Ok(Value::Undefined)));
        let cache = PropertyGetCache::new(key("prototype"), realm.config());
        let first = cache.get(&ctor, &realm).unwrap();
        let second = cache.get(&ctor, &realm).unwrap();
        assert!(matches!(first, Value::Object(_)));
        assert_eq!(first, second);
        assert!(matches!(cache.entries()[0].kind(), GetKind::ClassPrototype { .. }));
    }

    #[test]
    fn test_get_null_receiver() {
        let realm = Realm::new();
        let cache = PropertyGetCache::new(key("x"), realm.config());
        assert!(cache.get(&Value::Null, &realm).unwrap_err().is_type_error());
        assert_eq!(cache.state(), CacheState::Uninitialized);
    }

    // -------------------------------------------------------------------------
    // Typed reads
    // -------------------------------------------------------------------------

    #[test]
    fn test_typed_mismatch_disables_site() {
        let realm = Realm::new();
        let cache = PropertyGetCache::new(key("x"), realm.config());
        let int_obj = Value::Object(object_with(&realm, "x", Value::Int(1)));
        let padded = object_with(&realm, "pad", Value::Int(0));
        padded.set_own_value(&key("x"), Value::string("s"), &realm).unwrap();
        let str_obj = Value::Object(padded);
        assert_eq!(cache.get_int(&int_obj, &realm).unwrap(), Typed::Exact(1));
        assert!(cache.get_int(&str_obj, &realm).unwrap().is_mismatch());
        assert_eq!(
            cache.get_int(&int_obj, &realm).unwrap(),
            Typed::Mismatch(Value::Int(1))
        );
        assert_eq!(cache.get_double(&int_obj, &realm).unwrap(), Typed::Exact(1.0));
    }

    #[test]
    fn test_typed_reads_resume_after_respecialization() {
        let realm = Realm::new();
        let cache = PropertyGetCache::new(key("x"), realm.config());
        let str_obj = Value::Object(object_with(&realm, "x", Value::string("s")));
        assert!(cache.get_int(&str_obj, &realm).unwrap().is_mismatch());

        let other = object_with(&realm, "pad", Value::Int(0));
        other.set_own_value(&key("x"), Value::Int(7), &realm).unwrap();
        let int_obj = Value::Object(other);
        assert_eq!(cache.get_int(&int_obj, &realm).unwrap(), Typed::Exact(7));
        assert_eq!(cache.get_int(&int_obj, &realm).unwrap(), Typed::Exact(7));
        assert_eq!(cache.entries().len(), 2);
    }
}
