//! Object literal construction.
//!
//! An [`ObjectLiteral`] is the static member list of one `{ ... }`
//! expression. Each evaluation creates a fresh object and applies the
//! members in declaration order. Data and accessor members carry a
//! [`DefineCache`] holding the single shape transition the member produced
//! the first time, so a literal evaluated in a loop replays a fixed sequence
//! of location writes.

use parking_lot::RwLock;
use std::sync::Arc;
use strata_core::RuntimeConfig;
use strata_runtime::object::{AccessorPair, Location, LocationKind, PropertyValue, Shape};
use strata_runtime::ops;
use strata_runtime::{ObjectRef, OwnProperty, PropertyFlags, PropertyKey, Realm, RuntimeError, RuntimeResult, Value};
use tracing::trace;

// =============================================================================
// Members
// =============================================================================

/// One statically known member of an object literal.
#[derive(Debug, Clone)]
pub enum ObjectMember {
    /// `key: value`
    Data(PropertyKey),
    /// `get key() {}` / `set key(v) {}`
    Accessor(PropertyKey),
    /// `__proto__: value`
    Proto,
    /// `...source`
    Spread,
    /// `[key]: value`
    ComputedData,
}

/// The evaluated operand of one member, in member order.
#[derive(Debug, Clone)]
pub enum MemberValue {
    /// Operand of a data, proto or spread member.
    Value(Value),
    /// Functions of an accessor member; `None` where the literal has no
    /// getter or setter for the key.
    Accessor {
        getter: Option<Value>,
        setter: Option<Value>,
    },
    /// Operand of a computed member.
    Computed { key: Value, value: Value },
}

// =============================================================================
// Define Cache
// =============================================================================

#[derive(Debug, Clone)]
struct DefineTransition {
    from: Arc<Shape>,
    to: Arc<Shape>,
    location: Location,
}

#[derive(Debug, Clone)]
enum DefineState {
    Empty,
    Transition(DefineTransition),
    Generic,
}

/// Per-member cache: one transition keyed on the object's shape before the
/// member, then generic.
#[derive(Debug)]
pub struct DefineCache {
    key: PropertyKey,
    state: RwLock<DefineState>,
}

/// Attributes of a literal accessor.
const ACCESSOR_FLAGS: PropertyFlags = PropertyFlags::ENUMERABLE.union(PropertyFlags::CONFIGURABLE);

impl DefineCache {
    pub fn new(key: PropertyKey) -> Self {
        Self {
            key,
            state: RwLock::new(DefineState::Empty),
        }
    }

    /// Whether the cache holds a transition.
    pub fn is_specialized(&self) -> bool {
        matches!(*self.state.read(), DefineState::Transition(_))
    }

    /// Whether the cache gave up on specializing.
    pub fn is_generic(&self) -> bool {
        matches!(*self.state.read(), DefineState::Generic)
    }

    /// Define a data member on a fresh literal object.
    pub fn define_data(&self, object: &ObjectRef, value: Value, realm: &Realm) -> RuntimeResult<()> {
        let kind = LocationKind::for_value(&value, realm.config().typed_locations);
        if let Some(t) = self.transition() {
            if t.to.is_valid()
                && t.location.kind() == kind
                && object.extend_shape(&t.from, &t.to, t.location, &value)
            {
                return Ok(());
            }
        }
        self.specialize(object, realm, |from| {
            realm
                .shapes()
                .add_property(from, self.key.clone(), PropertyFlags::default(), kind)
        });
        ops::define(
            realm,
            object,
            self.key.clone(),
            OwnProperty::data(value, PropertyFlags::default()),
        )
    }

    /// Define an accessor member, merging with an accessor already defined
    /// for the same key by an earlier member.
    pub fn define_accessor(
        &self,
        object: &ObjectRef,
        getter: Option<Value>,
        setter: Option<Value>,
        realm: &Realm,
    ) -> RuntimeResult<()> {
        if let Some(t) = self.transition() {
            let pair = AccessorPair::new(getter.clone(), setter.clone());
            if t.to.is_valid() && object.extend_shape_with_accessor(&t.from, &t.to, t.location, pair) {
                return Ok(());
            }
        }
        self.specialize(object, realm, |from| {
            realm
                .shapes()
                .add_property(from, self.key.clone(), ACCESSOR_FLAGS, LocationKind::Object)
        });
        define_accessor(object, &self.key, getter, setter, realm)
    }

    fn transition(&self) -> Option<DefineTransition> {
        match &*self.state.read() {
            DefineState::Transition(t) => Some(t.clone()),
            _ => None,
        }
    }

    /// Record the transition for `object`'s current shape on first use; a
    /// second shape makes the member generic. A transition whose target was
    /// obsoleted is replaced.
    fn specialize(&self, object: &ObjectRef, realm: &Realm, target: impl FnOnce(&Arc<Shape>) -> Arc<Shape>) {
        let mut state = self.state.write();
        let retry = match &*state {
            DefineState::Empty => true,
            DefineState::Transition(t) => !t.to.is_valid(),
            DefineState::Generic => false,
        };
        if !retry {
            *state = DefineState::Generic;
            return;
        }
        let from = object.ensure_current_shape(realm);
        let eligible = !self.key.is_index()
            && !from.is_dictionary()
            && from.is_extensible()
            && from.lookup(&self.key).is_none();
        if !eligible {
            *state = DefineState::Generic;
            return;
        }
        let to = target(&from);
        *state = match to.lookup(&self.key).map(|p| p.location()) {
            Some(location) => {
                trace!(key = %self.key, "literal member specialized");
                DefineState::Transition(DefineTransition { from, to, location })
            }
            None => DefineState::Generic,
        };
    }
}

// =============================================================================
// Object Literal
// =============================================================================

/// A member and its cache.
#[derive(Debug)]
struct Member {
    kind: ObjectMember,
    cache: Option<DefineCache>,
}

/// The static description of one object literal expression.
#[derive(Debug)]
pub struct ObjectLiteral {
    members: Vec<Member>,
    dictionary: bool,
}

impl ObjectLiteral {
    pub fn new(members: Vec<ObjectMember>, config: &RuntimeConfig) -> Self {
        let dictionary = members.len() > config.dictionary_object_threshold;
        let members = members
            .into_iter()
            .map(|kind| {
                let cache = match (&kind, dictionary) {
                    (ObjectMember::Data(key) | ObjectMember::Accessor(key), false) => {
                        Some(DefineCache::new(key.clone()))
                    }
                    _ => None,
                };
                Member { kind, cache }
            })
            .collect();
        Self { members, dictionary }
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Whether evaluations create dictionary-mode objects.
    pub fn is_dictionary(&self) -> bool {
        self.dictionary
    }

    /// The define cache of member `index`, if it has one.
    pub fn define_cache(&self, index: usize) -> Option<&DefineCache> {
        self.members.get(index).and_then(|m| m.cache.as_ref())
    }

    /// Evaluate the literal with the member operands `values`.
    pub fn construct(&self, values: &[MemberValue], realm: &Realm) -> RuntimeResult<ObjectRef> {
        if values.len() != self.members.len() {
            return Err(RuntimeError::type_error(format!(
                "object literal has {} members but {} operands",
                self.members.len(),
                values.len()
            )));
        }
        let object = if self.dictionary {
            realm.new_dictionary_object(Some(realm.object_prototype()))
        } else {
            realm.new_object()
        };
        for (member, value) in self.members.iter().zip(values) {
            self.apply(&object, member, value, realm)?;
        }
        Ok(object)
    }

    fn apply(&self, object: &ObjectRef, member: &Member, value: &MemberValue, realm: &Realm) -> RuntimeResult<()> {
        match (&member.kind, value) {
            (ObjectMember::Data(key), MemberValue::Value(v)) => match &member.cache {
                Some(cache) => cache.define_data(object, v.clone(), realm),
                None => ops::define(realm, object, key.clone(), OwnProperty::data(v.clone(), PropertyFlags::default())),
            },
            (ObjectMember::Accessor(key), MemberValue::Accessor { getter, setter }) => match &member.cache {
                Some(cache) => cache.define_accessor(object, getter.clone(), setter.clone(), realm),
                None => define_accessor(object, key, getter.clone(), setter.clone(), realm),
            },
            (ObjectMember::Proto, MemberValue::Value(v)) => {
                match v {
                    Value::Object(proto) => {
                        object.set_prototype(Some(Arc::clone(proto)), realm);
                    }
                    Value::Null => {
                        object.set_prototype(None, realm);
                    }
                    _ => {}
                }
                Ok(())
            }
            (ObjectMember::Spread, MemberValue::Value(source)) => copy_data_properties(object, source, realm),
            (ObjectMember::ComputedData, MemberValue::Computed { key, value }) => {
                let key = ops::to_key(realm, &Value::Object(Arc::clone(object)), key)?;
                ops::define(realm, object, key, OwnProperty::data(value.clone(), PropertyFlags::default()))
            }
            (kind, value) => Err(RuntimeError::type_error(format!(
                "object literal member {kind:?} cannot take {value:?}"
            ))),
        }
    }
}

/// Define an accessor, keeping the half of an existing accessor pair that
/// the new member does not supply.
fn define_accessor(
    object: &ObjectRef,
    key: &PropertyKey,
    getter: Option<Value>,
    setter: Option<Value>,
    realm: &Realm,
) -> RuntimeResult<()> {
    let (getter, setter) = match object.get_own_property(key, realm) {
        Some(OwnProperty {
            value: PropertyValue::Accessor(existing),
            ..
        }) => (getter.or(existing.getter), setter.or(existing.setter)),
        _ => (getter, setter),
    };
    ops::define(realm, object, key.clone(), OwnProperty::accessor(getter, setter, ACCESSOR_FLAGS))
}

/// Copy the own enumerable properties of `source` onto `target` as plain
/// data properties.
fn copy_data_properties(target: &ObjectRef, source: &Value, realm: &Realm) -> RuntimeResult<()> {
    match source {
        Value::Object(object) => {
            // Proxies and foreign objects expose no key enumeration.
            if object.proxy().is_some() || object.foreign().is_some() {
                return Ok(());
            }
            for key in object.own_keys() {
                let Some(own) = object.get_own_property(&key, realm) else {
                    continue;
                };
                if !own.flags.is_enumerable() {
                    continue;
                }
                let value = match own.value {
                    PropertyValue::Data(v) => v,
                    PropertyValue::Accessor(pair) => ops::call_getter(realm, pair.getter.as_ref(), source)?,
                };
                ops::define(realm, target, key, OwnProperty::data(value, PropertyFlags::default()))?;
            }
            Ok(())
        }
        Value::String(s) => {
            for (index, unit) in (0..s.len()).filter_map(|i| s.code_unit_at(i).map(|u| (i, u))) {
                ops::define(
                    realm,
                    target,
                    PropertyKey::Index(index),
                    OwnProperty::data(Value::String(unit), PropertyFlags::default()),
                )?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> PropertyKey {
        PropertyKey::from_name(s)
    }

    fn get(object: &ObjectRef, name: &str, realm: &Realm) -> Value {
        ops::get_value(realm, &Value::Object(Arc::clone(object)), &key(name)).unwrap()
    }

    fn point(realm: &Realm) -> ObjectLiteral {
        ObjectLiteral::new(vec![ObjectMember::Data(key("x")), ObjectMember::Data(key("y"))], realm.config())
    }

    // -------------------------------------------------------------------------
    // Data Members
    // -------------------------------------------------------------------------

    #[test]
    fn test_repeated_construction_shares_shape() {
        let realm = Realm::new();
        let literal = point(&realm);
        let values = [MemberValue::Value(Value::Int(1)), MemberValue::Value(Value::Int(2))];
        let a = literal.construct(&values, &realm).unwrap();
        let b = literal.construct(&values, &realm).unwrap();
        assert!(Arc::ptr_eq(&a.shape(), &b.shape()));
        assert!(literal.define_cache(0).unwrap().is_specialized());
        assert_eq!(get(&b, "x", &realm), Value::Int(1));
        assert_eq!(get(&b, "y", &realm), Value::Int(2));
    }

    #[test]
    fn test_literal_shape_matches_assignment() {
        let realm = Realm::new();
        let literal = point(&realm);
        let values = [MemberValue::Value(Value::Int(1)), MemberValue::Value(Value::string("s"))];
        literal.construct(&values, &realm).unwrap();
        let lit = literal.construct(&values, &realm).unwrap();
        let manual = realm.new_object();
        manual.set_own_value(&key("x"), Value::Int(5), &realm).unwrap();
        manual.set_own_value(&key("y"), Value::string("t"), &realm).unwrap();
        assert!(Arc::ptr_eq(&lit.shape(), &manual.shape()));
    }

    #[test]
    fn test_value_kind_change_still_correct() {
        let realm = Realm::new();
        let literal = point(&realm);
        literal
            .construct(&[MemberValue::Value(Value::Int(1)), MemberValue::Value(Value::Int(2))], &realm)
            .unwrap();
        let obj = literal
            .construct(&[MemberValue::Value(Value::Double(0.5)), MemberValue::Value(Value::Int(2))], &realm)
            .unwrap();
        assert_eq!(get(&obj, "x", &realm), Value::Double(0.5));
        assert!(literal.define_cache(0).unwrap().is_generic());
    }

    #[test]
    fn test_duplicate_key_last_wins() {
        let realm = Realm::new();
        let literal = ObjectLiteral::new(vec![ObjectMember::Data(key("a")), ObjectMember::Data(key("a"))], realm.config());
        let obj = literal
            .construct(&[MemberValue::Value(Value::Int(1)), MemberValue::Value(Value::Int(2))], &realm)
            .unwrap();
        assert_eq!(get(&obj, "a", &realm), Value::Int(2));
        assert_eq!(obj.own_keys().len(), 1);
    }

    #[test]
    fn test_large_literal_is_dictionary() {
        let config = RuntimeConfig {
            dictionary_object_threshold: 2,
            ..Default::default()
        };
        let realm = Realm::with_config(config).unwrap();
        let names = ["a", "b", "c"];
        let literal = ObjectLiteral::new(names.iter().map(|n| ObjectMember::Data(key(n))).collect(), realm.config());
        assert!(literal.is_dictionary());
        let values: Vec<MemberValue> = (0..3).map(|i| MemberValue::Value(Value::Int(i))).collect();
        let obj = literal.construct(&values, &realm).unwrap();
        assert!(obj.is_dictionary());
        assert_eq!(get(&obj, "c", &realm), Value::Int(2));
    }

    // -------------------------------------------------------------------------
    // Other Members
    // -------------------------------------------------------------------------

    #[test]
    fn test_accessor_pair_merges() {
        let realm = Realm::new();
        let getter = realm.new_native_function(false, |_, _, _| Ok(Value::Int(42)));
        let setter = realm.new_native_function(false, |_, _, _| Ok(Value::Undefined));
        let literal = ObjectLiteral::new(
            vec![ObjectMember::Accessor(key("v")), ObjectMember::Accessor(key("v"))],
            realm.config(),
        );
        let values = [
            MemberValue::Accessor {
                getter: Some(Value::Object(getter)),
                setter: None,
            },
            MemberValue::Accessor {
                getter: None,
                setter: Some(Value::Object(setter)),
            },
        ];
        let obj = literal.construct(&values, &realm).unwrap();
        assert_eq!(get(&obj, "v", &realm), Value::Int(42));
        match obj.get_own_property(&key("v"), &realm).map(|p| p.value) {
            Some(PropertyValue::Accessor(pair)) => assert!(pair.getter.is_some() && pair.setter.is_some()),
            other => panic!("expected accessor, got {other:?}"),
        }
    }

    #[test]
    fn test_proto_and_spread() {
        let realm = Realm::new();
        let proto = realm.new_object();
        proto.set_own_value(&key("inherited"), Value::Int(1), &realm).unwrap();
        let source = realm.new_object();
        source.set_own_value(&key("copied"), Value::Int(2), &realm).unwrap();
        source
            .define_own_property(key("hidden"), OwnProperty::data(Value::Int(3), PropertyFlags::WRITABLE), &realm)
            .unwrap();
        let literal = ObjectLiteral::new(vec![ObjectMember::Proto, ObjectMember::Spread], realm.config());
        let obj = literal
            .construct(
                &[MemberValue::Value(Value::Object(Arc::clone(&proto))), MemberValue::Value(Value::Object(source))],
                &realm,
            )
            .unwrap();
        assert_eq!(get(&obj, "inherited", &realm), Value::Int(1));
        assert_eq!(get(&obj, "copied", &realm), Value::Int(2));
        assert!(!obj.has_own_property(&key("hidden")));
    }

    #[test]
    fn test_spread_string_and_computed() {
        let realm = Realm::new();
        let literal = ObjectLiteral::new(vec![ObjectMember::Spread, ObjectMember::ComputedData], realm.config());
        let obj = literal
            .construct(
                &[
                    MemberValue::Value(Value::string("hi")),
                    MemberValue::Computed {
                        key: Value::Int(-1),
                        value: Value::Boolean(true),
                    },
                ],
                &realm,
            )
            .unwrap();
        let recv = Value::Object(Arc::clone(&obj));
        assert_eq!(ops::get_value(&realm, &recv, &PropertyKey::Index(1)).unwrap(), Value::string("i"));
        assert_eq!(get(&obj, "-1", &realm), Value::Boolean(true));
    }

    #[test]
    fn test_operand_mismatch() {
        let realm = Realm::new();
        let literal = point(&realm);
        let err = literal.construct(&[MemberValue::Value(Value::Int(1))], &realm).unwrap_err();
        assert!(err.is_type_error());
    }
}
