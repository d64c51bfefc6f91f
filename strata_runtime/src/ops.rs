//! Generic property semantics.
//!
//! These functions implement get/set/has/define/delete without any caching.
//! Inline caches fall back to them on a miss and in the megamorphic state,
//! and they define the results every cached path must reproduce.

use crate::error::{RuntimeError, RuntimeResult};
use crate::interop::HostMember;
use crate::key::{PropertyKey, names};
use crate::object::{ObjectRef, OwnProperty, PropertyValue};
use crate::realm::Realm;
use crate::value::Value;
use std::sync::Arc;

/// What a read of an absent property produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AbsentPolicy {
    /// `undefined`.
    #[default]
    Undefined,
    /// A `ReferenceError`, as for unresolved global names.
    ReferenceError,
    /// A call to the receiver's `__noSuchProperty__` hook, if enabled.
    NoSuchProperty,
}

// =============================================================================
// Receivers
// =============================================================================

/// Where a lookup starts for `receiver`, after the receiver's own
/// primitive-specific properties.
fn lookup_start<'a>(realm: &'a Realm, receiver: &'a Value) -> Option<&'a ObjectRef> {
    match receiver {
        Value::Object(o) => Some(o),
        other => realm.prototype_for_primitive(other),
    }
}

fn string_own(receiver: &Value, key: &PropertyKey) -> Option<Value> {
    let Value::String(s) = receiver else {
        return None;
    };
    match key {
        PropertyKey::Index(i) => s.code_unit_at(*i).map(Value::String),
        _ if key == names::length() => Some(Value::number(s.len() as f64)),
        _ => None,
    }
}

// =============================================================================
// Accessors
// =============================================================================

/// Invoke a getter with `receiver` as `this`. A missing getter yields
/// `undefined`.
pub fn call_getter(realm: &Realm, getter: Option<&Value>, receiver: &Value) -> RuntimeResult<Value> {
    match getter {
        Some(Value::Object(f)) if f.is_callable() => f.call(realm, receiver, &[]),
        _ => Ok(Value::Undefined),
    }
}

/// Invoke a setter with `receiver` as `this`. A missing setter rejects the
/// assignment.
pub fn call_setter(
    realm: &Realm,
    setter: Option<&Value>,
    receiver: &Value,
    value: Value,
) -> RuntimeResult<bool> {
    match setter {
        Some(Value::Object(f)) if f.is_callable() => {
            f.call(realm, receiver, &[value])?;
            Ok(true)
        }
        _ => Ok(false),
    }
}

/// Resolve a host member of `object`, if host interop is enabled and the
/// object wraps a host value.
pub fn resolve_host_member(realm: &Realm, object: &ObjectRef, key: &PropertyKey) -> Option<HostMember> {
    if !realm.config().host_interop {
        return None;
    }
    let host = object.host()?;
    let name = key.as_name()?;
    realm.host_resolver()?.resolve(host.as_ref(), name.as_str())
}

/// Read a resolved host member.
pub fn read_host_member(realm: &Realm, object: &ObjectRef, member: &HostMember) -> RuntimeResult<Value> {
    match member {
        HostMember::Field(field) => match object.host() {
            Some(host) => field.get(host.as_ref()),
            None => Ok(Value::Undefined),
        },
        HostMember::Method(method) => Ok(Value::Object(realm.new_function(Arc::clone(method), false))),
    }
}

// =============================================================================
// Get
// =============================================================================

/// Read `key` from `receiver`. `Ok(None)` means the property is absent.
pub fn get(realm: &Realm, receiver: &Value, key: &PropertyKey) -> RuntimeResult<Option<Value>> {
    if receiver.is_nullish() {
        return Err(RuntimeError::type_error(format!(
            "Cannot read properties of {} (reading '{key}')",
            receiver.type_name()
        )));
    }
    if let Some(value) = string_own(receiver, key) {
        return Ok(Some(value));
    }
    let Some(start) = lookup_start(realm, receiver) else {
        return Ok(None);
    };
    get_from(realm, start, key, receiver)
}

/// Read `key` starting the lookup at `start`, with `receiver` as `this` for
/// getters.
pub fn get_from(
    realm: &Realm,
    start: &ObjectRef,
    key: &PropertyKey,
    receiver: &Value,
) -> RuntimeResult<Option<Value>> {
    let mut current = Arc::clone(start);
    loop {
        if let Some(proxy) = current.proxy() {
            return proxy
                .handler()
                .get(realm, proxy.target(), key, receiver)
                .map(Some);
        }
        if let Some(foreign) = current.foreign() {
            if !realm.config().foreign_interop {
                return Ok(None);
            }
            return foreign.read(key);
        }
        if let Some(own) = current.get_own_property(key, realm) {
            return match own.value {
                PropertyValue::Data(v) => Ok(Some(v)),
                PropertyValue::Accessor(pair) => call_getter(realm, pair.getter.as_ref(), receiver).map(Some),
            };
        }
        // Typed arrays answer every index themselves.
        if key.is_index() && current.typed_view().is_some() {
            return Ok(None);
        }
        match current.prototype() {
            Some(proto) => current = proto,
            None => break,
        }
    }
    match resolve_host_member(realm, start, key) {
        Some(member) => read_host_member(realm, start, &member).map(Some),
        None => Ok(None),
    }
}

/// Read `key`, producing `undefined` when absent.
pub fn get_value(realm: &Realm, receiver: &Value, key: &PropertyKey) -> RuntimeResult<Value> {
    Ok(get(realm, receiver, key)?.unwrap_or_default())
}

/// Read `key`, applying `policy` when absent.
pub fn get_with_policy(
    realm: &Realm,
    receiver: &Value,
    key: &PropertyKey,
    policy: AbsentPolicy,
) -> RuntimeResult<Value> {
    match get(realm, receiver, key)? {
        Some(value) => Ok(value),
        None => absent_value(realm, receiver, key, policy),
    }
}

/// The result of reading an absent property under `policy`.
pub fn absent_value(
    realm: &Realm,
    receiver: &Value,
    key: &PropertyKey,
    policy: AbsentPolicy,
) -> RuntimeResult<Value> {
    match policy {
        AbsentPolicy::Undefined => Ok(Value::Undefined),
        AbsentPolicy::ReferenceError => Err(RuntimeError::reference_error(format!(
            "{key} is not defined"
        ))),
        AbsentPolicy::NoSuchProperty => {
            if !realm.config().no_such_property {
                return Ok(Value::Undefined);
            }
            match get(realm, receiver, names::no_such_property())? {
                Some(Value::Object(hook)) if hook.is_callable() => {
                    hook.call(realm, receiver, &[key.to_value()])
                }
                _ => Ok(Value::Undefined),
            }
        }
    }
}

// =============================================================================
// Set
// =============================================================================

/// Assign `key` on `receiver`. `Ok(false)` reports a rejected assignment.
pub fn try_set(realm: &Realm, receiver: &Value, key: &PropertyKey, value: Value) -> RuntimeResult<bool> {
    if receiver.is_nullish() {
        return Err(RuntimeError::type_error(format!(
            "Cannot set properties of {} (setting '{key}')",
            receiver.type_name()
        )));
    }
    if string_own(receiver, key).is_some() {
        return Ok(false);
    }
    let Some(start) = lookup_start(realm, receiver) else {
        return Ok(false);
    };

    let mut current = Arc::clone(start);
    let mut found = false;
    loop {
        if let Some(proxy) = current.proxy() {
            return proxy.handler().set(realm, proxy.target(), key, value, receiver);
        }
        if let Some(foreign) = current.foreign() {
            if !realm.config().foreign_interop {
                return Ok(false);
            }
            return foreign.write(key, value);
        }
        if let Some(own) = current.get_own_property(key, realm) {
            match own.value {
                PropertyValue::Accessor(pair) => {
                    return call_setter(realm, pair.setter.as_ref(), receiver, value);
                }
                PropertyValue::Data(_) if !own.flags.is_writable() => return Ok(false),
                PropertyValue::Data(_) => {
                    found = true;
                    break;
                }
            }
        }
        if key.is_index() && current.typed_view().is_some() {
            found = true;
            break;
        }
        match current.prototype() {
            Some(proto) => current = proto,
            None => break,
        }
    }

    let Value::Object(target) = receiver else {
        return Ok(false);
    };
    if !found {
        if let Some(HostMember::Field(field)) = resolve_host_member(realm, target, key) {
            if let Some(host) = target.host() {
                return field.set(host.as_ref(), value);
            }
        }
    }
    target.set_own_value(key, value, realm)
}

/// Assign `key` on `receiver`; a rejected assignment throws in strict code.
pub fn set(
    realm: &Realm,
    receiver: &Value,
    key: &PropertyKey,
    value: Value,
    strict: bool,
) -> RuntimeResult<()> {
    if !try_set(realm, receiver, key, value)? && strict {
        return Err(RuntimeError::type_error(format!(
            "Cannot assign to read only property '{key}' of {}",
            receiver.type_name()
        )));
    }
    Ok(())
}

/// Assign to an existing binding; absent properties are a `ReferenceError`.
pub fn set_existing(
    realm: &Realm,
    receiver: &Value,
    key: &PropertyKey,
    value: Value,
    strict: bool,
) -> RuntimeResult<()> {
    if !has(realm, receiver, key)? {
        return Err(RuntimeError::reference_error(format!("{key} is not defined")));
    }
    set(realm, receiver, key, value, strict)
}

// =============================================================================
// Has / Define / Delete
// =============================================================================

/// The `in` operator.
pub fn has(realm: &Realm, receiver: &Value, key: &PropertyKey) -> RuntimeResult<bool> {
    let Value::Object(start) = receiver else {
        return Err(RuntimeError::type_error(format!(
            "Cannot use 'in' operator to search for '{key}' in {}",
            receiver.type_name()
        )));
    };
    let mut current = Arc::clone(start);
    loop {
        if let Some(proxy) = current.proxy() {
            return proxy.handler().has(realm, proxy.target(), key);
        }
        if let Some(foreign) = current.foreign() {
            return Ok(realm.config().foreign_interop && foreign.has_member(key));
        }
        if current.has_own_property(key) {
            return Ok(true);
        }
        if key.is_index() && current.typed_view().is_some() {
            return Ok(false);
        }
        match current.prototype() {
            Some(proto) => current = proto,
            None => break,
        }
    }
    Ok(resolve_host_member(realm, start, key).is_some())
}

/// Define an own property, throwing if the definition is rejected.
pub fn define(realm: &Realm, object: &ObjectRef, key: PropertyKey, property: OwnProperty) -> RuntimeResult<()> {
    let display = key.to_string();
    if !object.define_own_property(key, property, realm)? {
        return Err(RuntimeError::type_error(format!(
            "Cannot redefine property: {display}"
        )));
    }
    Ok(())
}

/// The `delete` operator.
pub fn delete(realm: &Realm, receiver: &Value, key: &PropertyKey, strict: bool) -> RuntimeResult<bool> {
    let deleted = match receiver {
        Value::Undefined | Value::Null => {
            return Err(RuntimeError::type_error(format!(
                "Cannot convert {} to object",
                receiver.type_name()
            )));
        }
        Value::Object(o) => o.proxy().is_none() && o.delete_own(key, realm),
        other => string_own(other, key).is_none(),
    };
    if !deleted && strict {
        return Err(RuntimeError::type_error(format!("Cannot delete property '{key}'")));
    }
    Ok(deleted)
}

// =============================================================================
// Computed member access
// =============================================================================

/// Normalize a computed member key.
pub fn to_key(realm: &Realm, receiver: &Value, key: &Value) -> RuntimeResult<PropertyKey> {
    if receiver.is_nullish() {
        return Err(RuntimeError::type_error(format!(
            "Cannot read properties of {}",
            receiver.type_name()
        )));
    }
    match PropertyKey::from_primitive(key) {
        Some(key) => Ok(key),
        None => realm.coercion().to_property_key(realm, key),
    }
}

/// `receiver[key]`
pub fn get_element(realm: &Realm, receiver: &Value, key: &Value) -> RuntimeResult<Value> {
    let key = to_key(realm, receiver, key)?;
    get_value(realm, receiver, &key)
}

/// `receiver[key] = value`
pub fn set_element(
    realm: &Realm,
    receiver: &Value,
    key: &Value,
    value: Value,
    strict: bool,
) -> RuntimeResult<()> {
    let key = to_key(realm, receiver, key)?;
    set(realm, receiver, &key, value, strict)
}
