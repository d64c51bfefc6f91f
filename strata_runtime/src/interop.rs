//! Interfaces to collaborators outside the property-access core.
//!
//! The core never interprets proxy traps, foreign objects or host members
//! itself. It calls out through these traits, treating every call as an
//! opaque nested invocation that may run arbitrary user code. No object lock
//! is ever held across one of these calls.

use crate::error::RuntimeResult;
use crate::key::PropertyKey;
use crate::object::ObjectRef;
use crate::realm::Realm;
use crate::value::{JsString, Value};
use std::any::{Any, TypeId};
use std::sync::Arc;

// =============================================================================
// Functions
// =============================================================================

/// Something that can be invoked as a function.
pub trait Callable: Send + Sync {
    /// Invoke with `this` and arguments.
    fn call(&self, realm: &Realm, this: &Value, args: &[Value]) -> RuntimeResult<Value>;
}

/// A [`Callable`] backed by a Rust closure.
pub struct NativeFunction<F>(pub F);

impl<F> Callable for NativeFunction<F>
where
    F: Fn(&Realm, &Value, &[Value]) -> RuntimeResult<Value> + Send + Sync,
{
    fn call(&self, realm: &Realm, this: &Value, args: &[Value]) -> RuntimeResult<Value> {
        (self.0)(realm, this, args)
    }
}

// =============================================================================
// Proxies
// =============================================================================

/// Trap dispatcher of a proxy object.
pub trait ProxyHandler: Send + Sync {
    /// `get` trap.
    fn get(
        &self,
        realm: &Realm,
        target: &ObjectRef,
        key: &PropertyKey,
        receiver: &Value,
    ) -> RuntimeResult<Value>;

    /// `set` trap. `Ok(false)` reports a rejected assignment.
    fn set(
        &self,
        realm: &Realm,
        target: &ObjectRef,
        key: &PropertyKey,
        value: Value,
        receiver: &Value,
    ) -> RuntimeResult<bool>;

    /// `has` trap.
    fn has(&self, realm: &Realm, target: &ObjectRef, key: &PropertyKey) -> RuntimeResult<bool>;
}

// =============================================================================
// Foreign objects
// =============================================================================

/// An object owned by another language, accessed through a message bridge.
pub trait ForeignObject: Send + Sync {
    /// Read a member. `Ok(None)` means the member does not exist.
    fn read(&self, key: &PropertyKey) -> RuntimeResult<Option<Value>>;

    /// Write a member. `Ok(false)` reports a rejected write.
    fn write(&self, key: &PropertyKey, value: Value) -> RuntimeResult<bool>;

    /// Check whether a member exists.
    fn has_member(&self, key: &PropertyKey) -> bool;

    /// Whether the object has an array-like size.
    fn has_size(&self) -> bool {
        false
    }

    /// The array-like size.
    fn get_size(&self) -> RuntimeResult<u32> {
        Ok(0)
    }
}

// =============================================================================
// Host objects
// =============================================================================

/// An object of the embedding application, exposed through member lookup.
pub trait HostObject: Send + Sync + Any {
    /// Class name, for diagnostics.
    fn class_name(&self) -> &str;

    /// Upcast for downcasting in resolvers.
    fn as_any(&self) -> &dyn Any;
}

/// Identity of a host object's class: its concrete Rust type.
#[inline]
pub fn host_class_of(host: &dyn HostObject) -> TypeId {
    Any::type_id(host.as_any())
}

/// A field of a host class.
pub trait HostField: Send + Sync {
    /// Read the field.
    fn get(&self, host: &dyn HostObject) -> RuntimeResult<Value>;

    /// Write the field. `Ok(false)` reports a read-only field.
    fn set(&self, host: &dyn HostObject, value: Value) -> RuntimeResult<bool>;
}

/// Result of host member resolution.
#[derive(Clone)]
pub enum HostMember {
    /// A readable/writable field.
    Field(Arc<dyn HostField>),
    /// A method, exposed as a function object.
    Method(Arc<dyn Callable>),
}

impl std::fmt::Debug for HostMember {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HostMember::Field(_) => f.write_str("HostMember::Field"),
            HostMember::Method(_) => f.write_str("HostMember::Method"),
        }
    }
}

/// Resolves member names on host objects.
///
/// Resolution must depend only on the host class and the name, so results
/// can be cached per class.
pub trait HostMemberResolver: Send + Sync {
    /// Resolve `name` on `host`'s class.
    fn resolve(&self, host: &dyn HostObject, name: &str) -> Option<HostMember>;
}

// =============================================================================
// Coercion & iteration
// =============================================================================

/// Conversions applied at key-normalization and representation boundaries.
pub trait Coercion: Send + Sync {
    /// `ToNumber`
    fn to_number(&self, realm: &Realm, value: &Value) -> RuntimeResult<f64>;
    /// `ToString`
    fn to_string(&self, realm: &Realm, value: &Value) -> RuntimeResult<JsString>;
    /// `ToBoolean`
    fn to_boolean(&self, value: &Value) -> bool;
    /// `ToPropertyKey`
    fn to_property_key(&self, realm: &Realm, value: &Value) -> RuntimeResult<PropertyKey>;
    /// `ToObject`
    fn to_object(&self, realm: &Realm, value: &Value) -> RuntimeResult<ObjectRef>;
}

/// Iteration over spread sources.
pub trait IterationProtocol: Send + Sync {
    /// Feed every element of `iterable` to `sink`, in order.
    fn iterate(
        &self,
        realm: &Realm,
        iterable: &Value,
        sink: &mut dyn FnMut(Value) -> RuntimeResult<()>,
    ) -> RuntimeResult<()>;
}
