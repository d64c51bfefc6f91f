//! Property set cache.
//!
//! A [`PropertySetCache`] serves `receiver.key = value` for one call site.
//! Strictness and whether the target must already exist (assignment to a
//! declared global) are fixed when the site is created.

use super::chain::{Applied, CacheChain, CacheState, CacheStats, ChainEntry};
use super::resolve::{Resolution, resolve};
use crate::receiver::{CheckOutcome, ClassGuard, ReceiverCheck};
use std::any::TypeId;
use std::sync::Arc;
use strata_core::RuntimeConfig;
use strata_runtime::interop::{HostField, HostMember, host_class_of};
use strata_runtime::key::names;
use strata_runtime::object::{Location, LocationKind, ObjectKind, Property, PropertyFlags, Shape};
use strata_runtime::ops;
use strata_runtime::{ObjectRef, PropertyKey, Realm, RuntimeError, RuntimeResult, Value};

// =============================================================================
// Entry Kinds
// =============================================================================

/// How an accepted receiver is written.
#[derive(Clone)]
pub enum SetKind {
    /// Existing primitive location on the receiver.
    TypedLocation { shape: Arc<Shape>, property: Property },
    /// Existing object location on the receiver.
    GenericLocation { shape: Arc<Shape>, property: Property },
    /// Add the property by following the memoized transition `from -> to`.
    ExtendShape {
        from: Arc<Shape>,
        to: Arc<Shape>,
        location: Location,
    },
    /// Existing property whose location is too narrow for the value seen at
    /// installation; the write redefines it with a wider location.
    Widen,
    /// Setter on the receiver or a prototype.
    Accessor { shape: Arc<Shape>, location: Location },
    /// Non-writable data on the receiver or a prototype.
    ReadOnly { strict: bool },
    /// Absent property on a non-extensible receiver.
    NotExtensible { strict: bool },
    /// Assignment to an undeclared binding.
    AbsentReferenceError,
    /// `length` of an ordinary array.
    ArrayLength,
    Proxy,
    Foreign,
    /// Writable field of a host class.
    HostMember { class: TypeId, field: Arc<dyn HostField> },
    /// Classified receiver whose assignment is not cacheable.
    Dictionary,
    /// Every receiver; megamorphic state.
    Generic,
}

impl std::fmt::Debug for SetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SetKind::TypedLocation { property, .. } => {
                write!(f, "TypedLocation({:?})", property.location())
            }
            SetKind::GenericLocation { property, .. } => {
                write!(f, "GenericLocation({:?})", property.location())
            }
            SetKind::ExtendShape { from, to, .. } => {
                write!(f, "ExtendShape({:?} -> {:?})", from.id(), to.id())
            }
            SetKind::Widen => f.write_str("Widen"),
            SetKind::Accessor { location, .. } => write!(f, "Accessor({location:?})"),
            SetKind::ReadOnly { strict } => write!(f, "ReadOnly {{ strict: {strict} }}"),
            SetKind::NotExtensible { strict } => write!(f, "NotExtensible {{ strict: {strict} }}"),
            SetKind::AbsentReferenceError => f.write_str("AbsentReferenceError"),
            SetKind::ArrayLength => f.write_str("ArrayLength"),
            SetKind::Proxy => f.write_str("Proxy"),
            SetKind::Foreign => f.write_str("Foreign"),
            SetKind::HostMember { class, .. } => write!(f, "HostMember({class:?})"),
            SetKind::Dictionary => f.write_str("Dictionary"),
            SetKind::Generic => f.write_str("Generic"),
        }
    }
}

/// One set cache entry.
#[derive(Debug, Clone)]
pub struct SetEntry {
    check: Option<ReceiverCheck>,
    kind: SetKind,
}

impl SetEntry {
    /// The receiver check; `None` accepts every receiver.
    pub fn check(&self) -> Option<&ReceiverCheck> {
        self.check.as_ref()
    }

    /// The entry kind.
    pub fn kind(&self) -> &SetKind {
        &self.kind
    }

    fn new(check: ReceiverCheck, kind: SetKind) -> Self {
        Self {
            check: Some(check),
            kind,
        }
    }
}

impl ChainEntry for SetEntry {
    fn generic() -> Self {
        Self {
            check: None,
            kind: SetKind::Generic,
        }
    }

    fn is_stale(&self) -> bool {
        if let SetKind::ExtendShape { to, .. } = &self.kind {
            if !to.is_valid() {
                return true;
            }
        }
        self.check.as_ref().is_some_and(ReceiverCheck::is_stale)
    }
}

// =============================================================================
// Property Set Cache
// =============================================================================

/// Inline cache for assigning one named property.
#[derive(Debug)]
pub struct PropertySetCache {
    key: PropertyKey,
    strict: bool,
    required: bool,
    chain: CacheChain<SetEntry>,
}

impl PropertySetCache {
    /// An ordinary assignment site.
    pub fn new(key: PropertyKey, strict: bool, config: &RuntimeConfig) -> Self {
        Self {
            key,
            strict,
            required: false,
            chain: CacheChain::new(config.property_cache_limit),
        }
    }

    /// An assignment site whose target must already exist; absent targets
    /// throw a `ReferenceError`.
    pub fn required(key: PropertyKey, strict: bool, config: &RuntimeConfig) -> Self {
        Self {
            required: true,
            ..Self::new(key, strict, config)
        }
    }

    /// The property key.
    #[inline]
    pub fn key(&self) -> &PropertyKey {
        &self.key
    }

    /// Whether rejected assignments throw.
    #[inline]
    pub fn is_strict(&self) -> bool {
        self.strict
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
    pub fn entries(&self) -> Arc<[SetEntry]> {
        self.chain.snapshot()
    }

    /// Collapse to the generic entry.
    pub fn make_megamorphic(&self) {
        self.chain.make_megamorphic();
    }

    /// Assign the property.
    pub fn set(&self, receiver: &Value, value: Value, realm: &Realm) -> RuntimeResult<()> {
        if let Some(result) = self.chain.dispatch(|entry| self.apply(entry, receiver, &value, realm)) {
            return result;
        }
        if let Some(entry) = self.specialize(receiver, &value, realm) {
            self.chain.install(entry);
        }
        self.generic(receiver, value, realm)
    }

    /// Assign an `int`.
    pub fn set_int(&self, receiver: &Value, value: i32, realm: &Realm) -> RuntimeResult<()> {
        self.set(receiver, Value::Int(value), realm)
    }

    /// Assign a `double`.
    pub fn set_double(&self, receiver: &Value, value: f64, realm: &Realm) -> RuntimeResult<()> {
        self.set(receiver, Value::Double(value), realm)
    }

    /// Assign a `boolean`.
    pub fn set_boolean(&self, receiver: &Value, value: bool, realm: &Realm) -> RuntimeResult<()> {
        self.set(receiver, Value::Boolean(value), realm)
    }

    /// Assign a `long`.
    pub fn set_long(&self, receiver: &Value, value: i64, realm: &Realm) -> RuntimeResult<()> {
        self.set(receiver, Value::Long(value), realm)
    }

    fn generic(&self, receiver: &Value, value: Value, realm: &Realm) -> RuntimeResult<()> {
        if self.required {
            ops::set_existing(realm, receiver, &self.key, value, self.strict)
        } else {
            ops::set(realm, receiver, &self.key, value, self.strict)
        }
    }

    fn finish(&self, accepted: bool, receiver: &Value) -> RuntimeResult<()> {
        if accepted || !self.strict {
            return Ok(());
        }
        Err(RuntimeError::type_error(format!(
            "Cannot assign to read only property '{}' of {}",
            self.key,
            receiver.type_name()
        )))
    }

    // -------------------------------------------------------------------------
    // Entry application
    // -------------------------------------------------------------------------

    fn apply(&self, entry: &SetEntry, receiver: &Value, value: &Value, realm: &Realm) -> Applied<()> {
        let holder = match &entry.check {
            None => None,
            Some(check) => match check.accept(receiver) {
                CheckOutcome::Accept(holder) => holder,
                CheckOutcome::Reject => return Applied::Skip,
                CheckOutcome::Invalidated => return Applied::Stale,
            },
        };
        let Some(target) = receiver.as_object() else {
            return match &entry.kind {
                SetKind::ReadOnly { .. } => Applied::Done(self.finish(false, receiver)),
                // The pair lives on the prototype the check resolved.
                SetKind::Accessor { shape, location } => {
                    self.apply_accessor(holder, shape, *location, receiver, value, realm)
                }
                SetKind::Dictionary | SetKind::Generic => {
                    Applied::Done(self.generic(receiver, value.clone(), realm))
                }
                _ => Applied::Skip,
            };
        };

        let done = match &entry.kind {
            SetKind::TypedLocation { shape, property } | SetKind::GenericLocation { shape, property } => {
                if !target.write_location(shape, property, value) {
                    return Applied::Skip;
                }
                Ok(())
            }
            SetKind::ExtendShape { from, to, location } => {
                if !to.is_valid() {
                    return Applied::Stale;
                }
                let kind = LocationKind::for_value(value, realm.config().typed_locations);
                if kind != location.kind() || !target.extend_shape(from, to, *location, value) {
                    return Applied::Skip;
                }
                Ok(())
            }
            SetKind::Widen => target
                .set_own_value(&self.key, value.clone(), realm)
                .and_then(|accepted| self.finish(accepted, receiver)),
            SetKind::Accessor { shape, location } => {
                let source = Some(holder.unwrap_or(target));
                return self.apply_accessor(source, shape, *location, receiver, value, realm);
            }
            SetKind::ReadOnly { .. } | SetKind::NotExtensible { .. } => self.finish(false, receiver),
            SetKind::AbsentReferenceError => Err(RuntimeError::reference_error(format!(
                "{} is not defined",
                self.key
            ))),
            SetKind::ArrayLength => {
                let writable = target
                    .get_own_property(names::length(), realm)
                    .is_some_and(|own| own.flags.is_writable());
                if writable {
                    target
                        .set_array_length(value, realm)
                        .and_then(|accepted| self.finish(accepted, receiver))
                } else {
                    self.finish(false, receiver)
                }
            }
            SetKind::Proxy => {
                let Some(proxy) = target.proxy() else {
                    return Applied::Skip;
                };
                proxy
                    .handler()
                    .set(realm, proxy.target(), &self.key, value.clone(), receiver)
                    .and_then(|accepted| self.finish(accepted, receiver))
            }
            SetKind::Foreign => {
                let Some(foreign) = target.foreign() else {
                    return Applied::Skip;
                };
                if realm.config().foreign_interop {
                    foreign
                        .write(&self.key, value.clone())
                        .and_then(|accepted| self.finish(accepted, receiver))
                } else {
                    self.finish(false, receiver)
                }
            }
            SetKind::HostMember { class, field } => match target.host() {
                Some(host) if host_class_of(host.as_ref()) == *class => field
                    .set(host.as_ref(), value.clone())
                    .and_then(|accepted| self.finish(accepted, receiver)),
                _ => return Applied::Skip,
            },
            SetKind::Dictionary | SetKind::Generic => self.generic(receiver, value.clone(), realm),
        };
        Applied::Done(done)
    }

    /// Run the setter found at `location` of `source`.
    fn apply_accessor(
        &self,
        source: Option<&ObjectRef>,
        shape: &Arc<Shape>,
        location: Location,
        receiver: &Value,
        value: &Value,
        realm: &Realm,
    ) -> Applied<()> {
        let Some(pair) = source.and_then(|source| source.read_accessor(shape, location)) else {
            return Applied::Skip;
        };
        Applied::Done(
            ops::call_setter(realm, pair.setter.as_ref(), receiver, value.clone())
                .and_then(|accepted| self.finish(accepted, receiver)),
        )
    }

    // -------------------------------------------------------------------------
    // Specialization
    // -------------------------------------------------------------------------

    fn specialize(&self, receiver: &Value, value: &Value, realm: &Realm) -> Option<SetEntry> {
        if self.key.is_index() {
            return None;
        }
        if let Value::Object(object) = receiver {
            match object.kind() {
                ObjectKind::Proxy(_) => {
                    return Some(SetEntry::new(ReceiverCheck::Class(ClassGuard::Proxy), SetKind::Proxy));
                }
                ObjectKind::Foreign(_) => {
                    return Some(SetEntry::new(
                        ReceiverCheck::Class(ClassGuard::Foreign),
                        SetKind::Foreign,
                    ));
                }
                ObjectKind::Array if &self.key == names::length() => {
                    let shape = object.ensure_current_shape(realm);
                    return Some(SetEntry::new(ReceiverCheck::Shape(shape), SetKind::ArrayLength));
                }
                _ => {}
            }
        }

        let strict = self.strict;
        match resolve(realm, receiver, &self.key) {
            Resolution::Own {
                check,
                shape,
                property,
                ..
            } => {
                let kind = if property.is_accessor() {
                    SetKind::Accessor {
                        shape,
                        location: property.location(),
                    }
                } else if !property.is_writable() {
                    SetKind::ReadOnly { strict }
                } else if !property.location().kind().accepts(value) {
                    SetKind::Widen
                } else if property.location().is_primitive() {
                    SetKind::TypedLocation { shape, property }
                } else {
                    SetKind::GenericLocation { shape, property }
                };
                Some(SetEntry::new(check, kind))
            }
            Resolution::Inherited {
                check, shape, property, ..
            } => {
                if property.is_accessor() {
                    let location = property.location();
                    return Some(SetEntry::new(check, SetKind::Accessor { shape, location }));
                }
                if !property.is_writable() {
                    return Some(SetEntry::new(check, SetKind::ReadOnly { strict }));
                }
                self.add_kind(check, receiver, value, realm, false)
            }
            Resolution::Absent { check } => self.add_kind(check, receiver, value, realm, true),
            Resolution::Slow { check } => Some(SetEntry::new(check, SetKind::Dictionary)),
            Resolution::Unguarded => None,
        }
    }

    /// Entry for a write that creates an own property on the receiver.
    fn add_kind(
        &self,
        check: ReceiverCheck,
        receiver: &Value,
        value: &Value,
        realm: &Realm,
        absent: bool,
    ) -> Option<SetEntry> {
        let Value::Object(object) = receiver else {
            return Some(SetEntry::new(check, SetKind::Dictionary));
        };
        if absent && self.required {
            return Some(SetEntry::new(check, SetKind::AbsentReferenceError));
        }
        if absent && object.host().is_some() && realm.config().host_interop {
            let kind = match (ops::resolve_host_member(realm, object, &self.key), object.host()) {
                (Some(HostMember::Field(field)), Some(host)) => SetKind::HostMember {
                    class: host_class_of(host.as_ref()),
                    field,
                },
                _ => SetKind::Dictionary,
            };
            return Some(SetEntry::new(check, kind));
        }
        let from = check.receiver_shape()?.clone();
        if !from.is_extensible() {
            return Some(SetEntry::new(check, SetKind::NotExtensible { strict: self.strict }));
        }
        let kind = LocationKind::for_value(value, realm.config().typed_locations);
        let to = realm
            .shapes()
            .add_property(&from, self.key.clone(), PropertyFlags::default(), kind);
        let location = to.lookup(&self.key)?.location();
        Some(SetEntry::new(check, SetKind::ExtendShape { from, to, location }))
    }
}
