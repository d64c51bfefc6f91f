//! Object instances.
//!
//! A `JsObject` pairs an immutable identity and kind with mutable state
//! behind a `parking_lot::RwLock`: the current shape, the storage block the
//! shape describes (or a dictionary), and the element store.
//!
//! Two families of accessors exist:
//!
//! - **Located access** (`read_slot`, `write_location`, `extend_shape`, ...)
//!   used by inline caches. The caller names the shape it specialized for;
//!   the access succeeds only if the object still has exactly that shape,
//!   checked under the same lock that protects the storage.
//! - **Own-property protocol** (`get_own_property`, `define_own_property`,
//!   `set_own_value`, `delete_own`, ...) used by the generic path. These
//!   perform shape transitions, generalization and lazy migration.
//!
//! No lock is ever held while calling user code, and at most one object
//! lock is held at a time.

use super::location::{Location, LocationKind};
use super::shape::{PropertyFlags, Shape, ShapeFlavor};
use super::storage::{AccessorPair, Dictionary, Slot, Storage};
use crate::array::{ArrayKind, ElementRead, ElementStore, ElementWriteCheck, SparseSlot, TypedArrayView};
use crate::error::{RuntimeError, RuntimeResult};
use crate::interop::{Callable, ForeignObject, HostObject, ProxyHandler};
use crate::key::{PropertyKey, names};
use crate::realm::Realm;
use crate::value::Value;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

// =============================================================================
// Identity
// =============================================================================

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of an object. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    fn next() -> Self {
        Self(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get raw value.
    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Shared reference to an object.
pub type ObjectRef = Arc<JsObject>;

// =============================================================================
// Kinds
// =============================================================================

/// Function payload.
pub struct FunctionData {
    callable: Arc<dyn Callable>,
    constructor: bool,
}

impl FunctionData {
    /// The code to run.
    #[inline]
    pub fn callable(&self) -> &Arc<dyn Callable> {
        &self.callable
    }

    /// Whether the function has a `prototype` property.
    #[inline]
    pub fn is_constructor(&self) -> bool {
        self.constructor
    }
}

/// Proxy payload.
pub struct ProxyData {
    target: ObjectRef,
    handler: Arc<dyn ProxyHandler>,
}

impl ProxyData {
    /// The proxied object.
    #[inline]
    pub fn target(&self) -> &ObjectRef {
        &self.target
    }

    /// The trap dispatcher.
    #[inline]
    pub fn handler(&self) -> &Arc<dyn ProxyHandler> {
        &self.handler
    }
}

/// What an object is, fixed at creation.
pub enum ObjectKind {
    Ordinary,
    Array,
    Function(FunctionData),
    TypedArray,
    Proxy(ProxyData),
    Foreign(Arc<dyn ForeignObject>),
    Host(Arc<dyn HostObject>),
    Global,
}

impl ObjectKind {
    /// Create a function kind.
    pub fn function(callable: Arc<dyn Callable>, constructor: bool) -> Self {
        ObjectKind::Function(FunctionData {
            callable,
            constructor,
        })
    }

    /// Create a proxy kind.
    pub fn proxy(target: ObjectRef, handler: Arc<dyn ProxyHandler>) -> Self {
        ObjectKind::Proxy(ProxyData { target, handler })
    }

    /// The shape flavor objects of this kind use.
    pub fn flavor(&self) -> ShapeFlavor {
        match self {
            ObjectKind::Ordinary => ShapeFlavor::Ordinary,
            ObjectKind::Array => ShapeFlavor::Array,
            ObjectKind::Function(_) => ShapeFlavor::Function,
            ObjectKind::TypedArray => ShapeFlavor::TypedArray,
            ObjectKind::Proxy(_) => ShapeFlavor::Proxy,
            ObjectKind::Foreign(_) => ShapeFlavor::Foreign,
            ObjectKind::Host(_) => ShapeFlavor::Host,
            ObjectKind::Global => ShapeFlavor::Global,
        }
    }
}

// =============================================================================
// Own property descriptors
// =============================================================================

/// Value part of an own property.
#[derive(Debug, Clone)]
pub enum PropertyValue {
    Data(Value),
    Accessor(AccessorPair),
}

/// An own property as seen by the generic protocol.
#[derive(Debug, Clone)]
pub struct OwnProperty {
    pub value: PropertyValue,
    pub flags: PropertyFlags,
}

impl OwnProperty {
    /// A data property.
    pub fn data(value: Value, flags: PropertyFlags) -> Self {
        Self {
            value: PropertyValue::Data(value),
            flags: flags | PropertyFlags::DATA,
        }
    }

    /// An accessor property.
    pub fn accessor(getter: Option<Value>, setter: Option<Value>, flags: PropertyFlags) -> Self {
        Self {
            value: PropertyValue::Accessor(AccessorPair::new(getter, setter)),
            flags: flags.difference(PropertyFlags::DATA | PropertyFlags::WRITABLE),
        }
    }

    /// The data value, if this is a data property.
    pub fn data_value(&self) -> Option<&Value> {
        match &self.value {
            PropertyValue::Data(v) => Some(v),
            PropertyValue::Accessor(_) => None,
        }
    }
}

// =============================================================================
// Object State
// =============================================================================

struct ObjectState {
    shape: Arc<Shape>,
    storage: Storage,
    dictionary: Option<Box<Dictionary>>,
    elements: ElementStore,
    is_prototype: bool,
}

impl ObjectState {
    fn own_slot(&self, key: &PropertyKey) -> Option<(Slot, PropertyFlags)> {
        if let Some(dict) = &self.dictionary {
            return dict.get(key).map(|e| (e.slot.clone(), e.flags));
        }
        let property = self.shape.lookup(key)?;
        Some((self.storage.read(property.location()), property.flags()))
    }

    fn own_flags(&self, key: &PropertyKey) -> Option<PropertyFlags> {
        match &self.dictionary {
            Some(dict) => dict.get(key).map(|e| e.flags),
            None => self.shape.lookup(key).map(|p| p.flags()),
        }
    }

    /// Move off an obsolete shape.
    fn migrate(&mut self, realm: &Realm) {
        if self.shape.is_valid() {
            return;
        }
        let registry = realm.shapes();
        let mut target = registry.migrate(&self.shape);
        for property in self.shape.properties() {
            let Slot::Value(value) = self.storage.read(property.location()) else {
                continue;
            };
            let needed = target
                .lookup(property.key())
                .map(|p| p.location().kind())
                .filter(|kind| !kind.accepts(&value));
            if let Some(kind) = needed {
                target = registry.generalize(&target, property.key(), kind.widen_for(&value));
            }
        }
        trace!(from = self.shape.id().raw(), to = target.id().raw(), "object migrated");
        self.reshape(target);
    }

    /// Rebuild storage for `target`, which must carry the same keys.
    fn reshape(&mut self, target: Arc<Shape>) {
        if Arc::ptr_eq(&self.shape, &target) {
            return;
        }
        let mut storage = Storage::for_shape(&target);
        for property in target.properties() {
            let Some(old) = self.shape.lookup(property.key()) else {
                continue;
            };
            let slot = self.storage.read(old.location());
            let location = property.location();
            if location.is_primitive() {
                match &slot {
                    Slot::Value(v) if location.kind().accepts(v) => storage.write_value(location, v),
                    _ => debug_assert!(false, "replayed location cannot hold {slot:?}"),
                }
            } else {
                storage.write_slot(location, slot);
            }
        }
        self.storage = storage;
        self.shape = target;
    }

    /// Store a named data property, adding, widening or reconfiguring as
    /// needed. Permission checks are the caller's.
    fn store_data(&mut self, key: &PropertyKey, value: &Value, flags: PropertyFlags, realm: &Realm) {
        self.migrate(realm);
        if let Some(dict) = &mut self.dictionary {
            dict.insert(key.clone(), Slot::Value(value.clone()), flags);
            return;
        }
        let registry = realm.shapes();
        let Some(existing) = self.shape.lookup(key).cloned() else {
            self.add_data(key, value, flags, realm);
            return;
        };
        if existing.is_accessor() {
            self.shape = registry.remove_property(&self.shape, key);
            self.add_data(key, value, flags, realm);
            return;
        }
        if existing.flags() != flags {
            self.shape = registry.reconfigure(&self.shape, key, flags);
        }
        let kind = existing.location().kind();
        if !kind.accepts(value) {
            let target = registry.generalize(&self.shape, key, kind.widen_for(value));
            self.reshape(target);
        }
        let Some(property) = self.shape.lookup(key) else {
            return;
        };
        if property.assumed_final() {
            property.finality().invalidate();
        }
        self.storage.write_value(property.location(), value);
    }

    fn add_data(&mut self, key: &PropertyKey, value: &Value, flags: PropertyFlags, realm: &Realm) {
        let kind = LocationKind::for_value(value, realm.config().typed_locations);
        let next = realm.shapes().add_property(&self.shape, key.clone(), flags, kind);
        self.storage.fit(&next);
        self.shape = next;
        if let Some(property) = self.shape.lookup(key) {
            self.storage.write_value(property.location(), value);
        }
    }

    /// Store an object-area slot (accessor pair or lazy prototype).
    fn store_slot(&mut self, key: &PropertyKey, slot: Slot, flags: PropertyFlags, realm: &Realm) {
        self.migrate(realm);
        if let Some(dict) = &mut self.dictionary {
            dict.insert(key.clone(), slot, flags);
            return;
        }
        let registry = realm.shapes();
        let reusable = self.shape.lookup(key).is_some_and(|p| {
            p.is_data() == flags.is_data() && !p.location().is_primitive()
        });
        if reusable {
            self.shape = registry.reconfigure(&self.shape, key, flags);
        } else {
            let base = registry.remove_property(&self.shape, key);
            self.shape = registry.add_property(&base, key.clone(), flags, LocationKind::Object);
            self.storage.fit(&self.shape);
        }
        if let Some(property) = self.shape.lookup(key) {
            if property.assumed_final() && reusable {
                property.finality().invalidate();
            }
            self.storage.write_slot(property.location(), slot);
        }
    }

    fn make_dictionary(&mut self, realm: &Realm) {
        if self.dictionary.is_some() {
            return;
        }
        let mut dict = Dictionary::new();
        for property in self.shape.properties() {
            dict.insert(
                property.key().clone(),
                self.storage.read(property.location()),
                property.flags(),
            );
        }
        self.shape = realm.shapes().to_dictionary(&self.shape);
        self.storage = Storage::default();
        self.dictionary = Some(Box::new(dict));
    }

    fn restrict(&mut self, realm: &Realm, f: fn(PropertyFlags) -> PropertyFlags, lock_length: bool) {
        self.migrate(realm);
        match &mut self.dictionary {
            Some(dict) => dict.update_flags(f),
            None => {
                let registry = realm.shapes();
                let keys: Vec<(PropertyKey, PropertyFlags)> = self
                    .shape
                    .properties()
                    .iter()
                    .map(|p| (p.key().clone(), p.flags()))
                    .collect();
                for (key, flags) in keys {
                    self.shape = registry.reconfigure(&self.shape, &key, f(flags));
                }
            }
        }
        self.elements.restrict(f, lock_length);
        self.shape = realm.shapes().prevent_extensions(&self.shape);
    }
}

// =============================================================================
// Object
// =============================================================================

/// A heap object.
pub struct JsObject {
    id: ObjectId,
    kind: ObjectKind,
    state: RwLock<ObjectState>,
}

impl JsObject {
    /// Create an object with the given initial shape and elements.
    ///
    /// The shape's flavor must match the kind.
    pub fn create(kind: ObjectKind, shape: Arc<Shape>, elements: ElementStore) -> ObjectRef {
        debug_assert_eq!(kind.flavor(), shape.flavor());
        let dictionary = shape.is_dictionary().then(|| Box::new(Dictionary::new()));
        Arc::new(Self {
            id: ObjectId::next(),
            kind,
            state: RwLock::new(ObjectState {
                storage: Storage::for_shape(&shape),
                shape,
                dictionary,
                elements,
                is_prototype: false,
            }),
        })
    }

    // -------------------------------------------------------------------------
    // Identity and kind
    // -------------------------------------------------------------------------

    /// Get the object ID.
    #[inline]
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Get the object kind.
    #[inline]
    pub fn kind(&self) -> &ObjectKind {
        &self.kind
    }

    /// Get the shape flavor.
    #[inline]
    pub fn flavor(&self) -> ShapeFlavor {
        self.kind.flavor()
    }

    /// Check if the object can be called.
    #[inline]
    pub fn is_callable(&self) -> bool {
        matches!(self.kind, ObjectKind::Function(_))
    }

    /// Check if the object is an ordinary array.
    #[inline]
    pub fn is_array(&self) -> bool {
        matches!(self.kind, ObjectKind::Array)
    }

    /// Function payload, if any.
    pub fn function(&self) -> Option<&FunctionData> {
        match &self.kind {
            ObjectKind::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Proxy payload, if any.
    pub fn proxy(&self) -> Option<&ProxyData> {
        match &self.kind {
            ObjectKind::Proxy(p) => Some(p),
            _ => None,
        }
    }

    /// Foreign payload, if any.
    pub fn foreign(&self) -> Option<&Arc<dyn ForeignObject>> {
        match &self.kind {
            ObjectKind::Foreign(f) => Some(f),
            _ => None,
        }
    }

    /// Host payload, if any.
    pub fn host(&self) -> Option<&Arc<dyn HostObject>> {
        match &self.kind {
            ObjectKind::Host(h) => Some(h),
            _ => None,
        }
    }

    /// Invoke the object as a function.
    pub fn call(&self, realm: &Realm, this: &Value, args: &[Value]) -> RuntimeResult<Value> {
        match &self.kind {
            ObjectKind::Function(f) => f.callable.call(realm, this, args),
            _ => Err(RuntimeError::type_error(format!(
                "object #{} is not a function",
                self.id.raw()
            ))),
        }
    }

    // -------------------------------------------------------------------------
    // Shape
    // -------------------------------------------------------------------------

    /// The current shape.
    #[inline]
    pub fn shape(&self) -> Arc<Shape> {
        Arc::clone(&self.state.read().shape)
    }

    /// The prototype.
    #[inline]
    pub fn prototype(&self) -> Option<ObjectRef> {
        self.state.read().shape.prototype().cloned()
    }

    /// Check if properties may be added.
    #[inline]
    pub fn is_extensible(&self) -> bool {
        self.state.read().shape.is_extensible()
    }

    /// Check if the object is some other object's prototype.
    #[inline]
    pub fn is_prototype(&self) -> bool {
        self.state.read().is_prototype
    }

    /// Check if properties are kept in a dictionary.
    #[inline]
    pub fn is_dictionary(&self) -> bool {
        self.state.read().dictionary.is_some()
    }

    /// Check whether the object currently has exactly `expected`.
    #[inline]
    pub fn has_shape(&self, expected: &Arc<Shape>) -> bool {
        Arc::ptr_eq(&self.state.read().shape, expected)
    }

    /// Migrate off an obsolete shape and return the current one.
    pub fn ensure_current_shape(&self, realm: &Realm) -> Arc<Shape> {
        {
            let state = self.state.read();
            if state.shape.is_valid() {
                return Arc::clone(&state.shape);
            }
        }
        let mut state = self.state.write();
        state.migrate(realm);
        Arc::clone(&state.shape)
    }

    /// Switch to dictionary mode.
    pub fn make_dictionary(&self, realm: &Realm) {
        self.state.write().make_dictionary(realm);
    }

    pub(crate) fn mark_as_prototype(&self, realm: &Realm) {
        let mut state = self.state.write();
        if state.is_prototype {
            return;
        }
        state.is_prototype = true;
        let exotic = matches!(self.kind(), ObjectKind::Proxy(_) | ObjectKind::Foreign(_));
        if exotic || !state.elements.is_empty() {
            realm.no_prototype_elements().invalidate();
        }
    }

    // -------------------------------------------------------------------------
    // Located access
    // -------------------------------------------------------------------------

    /// Read a slot if the object still has shape `expected`.
    #[inline]
    pub fn read_slot(&self, expected: &Arc<Shape>, location: Location) -> Option<Slot> {
        let state = self.state.read();
        if !Arc::ptr_eq(&state.shape, expected) {
            return None;
        }
        Some(state.storage.read(location))
    }

    /// Read the raw word of a typed location if the shape still matches.
    #[inline]
    pub fn read_bits(&self, expected: &Arc<Shape>, location: Location) -> Option<u64> {
        let state = self.state.read();
        if !Arc::ptr_eq(&state.shape, expected) {
            return None;
        }
        Some(state.storage.read_bits(location))
    }

    /// Read a data location, materializing a lazy prototype if needed.
    pub fn read_data(
        self: &Arc<Self>,
        expected: &Arc<Shape>,
        location: Location,
        realm: &Realm,
    ) -> Option<Value> {
        match self.read_slot(expected, location)? {
            Slot::Value(v) => Some(v),
            Slot::Empty => Some(Value::Undefined),
            Slot::LazyPrototype => Some(self.materialize_prototype(realm)),
            Slot::Accessor(_) => None,
        }
    }

    /// Read an accessor location.
    pub fn read_accessor(&self, expected: &Arc<Shape>, location: Location) -> Option<AccessorPair> {
        match self.read_slot(expected, location)? {
            Slot::Accessor(pair) => Some(pair),
            _ => None,
        }
    }

    /// Overwrite an existing data property in place.
    ///
    /// Fails if the shape changed or the location cannot hold `value`.
    pub fn write_location(
        &self,
        expected: &Arc<Shape>,
        property: &super::shape::Property,
        value: &Value,
    ) -> bool {
        let location = property.location();
        if !location.kind().accepts(value) {
            return false;
        }
        let mut state = self.state.write();
        if !Arc::ptr_eq(&state.shape, expected) {
            return false;
        }
        if property.assumed_final() {
            property.finality().invalidate();
        }
        state.storage.write_value(location, value);
        true
    }

    /// Add a property by following a known transition `from -> to`.
    pub fn extend_shape(
        &self,
        from: &Arc<Shape>,
        to: &Arc<Shape>,
        location: Location,
        value: &Value,
    ) -> bool {
        if !location.kind().accepts(value) {
            return false;
        }
        let mut state = self.state.write();
        if !Arc::ptr_eq(&state.shape, from) {
            return false;
        }
        state.storage.fit(to);
        state.shape = Arc::clone(to);
        state.storage.write_value(location, value);
        true
    }

    /// Add an accessor property by following a known transition `from -> to`.
    pub fn extend_shape_with_accessor(
        &self,
        from: &Arc<Shape>,
        to: &Arc<Shape>,
        location: Location,
        pair: AccessorPair,
    ) -> bool {
        if location.is_primitive() {
            return false;
        }
        let mut state = self.state.write();
        if !Arc::ptr_eq(&state.shape, from) {
            return false;
        }
        state.storage.fit(to);
        state.shape = Arc::clone(to);
        state.storage.write_slot(location, Slot::Accessor(pair));
        true
    }

    /// Create a function's `prototype` object on first access.
    pub fn materialize_prototype(self: &Arc<Self>, realm: &Realm) -> Value {
        let key = names::prototype();
        match self.state.read().own_slot(key) {
            Some((Slot::LazyPrototype, _)) => {}
            Some((Slot::Value(v), _)) => return v,
            _ => return Value::Undefined,
        }

        let proto = realm.new_object();
        proto.state.write().store_data(
            names::constructor(),
            &Value::Object(Arc::clone(self)),
            PropertyFlags::hidden(),
            realm,
        );
        let proto = Value::Object(proto);

        let mut state = self.state.write();
        match state.own_slot(key) {
            Some((Slot::LazyPrototype, flags)) => {
                if let Some(dict) = &mut state.dictionary {
                    dict.insert(key.clone(), Slot::Value(proto.clone()), flags);
                } else if let Some(property) = state.shape.lookup(key).cloned() {
                    state.storage.write_slot(property.location(), Slot::Value(proto.clone()));
                }
                proto
            }
            Some((Slot::Value(v), _)) => v,
            _ => Value::Undefined,
        }
    }

    pub(crate) fn init_lazy_prototype(&self, realm: &Realm) {
        self.state.write().store_slot(
            names::prototype(),
            Slot::LazyPrototype,
            PropertyFlags::WRITABLE | PropertyFlags::DATA,
            realm,
        );
    }

    // -------------------------------------------------------------------------
    // Elements
    // -------------------------------------------------------------------------

    /// The current array representation.
    #[inline]
    pub fn array_kind(&self) -> ArrayKind {
        self.state.read().elements.kind()
    }

    /// The element length.
    #[inline]
    pub fn element_len(&self) -> u32 {
        self.state.read().elements.len()
    }

    /// Read one element.
    #[inline]
    pub fn read_element(&self, index: u32) -> ElementRead {
        self.state.read().elements.get(index)
    }

    /// Write an element without changing representation, if the store still
    /// has representation `expected`. `fill` permits filling holes and
    /// appending.
    pub fn write_element_in_place(
        &self,
        expected: ArrayKind,
        index: u32,
        value: &Value,
        fill: bool,
    ) -> bool {
        let mut state = self.state.write();
        if state.elements.kind() != expected {
            return false;
        }
        let fill = fill && state.shape.is_extensible() && !state.is_prototype;
        state.elements.write_in_place(index, value, fill)
    }

    /// The typed view of a typed array.
    pub fn typed_view(&self) -> Option<TypedArrayView> {
        self.state.read().elements.as_typed().cloned()
    }

    /// Snapshot of present element indices.
    pub fn element_indices(&self) -> Vec<u32> {
        self.state.read().elements.indices()
    }

    fn write_element(&self, index: u32, value: Value, create: bool, realm: &Realm) -> RuntimeResult<bool> {
        if let Some(view) = self.typed_view() {
            let number = realm.coercion().to_number(realm, &value)?;
            view.set(index, number)?;
            return Ok(true);
        }
        let mut state = self.state.write();
        match state.elements.check_write(index) {
            ElementWriteCheck::Writable => {}
            ElementWriteCheck::ReadOnly | ElementWriteCheck::Accessor(_) => return Ok(false),
            ElementWriteCheck::Absent => {
                if !create || !state.shape.is_extensible() {
                    return Ok(false);
                }
                if index >= state.elements.len() && !state.elements.length_writable() {
                    return Ok(false);
                }
            }
        }
        state.elements.write(index, value, realm.config());
        if state.is_prototype {
            realm.no_prototype_elements().invalidate();
        }
        Ok(true)
    }

    /// Assign an array's `length`.
    pub fn set_array_length(&self, value: &Value, realm: &Realm) -> RuntimeResult<bool> {
        let number = realm.coercion().to_number(realm, value)?;
        let length = number as u32;
        if length as f64 != number {
            return Err(RuntimeError::range_error("Invalid array length"));
        }
        if !self.is_array() {
            return Ok(false);
        }
        let mut state = self.state.write();
        Ok(state.elements.set_length(length, realm.config()))
    }

    // -------------------------------------------------------------------------
    // Own-property protocol
    // -------------------------------------------------------------------------

    /// Look up an own property.
    pub fn get_own_property(self: &Arc<Self>, key: &PropertyKey, realm: &Realm) -> Option<OwnProperty> {
        if let PropertyKey::Index(index) = key {
            let state = self.state.read();
            let flags = state.elements.flags(*index)?;
            return match state.elements.get(*index) {
                ElementRead::Value(v) => Some(OwnProperty::data(v, flags)),
                ElementRead::Accessor(pair) => Some(OwnProperty {
                    value: PropertyValue::Accessor(pair),
                    flags,
                }),
                ElementRead::Hole | ElementRead::OutOfBounds => None,
            };
        }
        if key == names::length() && self.flavor().has_virtual_length() {
            let state = self.state.read();
            let writable = self.is_array() && state.elements.length_writable();
            let flags = if writable {
                PropertyFlags::WRITABLE | PropertyFlags::DATA
            } else {
                PropertyFlags::DATA
            };
            return Some(OwnProperty::data(
                Value::number(state.elements.len() as f64),
                flags,
            ));
        }

        let (slot, flags) = self.state.read().own_slot(key)?;
        Some(match slot {
            Slot::Value(v) => OwnProperty::data(v, flags),
            Slot::Empty => OwnProperty::data(Value::Undefined, flags),
            Slot::Accessor(pair) => OwnProperty {
                value: PropertyValue::Accessor(pair),
                flags,
            },
            Slot::LazyPrototype => OwnProperty::data(self.materialize_prototype(realm), flags),
        })
    }

    /// Check for an own property without reading it.
    pub fn has_own_property(&self, key: &PropertyKey) -> bool {
        let state = self.state.read();
        match key {
            PropertyKey::Index(index) => state.elements.flags(*index).is_some(),
            _ if key == names::length() && self.flavor().has_virtual_length() => true,
            _ => state.own_flags(key).is_some(),
        }
    }

    /// Ordinary assignment to this object as the receiver: update an
    /// existing writable data property or create one if extensible.
    ///
    /// Returns `false` when the assignment is rejected.
    pub fn set_own_value(&self, key: &PropertyKey, value: Value, realm: &Realm) -> RuntimeResult<bool> {
        if let PropertyKey::Index(index) = key {
            return self.write_element(*index, value, true, realm);
        }
        if key == names::length() && self.flavor().has_virtual_length() {
            return self.set_array_length(&value, realm);
        }
        let mut state = self.state.write();
        state.migrate(realm);
        match state.own_flags(key) {
            Some(flags) if flags.is_writable() => {
                state.store_data(key, &value, flags, realm);
                Ok(true)
            }
            Some(_) => Ok(false),
            None if !state.shape.is_extensible() => Ok(false),
            None => {
                state.store_data(key, &value, PropertyFlags::default(), realm);
                Ok(true)
            }
        }
    }

    /// Define or redefine an own property.
    ///
    /// Non-configurable properties only accept a value change of a writable
    /// data property with unchanged attributes.
    pub fn define_own_property(
        &self,
        key: PropertyKey,
        property: OwnProperty,
        realm: &Realm,
    ) -> RuntimeResult<bool> {
        if let PropertyKey::Index(index) = key {
            return self.define_element(index, property, realm);
        }
        if &key == names::length() && self.flavor().has_virtual_length() {
            let PropertyValue::Data(value) = &property.value else {
                return Ok(false);
            };
            if !self.set_array_length(value, realm)? {
                return Ok(false);
            }
            if !property.flags.contains(PropertyFlags::WRITABLE) {
                self.state.write().elements.restrict(|f| f, true);
            }
            return Ok(true);
        }

        let mut state = self.state.write();
        state.migrate(realm);
        match state.own_flags(&key) {
            Some(existing) if !existing.is_configurable() => {
                return Ok(match &property.value {
                    PropertyValue::Data(v) if existing.is_writable() && property.flags == existing => {
                        state.store_data(&key, v, existing, realm);
                        true
                    }
                    _ => false,
                });
            }
            Some(_) => {}
            None if !state.shape.is_extensible() => return Ok(false),
            None => {}
        }
        match property.value {
            PropertyValue::Data(v) => state.store_data(&key, &v, property.flags, realm),
            PropertyValue::Accessor(pair) => {
                state.store_slot(&key, Slot::Accessor(pair), property.flags, realm)
            }
        }
        Ok(true)
    }

    fn define_element(&self, index: u32, property: OwnProperty, realm: &Realm) -> RuntimeResult<bool> {
        if self.typed_view().is_some() {
            return match property.value {
                PropertyValue::Data(v) => self.write_element(index, v, false, realm),
                PropertyValue::Accessor(_) => Ok(false),
            };
        }
        let mut state = self.state.write();
        match state.elements.flags(index) {
            Some(existing) if !existing.is_configurable() => {
                let allowed = existing.is_writable() && property.flags == existing;
                if let (true, PropertyValue::Data(v)) = (allowed, property.value) {
                    state.elements.write(index, v, realm.config());
                    return Ok(true);
                }
                return Ok(false);
            }
            Some(_) => {}
            None if !state.shape.is_extensible() => return Ok(false),
            None => {}
        }
        let slot = match property.value {
            PropertyValue::Data(v) => SparseSlot::Data(v),
            PropertyValue::Accessor(pair) => SparseSlot::Accessor(pair),
        };
        state.elements.define(index, slot, property.flags, realm.config());
        if state.is_prototype {
            realm.no_prototype_elements().invalidate();
        }
        Ok(true)
    }

    /// Delete an own property. Returns `false` if it is not configurable.
    pub fn delete_own(&self, key: &PropertyKey, realm: &Realm) -> bool {
        let mut state = self.state.write();
        if let PropertyKey::Index(index) = key {
            return state.elements.delete(*index);
        }
        if key == names::length() && self.flavor().has_virtual_length() {
            return false;
        }
        state.migrate(realm);
        match state.own_flags(key) {
            None => true,
            Some(flags) if !flags.is_configurable() => false,
            Some(_) => {
                if let Some(dict) = &mut state.dictionary {
                    dict.remove(key);
                    return true;
                }
                if let Some(property) = state.shape.lookup(key).cloned() {
                    if !property.location().is_primitive() {
                        state.storage.write_slot(property.location(), Slot::Empty);
                    }
                }
                state.shape = realm.shapes().remove_property(&state.shape, key);
                true
            }
        }
    }

    /// Own keys: indices ascending, then names, then symbols, each in
    /// definition order.
    pub fn own_keys(&self) -> Vec<PropertyKey> {
        let state = self.state.read();
        let mut keys: Vec<PropertyKey> = state
            .elements
            .indices()
            .into_iter()
            .map(PropertyKey::Index)
            .collect();
        if self.flavor().has_virtual_length() {
            keys.push(names::length().clone());
        }
        let named: Vec<PropertyKey> = match &state.dictionary {
            Some(dict) => dict.keys(),
            None => state.shape.properties().iter().map(|p| p.key().clone()).collect(),
        };
        let (symbols, strings): (Vec<_>, Vec<_>) = named
            .into_iter()
            .partition(|k| matches!(k, PropertyKey::Symbol(_)));
        keys.extend(strings);
        keys.extend(symbols);
        keys
    }

    /// Change the prototype. Fails on cycles and on non-extensible objects.
    pub fn set_prototype(&self, proto: Option<ObjectRef>, realm: &Realm) -> bool {
        let current = self.prototype();
        if current.as_ref().map(|p| p.id()) == proto.as_ref().map(|p| p.id()) {
            return true;
        }
        if !self.is_extensible() {
            return false;
        }
        let mut cursor = proto.clone();
        while let Some(object) = cursor {
            if object.id() == self.id {
                return false;
            }
            if object.proxy().is_some() {
                break;
            }
            cursor = object.prototype();
        }
        {
            let mut state = self.state.write();
            state.migrate(realm);
            state.shape = realm.shapes().set_prototype(&state.shape, proto.as_ref());
        }
        if let Some(proto) = &proto {
            proto.mark_as_prototype(realm);
        }
        true
    }

    /// Forbid adding properties. Elements move to the sparse
    /// representation, which has no append fast path.
    pub fn prevent_extensions(&self, realm: &Realm) {
        let mut state = self.state.write();
        state.migrate(realm);
        state.shape = realm.shapes().prevent_extensions(&state.shape);
        state.elements.make_sparse();
    }

    /// Make every property non-configurable and the object non-extensible.
    pub fn seal(&self, realm: &Realm) {
        self.state.write().restrict(realm, PropertyFlags::sealed, false);
    }

    /// Make every property read-only and non-configurable and the object
    /// non-extensible.
    pub fn freeze(&self, realm: &Realm) {
        self.state.write().restrict(realm, PropertyFlags::frozen, true);
    }
}

impl fmt::Debug for JsObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsObject")
            .field("id", &self.id.raw())
            .field("flavor", &self.flavor())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::ElementKind;

    fn key(s: &str) -> PropertyKey {
        PropertyKey::from_name(s)
    }

    fn get(obj: &ObjectRef, k: &str, realm: &Realm) -> Option<Value> {
        obj.get_own_property(&key(k), realm)
            .and_then(|p| p.data_value().cloned())
    }

    // -------------------------------------------------------------------------
    // Named properties
    // -------------------------------------------------------------------------

    #[test]
    fn test_add_and_overwrite() {
        let realm = Realm::new();
        let obj = realm.new_object();
        assert!(obj.set_own_value(&key("x"), Value::Int(1), &realm).unwrap());
        let shape = obj.shape();
        assert_eq!(shape.lookup(&key("x")).unwrap().location().kind(), LocationKind::Int);
        assert!(obj.set_own_value(&key("x"), Value::Int(2), &realm).unwrap());
        assert!(Arc::ptr_eq(&shape, &obj.shape()));
        assert_eq!(get(&obj, "x", &realm), Some(Value::Int(2)));
    }

    #[test]
    fn test_overwrite_invalidates_finality() {
        let realm = Realm::new();
        let obj = realm.new_object();
        obj.set_own_value(&key("x"), Value::Int(1), &realm).unwrap();
        let shape = obj.shape();
        let property = shape.lookup(&key("x")).unwrap();
        assert!(property.assumed_final());
        obj.set_own_value(&key("x"), Value::Int(5), &realm).unwrap();
        assert!(!property.assumed_final());
    }

    #[test]
    fn test_widening_generalizes_shape() {
        let realm = Realm::new();
        let obj = realm.new_object();
        obj.set_own_value(&key("x"), Value::Int(1), &realm).unwrap();
        let int_shape = obj.shape();
        obj.set_own_value(&key("x"), Value::Double(2.5), &realm).unwrap();
        let dbl_shape = obj.shape();
        assert!(!Arc::ptr_eq(&int_shape, &dbl_shape));
        assert!(!int_shape.is_valid());
        assert_eq!(dbl_shape.lookup(&key("x")).unwrap().location().kind(), LocationKind::Double);
        assert_eq!(get(&obj, "x", &realm), Some(Value::Double(2.5)));
    }

    #[test]
    fn test_sibling_migrates_lazily() {
        let realm = Realm::new();
        let a = realm.new_object();
        let b = realm.new_object();
        for obj in [&a, &b] {
            obj.set_own_value(&key("x"), Value::Int(1), &realm).unwrap();
            obj.set_own_value(&key("y"), Value::string("s"), &realm).unwrap();
        }
        a.set_own_value(&key("x"), Value::Double(0.5), &realm).unwrap();
        assert!(!b.shape().is_valid());
        let current = b.ensure_current_shape(&realm);
        assert!(Arc::ptr_eq(&current, &a.shape()));
        assert_eq!(get(&b, "x", &realm), Some(Value::Int(1)));
        assert_eq!(get(&b, "y", &realm), Some(Value::string("s")));
    }

    #[test]
    fn test_delete_and_readd_changes_shape() {
        let realm = Realm::new();
        let obj = realm.new_object();
        obj.set_own_value(&key("p"), Value::Int(1), &realm).unwrap();
        let before = obj.shape();
        assert!(obj.delete_own(&key("p"), &realm));
        assert!(get(&obj, "p", &realm).is_none());
        obj.set_own_value(&key("p"), Value::string("again"), &realm).unwrap();
        assert!(!Arc::ptr_eq(&before, &obj.shape()));
        assert_eq!(get(&obj, "p", &realm), Some(Value::string("again")));
    }

    #[test]
    fn test_read_only_rejects_write() {
        let realm = Realm::new();
        let obj = realm.new_object();
        obj.define_own_property(key("k"), OwnProperty::data(Value::Int(1), PropertyFlags::read_only()), &realm)
            .unwrap();
        assert!(!obj.set_own_value(&key("k"), Value::Int(2), &realm).unwrap());
        assert_eq!(get(&obj, "k", &realm), Some(Value::Int(1)));
    }

    #[test]
    fn test_non_configurable_redefinition() {
        let realm = Realm::new();
        let obj = realm.new_object();
        let flags = PropertyFlags::WRITABLE | PropertyFlags::DATA;
        obj.define_own_property(key("k"), OwnProperty::data(Value::Int(1), flags), &realm).unwrap();
        assert!(obj.define_own_property(key("k"), OwnProperty::data(Value::Int(2), flags), &realm).unwrap());
        assert!(!obj
            .define_own_property(key("k"), OwnProperty::data(Value::Int(3), PropertyFlags::default()), &realm)
            .unwrap());
        assert!(!obj.delete_own(&key("k"), &realm));
    }

    #[test]
    fn test_accessor_replaces_data() {
        let realm = Realm::new();
        let obj = realm.new_object();
        obj.set_own_value(&key("a"), Value::Int(1), &realm).unwrap();
        obj.define_own_property(key("a"), OwnProperty::accessor(None, None, PropertyFlags::accessor()), &realm)
            .unwrap();
        let prop = obj.get_own_property(&key("a"), &realm).unwrap();
        assert!(matches!(prop.value, PropertyValue::Accessor(_)));
        assert!(obj.shape().lookup(&key("a")).unwrap().is_accessor());
    }

    // -------------------------------------------------------------------------
    // Extensibility / dictionary
    // -------------------------------------------------------------------------

    #[test]
    fn test_prevent_extensions() {
        let realm = Realm::new();
        let obj = realm.new_object();
        obj.prevent_extensions(&realm);
        assert!(!obj.is_extensible());
        assert!(!obj.set_own_value(&key("x"), Value::Int(1), &realm).unwrap());
        assert!(!obj.set_own_value(&PropertyKey::Index(0), Value::Int(1), &realm).unwrap());
    }

    #[test]
    fn test_freeze() {
        let realm = Realm::new();
        let obj = realm.new_object();
        obj.set_own_value(&key("x"), Value::Int(1), &realm).unwrap();
        obj.freeze(&realm);
        assert!(!obj.set_own_value(&key("x"), Value::Int(2), &realm).unwrap());
        assert!(!obj.delete_own(&key("x"), &realm));
        assert!(obj.shape().lookup(&key("x")).unwrap().location().is_final());
    }

    #[test]
    fn test_dictionary_mode_roundtrip() {
        let realm = Realm::new();
        let obj = realm.new_object();
        obj.set_own_value(&key("a"), Value::Int(1), &realm).unwrap();
        obj.set_own_value(&key("b"), Value::Int(2), &realm).unwrap();
        obj.make_dictionary(&realm);
        assert!(obj.is_dictionary());
        assert!(obj.shape().is_dictionary());
        obj.set_own_value(&key("c"), Value::Int(3), &realm).unwrap();
        assert!(obj.delete_own(&key("a"), &realm));
        let keys: Vec<_> = obj.own_keys().iter().map(|k| k.to_string()).collect();
        assert_eq!(keys, ["b", "c"]);
    }

    #[test]
    fn test_set_prototype_rejects_cycle() {
        let realm = Realm::new();
        let a = realm.new_object();
        let b = realm.new_object_with_proto(Some(&a));
        assert!(!a.set_prototype(Some(Arc::clone(&b)), &realm));
        assert!(b.set_prototype(None, &realm));
        assert!(b.prototype().is_none());
        assert!(a.is_prototype());
    }

    // -------------------------------------------------------------------------
    // Elements
    // -------------------------------------------------------------------------

    #[test]
    fn test_array_length_property() {
        let realm = Realm::new();
        let arr = realm.new_array(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(get(&arr, "length", &realm), Some(Value::Int(2)));
        arr.set_own_value(&key("length"), Value::Int(5), &realm).unwrap();
        assert_eq!(arr.element_len(), 5);
        assert_eq!(arr.array_kind(), ArrayKind::Holes(ElementKind::Int));
        assert!(arr.set_array_length(&Value::Double(1.5), &realm).is_err());
    }

    #[test]
    fn test_prototype_elements_invalidate_assumption() {
        let realm = Realm::new();
        assert!(realm.no_prototype_elements().is_valid());
        let proto = realm.array_prototype();
        proto.set_own_value(&PropertyKey::Index(0), Value::Int(1), &realm).unwrap();
        assert!(!realm.no_prototype_elements().is_valid());
    }

    #[test]
    fn test_proxy_prototype_invalidates_assumption() {
        struct Empty;
        impl ProxyHandler for Empty {
            fn get(&self, _: &Realm, _: &ObjectRef, _: &PropertyKey, _: &Value) -> RuntimeResult<Value> {
                Ok(Value::Undefined)
            }
            fn set(&self, _: &Realm, _: &ObjectRef, _: &PropertyKey, _: Value, _: &Value) -> RuntimeResult<bool> {
                Ok(true)
            }
            fn has(&self, _: &Realm, _: &ObjectRef, _: &PropertyKey) -> RuntimeResult<bool> {
                Ok(false)
            }
        }

        let realm = Realm::new();
        let proxy = realm.new_proxy(realm.new_object(), Arc::new(Empty));
        assert!(realm.no_prototype_elements().is_valid());
        realm.new_object_with_proto(Some(&proxy));
        assert!(!realm.no_prototype_elements().is_valid());
    }

    #[test]
    fn test_own_keys_order() {
        let realm = Realm::new();
        let obj = realm.new_object();
        let sym = crate::value::Symbol::new(Some("s"));
        obj.set_own_value(&PropertyKey::Symbol(sym), Value::Int(0), &realm).unwrap();
        obj.set_own_value(&key("b"), Value::Int(0), &realm).unwrap();
        obj.set_own_value(&PropertyKey::Index(2), Value::Int(0), &realm).unwrap();
        obj.set_own_value(&key("a"), Value::Int(0), &realm).unwrap();
        obj.set_own_value(&PropertyKey::Index(0), Value::Int(0), &realm).unwrap();
        let keys = obj.own_keys();
        assert_eq!(keys[0], PropertyKey::Index(0));
        assert_eq!(keys[1], PropertyKey::Index(2));
        assert_eq!(keys[2], key("b"));
        assert_eq!(keys[3], key("a"));
        assert!(matches!(keys[4], PropertyKey::Symbol(_)));
    }

    #[test]
    fn test_lazy_function_prototype() {
        let realm = Realm::new();
        let f = realm.new_native_function(true, |_, _, _| Ok(Value::Undefined));
        let shape = f.shape();
        let location = shape.lookup(names::prototype()).unwrap().location();
        assert!(matches!(f.read_slot(&shape, location), Some(Slot::LazyPrototype)));
        let proto = f.read_data(&shape, location, &realm).unwrap();
        let again = f.read_data(&shape, location, &realm).unwrap();
        assert_eq!(proto, again);
        let proto = proto.as_object().unwrap().clone();
        let ctor = proto.get_own_property(names::constructor(), &realm).unwrap();
        assert_eq!(ctor.data_value(), Some(&Value::Object(Arc::clone(&f))));
    }
}
