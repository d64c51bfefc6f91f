//! Shape system for hidden class optimization.
//!
//! A `Shape` describes the property layout of every object that carries it:
//! the ordered property list, each property's storage location and
//! attributes, the object's prototype and its extensibility. Shapes are
//! immutable once published and form a transition tree rooted at one empty
//! shape per [`ShapeFlavor`]:
//!
//! ```text
//!                 Root(Ordinary)
//!                       |
//!               SetPrototype(#1)
//!                 /           \
//!        Add(x, Int)        Add(y, Object)
//!             |                   |
//!        Add(y, Object)      Add(x, Int)      <- same properties,
//!             |                                  distinct shape
//!      Generalize(x, Double)
//! ```
//!
//! Every shape owns an index over its property list for O(1) lookup. The
//! list itself is shared with the parent when a transition does not change
//! it (prototype changes, extensibility changes).
//!
//! # Assumptions
//!
//! Each shape carries three kinds of assumption used by inline caches:
//!
//! - **validity**: invalidated once, when the shape is obsoleted by a
//!   generalization. Objects still carrying it migrate lazily.
//! - **leaf**: invalidated the first time a transition edge is added from
//!   the shape. While it holds, no object carrying the shape has changed
//!   layout or prototype, which makes prototype-chain checks O(1).
//! - **finality** (per property record): invalidated on the first overwrite
//!   of the property's value through any object sharing the record.

use super::location::{Location, LocationKind};
use super::ObjectRef;
use crate::key::PropertyKey;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};
use strata_core::assumption::Assumption;

// =============================================================================
// Property Attributes
// =============================================================================

bitflags::bitflags! {
    /// Property descriptor attributes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PropertyFlags: u8 {
        /// Property value can be changed.
        const WRITABLE = 1 << 0;
        /// Property appears in enumeration.
        const ENUMERABLE = 1 << 1;
        /// Property can be deleted or have attributes changed.
        const CONFIGURABLE = 1 << 2;
        /// Property is a data property (vs accessor).
        const DATA = 1 << 3;
    }
}

impl Default for PropertyFlags {
    /// Writable, enumerable, configurable data property.
    #[inline]
    fn default() -> Self {
        Self::WRITABLE | Self::ENUMERABLE | Self::CONFIGURABLE | Self::DATA
    }
}

impl PropertyFlags {
    /// Read-only, enumerable, configurable data property.
    #[inline]
    pub const fn read_only() -> Self {
        Self::ENUMERABLE.union(Self::CONFIGURABLE).union(Self::DATA)
    }

    /// Writable, non-enumerable, configurable data property.
    #[inline]
    pub const fn hidden() -> Self {
        Self::WRITABLE.union(Self::CONFIGURABLE).union(Self::DATA)
    }

    /// Enumerable, configurable accessor property.
    #[inline]
    pub const fn accessor() -> Self {
        Self::ENUMERABLE.union(Self::CONFIGURABLE)
    }

    /// Check for a data property.
    #[inline]
    pub const fn is_data(self) -> bool {
        self.contains(Self::DATA)
    }

    /// Check for a writable data property.
    #[inline]
    pub const fn is_writable(self) -> bool {
        self.contains(Self::WRITABLE.union(Self::DATA))
    }

    /// Check for a configurable property.
    #[inline]
    pub const fn is_configurable(self) -> bool {
        self.contains(Self::CONFIGURABLE)
    }

    /// Check for an enumerable property.
    #[inline]
    pub const fn is_enumerable(self) -> bool {
        self.contains(Self::ENUMERABLE)
    }

    /// Attributes after `freeze`: no longer writable or configurable.
    #[inline]
    pub const fn frozen(self) -> Self {
        self.difference(Self::WRITABLE.union(Self::CONFIGURABLE))
    }

    /// Attributes after `seal`: no longer configurable.
    #[inline]
    pub const fn sealed(self) -> Self {
        self.difference(Self::CONFIGURABLE)
    }

    /// Whether a data property with these attributes can never change.
    #[inline]
    pub const fn is_final_data(self) -> bool {
        self.is_data() && !self.contains(Self::WRITABLE) && !self.contains(Self::CONFIGURABLE)
    }
}

// =============================================================================
// Property
// =============================================================================

/// One entry of a shape's property list.
#[derive(Debug, Clone)]
pub struct Property {
    key: PropertyKey,
    location: Location,
    flags: PropertyFlags,
    finality: Arc<Assumption>,
}

impl Property {
    /// Create a property record with a fresh finality assumption.
    pub(crate) fn new(key: PropertyKey, location: Location, flags: PropertyFlags) -> Self {
        let location = if flags.is_final_data() {
            location.into_final()
        } else {
            location
        };
        Self {
            key,
            location,
            flags,
            finality: Assumption::shared("property-final"),
        }
    }

    /// The same record with new attributes, sharing the finality assumption.
    pub(crate) fn reconfigured(&self, flags: PropertyFlags) -> Self {
        let location = Location::new(self.location.kind(), self.location.index() as u32);
        Self {
            key: self.key.clone(),
            location: if flags.is_final_data() {
                location.into_final()
            } else {
                location
            },
            flags,
            finality: Arc::clone(&self.finality),
        }
    }

    /// The property key.
    #[inline]
    pub fn key(&self) -> &PropertyKey {
        &self.key
    }

    /// The storage location.
    #[inline]
    pub fn location(&self) -> Location {
        self.location
    }

    /// The attribute flags.
    #[inline]
    pub fn flags(&self) -> PropertyFlags {
        self.flags
    }

    /// Check for a data property.
    #[inline]
    pub fn is_data(&self) -> bool {
        self.flags.is_data()
    }

    /// Check for an accessor property.
    #[inline]
    pub fn is_accessor(&self) -> bool {
        !self.flags.is_data()
    }

    /// Check for a writable data property.
    #[inline]
    pub fn is_writable(&self) -> bool {
        self.flags.is_writable()
    }

    /// The finality assumption: valid while no existing value of this
    /// property has been overwritten.
    #[inline]
    pub fn finality(&self) -> &Arc<Assumption> {
        &self.finality
    }

    /// Check if the value has never been overwritten.
    #[inline]
    pub fn assumed_final(&self) -> bool {
        self.finality.is_valid()
    }
}

// =============================================================================
// Shape ID / Flavor / Transition
// =============================================================================

/// Unique identifier for a Shape, for diagnostics and statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ShapeId(pub u32);

impl ShapeId {
    /// Get raw value.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// The category of object a shape tree describes. Fixed at the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeFlavor {
    Ordinary,
    Array,
    Function,
    TypedArray,
    Proxy,
    Foreign,
    Host,
    Global,
}

impl ShapeFlavor {
    /// Number of flavors.
    pub const COUNT: usize = 8;

    /// All flavors, in root order.
    pub const ALL: [ShapeFlavor; Self::COUNT] = [
        ShapeFlavor::Ordinary,
        ShapeFlavor::Array,
        ShapeFlavor::Function,
        ShapeFlavor::TypedArray,
        ShapeFlavor::Proxy,
        ShapeFlavor::Foreign,
        ShapeFlavor::Host,
        ShapeFlavor::Global,
    ];

    /// Whether objects of this flavor have a virtual `length` backed by
    /// their element store.
    #[inline]
    pub const fn has_virtual_length(self) -> bool {
        matches!(self, ShapeFlavor::Array | ShapeFlavor::TypedArray)
    }
}

/// A memoized edge in the transition tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Transition {
    /// Append a property.
    AddProperty {
        key: PropertyKey,
        flags: PropertyFlags,
        kind: LocationKind,
    },
    /// Remove a property; every other location is kept.
    RemoveProperty { key: PropertyKey },
    /// Move a property to a wider location kind.
    Generalize { key: PropertyKey, kind: LocationKind },
    /// Change a property's attributes in place.
    Reconfigure { key: PropertyKey, flags: PropertyFlags },
    /// Change the prototype (identified by object id, `None` for null).
    SetPrototype { proto: Option<u64> },
    /// Make the object non-extensible.
    PreventExtensions,
    /// Switch to dictionary mode.
    ToDictionary,
}

bitflags::bitflags! {
    /// Shape-level flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShapeFlags: u8 {
        /// Properties live in a per-object map, not in the shape.
        const DICTIONARY = 1 << 0;
        /// No properties may be added.
        const NOT_EXTENSIBLE = 1 << 1;
    }
}

// =============================================================================
// Property Table
// =============================================================================

/// Ordered property list with a key index.
#[derive(Default)]
pub(crate) struct PropertyTable {
    list: Vec<Property>,
    index: FxHashMap<PropertyKey, usize>,
}

impl PropertyTable {
    pub(crate) fn from_list(list: Vec<Property>) -> Self {
        let index = list
            .iter()
            .enumerate()
            .map(|(i, p)| (p.key.clone(), i))
            .collect();
        Self { list, index }
    }

    #[inline]
    pub(crate) fn get(&self, key: &PropertyKey) -> Option<&Property> {
        self.index.get(key).map(|&i| &self.list[i])
    }

    #[inline]
    pub(crate) fn as_slice(&self) -> &[Property] {
        &self.list
    }

    pub(crate) fn with_appended(&self, property: Property) -> Self {
        let mut list = Vec::with_capacity(self.list.len() + 1);
        list.extend_from_slice(&self.list);
        list.push(property);
        Self::from_list(list)
    }

    pub(crate) fn with_replaced(&self, key: &PropertyKey, property: Property) -> Self {
        let list = self
            .list
            .iter()
            .map(|p| if &p.key == key { property.clone() } else { p.clone() })
            .collect();
        Self::from_list(list)
    }

    pub(crate) fn without(&self, key: &PropertyKey) -> Self {
        let list = self.list.iter().filter(|p| &p.key != key).cloned().collect();
        Self::from_list(list)
    }
}

// =============================================================================
// Shape
// =============================================================================

/// A Shape describes the property layout of objects.
///
/// Objects that underwent the same sequence of layout mutations from the
/// same root share a pointer-identical Shape. Structurally equal shapes
/// reached through different mutation orders are distinct objects.
pub struct Shape {
    pub(crate) id: ShapeId,
    pub(crate) flavor: ShapeFlavor,
    pub(crate) flags: ShapeFlags,
    pub(crate) parent: Option<Arc<Shape>>,
    pub(crate) transition: Option<Transition>,
    pub(crate) prototype: Option<ObjectRef>,
    pub(crate) table: Arc<PropertyTable>,
    pub(crate) primitive_slots: u32,
    pub(crate) object_slots: u32,
    pub(crate) transitions: RwLock<FxHashMap<Transition, Arc<Shape>>>,
    pub(crate) valid: Arc<Assumption>,
    pub(crate) leaf: Arc<Assumption>,
    pub(crate) successor: OnceLock<Arc<Shape>>,
}

impl Shape {
    /// Create an empty root shape.
    pub(crate) fn root(id: ShapeId, flavor: ShapeFlavor) -> Self {
        Self {
            id,
            flavor,
            flags: ShapeFlags::empty(),
            parent: None,
            transition: None,
            prototype: None,
            table: Arc::new(PropertyTable::default()),
            primitive_slots: 0,
            object_slots: 0,
            transitions: RwLock::new(FxHashMap::default()),
            valid: Assumption::shared("shape-valid"),
            leaf: Assumption::shared("shape-leaf"),
            successor: OnceLock::new(),
        }
    }

    /// Create a child inheriting everything from `parent` except what the
    /// caller overrides afterwards.
    pub(crate) fn child(id: ShapeId, parent: &Arc<Shape>, transition: Transition) -> Self {
        Self {
            id,
            flavor: parent.flavor,
            flags: parent.flags,
            parent: Some(Arc::clone(parent)),
            transition: Some(transition),
            prototype: parent.prototype.clone(),
            table: Arc::clone(&parent.table),
            primitive_slots: parent.primitive_slots,
            object_slots: parent.object_slots,
            transitions: RwLock::new(FxHashMap::default()),
            valid: Assumption::shared("shape-valid"),
            leaf: Assumption::shared("shape-leaf"),
            successor: OnceLock::new(),
        }
    }

    /// Get the shape ID.
    #[inline]
    pub fn id(&self) -> ShapeId {
        self.id
    }

    /// Get the flavor fixed at the root.
    #[inline]
    pub fn flavor(&self) -> ShapeFlavor {
        self.flavor
    }

    /// Get the parent shape.
    #[inline]
    pub fn parent(&self) -> Option<&Arc<Shape>> {
        self.parent.as_ref()
    }

    /// The transition that produced this shape from its parent.
    #[inline]
    pub fn transition(&self) -> Option<&Transition> {
        self.transition.as_ref()
    }

    /// The prototype of every object with this shape.
    #[inline]
    pub fn prototype(&self) -> Option<&ObjectRef> {
        self.prototype.as_ref()
    }

    /// Lookup a property by key. O(1).
    #[inline]
    pub fn lookup(&self, key: &PropertyKey) -> Option<&Property> {
        self.table.get(key)
    }

    /// All properties in definition order.
    #[inline]
    pub fn properties(&self) -> &[Property] {
        self.table.as_slice()
    }

    /// Number of properties.
    #[inline]
    pub fn property_count(&self) -> usize {
        self.table.as_slice().len()
    }

    /// Slots needed in the primitive area.
    #[inline]
    pub fn primitive_slots(&self) -> usize {
        self.primitive_slots as usize
    }

    /// Slots needed in the object area.
    #[inline]
    pub fn object_slots(&self) -> usize {
        self.object_slots as usize
    }

    /// Check if objects of this shape keep properties in a dictionary.
    #[inline]
    pub fn is_dictionary(&self) -> bool {
        self.flags.contains(ShapeFlags::DICTIONARY)
    }

    /// Check if properties may be added.
    #[inline]
    pub fn is_extensible(&self) -> bool {
        !self.flags.contains(ShapeFlags::NOT_EXTENSIBLE)
    }

    /// Check if the shape has not been obsoleted.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.valid.is_valid()
    }

    /// The validity assumption.
    #[inline]
    pub fn validity(&self) -> &Arc<Assumption> {
        &self.valid
    }

    /// The leaf assumption.
    #[inline]
    pub fn leaf_assumption(&self) -> &Arc<Assumption> {
        &self.leaf
    }

    /// Check if no transition has been taken from this shape yet.
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.leaf.is_valid()
    }

    /// The direct successor recorded at obsoletion, if any.
    #[inline]
    pub fn successor(&self) -> Option<&Arc<Shape>> {
        self.successor.get()
    }

    /// Follow successors to the newest valid replacement.
    pub fn latest_successor(&self) -> Option<Arc<Shape>> {
        let mut current = Arc::clone(self.successor.get()?);
        while !current.is_valid() {
            current = Arc::clone(current.successor.get()?);
        }
        Some(current)
    }

    /// Check if a transition edge exists.
    pub fn has_transition(&self, transition: &Transition) -> bool {
        self.transitions.read().contains_key(transition)
    }

    /// Get an existing transition target.
    pub fn get_transition(&self, transition: &Transition) -> Option<Arc<Shape>> {
        self.transitions.read().get(transition).cloned()
    }

    /// Number of outgoing transition edges.
    pub fn transition_count(&self) -> usize {
        self.transitions.read().len()
    }

    /// Iterate from this shape up to the root.
    pub fn ancestors(&self) -> Ancestors<'_> {
        Ancestors {
            current: Some(self),
        }
    }
}

/// Iterator over a shape and its ancestors.
pub struct Ancestors<'a> {
    current: Option<&'a Shape>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a Shape;

    fn next(&mut self) -> Option<Self::Item> {
        let shape = self.current?;
        self.current = shape.parent.as_deref();
        Some(shape)
    }
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shape")
            .field("id", &self.id.0)
            .field("flavor", &self.flavor)
            .field("flags", &self.flags)
            .field(
                "prototype",
                &self.prototype.as_ref().map(|p| p.id().raw()),
            )
            .field(
                "properties",
                &self
                    .properties()
                    .iter()
                    .map(|p| (p.key(), p.location().kind()))
                    .collect::<Vec<_>>(),
            )
            .field("valid", &self.is_valid())
            .finish()
    }
}
