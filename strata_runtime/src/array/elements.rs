//! Indexed element storage.
//!
//! # Architecture
//!
//! Every object owns one `ElementStore`. Its variant is the array
//! representation; transitions only move forward along the lattice:
//!
//! ```text
//! ConstantEmpty ─> Constant{Byte,Int,Double,Object} ─> Writable{Int,Double,Object}
//!                                                          │
//!        Writable(Int) ─> Holes(Int) ─> Holes(Double) ─> Holes(Object)
//!        Writable(Double) ─────────────> Holes(Double)
//!        Writable(Object) ───────────────────────────────> Holes(Object)
//!
//!        any dense ─> Sparse          Typed(kind): never transitions
//! ```
//!
//! Element kinds widen `Byte < Int < Double < Object` (bytes only exist in
//! constant stores). Constant stores share their backing slice with the
//! literal that produced them and are copied on first write.
//!
//! The store is replaced as a whole under the owning object's write lock, so
//! length and hole count always change together with the representation.

use super::typed::{TypedArrayView, TypedKind};
use crate::object::shape::PropertyFlags;
use crate::object::storage::AccessorPair;
use crate::value::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use strata_core::config::RuntimeConfig;
use tracing::debug;

// =============================================================================
// Element Kind
// =============================================================================

/// Element representation width, ordered narrowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElementKind {
    Byte,
    Int,
    Double,
    Object,
}

impl ElementKind {
    /// The narrowest kind holding `value`.
    pub fn for_value(value: &Value) -> Self {
        match value {
            Value::Int(i) if i8::try_from(*i).is_ok() => ElementKind::Byte,
            Value::Int(_) => ElementKind::Int,
            Value::Double(_) => ElementKind::Double,
            _ => ElementKind::Object,
        }
    }

    /// Check if `value` fits without widening.
    #[inline]
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            ElementKind::Byte => matches!(value, Value::Int(i) if i8::try_from(*i).is_ok()),
            ElementKind::Int => matches!(value, Value::Int(_)),
            ElementKind::Double => matches!(value, Value::Int(_) | Value::Double(_)),
            ElementKind::Object => true,
        }
    }

    /// The kind used by mutable stores (bytes widen to ints).
    #[inline]
    pub fn writable(self) -> Self {
        self.max(ElementKind::Int)
    }
}

// =============================================================================
// Array Kind
// =============================================================================

/// Tag identifying an element store's representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArrayKind {
    ConstantEmpty,
    ConstantPacked(ElementKind),
    Writable(ElementKind),
    Holes(ElementKind),
    Sparse,
    Typed(TypedKind),
}

impl ArrayKind {
    fn stage(self) -> u8 {
        match self {
            ArrayKind::ConstantEmpty => 0,
            ArrayKind::ConstantPacked(_) => 1,
            ArrayKind::Writable(_) => 2,
            ArrayKind::Holes(_) => 3,
            ArrayKind::Sparse => 4,
            ArrayKind::Typed(_) => 5,
        }
    }

    /// The element kind of dense representations.
    pub fn element_kind(self) -> Option<ElementKind> {
        match self {
            ArrayKind::ConstantPacked(k) | ArrayKind::Writable(k) | ArrayKind::Holes(k) => Some(k),
            _ => None,
        }
    }

    /// Check if the representation is copy-on-write.
    #[inline]
    pub fn is_constant(self) -> bool {
        matches!(self, ArrayKind::ConstantEmpty | ArrayKind::ConstantPacked(_))
    }

    /// Check if `next` is reachable from `self` without narrowing.
    pub fn widens_to(self, next: ArrayKind) -> bool {
        if self == next {
            return true;
        }
        match (self, next) {
            (ArrayKind::Typed(_), _) | (_, ArrayKind::Typed(_)) => false,
            (_, ArrayKind::Sparse) => true,
            (ArrayKind::Sparse, _) => false,
            _ => {
                let kinds_ok = match (self.element_kind(), next.element_kind()) {
                    (Some(a), Some(b)) => a.writable() <= b.writable() || self.is_constant(),
                    _ => true,
                };
                self.stage() <= next.stage() && kinds_ok
            }
        }
    }
}

// =============================================================================
// Holey vectors / sparse maps
// =============================================================================

/// Dense storage with explicit holes.
#[derive(Debug, Clone, Default)]
pub struct HoleVec<T> {
    slots: Vec<Option<T>>,
    holes: u32,
}

impl<T: Clone> HoleVec<T> {
    fn from_slots(slots: Vec<Option<T>>) -> Self {
        let holes = slots.iter().filter(|s| s.is_none()).count() as u32;
        Self { slots, holes }
    }

    /// Number of holes within the length.
    #[inline]
    pub fn holes(&self) -> u32 {
        self.holes
    }

    #[inline]
    fn len(&self) -> u32 {
        self.slots.len() as u32
    }

    #[inline]
    fn get(&self, index: u32) -> Option<&Option<T>> {
        self.slots.get(index as usize)
    }

    fn set(&mut self, index: u32, value: T) {
        let i = index as usize;
        if i >= self.slots.len() {
            self.holes += (i - self.slots.len()) as u32;
            self.slots.resize(i, None);
            self.slots.push(Some(value));
        } else {
            if self.slots[i].is_none() {
                self.holes -= 1;
            }
            self.slots[i] = Some(value);
        }
    }

    fn clear(&mut self, index: u32) {
        if let Some(slot) = self.slots.get_mut(index as usize) {
            if slot.take().is_some() {
                self.holes += 1;
            }
        }
    }

    fn resize(&mut self, len: u32) {
        let len = len as usize;
        if len < self.slots.len() {
            self.slots.truncate(len);
            self.holes = self.slots.iter().filter(|s| s.is_none()).count() as u32;
        } else {
            self.holes += (len - self.slots.len()) as u32;
            self.slots.resize(len, None);
        }
    }
}

/// Value of a sparse entry.
#[derive(Debug, Clone)]
pub enum SparseSlot {
    Data(Value),
    Accessor(AccessorPair),
}

/// One present index of a sparse store.
#[derive(Debug, Clone)]
pub struct SparseEntry {
    pub slot: SparseSlot,
    pub flags: PropertyFlags,
}

/// Map-backed storage for far-apart indices or per-element attributes.
#[derive(Debug, Clone)]
pub struct SparseElements {
    entries: BTreeMap<u32, SparseEntry>,
    length: u32,
    length_writable: bool,
}

impl SparseElements {
    /// Number of present entries.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Whether `length` may still be assigned.
    pub fn length_writable(&self) -> bool {
        self.length_writable
    }
}

// =============================================================================
// Element Store
// =============================================================================

/// Result of reading one element.
#[derive(Debug, Clone)]
pub enum ElementRead {
    /// A present data element.
    Value(Value),
    /// A present accessor element (sparse only).
    Accessor(AccessorPair),
    /// Within the length but unassigned.
    Hole,
    /// At or beyond the length.
    OutOfBounds,
}

/// Result of a semantic check before a write.
#[derive(Debug, Clone)]
pub enum ElementWriteCheck {
    /// Writable data element present.
    Writable,
    /// Present but read-only.
    ReadOnly,
    /// Present accessor.
    Accessor(AccessorPair),
    /// Absent; a new element must be created.
    Absent,
}

/// Backing store for indexed properties.
#[derive(Debug, Clone, Default)]
pub enum ElementStore {
    #[default]
    ConstantEmpty,
    ConstantByte(Arc<[i8]>),
    ConstantInt(Arc<[i32]>),
    ConstantDouble(Arc<[f64]>),
    ConstantObject(Arc<[Value]>),
    WritableInt(Vec<i32>),
    WritableDouble(Vec<f64>),
    WritableObject(Vec<Value>),
    HolesInt(HoleVec<i32>),
    HolesDouble(HoleVec<f64>),
    HolesObject(HoleVec<Value>),
    Sparse(SparseElements),
    Typed(TypedArrayView),
}

impl ElementStore {
    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    /// A constant store of the narrowest kind holding every value.
    pub fn constant(values: &[Value]) -> Self {
        if values.is_empty() {
            return ElementStore::ConstantEmpty;
        }
        let kind = values
            .iter()
            .map(ElementKind::for_value)
            .max()
            .unwrap_or(ElementKind::Byte);
        match kind {
            ElementKind::Byte => ElementStore::ConstantByte(
                values.iter().map(|v| as_int(v) as i8).collect(),
            ),
            ElementKind::Int => ElementStore::ConstantInt(values.iter().map(as_int).collect()),
            ElementKind::Double => {
                ElementStore::ConstantDouble(values.iter().map(as_double).collect())
            }
            ElementKind::Object => ElementStore::ConstantObject(values.iter().cloned().collect()),
        }
    }

    /// A writable store of the narrowest mutable kind holding every value.
    pub fn packed(values: Vec<Value>) -> Self {
        let kind = values
            .iter()
            .map(ElementKind::for_value)
            .max()
            .unwrap_or(ElementKind::Int)
            .writable();
        Self::build(kind, false, values.into_iter().map(Some).collect())
    }

    /// A writable store for a slot list that may contain holes. Without
    /// holes this is the same as [`packed`](Self::packed).
    pub fn from_slots(slots: Vec<Option<Value>>) -> Self {
        let kind = slots
            .iter()
            .flatten()
            .map(ElementKind::for_value)
            .max()
            .unwrap_or(ElementKind::Int)
            .writable();
        let holes = slots.iter().any(Option::is_none);
        Self::build(kind, holes, slots)
    }

    /// A typed store.
    pub fn typed(view: TypedArrayView) -> Self {
        ElementStore::Typed(view)
    }

    fn build(kind: ElementKind, holes: bool, slots: Vec<Option<Value>>) -> Self {
        let kind = kind.writable();
        if holes {
            match kind {
                ElementKind::Byte | ElementKind::Int => ElementStore::HolesInt(HoleVec::from_slots(
                    slots.iter().map(|s| s.as_ref().map(as_int)).collect(),
                )),
                ElementKind::Double => ElementStore::HolesDouble(HoleVec::from_slots(
                    slots.iter().map(|s| s.as_ref().map(as_double)).collect(),
                )),
                ElementKind::Object => ElementStore::HolesObject(HoleVec::from_slots(slots)),
            }
        } else {
            let values = slots.into_iter().flatten();
            match kind {
                ElementKind::Byte | ElementKind::Int => {
                    ElementStore::WritableInt(values.map(|v| as_int(&v)).collect())
                }
                ElementKind::Double => {
                    ElementStore::WritableDouble(values.map(|v| as_double(&v)).collect())
                }
                ElementKind::Object => ElementStore::WritableObject(values.collect()),
            }
        }
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// The representation tag.
    pub fn kind(&self) -> ArrayKind {
        match self {
            ElementStore::ConstantEmpty => ArrayKind::ConstantEmpty,
            ElementStore::ConstantByte(_) => ArrayKind::ConstantPacked(ElementKind::Byte),
            ElementStore::ConstantInt(_) => ArrayKind::ConstantPacked(ElementKind::Int),
            ElementStore::ConstantDouble(_) => ArrayKind::ConstantPacked(ElementKind::Double),
            ElementStore::ConstantObject(_) => ArrayKind::ConstantPacked(ElementKind::Object),
            ElementStore::WritableInt(_) => ArrayKind::Writable(ElementKind::Int),
            ElementStore::WritableDouble(_) => ArrayKind::Writable(ElementKind::Double),
            ElementStore::WritableObject(_) => ArrayKind::Writable(ElementKind::Object),
            ElementStore::HolesInt(_) => ArrayKind::Holes(ElementKind::Int),
            ElementStore::HolesDouble(_) => ArrayKind::Holes(ElementKind::Double),
            ElementStore::HolesObject(_) => ArrayKind::Holes(ElementKind::Object),
            ElementStore::Sparse(_) => ArrayKind::Sparse,
            ElementStore::Typed(view) => ArrayKind::Typed(view.kind()),
        }
    }

    /// The element length.
    pub fn len(&self) -> u32 {
        match self {
            ElementStore::ConstantEmpty => 0,
            ElementStore::ConstantByte(v) => v.len() as u32,
            ElementStore::ConstantInt(v) => v.len() as u32,
            ElementStore::ConstantDouble(v) => v.len() as u32,
            ElementStore::ConstantObject(v) => v.len() as u32,
            ElementStore::WritableInt(v) => v.len() as u32,
            ElementStore::WritableDouble(v) => v.len() as u32,
            ElementStore::WritableObject(v) => v.len() as u32,
            ElementStore::HolesInt(v) => v.len(),
            ElementStore::HolesDouble(v) => v.len(),
            ElementStore::HolesObject(v) => v.len(),
            ElementStore::Sparse(s) => s.length,
            ElementStore::Typed(view) => view.len(),
        }
    }

    /// Check if the length is 0.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of holes within the length (dense holey stores only).
    pub fn hole_count(&self) -> u32 {
        match self {
            ElementStore::HolesInt(v) => v.holes(),
            ElementStore::HolesDouble(v) => v.holes(),
            ElementStore::HolesObject(v) => v.holes(),
            _ => 0,
        }
    }

    /// Whether the array `length` property may be assigned.
    pub fn length_writable(&self) -> bool {
        match self {
            ElementStore::Sparse(s) => s.length_writable,
            ElementStore::Typed(_) => false,
            _ => true,
        }
    }

    /// Read one element.
    pub fn get(&self, index: u32) -> ElementRead {
        let i = index as usize;
        let hit = match self {
            ElementStore::ConstantEmpty => None,
            ElementStore::ConstantByte(v) => v.get(i).map(|&b| Some(Value::Int(b as i32))),
            ElementStore::ConstantInt(v) => v.get(i).map(|&n| Some(Value::Int(n))),
            ElementStore::ConstantDouble(v) => v.get(i).map(|&d| Some(Value::Double(d))),
            ElementStore::ConstantObject(v) => v.get(i).map(|x| Some(x.clone())),
            ElementStore::WritableInt(v) => v.get(i).map(|&n| Some(Value::Int(n))),
            ElementStore::WritableDouble(v) => v.get(i).map(|&d| Some(Value::Double(d))),
            ElementStore::WritableObject(v) => v.get(i).map(|x| Some(x.clone())),
            ElementStore::HolesInt(v) => v.get(index).map(|s| s.map(Value::Int)),
            ElementStore::HolesDouble(v) => v.get(index).map(|s| s.map(Value::Double)),
            ElementStore::HolesObject(v) => v.get(index).map(|s| s.clone()),
            ElementStore::Sparse(s) => {
                return match s.entries.get(&index) {
                    Some(SparseEntry {
                        slot: SparseSlot::Data(v),
                        ..
                    }) => ElementRead::Value(v.clone()),
                    Some(SparseEntry {
                        slot: SparseSlot::Accessor(pair),
                        ..
                    }) => ElementRead::Accessor(pair.clone()),
                    None if index < s.length => ElementRead::Hole,
                    None => ElementRead::OutOfBounds,
                };
            }
            ElementStore::Typed(view) => {
                return match view.get(index) {
                    Some(v) => ElementRead::Value(v),
                    None => ElementRead::OutOfBounds,
                };
            }
        };
        match hit {
            Some(Some(v)) => ElementRead::Value(v),
            Some(None) => ElementRead::Hole,
            None => ElementRead::OutOfBounds,
        }
    }

    /// Attributes of a present element.
    pub fn flags(&self, index: u32) -> Option<PropertyFlags> {
        match self {
            ElementStore::Sparse(s) => s.entries.get(&index).map(|e| e.flags),
            ElementStore::Typed(view) => {
                (index < view.len()).then_some(PropertyFlags::default().sealed())
            }
            _ => match self.get(index) {
                ElementRead::Value(_) => Some(PropertyFlags::default()),
                _ => None,
            },
        }
    }

    /// Classify an index before a write.
    pub fn check_write(&self, index: u32) -> ElementWriteCheck {
        match self {
            ElementStore::Sparse(s) => match s.entries.get(&index) {
                Some(SparseEntry {
                    slot: SparseSlot::Accessor(pair),
                    ..
                }) => ElementWriteCheck::Accessor(pair.clone()),
                Some(entry) if entry.flags.is_writable() => ElementWriteCheck::Writable,
                Some(_) => ElementWriteCheck::ReadOnly,
                None => ElementWriteCheck::Absent,
            },
            _ => match self.get(index) {
                ElementRead::Value(_) => ElementWriteCheck::Writable,
                _ => ElementWriteCheck::Absent,
            },
        }
    }

    /// Present indices in ascending order.
    pub fn indices(&self) -> Vec<u32> {
        match self {
            ElementStore::Sparse(s) => s.entries.keys().copied().collect(),
            ElementStore::HolesInt(v) => present(&v.slots),
            ElementStore::HolesDouble(v) => present(&v.slots),
            ElementStore::HolesObject(v) => present(&v.slots),
            _ => (0..self.len()).collect(),
        }
    }

    // -------------------------------------------------------------------------
    // Writes
    // -------------------------------------------------------------------------

    /// Store without changing representation.
    ///
    /// Succeeds for an in-bounds present element whose kind accepts the
    /// value. With `fill` set it also fills holes and appends at `len`; the
    /// caller must know that no prototype defines indexed properties.
    pub fn write_in_place(&mut self, index: u32, value: &Value, fill: bool) -> bool {
        let i = index as usize;
        macro_rules! dense {
            ($vec:expr, $accepts:expr, $conv:expr) => {{
                if !$accepts {
                    return false;
                }
                if i < $vec.len() {
                    $vec[i] = $conv;
                    true
                } else if fill && i == $vec.len() {
                    $vec.push($conv);
                    true
                } else {
                    false
                }
            }};
        }
        macro_rules! holey {
            ($hv:expr, $accepts:expr, $conv:expr) => {{
                if !$accepts {
                    return false;
                }
                let present = $hv.get(index).map(Option::is_some);
                let allowed = match present {
                    Some(true) => true,
                    Some(false) => fill,
                    None => fill && index == $hv.len(),
                };
                if allowed {
                    $hv.set(index, $conv);
                }
                allowed
            }};
        }
        match self {
            ElementStore::WritableInt(v) => dense!(v, ElementKind::Int.accepts(value), as_int(value)),
            ElementStore::WritableDouble(v) => {
                dense!(v, ElementKind::Double.accepts(value), as_double(value))
            }
            ElementStore::WritableObject(v) => dense!(v, true, value.clone()),
            ElementStore::HolesInt(v) => holey!(v, ElementKind::Int.accepts(value), as_int(value)),
            ElementStore::HolesDouble(v) => {
                holey!(v, ElementKind::Double.accepts(value), as_double(value))
            }
            ElementStore::HolesObject(v) => holey!(v, true, value.clone()),
            ElementStore::Sparse(s) => match s.entries.get_mut(&index) {
                Some(SparseEntry {
                    slot: slot @ SparseSlot::Data(_),
                    flags,
                }) if flags.is_writable() => {
                    *slot = SparseSlot::Data(value.clone());
                    true
                }
                _ => false,
            },
            _ => false,
        }
    }

    /// Store with whatever representation change the value and index need.
    ///
    /// The caller has already established that the write is permitted
    /// (no setter, not read-only, object extensible if the index is new).
    /// Typed stores are written through [`TypedArrayView::set`] instead.
    pub fn write(&mut self, index: u32, value: Value, config: &RuntimeConfig) {
        if self.write_in_place(index, &value, true) {
            return;
        }
        if let ElementStore::Typed(_) = self {
            debug_assert!(false, "typed stores are written through the view");
            return;
        }

        let len = self.len();
        let far = index >= config.max_dense_length
            || index > len.saturating_add(config.sparse_gap_threshold);
        if far && !matches!(self, ElementStore::Sparse(_)) {
            self.make_sparse();
        }

        if let ElementStore::Sparse(s) = self {
            match s.entries.get_mut(&index) {
                Some(entry) => entry.slot = SparseSlot::Data(value),
                None => {
                    s.entries.insert(
                        index,
                        SparseEntry {
                            slot: SparseSlot::Data(value),
                            flags: PropertyFlags::default(),
                        },
                    );
                }
            }
            if index >= s.length {
                s.length = index + 1;
            }
            return;
        }

        let current = self.kind();
        let needed = ElementKind::for_value(&value).writable();
        let kind = current.element_kind().map_or(needed, |k| k.max(needed)).writable();
        let holes = matches!(current, ArrayKind::Holes(_)) || index > len;
        self.retag(kind, holes);
        let written = self.write_in_place(index, &value, true);
        debug_assert!(written, "retagged store must accept the write");
    }

    /// Convert to a dense store of at least `kind` (with holes if `holes`).
    fn retag(&mut self, kind: ElementKind, holes: bool) {
        let target = if holes {
            ArrayKind::Holes(kind)
        } else {
            ArrayKind::Writable(kind)
        };
        if self.kind() == target {
            return;
        }
        let slots = self.slots();
        *self = Self::build(kind, holes, slots);
    }

    fn slots(&self) -> Vec<Option<Value>> {
        let len = self.len();
        (0..len)
            .map(|i| match self.get(i) {
                ElementRead::Value(v) => Some(v),
                _ => None,
            })
            .collect()
    }

    /// Copy a constant store into the equivalent writable one.
    pub fn thaw(&mut self) {
        if let ArrayKind::ConstantPacked(kind) = self.kind() {
            let slots = self.slots();
            *self = Self::build(kind, false, slots);
        }
    }

    /// Move to the sparse representation, keeping every present element.
    pub fn make_sparse(&mut self) {
        if matches!(self, ElementStore::Sparse(_) | ElementStore::Typed(_)) {
            return;
        }
        let from = self.kind();
        let length = self.len();
        let entries = (0..length)
            .filter_map(|i| match self.get(i) {
                ElementRead::Value(v) => Some((
                    i,
                    SparseEntry {
                        slot: SparseSlot::Data(v),
                        flags: PropertyFlags::default(),
                    },
                )),
                _ => None,
            })
            .collect();
        *self = ElementStore::Sparse(SparseElements {
            entries,
            length,
            length_writable: true,
        });
        debug!(?from, length, "elements moved to sparse representation");
    }

    /// Define an element with explicit attributes or an accessor.
    pub fn define(&mut self, index: u32, slot: SparseSlot, flags: PropertyFlags, config: &RuntimeConfig) {
        if let (SparseSlot::Data(value), true) = (&slot, flags == PropertyFlags::default()) {
            if !matches!(self, ElementStore::Sparse(_)) {
                self.write(index, value.clone(), config);
                return;
            }
        }
        self.make_sparse();
        if let ElementStore::Sparse(s) = self {
            s.entries.insert(index, SparseEntry { slot, flags });
            if index >= s.length {
                s.length = index + 1;
            }
        }
    }

    /// Delete an element. Returns `false` if it is not configurable.
    pub fn delete(&mut self, index: u32) -> bool {
        if index >= self.len() {
            return true;
        }
        match self {
            ElementStore::Typed(_) => false,
            ElementStore::Sparse(s) => match s.entries.get(&index) {
                Some(entry) if !entry.flags.is_configurable() => false,
                _ => {
                    s.entries.remove(&index);
                    true
                }
            },
            _ => {
                if let Some(kind) = self.kind().element_kind() {
                    self.retag(kind.writable(), true);
                }
                match self {
                    ElementStore::HolesInt(v) => v.clear(index),
                    ElementStore::HolesDouble(v) => v.clear(index),
                    ElementStore::HolesObject(v) => v.clear(index),
                    _ => {}
                }
                true
            }
        }
    }

    /// Assign the array length. Truncates or extends with holes.
    ///
    /// Returns `false` if the length is read-only or a non-configurable
    /// element prevented full truncation.
    pub fn set_length(&mut self, new_len: u32, config: &RuntimeConfig) -> bool {
        let len = self.len();
        if !self.length_writable() {
            return new_len == len;
        }
        if new_len == len {
            return true;
        }
        if new_len > len
            && (new_len > config.max_dense_length
                || new_len - len > config.sparse_gap_threshold)
        {
            self.make_sparse();
        }
        match self {
            ElementStore::Sparse(s) => {
                if new_len < s.length {
                    let doomed: Vec<u32> = s.entries.range(new_len..).map(|(&i, _)| i).rev().collect();
                    for i in doomed {
                        let configurable = s.entries.get(&i).is_some_and(|e| e.flags.is_configurable());
                        if !configurable {
                            s.length = i + 1;
                            return false;
                        }
                        s.entries.remove(&i);
                    }
                }
                s.length = new_len;
                true
            }
            _ => {
                if new_len < len {
                    self.thaw();
                    match self {
                        ElementStore::ConstantEmpty => {}
                        ElementStore::WritableInt(v) => v.truncate(new_len as usize),
                        ElementStore::WritableDouble(v) => v.truncate(new_len as usize),
                        ElementStore::WritableObject(v) => v.truncate(new_len as usize),
                        ElementStore::HolesInt(v) => v.resize(new_len),
                        ElementStore::HolesDouble(v) => v.resize(new_len),
                        ElementStore::HolesObject(v) => v.resize(new_len),
                        _ => {}
                    }
                } else {
                    let kind = self.kind().element_kind().unwrap_or(ElementKind::Int).writable();
                    self.retag(kind, true);
                    match self {
                        ElementStore::HolesInt(v) => v.resize(new_len),
                        ElementStore::HolesDouble(v) => v.resize(new_len),
                        ElementStore::HolesObject(v) => v.resize(new_len),
                        _ => {}
                    }
                }
                true
            }
        }
    }

    /// Apply attribute changes to every element (freeze/seal).
    ///
    /// Moves to the sparse representation so each element carries its own
    /// attributes. `length` becomes read-only when `lock_length` is set.
    pub fn restrict(&mut self, f: impl Fn(PropertyFlags) -> PropertyFlags, lock_length: bool) {
        if let ElementStore::Typed(_) = self {
            return;
        }
        self.make_sparse();
        if let ElementStore::Sparse(s) = self {
            for entry in s.entries.values_mut() {
                entry.flags = f(entry.flags);
            }
            if lock_length {
                s.length_writable = false;
            }
        }
    }

    /// The typed view, if this is a typed store.
    pub fn as_typed(&self) -> Option<&TypedArrayView> {
        match self {
            ElementStore::Typed(view) => Some(view),
            _ => None,
        }
    }
}

fn present<T>(slots: &[Option<T>]) -> Vec<u32> {
    slots
        .iter()
        .enumerate()
        .filter(|(_, s)| s.is_some())
        .map(|(i, _)| i as u32)
        .collect()
}

#[inline]
fn as_int(value: &Value) -> i32 {
    match value {
        Value::Int(i) => *i,
        _ => {
            debug_assert!(false, "int store cannot hold {value:?}");
            0
        }
    }
}

#[inline]
fn as_double(value: &Value) -> f64 {
    value.as_f64().unwrap_or_else(|| {
        debug_assert!(false, "double store cannot hold {value:?}");
        f64::NAN
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RuntimeConfig {
        RuntimeConfig::default()
    }

    fn ints(values: &[i32]) -> Vec<Value> {
        values.iter().map(|&i| Value::Int(i)).collect()
    }

    fn value_at(store: &ElementStore, index: u32) -> Option<Value> {
        match store.get(index) {
            ElementRead::Value(v) => Some(v),
            _ => None,
        }
    }

    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    #[test]
    fn test_constant_picks_narrowest_kind() {
        assert_eq!(ElementStore::constant(&[]).kind(), ArrayKind::ConstantEmpty);
        assert_eq!(
            ElementStore::constant(&ints(&[1, 2, 3])).kind(),
            ArrayKind::ConstantPacked(ElementKind::Byte)
        );
        assert_eq!(
            ElementStore::constant(&ints(&[1, 1000])).kind(),
            ArrayKind::ConstantPacked(ElementKind::Int)
        );
        assert_eq!(
            ElementStore::constant(&[Value::Int(1), Value::Double(0.5)]).kind(),
            ArrayKind::ConstantPacked(ElementKind::Double)
        );
        assert_eq!(
            ElementStore::constant(&[Value::Int(1), Value::string("a")]).kind(),
            ArrayKind::ConstantPacked(ElementKind::Object)
        );
    }

    #[test]
    fn test_from_slots_with_holes() {
        let store = ElementStore::from_slots(vec![Some(Value::Int(1)), None, Some(Value::Int(3))]);
        assert_eq!(store.kind(), ArrayKind::Holes(ElementKind::Int));
        assert_eq!(store.hole_count(), 1);
        assert!(matches!(store.get(1), ElementRead::Hole));
        assert_eq!(store.len(), 3);
    }

    // -------------------------------------------------------------------------
    // Writes and transitions
    // -------------------------------------------------------------------------

    #[test]
    fn test_constant_thaws_on_write() {
        let mut store = ElementStore::constant(&ints(&[1, 2, 3]));
        store.write(0, Value::Int(7), &config());
        assert_eq!(store.kind(), ArrayKind::Writable(ElementKind::Int));
        assert_eq!(value_at(&store, 0), Some(Value::Int(7)));
    }

    #[test]
    fn test_constant_shared_backing_is_not_mutated() {
        let shared: Arc<[i32]> = Arc::from(vec![1000, 2000]);
        let mut a = ElementStore::ConstantInt(Arc::clone(&shared));
        let b = ElementStore::ConstantInt(Arc::clone(&shared));
        a.write(0, Value::Int(1), &config());
        assert_eq!(value_at(&b, 0), Some(Value::Int(1000)));
    }

    #[test]
    fn test_append_extends() {
        let mut store = ElementStore::packed(ints(&[1, 2]));
        store.write(2, Value::Int(3), &config());
        assert_eq!(store.len(), 3);
        assert_eq!(store.kind(), ArrayKind::Writable(ElementKind::Int));
    }

    #[test]
    fn test_widen_int_to_double_to_object() {
        let mut store = ElementStore::packed(ints(&[1, 2]));
        store.write(0, Value::Double(1.5), &config());
        assert_eq!(store.kind(), ArrayKind::Writable(ElementKind::Double));
        assert_eq!(value_at(&store, 1), Some(Value::Int(2)));
        store.write(1, Value::string("s"), &config());
        assert_eq!(store.kind(), ArrayKind::Writable(ElementKind::Object));
        assert_eq!(value_at(&store, 0), Some(Value::Double(1.5)));
    }

    #[test]
    fn test_gap_write_creates_holes() {
        let mut store = ElementStore::constant(&ints(&[1, 2, 3]));
        store.write(5, Value::Int(9), &config());
        assert_eq!(store.kind(), ArrayKind::Holes(ElementKind::Int));
        assert_eq!(store.len(), 6);
        assert_eq!(store.hole_count(), 2);
        assert!(matches!(store.get(4), ElementRead::Hole));
        assert_eq!(value_at(&store, 5), Some(Value::Int(9)));
    }

    #[test]
    fn test_holes_stay_holey_after_filling() {
        let mut store = ElementStore::from_slots(vec![Some(Value::Int(1)), None]);
        store.write(1, Value::Int(2), &config());
        assert_eq!(store.hole_count(), 0);
        assert_eq!(store.kind(), ArrayKind::Holes(ElementKind::Int));
        store.write(0, Value::Double(0.5), &config());
        assert_eq!(store.kind(), ArrayKind::Holes(ElementKind::Double));
    }

    #[test]
    fn test_far_write_goes_sparse() {
        let mut store = ElementStore::packed(ints(&[1]));
        store.write(1_000_000, Value::Int(2), &config());
        assert_eq!(store.kind(), ArrayKind::Sparse);
        assert_eq!(store.len(), 1_000_001);
        assert_eq!(value_at(&store, 0), Some(Value::Int(1)));
        assert!(matches!(store.get(10), ElementRead::Hole));
        store.write(5, Value::Int(3), &config());
        assert_eq!(store.kind(), ArrayKind::Sparse);
    }

    #[test]
    fn test_write_in_place_respects_fill_flag() {
        let mut store = ElementStore::packed(ints(&[1]));
        assert!(!store.write_in_place(1, &Value::Int(2), false));
        assert!(store.write_in_place(1, &Value::Int(2), true));
        assert!(!store.write_in_place(0, &Value::Double(0.5), true));
    }

    // -------------------------------------------------------------------------
    // Delete / length / restrict
    // -------------------------------------------------------------------------

    #[test]
    fn test_delete_creates_hole() {
        let mut store = ElementStore::packed(ints(&[1, 2, 3]));
        assert!(store.delete(1));
        assert_eq!(store.kind(), ArrayKind::Holes(ElementKind::Int));
        assert!(matches!(store.get(1), ElementRead::Hole));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_set_length_truncate_and_extend() {
        let mut store = ElementStore::packed(ints(&[1, 2, 3]));
        assert!(store.set_length(1, &config()));
        assert_eq!(store.len(), 1);
        assert!(store.set_length(4, &config()));
        assert_eq!(store.kind(), ArrayKind::Holes(ElementKind::Int));
        assert_eq!(store.hole_count(), 3);
    }

    #[test]
    fn test_frozen_elements() {
        let mut store = ElementStore::packed(ints(&[1, 2]));
        store.restrict(PropertyFlags::frozen, true);
        assert_eq!(store.kind(), ArrayKind::Sparse);
        assert!(matches!(store.check_write(0), ElementWriteCheck::ReadOnly));
        assert!(!store.delete(0));
        assert!(!store.set_length(0, &config()));
        assert!(!store.length_writable());
    }

    #[test]
    fn test_define_accessor_goes_sparse() {
        let mut store = ElementStore::packed(ints(&[1]));
        store.define(
            0,
            SparseSlot::Accessor(AccessorPair::default()),
            PropertyFlags::accessor(),
            &config(),
        );
        assert_eq!(store.kind(), ArrayKind::Sparse);
        assert!(matches!(store.get(0), ElementRead::Accessor(_)));
    }

    // -------------------------------------------------------------------------
    // Lattice
    // -------------------------------------------------------------------------

    #[test]
    fn test_widens_to() {
        let wi = ArrayKind::Writable(ElementKind::Int);
        let hd = ArrayKind::Holes(ElementKind::Double);
        assert!(wi.widens_to(hd));
        assert!(!hd.widens_to(wi));
        assert!(hd.widens_to(ArrayKind::Sparse));
        assert!(!ArrayKind::Sparse.widens_to(hd));
        assert!(ArrayKind::ConstantPacked(ElementKind::Byte).widens_to(wi));
        assert!(!ArrayKind::Typed(TypedKind::Int8).widens_to(ArrayKind::Sparse));
    }
}
