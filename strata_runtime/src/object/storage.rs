//! Per-object storage blocks.
//!
//! A shaped object stores typed property values as raw words in a primitive
//! area and everything else as [`Slot`]s in an object area. A dictionary-mode
//! object keeps a [`Dictionary`] instead and ignores both areas.

use super::location::Location;
use super::shape::{PropertyFlags, Shape};
use crate::key::PropertyKey;
use crate::value::Value;
use rustc_hash::FxHashMap;

// =============================================================================
// Slots
// =============================================================================

/// Getter/setter pair of an accessor property.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccessorPair {
    pub getter: Option<Value>,
    pub setter: Option<Value>,
}

impl AccessorPair {
    /// Create an accessor pair.
    pub fn new(getter: Option<Value>, setter: Option<Value>) -> Self {
        Self { getter, setter }
    }
}

/// One entry in an object area.
#[derive(Debug, Clone, Default)]
pub enum Slot {
    /// Not yet written.
    #[default]
    Empty,
    /// A data value.
    Value(Value),
    /// An accessor property.
    Accessor(AccessorPair),
    /// A function's `prototype` object, created on first read.
    LazyPrototype,
}

impl Slot {
    /// The data value, if this slot holds one.
    #[inline]
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Slot::Value(v) => Some(v),
            _ => None,
        }
    }
}

// =============================================================================
// Storage
// =============================================================================

/// Storage block of a shaped object.
#[derive(Debug, Default)]
pub struct Storage {
    primitives: Vec<u64>,
    objects: Vec<Slot>,
}

impl Storage {
    /// Create a block sized for `shape`.
    pub fn for_shape(shape: &Shape) -> Self {
        Self {
            primitives: vec![0; shape.primitive_slots()],
            objects: vec![Slot::Empty; shape.object_slots()],
        }
    }

    /// Grow the block to fit `shape`. Existing slots keep their index.
    pub fn fit(&mut self, shape: &Shape) {
        if self.primitives.len() < shape.primitive_slots() {
            self.primitives.resize(shape.primitive_slots(), 0);
        }
        if self.objects.len() < shape.object_slots() {
            self.objects.resize(shape.object_slots(), Slot::Empty);
        }
    }

    /// Read the value at a location.
    #[inline]
    pub fn read(&self, location: Location) -> Slot {
        if location.is_primitive() {
            Slot::Value(location.kind().decode(self.primitives[location.index()]))
        } else {
            self.objects[location.index()].clone()
        }
    }

    /// Read the raw word of a typed location.
    #[inline]
    pub fn read_bits(&self, location: Location) -> u64 {
        debug_assert!(location.is_primitive());
        self.primitives[location.index()]
    }

    /// Borrow the slot of an object location.
    #[inline]
    pub fn slot(&self, location: Location) -> &Slot {
        debug_assert!(!location.is_primitive());
        &self.objects[location.index()]
    }

    /// Store a data value. The location must accept it.
    #[inline]
    pub fn write_value(&mut self, location: Location, value: &Value) {
        if location.is_primitive() {
            debug_assert!(location.kind().accepts(value));
            self.primitives[location.index()] = location.kind().encode(value);
        } else {
            self.objects[location.index()] = Slot::Value(value.clone());
        }
    }

    /// Store an arbitrary slot into an object location.
    #[inline]
    pub fn write_slot(&mut self, location: Location, slot: Slot) {
        debug_assert!(!location.is_primitive());
        self.objects[location.index()] = slot;
    }
}

// =============================================================================
// Dictionary
// =============================================================================

/// A property of a dictionary-mode object.
#[derive(Debug, Clone)]
pub struct DictionaryEntry {
    pub slot: Slot,
    pub flags: PropertyFlags,
    order: u64,
}

/// Property map of a dictionary-mode object.
///
/// Entries remember their insertion order so enumeration matches what a
/// shaped object would report.
#[derive(Debug, Default)]
pub struct Dictionary {
    entries: FxHashMap<PropertyKey, DictionaryEntry>,
    next_order: u64,
}

impl Dictionary {
    /// Create an empty dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a property.
    #[inline]
    pub fn get(&self, key: &PropertyKey) -> Option<&DictionaryEntry> {
        self.entries.get(key)
    }

    /// Look up a property for in-place update.
    #[inline]
    pub fn get_mut(&mut self, key: &PropertyKey) -> Option<&mut DictionaryEntry> {
        self.entries.get_mut(key)
    }

    /// Insert or replace a property. Replacing keeps the original position.
    pub fn insert(&mut self, key: PropertyKey, slot: Slot, flags: PropertyFlags) {
        match self.entries.get_mut(&key) {
            Some(entry) => {
                entry.slot = slot;
                entry.flags = flags;
            }
            None => {
                let order = self.next_order;
                self.next_order += 1;
                self.entries.insert(key, DictionaryEntry { slot, flags, order });
            }
        }
    }

    /// Remove a property.
    pub fn remove(&mut self, key: &PropertyKey) -> Option<DictionaryEntry> {
        self.entries.remove(key)
    }

    /// Number of properties.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if there are no properties.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> Vec<PropertyKey> {
        let mut keyed: Vec<_> = self.entries.iter().map(|(k, e)| (e.order, k.clone())).collect();
        keyed.sort_unstable_by_key(|(order, _)| *order);
        keyed.into_iter().map(|(_, k)| k).collect()
    }

    /// Apply `f` to every entry's attributes.
    pub fn update_flags(&mut self, f: impl Fn(PropertyFlags) -> PropertyFlags) {
        for entry in self.entries.values_mut() {
            entry.flags = f(entry.flags);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::location::LocationKind;

    #[test]
    fn test_storage_read_write() {
        let mut storage = Storage::default();
        storage.primitives.resize(2, 0);
        storage.objects.resize(1, Slot::Empty);

        let int = Location::new(LocationKind::Int, 0);
        let dbl = Location::new(LocationKind::Double, 1);
        let obj = Location::new(LocationKind::Object, 0);
        storage.write_value(int, &Value::Int(-3));
        storage.write_value(dbl, &Value::Int(2));
        storage.write_value(obj, &Value::string("s"));

        assert_eq!(storage.read(int).as_value(), Some(&Value::Int(-3)));
        assert_eq!(storage.read(dbl).as_value(), Some(&Value::Double(2.0)));
        assert_eq!(storage.read(obj).as_value(), Some(&Value::string("s")));
        assert_eq!(storage.read_bits(int), (-3i32) as u32 as u64);
    }

    #[test]
    fn test_dictionary_order_survives_replace_and_remove() {
        let mut dict = Dictionary::new();
        let f = PropertyFlags::default();
        dict.insert(PropertyKey::from_name("a"), Slot::Value(Value::Int(1)), f);
        dict.insert(PropertyKey::from_name("b"), Slot::Value(Value::Int(2)), f);
        dict.insert(PropertyKey::from_name("c"), Slot::Value(Value::Int(3)), f);
        dict.insert(PropertyKey::from_name("a"), Slot::Value(Value::Int(9)), f);
        dict.remove(&PropertyKey::from_name("b"));

        let keys: Vec<_> = dict.keys().iter().map(|k| k.to_string()).collect();
        assert_eq!(keys, ["a", "c"]);
        assert_eq!(
            dict.get(&PropertyKey::from_name("a")).and_then(|e| e.slot.as_value().cloned()),
            Some(Value::Int(9))
        );
    }

    #[test]
    fn test_dictionary_update_flags() {
        let mut dict = Dictionary::new();
        dict.insert(PropertyKey::from_name("a"), Slot::Empty, PropertyFlags::default());
        dict.update_flags(PropertyFlags::frozen);
        assert!(!dict.get(&PropertyKey::from_name("a")).unwrap().flags.is_writable());
    }
}
