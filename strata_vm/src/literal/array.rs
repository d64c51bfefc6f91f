//! Array literal construction.
//!
//! A literal whose elements are all compile-time constants picks its
//! representation once, from the values, and every evaluation starts from
//! that store. Other literals evaluate into a pre-sized primitive buffer of
//! the kind the site has seen so far and fall back to a slot list (which
//! tracks holes) when an element does not fit.

use std::sync::atomic::{AtomicU8, Ordering};
use strata_runtime::array::{ArrayKind, ElementKind, ElementStore};
use strata_runtime::{ObjectRef, Realm, RuntimeError, RuntimeResult, Value};
use tracing::trace;

/// One evaluated element of a non-constant literal.
#[derive(Debug, Clone)]
pub enum ElementValue {
    Value(Value),
    /// An elided element (`[a, , b]`).
    Hole,
    /// `...iterable`
    Spread(Value),
}

/// The static description of one array literal expression.
#[derive(Debug)]
pub enum ArrayLiteral {
    /// Every element is a constant; the store is built once.
    Constant(ElementStore),
    /// Elements are evaluated each time.
    Dynamic(DynamicArray),
}

impl ArrayLiteral {
    /// A literal of constant elements, `None` marking an elided element.
    pub fn constant(values: &[Option<Value>]) -> Self {
        let store = if values.iter().all(Option::is_some) {
            let values: Vec<Value> = values.iter().flatten().cloned().collect();
            ElementStore::constant(&values)
        } else {
            ElementStore::from_slots(values.to_vec())
        };
        ArrayLiteral::Constant(store)
    }

    /// A literal whose elements are evaluated.
    pub fn dynamic() -> Self {
        ArrayLiteral::Dynamic(DynamicArray::new())
    }

    /// The representation a constant literal starts with.
    pub fn constant_kind(&self) -> Option<ArrayKind> {
        match self {
            ArrayLiteral::Constant(store) => Some(store.kind()),
            ArrayLiteral::Dynamic(_) => None,
        }
    }

    /// Evaluate the literal. Constant literals take no elements.
    pub fn construct(&self, elements: &[ElementValue], realm: &Realm) -> RuntimeResult<ObjectRef> {
        match self {
            ArrayLiteral::Constant(store) if elements.is_empty() => Ok(realm.new_array_from_store(store.clone())),
            ArrayLiteral::Constant(_) => Err(RuntimeError::type_error(
                "constant array literal takes no evaluated elements",
            )),
            ArrayLiteral::Dynamic(dynamic) => dynamic.construct(elements, realm),
        }
    }
}

// =============================================================================
// Dynamic Literals
// =============================================================================

const HINT_INT: u8 = 0;
const HINT_DOUBLE: u8 = 1;
const HINT_OBJECT: u8 = 2;

/// Evaluation state of a non-constant literal: the widest element kind
/// produced so far.
#[derive(Debug)]
pub struct DynamicArray {
    hint: AtomicU8,
}

impl DynamicArray {
    fn new() -> Self {
        Self {
            hint: AtomicU8::new(HINT_INT),
        }
    }

    /// The element kind the next evaluation starts with.
    pub fn hint(&self) -> ElementKind {
        match self.hint.load(Ordering::Relaxed) {
            HINT_INT => ElementKind::Int,
            HINT_DOUBLE => ElementKind::Double,
            _ => ElementKind::Object,
        }
    }

    fn construct(&self, elements: &[ElementValue], realm: &Realm) -> RuntimeResult<ObjectRef> {
        let mut buffer = Buffer::with_hint(self.hint(), elements.len());
        for element in elements {
            match element {
                ElementValue::Value(value) => buffer.push(value.clone()),
                ElementValue::Hole => buffer.push_hole(),
                ElementValue::Spread(source) => realm.iteration().iterate(realm, source, &mut |value| {
                    buffer.push(value);
                    Ok(())
                })?,
            }
        }
        let widened = buffer.hint();
        if self.hint.fetch_max(widened, Ordering::Relaxed) < widened {
            trace!(hint = widened, "array literal widened");
        }
        Ok(realm.new_array_from_store(buffer.finish()))
    }
}

/// Pre-sized evaluation buffer.
enum Buffer {
    Int(Vec<i32>),
    Double(Vec<f64>),
    Slots(Vec<Option<Value>>),
}

impl Buffer {
    fn with_hint(hint: ElementKind, capacity: usize) -> Self {
        match hint {
            ElementKind::Byte | ElementKind::Int => Buffer::Int(Vec::with_capacity(capacity)),
            ElementKind::Double => Buffer::Double(Vec::with_capacity(capacity)),
            ElementKind::Object => Buffer::Slots(Vec::with_capacity(capacity)),
        }
    }

    fn push(&mut self, value: Value) {
        match (&mut *self, &value) {
            (Buffer::Int(v), Value::Int(i)) => return v.push(*i),
            (Buffer::Double(v), Value::Int(i)) => return v.push(f64::from(*i)),
            (Buffer::Double(v), Value::Double(d)) => return v.push(*d),
            _ => {}
        }
        self.push_slot(Some(value));
    }

    fn push_hole(&mut self) {
        self.push_slot(None);
    }

    /// Push onto the slot list, first converting the elements pushed so far.
    fn push_slot(&mut self, slot: Option<Value>) {
        if let Buffer::Slots(v) = self {
            return v.push(slot);
        }
        let mut slots: Vec<Option<Value>> = match std::mem::replace(self, Buffer::Slots(Vec::new())) {
            Buffer::Int(v) => v.into_iter().map(|i| Some(Value::Int(i))).collect(),
            Buffer::Double(v) => v.into_iter().map(|d| Some(Value::Double(d))).collect(),
            Buffer::Slots(v) => v,
        };
        slots.push(slot);
        *self = Buffer::Slots(slots);
    }

    fn hint(&self) -> u8 {
        match self {
            Buffer::Int(_) => HINT_INT,
            Buffer::Double(_) => HINT_DOUBLE,
            Buffer::Slots(_) => HINT_OBJECT,
        }
    }

    fn finish(self) -> ElementStore {
        match self {
            Buffer::Int(v) => ElementStore::WritableInt(v),
            Buffer::Double(v) => ElementStore::WritableDouble(v),
            Buffer::Slots(v) => ElementStore::from_slots(v),
        }
    }
}
