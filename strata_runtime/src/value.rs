//! Runtime values.
//!
//! `Value` is the boxed representation every property operation accepts and
//! returns. Numbers have three physical forms (`Int`, `Long`, `Double`) that
//! compare by numeric value, so a value read back from a typed storage
//! location equals the value that was written even if the location widened
//! the representation on the way.

use crate::object::ObjectRef;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

// =============================================================================
// Strings
// =============================================================================

/// An immutable string value.
///
/// Cheap to clone; compares by content. The UTF-16 length is computed once
/// at construction since `length` reads are hot.
#[derive(Clone)]
pub struct JsString {
    text: Arc<str>,
    utf16_len: u32,
}

impl JsString {
    /// Create a string value.
    pub fn new(text: &str) -> Self {
        Self {
            utf16_len: text.encode_utf16().count() as u32,
            text: Arc::from(text),
        }
    }

    /// Get the string contents.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Length in UTF-16 code units (the language-visible `length`).
    #[inline]
    pub fn len(&self) -> u32 {
        self.utf16_len
    }

    /// Check if the string is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.utf16_len == 0
    }

    /// The single code unit at `index` as a one-element string.
    pub fn code_unit_at(&self, index: u32) -> Option<JsString> {
        if index >= self.utf16_len {
            return None;
        }
        let unit = self.text.encode_utf16().nth(index as usize)?;
        Some(JsString::new(&String::from_utf16_lossy(&[unit])))
    }
}

impl PartialEq for JsString {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.text, &other.text) || self.text == other.text
    }
}

impl Eq for JsString {}

impl Hash for JsString {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.text.hash(state);
    }
}

impl fmt::Debug for JsString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", &*self.text)
    }
}

impl fmt::Display for JsString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl From<&str> for JsString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

// =============================================================================
// Symbols
// =============================================================================

static NEXT_SYMBOL_ID: AtomicU64 = AtomicU64::new(1);

struct SymbolData {
    id: u64,
    description: Option<Box<str>>,
}

/// A unique symbol. Two symbols are equal only if they are the same symbol.
#[derive(Clone)]
pub struct Symbol(Arc<SymbolData>);

impl Symbol {
    /// Create a fresh symbol.
    pub fn new(description: Option<&str>) -> Self {
        Self(Arc::new(SymbolData {
            id: NEXT_SYMBOL_ID.fetch_add(1, Ordering::Relaxed),
            description: description.map(Box::from),
        }))
    }

    /// The symbol's description, if any.
    #[inline]
    pub fn description(&self) -> Option<&str> {
        self.0.description.as_deref()
    }

    /// Unique numeric identity.
    #[inline]
    pub fn id(&self) -> u64 {
        self.0.id
    }
}

impl PartialEq for Symbol {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.description() {
            Some(d) => write!(f, "Symbol({d})"),
            None => f.write_str("Symbol()"),
        }
    }
}

// =============================================================================
// Value
// =============================================================================

/// A boxed runtime value.
#[derive(Clone, Default)]
pub enum Value {
    /// `undefined`
    #[default]
    Undefined,
    /// `null`
    Null,
    /// A boolean.
    Boolean(bool),
    /// A number that fits in 32 bits.
    Int(i32),
    /// A 64-bit integer (host interop, long-typed locations).
    Long(i64),
    /// A floating point number.
    Double(f64),
    /// A string.
    String(JsString),
    /// A symbol.
    Symbol(Symbol),
    /// A heap object.
    Object(ObjectRef),
}

impl Value {
    /// Create a string value.
    #[inline]
    pub fn string(s: &str) -> Self {
        Value::String(JsString::new(s))
    }

    /// Create a number, choosing `Int` when the value is an exact 32-bit
    /// integer (and not negative zero).
    pub fn number(n: f64) -> Self {
        let i = n as i32;
        if i as f64 == n && !(n == 0.0 && n.is_sign_negative()) {
            Value::Int(i)
        } else {
            Value::Double(n)
        }
    }

    /// Check for `undefined` or `null`.
    #[inline]
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    /// Check for `undefined`.
    #[inline]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Check for any numeric form.
    #[inline]
    pub fn is_number(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Long(_) | Value::Double(_))
    }

    /// The numeric value, if this is a number.
    #[inline]
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Int(i) => Some(i as f64),
            Value::Long(l) => Some(l as f64),
            Value::Double(d) => Some(d),
            _ => None,
        }
    }

    /// The object, if this is one.
    #[inline]
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// The string, if this is one.
    #[inline]
    pub fn as_string(&self) -> Option<&JsString> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Check if this value is callable.
    #[inline]
    pub fn is_callable(&self) -> bool {
        self.as_object().is_some_and(|o| o.is_callable())
    }

    /// Language-level type name, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Int(_) | Value::Long(_) | Value::Double(_) => "number",
            Value::String(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::Object(o) if o.is_callable() => "function",
            Value::Object(_) => "object",
        }
    }

    /// `SameValueZero` equality: numbers compare numerically with `NaN`
    /// equal to itself; objects by identity.
    pub fn same_value_zero(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.id() == b.id(),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x == y || (x.is_nan() && y.is_nan()),
                _ => false,
            },
        }
    }
}

impl PartialEq for Value {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.same_value_zero(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Long(l) => write!(f, "{l}L"),
            Value::Double(d) => write!(f, "{d:?}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Symbol(s) => write!(f, "{s:?}"),
            Value::Object(o) => write!(f, "[object #{}]", o.id().raw()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i)
    }
}

impl From<i64> for Value {
    fn from(l: i64) -> Self {
        Value::Long(l)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<JsString> for Value {
    fn from(s: JsString) -> Self {
        Value::String(s)
    }
}

impl From<ObjectRef> for Value {
    fn from(o: ObjectRef) -> Self {
        Value::Object(o)
    }
}

// =============================================================================
// Numeric helpers
// =============================================================================

/// Render a number the way property keys and string coercion expect.
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == n.trunc() && n.abs() < 1e21 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// Modular conversion to a 32-bit integer (`ToInt32`).
pub fn to_int32(n: f64) -> i32 {
    if !n.is_finite() || n == 0.0 {
        return 0;
    }
    let wrapped = n.trunc().rem_euclid(4_294_967_296.0);
    wrapped as u32 as i32
}
