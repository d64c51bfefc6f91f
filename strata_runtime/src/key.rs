//! Property keys.
//!
//! Keys are normalized once, at the boundary: any string that spells a
//! canonical array index (`"0"`, `"17"`, but not `"017"` or `"4294967295"`)
//! becomes `PropertyKey::Index`. Indexed keys always address the element
//! store, never the shape, so the two halves of the object model can never
//! disagree about where a property like `"3"` lives.

use crate::value::{JsString, Symbol, Value, number_to_string};
use std::fmt;
use strata_core::intern::{InternedString, intern};

/// Largest valid array index (2^32 - 2).
pub const MAX_ARRAY_INDEX: u32 = u32::MAX - 1;

/// A normalized property key.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    /// A canonical array index.
    Index(u32),
    /// A named (string) property.
    String(InternedString),
    /// A symbol-keyed property.
    Symbol(Symbol),
}

impl PropertyKey {
    /// Create a key from a name, normalizing canonical indices.
    pub fn from_name(name: &str) -> Self {
        match parse_array_index(name) {
            Some(index) => PropertyKey::Index(index),
            None => PropertyKey::String(intern(name)),
        }
    }

    /// Create a key from an integer index.
    ///
    /// `u32::MAX` is not an array index and becomes a string key.
    pub fn from_index(index: u32) -> Self {
        if index <= MAX_ARRAY_INDEX {
            PropertyKey::Index(index)
        } else {
            PropertyKey::String(intern(&index.to_string()))
        }
    }

    /// Create a key from a number, as computed member access does.
    pub fn from_number(n: f64) -> Self {
        if n >= 0.0 && n <= MAX_ARRAY_INDEX as f64 && n.fract() == 0.0 {
            PropertyKey::Index(n as u32)
        } else {
            PropertyKey::String(intern(&number_to_string(n)))
        }
    }

    /// Fast conversion of primitive values that need no user-visible
    /// coercion. Objects return `None`.
    pub fn from_primitive(value: &Value) -> Option<Self> {
        Some(match value {
            Value::Int(i) if *i >= 0 => PropertyKey::Index(*i as u32),
            Value::Int(i) => PropertyKey::String(intern(&i.to_string())),
            Value::Long(l) if *l >= 0 && *l <= MAX_ARRAY_INDEX as i64 => {
                PropertyKey::Index(*l as u32)
            }
            Value::Long(l) => PropertyKey::String(intern(&l.to_string())),
            Value::Double(d) => PropertyKey::from_number(*d),
            Value::String(s) => PropertyKey::from_name(s.as_str()),
            Value::Symbol(s) => PropertyKey::Symbol(s.clone()),
            Value::Undefined => PropertyKey::String(intern("undefined")),
            Value::Null => PropertyKey::String(intern("null")),
            Value::Boolean(b) => PropertyKey::String(intern(if *b { "true" } else { "false" })),
            Value::Object(_) => return None,
        })
    }

    /// Check if this key addresses the element store.
    #[inline]
    pub fn is_index(&self) -> bool {
        matches!(self, PropertyKey::Index(_))
    }

    /// The array index, if any.
    #[inline]
    pub fn as_index(&self) -> Option<u32> {
        match self {
            PropertyKey::Index(i) => Some(*i),
            _ => None,
        }
    }

    /// The interned name, if this is a string key.
    #[inline]
    pub fn as_name(&self) -> Option<&InternedString> {
        match self {
            PropertyKey::String(s) => Some(s),
            _ => None,
        }
    }

    /// Check whether this is the named key `name`.
    #[inline]
    pub fn is_named(&self, name: &str) -> bool {
        matches!(self, PropertyKey::String(s) if s.as_str() == name)
    }

    /// The key as a language value (strings for names and indices).
    pub fn to_value(&self) -> Value {
        match self {
            PropertyKey::Index(i) => Value::String(JsString::new(&i.to_string())),
            PropertyKey::String(s) => Value::string(s.as_str()),
            PropertyKey::Symbol(s) => Value::Symbol(s.clone()),
        }
    }
}

/// Frequently used property names, interned once.
pub mod names {
    use super::PropertyKey;
    use std::sync::LazyLock;

    macro_rules! well_known {
        ($($fn_name:ident => $text:literal),* $(,)?) => {
            $(
                #[doc = concat!("The `", $text, "` key.")]
                pub fn $fn_name() -> &'static PropertyKey {
                    static KEY: LazyLock<PropertyKey> = LazyLock::new(|| PropertyKey::from_name($text));
                    &KEY
                }
            )*
        };
    }

    well_known! {
        length => "length",
        prototype => "prototype",
        constructor => "constructor",
        no_such_property => "__noSuchProperty__",
        value_of => "valueOf",
        to_string => "toString",
    }
}

/// Parse a canonical array index.
pub fn parse_array_index(s: &str) -> Option<u32> {
    let bytes = s.as_bytes();
    if bytes.is_empty() || bytes.len() > 10 {
        return None;
    }
    if bytes[0] == b'0' {
        return (bytes.len() == 1).then_some(0);
    }
    let mut n: u64 = 0;
    for &b in bytes {
        if !b.is_ascii_digit() {
            return None;
        }
        n = n * 10 + u64::from(b - b'0');
    }
    (n <= MAX_ARRAY_INDEX as u64).then_some(n as u32)
}

impl From<&str> for PropertyKey {
    fn from(name: &str) -> Self {
        PropertyKey::from_name(name)
    }
}

impl From<u32> for PropertyKey {
    fn from(index: u32) -> Self {
        PropertyKey::from_index(index)
    }
}

impl From<Symbol> for PropertyKey {
    fn from(symbol: Symbol) -> Self {
        PropertyKey::Symbol(symbol)
    }
}

impl fmt::Debug for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyKey::Index(i) => write!(f, "[{i}]"),
            PropertyKey::String(s) => write!(f, "{}", s.as_str()),
            PropertyKey::Symbol(s) => write!(f, "{s:?}"),
        }
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyKey::Index(i) => write!(f, "{i}"),
            PropertyKey::String(s) => f.write_str(s.as_str()),
            PropertyKey::Symbol(s) => write!(f, "{s:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_indices() {
        assert_eq!(PropertyKey::from_name("0"), PropertyKey::Index(0));
        assert_eq!(PropertyKey::from_name("42"), PropertyKey::Index(42));
        assert_eq!(PropertyKey::from_name("4294967294"), PropertyKey::Index(MAX_ARRAY_INDEX));
    }

    #[test]
    fn test_non_canonical_names() {
        assert!(!PropertyKey::from_name("01").is_index());
        assert!(!PropertyKey::from_name("4294967295").is_index());
        assert!(!PropertyKey::from_name("-1").is_index());
        assert!(!PropertyKey::from_name("1.5").is_index());
        assert!(!PropertyKey::from_name("").is_index());
        assert!(!PropertyKey::from_name("x").is_index());
    }

    #[test]
    fn test_from_index_max_is_named() {
        assert!(!PropertyKey::from_index(u32::MAX).is_index());
        assert_eq!(PropertyKey::from_index(u32::MAX), PropertyKey::from_name("4294967295"));
    }

    #[test]
    fn test_from_primitive() {
        assert_eq!(PropertyKey::from_primitive(&Value::Int(3)), Some(PropertyKey::Index(3)));
        assert_eq!(PropertyKey::from_primitive(&Value::Double(3.0)), Some(PropertyKey::Index(3)));
        assert_eq!(
            PropertyKey::from_primitive(&Value::Double(1.5)),
            Some(PropertyKey::from_name("1.5"))
        );
        assert_eq!(
            PropertyKey::from_primitive(&Value::Int(-1)),
            Some(PropertyKey::from_name("-1"))
        );
        assert_eq!(
            PropertyKey::from_primitive(&Value::string("7")),
            Some(PropertyKey::Index(7))
        );
    }

    #[test]
    fn test_named_keys_intern() {
        let a = PropertyKey::from_name("length");
        let b = PropertyKey::from_name("length");
        assert_eq!(a, b);
        assert!(a.is_named("length"));
        assert!(!a.is_named("size"));
    }
}
