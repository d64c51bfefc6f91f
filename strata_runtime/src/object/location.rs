//! Storage locations.
//!
//! A `Location` binds a property to a physical slot in an object's storage
//! block. Typed locations (`Int`, `Double`, `Boolean`, `Long`) live in the
//! primitive area as raw 64-bit words; `Object` locations live in the object
//! area as boxed values or accessor pairs.
//!
//! A location's kind is fixed for the life of the shape that owns it. A value
//! the kind cannot represent requires a shape transition to a wider kind
//! (see [`LocationKind::widen_for`]); the primitive words are never read back
//! under a different kind than the one they were written with.

use crate::value::Value;

// =============================================================================
// Location Kind
// =============================================================================

/// Physical representation of a property slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LocationKind {
    /// 32-bit integer in the primitive area.
    Int,
    /// 64-bit float in the primitive area.
    Double,
    /// Boolean in the primitive area.
    Boolean,
    /// 64-bit integer in the primitive area.
    Long,
    /// Boxed value in the object area.
    Object,
}

impl LocationKind {
    /// The narrowest kind that can hold `value`.
    ///
    /// With typed locations disabled every property is `Object`.
    #[inline]
    pub fn for_value(value: &Value, typed_locations: bool) -> Self {
        if !typed_locations {
            return LocationKind::Object;
        }
        match value {
            Value::Int(_) => LocationKind::Int,
            Value::Double(_) => LocationKind::Double,
            Value::Boolean(_) => LocationKind::Boolean,
            Value::Long(_) => LocationKind::Long,
            _ => LocationKind::Object,
        }
    }

    /// Check if the kind stores into the primitive area.
    #[inline]
    pub const fn is_primitive(self) -> bool {
        !matches!(self, LocationKind::Object)
    }

    /// Check if `value` can be stored without changing the kind.
    #[inline]
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            LocationKind::Int => matches!(value, Value::Int(_)),
            LocationKind::Double => matches!(value, Value::Int(_) | Value::Double(_)),
            LocationKind::Boolean => matches!(value, Value::Boolean(_)),
            LocationKind::Long => matches!(value, Value::Int(_) | Value::Long(_)),
            LocationKind::Object => true,
        }
    }

    /// The kind a location must widen to in order to hold `value`.
    ///
    /// `Int` widens to `Double` or `Long`; every other mismatch widens to
    /// `Object`. Returns `self` if the value already fits.
    pub fn widen_for(self, value: &Value) -> Self {
        if self.accepts(value) {
            return self;
        }
        match (self, value) {
            (LocationKind::Int, Value::Double(_)) => LocationKind::Double,
            (LocationKind::Int, Value::Long(_)) => LocationKind::Long,
            _ => LocationKind::Object,
        }
    }

    /// Encode a value for the primitive area.
    ///
    /// The caller must have checked [`accepts`](Self::accepts).
    #[inline]
    pub fn encode(self, value: &Value) -> u64 {
        match (self, value) {
            (LocationKind::Int, Value::Int(i)) => *i as u32 as u64,
            (LocationKind::Double, Value::Int(i)) => (*i as f64).to_bits(),
            (LocationKind::Double, Value::Double(d)) => d.to_bits(),
            (LocationKind::Boolean, Value::Boolean(b)) => u64::from(*b),
            (LocationKind::Long, Value::Int(i)) => *i as i64 as u64,
            (LocationKind::Long, Value::Long(l)) => *l as u64,
            _ => {
                debug_assert!(false, "{self:?} location cannot encode {value:?}");
                0
            }
        }
    }

    /// Decode a primitive word written with this kind.
    #[inline]
    pub fn decode(self, bits: u64) -> Value {
        match self {
            LocationKind::Int => Value::Int(bits as u32 as i32),
            LocationKind::Double => Value::Double(f64::from_bits(bits)),
            LocationKind::Boolean => Value::Boolean(bits != 0),
            LocationKind::Long => Value::Long(bits as i64),
            LocationKind::Object => {
                debug_assert!(false, "object locations are not encoded");
                Value::Undefined
            }
        }
    }
}

// =============================================================================
// Location
// =============================================================================

/// A typed slot descriptor bound to a physical index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Location {
    kind: LocationKind,
    index: u32,
    is_final: bool,
}

impl Location {
    /// Create a location.
    #[inline]
    pub const fn new(kind: LocationKind, index: u32) -> Self {
        Self {
            kind,
            index,
            is_final: false,
        }
    }

    /// Mark the location write-once (non-writable, non-configurable data).
    #[inline]
    pub const fn into_final(self) -> Self {
        Self {
            is_final: true,
            ..self
        }
    }

    /// The storage kind.
    #[inline]
    pub const fn kind(&self) -> LocationKind {
        self.kind
    }

    /// Index into the primitive area (typed kinds) or object area (`Object`).
    #[inline]
    pub const fn index(&self) -> usize {
        self.index as usize
    }

    /// Whether the value can never change after definition.
    #[inline]
    pub const fn is_final(&self) -> bool {
        self.is_final
    }

    /// Check if this location lives in the primitive area.
    #[inline]
    pub const fn is_primitive(&self) -> bool {
        self.kind.is_primitive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_for_value() {
        assert_eq!(LocationKind::for_value(&Value::Int(1), true), LocationKind::Int);
        assert_eq!(LocationKind::for_value(&Value::Double(1.5), true), LocationKind::Double);
        assert_eq!(LocationKind::for_value(&Value::Boolean(true), true), LocationKind::Boolean);
        assert_eq!(LocationKind::for_value(&Value::Long(1 << 40), true), LocationKind::Long);
        assert_eq!(LocationKind::for_value(&Value::string("s"), true), LocationKind::Object);
        assert_eq!(LocationKind::for_value(&Value::Int(1), false), LocationKind::Object);
    }

    #[test]
    fn test_widening_rules() {
        assert_eq!(LocationKind::Int.widen_for(&Value::Double(2.5)), LocationKind::Double);
        assert_eq!(LocationKind::Int.widen_for(&Value::Long(1 << 40)), LocationKind::Long);
        assert_eq!(LocationKind::Int.widen_for(&Value::string("x")), LocationKind::Object);
        assert_eq!(LocationKind::Double.widen_for(&Value::Int(3)), LocationKind::Double);
        assert_eq!(LocationKind::Double.widen_for(&Value::Long(3)), LocationKind::Object);
        assert_eq!(LocationKind::Boolean.widen_for(&Value::Int(0)), LocationKind::Object);
        assert_eq!(LocationKind::Long.widen_for(&Value::Double(0.5)), LocationKind::Object);
    }

    #[test]
    fn test_encode_decode() {
        let cases = [
            (LocationKind::Int, Value::Int(-7)),
            (LocationKind::Double, Value::Double(-0.25)),
            (LocationKind::Boolean, Value::Boolean(true)),
            (LocationKind::Long, Value::Long(i64::MIN)),
        ];
        for (kind, value) in cases {
            assert_eq!(kind.decode(kind.encode(&value)), value);
        }
    }

    #[test]
    fn test_int_into_wider_kinds() {
        let d = LocationKind::Double;
        assert!(matches!(d.decode(d.encode(&Value::Int(4))), Value::Double(x) if x == 4.0));
        let l = LocationKind::Long;
        assert!(matches!(l.decode(l.encode(&Value::Int(-4))), Value::Long(-4)));
    }

    #[test]
    fn test_final_location() {
        let loc = Location::new(LocationKind::Object, 3);
        assert!(!loc.is_final());
        let fin = loc.into_final();
        assert!(fin.is_final());
        assert_eq!(fin.index(), 3);
        assert!(!fin.is_primitive());
    }
}
