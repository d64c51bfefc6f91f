//! Standard coercions and the array-like iteration protocol.

use crate::error::{RuntimeError, RuntimeResult};
use crate::interop::{Coercion, IterationProtocol};
use crate::key::{PropertyKey, names};
use crate::object::{ObjectKind, ObjectRef};
use crate::ops;
use crate::realm::Realm;
use crate::value::{JsString, Value, number_to_string};

// =============================================================================
// Coercion
// =============================================================================

/// The default [`Coercion`] implementation.
///
/// Objects are converted through `valueOf`/`toString`, looked up with the
/// ordinary property access path.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardCoercion;

impl StandardCoercion {
    fn to_primitive(realm: &Realm, object: &ObjectRef, prefer_string: bool) -> RuntimeResult<Value> {
        let order = if prefer_string {
            [names::to_string(), names::value_of()]
        } else {
            [names::value_of(), names::to_string()]
        };
        let receiver = Value::Object(object.clone());
        for key in order {
            let Some(Value::Object(method)) = ops::get(realm, &receiver, key)? else {
                continue;
            };
            if !method.is_callable() {
                continue;
            }
            let result = method.call(realm, &receiver, &[])?;
            if !matches!(result, Value::Object(_)) {
                return Ok(result);
            }
        }
        Err(RuntimeError::type_error("Cannot convert object to primitive value"))
    }
}

impl Coercion for StandardCoercion {
    fn to_number(&self, realm: &Realm, value: &Value) -> RuntimeResult<f64> {
        Ok(match value {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Boolean(b) => f64::from(u8::from(*b)),
            Value::Int(i) => f64::from(*i),
            Value::Long(l) => *l as f64,
            Value::Double(d) => *d,
            Value::String(s) => parse_number(s.as_str()),
            Value::Symbol(_) => {
                return Err(RuntimeError::type_error("Cannot convert a Symbol value to a number"));
            }
            Value::Object(o) => {
                let primitive = Self::to_primitive(realm, o, false)?;
                return self.to_number(realm, &primitive);
            }
        })
    }

    fn to_string(&self, realm: &Realm, value: &Value) -> RuntimeResult<JsString> {
        Ok(match value {
            Value::Undefined => JsString::new("undefined"),
            Value::Null => JsString::new("null"),
            Value::Boolean(b) => JsString::new(if *b { "true" } else { "false" }),
            Value::Int(i) => JsString::new(&i.to_string()),
            Value::Long(l) => JsString::new(&l.to_string()),
            Value::Double(d) => JsString::new(&number_to_string(*d)),
            Value::String(s) => s.clone(),
            Value::Symbol(_) => {
                return Err(RuntimeError::type_error("Cannot convert a Symbol value to a string"));
            }
            Value::Object(o) => {
                let primitive = Self::to_primitive(realm, o, true)?;
                return self.to_string(realm, &primitive);
            }
        })
    }

    fn to_boolean(&self, value: &Value) -> bool {
        match value {
            Value::Undefined | Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Long(l) => *l != 0,
            Value::Double(d) => *d != 0.0 && !d.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Symbol(_) | Value::Object(_) => true,
        }
    }

    fn to_property_key(&self, realm: &Realm, value: &Value) -> RuntimeResult<PropertyKey> {
        if let Some(key) = PropertyKey::from_primitive(value) {
            return Ok(key);
        }
        let Value::Object(o) = value else {
            return Err(RuntimeError::type_error("invalid property key"));
        };
        let primitive = Self::to_primitive(realm, o, true)?;
        PropertyKey::from_primitive(&primitive)
            .ok_or_else(|| RuntimeError::type_error("Cannot convert object to primitive value"))
    }

    fn to_object(&self, realm: &Realm, value: &Value) -> RuntimeResult<ObjectRef> {
        match value {
            Value::Object(o) => Ok(o.clone()),
            Value::Undefined | Value::Null => Err(RuntimeError::type_error(
                "Cannot convert undefined or null to object",
            )),
            Value::String(s) => Ok(realm.new_string_wrapper(s)),
            _ => Ok(realm.new_object_with_proto(realm.prototype_for_primitive(value))),
        }
    }
}

/// `StringToNumber` for the literal forms the runtime produces and accepts.
fn parse_number(text: &str) -> f64 {
    let t = text.trim();
    if t.is_empty() {
        return 0.0;
    }
    match t {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16).map_or(f64::NAN, |n| n as f64);
    }
    // Rust also accepts "inf" and "nan"; the grammar here does not.
    let numeric = t
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-'));
    if !numeric {
        return f64::NAN;
    }
    t.parse::<f64>().unwrap_or(f64::NAN)
}

// =============================================================================
// Iteration
// =============================================================================

/// Iterates strings by code point, arrays and typed arrays by index, and
/// foreign objects that report a size.
#[derive(Debug, Default, Clone, Copy)]
pub struct ArrayLikeIteration;

impl IterationProtocol for ArrayLikeIteration {
    fn iterate(
        &self,
        realm: &Realm,
        iterable: &Value,
        sink: &mut dyn FnMut(Value) -> RuntimeResult<()>,
    ) -> RuntimeResult<()> {
        match iterable {
            Value::String(s) => {
                let mut buf = [0u8; 4];
                for ch in s.as_str().chars() {
                    sink(Value::string(ch.encode_utf8(&mut buf)))?;
                }
                Ok(())
            }
            Value::Object(o) => match o.kind() {
                ObjectKind::Foreign(foreign) if foreign.has_size() => {
                    for i in 0..foreign.get_size()? {
                        sink(foreign.read(&PropertyKey::Index(i))?.unwrap_or_default())?;
                    }
                    Ok(())
                }
                ObjectKind::Array | ObjectKind::TypedArray => {
                    // Length is re-read each step; the sink may run user code.
                    let mut i = 0;
                    while i < o.element_len() {
                        let value = ops::get(realm, iterable, &PropertyKey::Index(i))?;
                        sink(value.unwrap_or_default())?;
                        i += 1;
                    }
                    Ok(())
                }
                _ => Err(RuntimeError::type_error("object is not iterable")),
            },
            other => Err(RuntimeError::type_error(format!(
                "{} is not iterable",
                other.type_name()
            ))),
        }
    }
}
