//! Fixed-width typed element storage.
//!
//! A typed array is a view of `length` elements of one [`TypedKind`] over an
//! [`ArrayBuffer`]. The kind and length never change. Reads outside the view
//! (or of a detached buffer) yield `undefined`; writes outside the view are
//! ignored; a write to a detached buffer is a `TypeError`.

use crate::error::{RuntimeError, RuntimeResult};
use crate::value::{Value, to_int32};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// Element type of a typed array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypedKind {
    Int8,
    Uint8,
    Uint8Clamped,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Float32,
    Float64,
}

impl TypedKind {
    /// Size of one element in bytes.
    #[inline]
    pub const fn element_size(self) -> usize {
        match self {
            TypedKind::Int8 | TypedKind::Uint8 | TypedKind::Uint8Clamped => 1,
            TypedKind::Int16 | TypedKind::Uint16 => 2,
            TypedKind::Int32 | TypedKind::Uint32 | TypedKind::Float32 => 4,
            TypedKind::Float64 => 8,
        }
    }

    /// Constructor name, for diagnostics.
    pub const fn name(self) -> &'static str {
        match self {
            TypedKind::Int8 => "Int8Array",
            TypedKind::Uint8 => "Uint8Array",
            TypedKind::Uint8Clamped => "Uint8ClampedArray",
            TypedKind::Int16 => "Int16Array",
            TypedKind::Uint16 => "Uint16Array",
            TypedKind::Int32 => "Int32Array",
            TypedKind::Uint32 => "Uint32Array",
            TypedKind::Float32 => "Float32Array",
            TypedKind::Float64 => "Float64Array",
        }
    }

    fn encode(self, n: f64, out: &mut [u8]) {
        match self {
            TypedKind::Int8 => out.copy_from_slice(&(to_int32(n) as i8).to_le_bytes()),
            TypedKind::Uint8 => out.copy_from_slice(&(to_int32(n) as u8).to_le_bytes()),
            TypedKind::Uint8Clamped => out[0] = clamp_u8(n),
            TypedKind::Int16 => out.copy_from_slice(&(to_int32(n) as i16).to_le_bytes()),
            TypedKind::Uint16 => out.copy_from_slice(&(to_int32(n) as u16).to_le_bytes()),
            TypedKind::Int32 => out.copy_from_slice(&to_int32(n).to_le_bytes()),
            TypedKind::Uint32 => out.copy_from_slice(&(to_int32(n) as u32).to_le_bytes()),
            TypedKind::Float32 => out.copy_from_slice(&(n as f32).to_le_bytes()),
            TypedKind::Float64 => out.copy_from_slice(&n.to_le_bytes()),
        }
    }

    fn decode(self, bytes: &[u8]) -> Value {
        match self {
            TypedKind::Int8 => Value::Int(i8::from_le_bytes([bytes[0]]) as i32),
            TypedKind::Uint8 | TypedKind::Uint8Clamped => Value::Int(bytes[0] as i32),
            TypedKind::Int16 => Value::Int(i16::from_le_bytes([bytes[0], bytes[1]]) as i32),
            TypedKind::Uint16 => Value::Int(u16::from_le_bytes([bytes[0], bytes[1]]) as i32),
            TypedKind::Int32 => Value::Int(i32::from_le_bytes(word(bytes))),
            TypedKind::Uint32 => {
                let v = u32::from_le_bytes(word(bytes));
                match i32::try_from(v) {
                    Ok(i) => Value::Int(i),
                    Err(_) => Value::Double(v as f64),
                }
            }
            TypedKind::Float32 => Value::Double(f32::from_le_bytes(word(bytes)) as f64),
            TypedKind::Float64 => {
                let mut b = [0u8; 8];
                b.copy_from_slice(&bytes[..8]);
                Value::Double(f64::from_le_bytes(b))
            }
        }
    }
}

fn word(bytes: &[u8]) -> [u8; 4] {
    [bytes[0], bytes[1], bytes[2], bytes[3]]
}

/// `ToUint8Clamp`: clamp to 0..=255, rounding half to even.
fn clamp_u8(n: f64) -> u8 {
    if n.is_nan() || n <= 0.0 {
        return 0;
    }
    if n >= 255.0 {
        return 255;
    }
    let floor = n.floor();
    let frac = n - floor;
    let rounded = if frac > 0.5 || (frac == 0.5 && floor % 2.0 != 0.0) {
        floor + 1.0
    } else {
        floor
    };
    rounded as u8
}

// =============================================================================
// Array Buffer
// =============================================================================

/// A detachable byte buffer shared by typed array views.
pub struct ArrayBuffer {
    bytes: RwLock<Option<Box<[u8]>>>,
}

impl ArrayBuffer {
    /// Allocate a zeroed buffer.
    pub fn new(byte_len: usize) -> Arc<Self> {
        Arc::new(Self {
            bytes: RwLock::new(Some(vec![0u8; byte_len].into_boxed_slice())),
        })
    }

    /// Release the bytes. Every view over this buffer becomes detached.
    pub fn detach(&self) {
        *self.bytes.write() = None;
    }

    /// Check if the buffer has been detached.
    pub fn is_detached(&self) -> bool {
        self.bytes.read().is_none()
    }

    /// Length in bytes (0 once detached).
    pub fn byte_len(&self) -> usize {
        self.bytes.read().as_ref().map_or(0, |b| b.len())
    }
}

impl fmt::Debug for ArrayBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayBuffer")
            .field("byte_len", &self.byte_len())
            .field("detached", &self.is_detached())
            .finish()
    }
}

// =============================================================================
// Typed Array View
// =============================================================================

/// A fixed-kind, fixed-length view over an [`ArrayBuffer`].
#[derive(Debug, Clone)]
pub struct TypedArrayView {
    kind: TypedKind,
    buffer: Arc<ArrayBuffer>,
    byte_offset: usize,
    length: u32,
}

impl TypedArrayView {
    /// Create a view. The view must lie within the buffer.
    pub fn new(
        kind: TypedKind,
        buffer: Arc<ArrayBuffer>,
        byte_offset: usize,
        length: u32,
    ) -> RuntimeResult<Self> {
        if byte_offset % kind.element_size() != 0 {
            return Err(RuntimeError::range_error(format!(
                "start offset of {} should be a multiple of {}",
                kind.name(),
                kind.element_size()
            )));
        }
        let end = byte_offset + length as usize * kind.element_size();
        if end > buffer.byte_len() {
            return Err(RuntimeError::range_error(format!(
                "invalid {} length: {length}",
                kind.name()
            )));
        }
        Ok(Self {
            kind,
            buffer,
            byte_offset,
            length,
        })
    }

    /// Allocate a fresh buffer exactly large enough for `length` elements.
    pub fn with_length(kind: TypedKind, length: u32) -> Self {
        Self {
            kind,
            buffer: ArrayBuffer::new(length as usize * kind.element_size()),
            byte_offset: 0,
            length,
        }
    }

    /// Element kind.
    #[inline]
    pub fn kind(&self) -> TypedKind {
        self.kind
    }

    /// The backing buffer.
    #[inline]
    pub fn buffer(&self) -> &Arc<ArrayBuffer> {
        &self.buffer
    }

    /// Visible length (0 once detached).
    pub fn len(&self) -> u32 {
        if self.buffer.is_detached() {
            0
        } else {
            self.length
        }
    }

    /// Check if the visible length is 0.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if the buffer has been detached.
    pub fn is_detached(&self) -> bool {
        self.buffer.is_detached()
    }

    /// Read an element. Out of range or detached reads yield `None`.
    pub fn get(&self, index: u32) -> Option<Value> {
        if index >= self.length {
            return None;
        }
        let bytes = self.buffer.bytes.read();
        let bytes = bytes.as_ref()?;
        let size = self.kind.element_size();
        let start = self.byte_offset + index as usize * size;
        Some(self.kind.decode(&bytes[start..start + size]))
    }

    /// Write an already-converted number.
    ///
    /// Detached buffers raise a `TypeError` before any bounds check;
    /// in-bounds-but-out-of-view writes are ignored.
    pub fn set(&self, index: u32, number: f64) -> RuntimeResult<()> {
        let mut bytes = self.buffer.bytes.write();
        let Some(bytes) = bytes.as_mut() else {
            return Err(RuntimeError::type_error(format!(
                "cannot perform set on a detached {}",
                self.kind.name()
            )));
        };
        if index >= self.length {
            return Ok(());
        }
        let size = self.kind.element_size();
        let start = self.byte_offset + index as usize * size;
        self.kind.encode(number, &mut bytes[start..start + size]);
        Ok(())
    }
}
