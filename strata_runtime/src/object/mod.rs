//! Object model: shapes, storage locations and object instances.
//!
//! - [`location`]: typed storage locations and their widening lattice
//! - [`shape`]: immutable shapes, property records and transitions
//! - [`registry`]: memoized transitions, generalization and migration
//! - [`storage`]: per-object storage blocks and dictionaries
//! - [`instance`]: the object itself

pub mod instance;
pub mod location;
pub mod registry;
pub mod shape;
pub mod storage;

pub use instance::{
    FunctionData, JsObject, ObjectId, ObjectKind, ObjectRef, OwnProperty, PropertyValue, ProxyData,
};
pub use location::{Location, LocationKind};
pub use registry::{ShapeRegistry, ShapeStats};
pub use shape::{Property, PropertyFlags, Shape, ShapeFlavor, ShapeId, Transition};
pub use storage::{AccessorPair, Dictionary, DictionaryEntry, Slot, Storage};
