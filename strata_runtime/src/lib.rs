//! Object model of the Strata property-access core.
//!
//! This crate provides:
//! - Values, property keys and runtime errors
//! - Shapes with memoized transitions, generalization and lazy migration
//! - Typed storage locations and per-object storage blocks
//! - The array representation family (constant, writable, holey, sparse, typed)
//! - Realms with intrinsic prototypes and external collaborator interfaces
//! - Generic (uncached) property semantics used by slow paths

pub mod array;
pub mod coercion;
pub mod error;
pub mod interop;
pub mod key;
pub mod object;
pub mod ops;
pub mod realm;
pub mod value;

// Re-export commonly used items
pub use error::{RuntimeError, RuntimeResult};
pub use key::PropertyKey;
pub use object::{JsObject, ObjectId, ObjectKind, ObjectRef, OwnProperty, PropertyFlags, Shape};
pub use ops::AbsentPolicy;
pub use realm::{Realm, RealmBuilder};
pub use value::{JsString, Symbol, Value};
