//! Array representation family.
//!
//! - [`elements`]: the element store and its representation lattice
//! - [`typed`]: fixed-width typed views over detachable buffers

pub mod elements;
pub mod typed;

pub use elements::{
    ArrayKind, ElementKind, ElementRead, ElementStore, ElementWriteCheck, HoleVec, SparseEntry,
    SparseSlot,
};
pub use typed::{ArrayBuffer, TypedArrayView, TypedKind};
