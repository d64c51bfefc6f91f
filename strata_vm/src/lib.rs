//! Inline caches and literal construction for the Strata object model.
//!
//! This crate provides:
//! - Receiver checks (shape, prototype-chain and class guards)
//! - Get/Set/Has property caches that specialize per receiver shape and
//!   degrade from monomorphic through polymorphic to megamorphic
//! - Element read/write caches keyed by array representation
//! - Object and array literal construction sharing shapes and element kinds
//! - A registry of cache sites with aggregate statistics

pub mod element;
pub mod ic_manager;
pub mod literal;
pub mod property;
pub mod receiver;

pub use element::{ReadElementCache, WriteElementCache};
pub use ic_manager::{CodeId, IcClassification, IcManager, IcSite, IcSiteId, IcStats};
pub use literal::{ArrayLiteral, ElementValue, MemberValue, ObjectLiteral, ObjectMember};
pub use property::{CacheState, CacheStats, PropertyGetCache, PropertyHasCache, PropertySetCache, Typed};
pub use receiver::{CheckOutcome, ClassGuard, ReceiverCheck};
