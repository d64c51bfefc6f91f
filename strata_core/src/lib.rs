//! Leaf utilities shared by the Strata object model.
//!
//! This crate provides:
//! - Interned property names with pointer-equality comparison
//! - Epoch-based assumptions used to guard speculative cache entries
//! - Runtime configuration (cache limits, representation thresholds, feature flags)

pub mod assumption;
pub mod config;
pub mod intern;

pub use assumption::{Assumption, AssumptionToken};
pub use config::{ConfigError, RuntimeConfig};
pub use intern::{InternedString, intern};
