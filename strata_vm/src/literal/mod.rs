//! Object and array literal construction.

pub mod array;
pub mod object;

pub use array::{ArrayLiteral, DynamicArray, ElementValue};
pub use object::{DefineCache, MemberValue, ObjectLiteral, ObjectMember};
