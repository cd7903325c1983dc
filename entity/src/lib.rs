//! Densely numbered entity references.
//!
//! This crate is the same kind of foundation `cranelift-entity` is for
//! Cranelift: small newtype indices (`EntityRef`) into arena-owned tables
//! (`PrimaryMap`, `SecondaryMap`), a packed `Option` representation
//! (`PackedOption`) that avoids doubling the size of an optional entity
//! reference, and pool-allocated variadic lists (`EntityList`, backed by a
//! shared `ListPool`) for owners with many small lists of entities. It has
//! no knowledge of the Cot compiler itself.

mod entity_ref;
mod list;
mod map;
pub mod packed_option;

pub use crate::entity_ref::EntityRef;
pub use crate::list::{EntityList, ListPool};
pub use crate::map::{PrimaryMap, SecondaryMap};
pub use crate::packed_option::PackedOption;
