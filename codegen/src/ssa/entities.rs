//! Entity references for the SSA representation (spec §3.3).

use cot_entity::entity_impl;

/// A dense SSA value ID.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(u32);
entity_impl!(ValueId, "v");

/// An SSA block. Distinct from [`crate::ir::IrBlock`] even though blocks are
/// created 1-to-1 with the flat IR's blocks (spec §4.2 step 1) — keeping the
/// two ID spaces separate means a `ValueId`/`BlockId` mixing bug is a type
/// error, not a silent index collision.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(u32);
entity_impl!(BlockId, "block");
