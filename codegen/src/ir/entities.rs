//! Entity references used by the flat, pre-SSA IR (spec §3.2).

use cot_entity::entity_impl;

/// A block in the flat IR: an ordered sequence of node indices. IDs are
/// dense from 0 in declaration order.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IrBlock(u32);
entity_impl!(IrBlock, "irblock");

/// An index into a function's flat node pool.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);
entity_impl!(NodeId, "n");

/// A local variable slot (parameter or user local).
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalId(u32);
entity_impl!(LocalId, "l");

/// A deduplicated string-literal handle.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StringId(u32);
entity_impl!(StringId, "str");
