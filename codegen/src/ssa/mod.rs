//! The SSA value/block data model and its operation vocabulary (spec §3.3,
//! §4.3). SSA *construction* (turning flat IR into this form, C2) lives in
//! the sibling `cot-frontend` crate, which only depends on this module.

pub mod entities;
pub mod function;
pub mod op;
pub mod value;

pub use entities::{BlockId, ValueId};
pub use function::{Block, BlockKind, Function, PredEdge, SuccEdge};
pub use op::{Arity, Op, OpMeta};
pub use value::{AuxPtr, Value};
