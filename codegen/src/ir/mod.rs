//! The flat, pre-SSA IR (C1, spec §3.2/§4.1).

pub mod builder;
pub mod entities;
pub mod function;
pub mod node;

pub use builder::IrBuilder;
pub use entities::{IrBlock, LocalId, NodeId, StringId};
pub use function::{IrBlockData, IrFunction, Local, StringLiteral};
pub use node::{BinOp, Node, NodeKind, Span, UnOp};
