//! The SSA builder's notion of a "variable" (spec §4.2): something a caller
//! can `def_var`/`use_var` across block boundaries, as opposed to an SSA
//! `Value`, which is immutable once defined.
//!
//! `cranelift-frontend::Variable` is a caller-chosen opaque index because
//! Cranelift's frontend serves arbitrary source languages that invent their
//! own variable numbering. Here the flat IR already has exactly that
//! namespace — `ir::LocalId` — so `Variable` is a direct alias rather than a
//! second parallel index space.

pub use cot_codegen::ir::LocalId as Variable;
