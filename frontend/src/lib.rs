//! SSA construction (C2): turns a finished [`cot_codegen::ir::IrFunction`]
//! into a [`cot_codegen::ssa::Function`]. See the crate README for how this
//! relates to `cranelift-frontend`.

mod ssa_builder;
mod translate;
mod variable;

pub use ssa_builder::SsaBuilder;
pub use translate::build_ssa;
pub use variable::Variable;
