//! The ordered pass pipeline (C3, spec §4.4): `expand_calls` -> `decompose`
//! -> `lower` -> `schedule` -> local opts. Each stage takes `&mut Function`
//! and rewrites in place; nothing here changes block/value identity, only
//! their op, args and (for `schedule`) position.

pub mod decompose;
pub mod expand_calls;
pub mod local_opts;
pub mod lower;
pub mod schedule;

use crate::result::CodegenResult;
use crate::settings::Flags;
use crate::ssa::Function;
use crate::trace::{Phase, Tracer};
use crate::types::TypeRegistry;

/// Run every pass in spec order against `func`.
pub fn run_pipeline(func: &mut Function, types: &TypeRegistry, flags: &Flags) -> CodegenResult<()> {
    let tracer = Tracer::new(flags.debug_phases);
    tracer.trace(Phase::Codegen, || {
        format!("running pass pipeline for `{}`", func.name)
    });

    expand_calls::run(func, types, &tracer)?;
    decompose::run(func)?;
    lower::run(func, flags.opt_level)?;
    schedule::run(func)?;
    local_opts::run(func)?;
    Ok(())
}
