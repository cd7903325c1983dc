//! Pretty-prints a [`CodegenError`] against the function that produced it,
//! mirroring `cranelift-codegen::print_errors::pretty_error` (dump the
//! function, then point at what went wrong). There's no textual IR printer
//! in this core (spec §1's Non-goals), so the "dump" here is the function
//! name plus a per-block value listing — enough to locate the offending
//! value or block by id.

use crate::result::CodegenError;
use crate::ssa::Function;
use std::fmt::Write;

pub fn pretty_error(func: &Function, err: &CodegenError) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "error in `{}`: {err}", func.name);
    let _ = writeln!(out, "-- function dump --");
    for (b, block) in func.blocks() {
        let _ = writeln!(out, "block{:?}:", dense_index(b));
        for &v in &block.values {
            let val = func.value(v);
            let _ = writeln!(out, "    v{} = {:?} {:?}", dense_index(v), val.op, val.args);
        }
        if let Some(c) = block.control[0] {
            let _ = writeln!(out, "    control -> v{}", dense_index(c));
        }
    }
    out
}

fn dense_index<T: cot_entity::EntityRef>(e: T) -> usize {
    e.index()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::{CodegenError, SsaError};
    use crate::ssa::BlockId;
    use crate::types::{Primitive, TypeRegistry};

    #[test]
    fn includes_the_function_name_and_error_message() {
        let reg = TypeRegistry::new();
        let i64_ty = reg.primitive(Primitive::I64);
        let mut f = Function::new("broken", 8);
        let entry = f.entry;
        let c = f.const_int(entry, 1, i64_ty);
        f.block_mut(entry).control[0] = Some(c);

        let err = CodegenError::Ssa(SsaError::AsymmetricEdge(BlockId::new(0)));
        let dump = pretty_error(&f, &err);
        assert!(dump.contains("broken"));
        assert!(dump.contains("control -> v"));
    }
}
