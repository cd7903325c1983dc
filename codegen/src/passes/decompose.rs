//! `decompose` (spec §4.4.2): rewrites accessors on slice/string aggregates
//! that trace directly to a `slice_make`/`string_make` into a plain `copy`
//! of the underlying scalar component, so the stack allocator and register
//! allocator downstream never have to reconstruct a two-word value from its
//! constructor to know what it holds.
//!
//! Mirrors the shape of a legalization pass that rewrites one compound op
//! into a simpler one already in the function, rather than emitting new
//! instructions from scratch.

use crate::result::CodegenResult;
use crate::ssa::{Function, Op, ValueId};

pub fn run(func: &mut Function) -> CodegenResult<()> {
    let all_values: Vec<ValueId> = func.values().map(|(id, _)| id).collect();
    for v in all_values {
        let val = func.value(v);
        let op = val.op;
        let arg0 = val.args.first().copied();
        let Some(arg0) = arg0 else { continue };

        let component = match op {
            Op::SlicePtr | Op::StringPtr => component_of(func, arg0, 0),
            Op::SliceLen | Op::StringLen => component_of(func, arg0, 1),
            _ => None,
        };

        if let Some(component) = component {
            func.reset_args(v);
            func.add_arg(v, component);
            let vm = func.value_mut(v);
            vm.op = Op::Copy;
            vm.rematerializable = Op::Copy.meta().rematerializable;
        }
    }
    Ok(())
}

fn component_of(func: &Function, defining: ValueId, slot: usize) -> Option<ValueId> {
    let dv = func.value(defining);
    match dv.op {
        Op::SliceMake | Op::StringMake => dv.args.get(slot).copied(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Primitive, TypeRegistry};

    #[test]
    fn slice_len_of_a_fresh_slice_make_becomes_a_copy() {
        let reg = TypeRegistry::new();
        let i64_ty = reg.primitive(Primitive::I64);
        let mut f = Function::new("f", 0);
        let entry = f.entry;

        let ptr = f.make_value(Op::LocalAddr, i64_ty);
        f.append_to_block(entry, ptr);
        let len = f.const_int(entry, 3, i64_ty);

        let made = f.make_value(Op::SliceMake, i64_ty);
        f.add_arg(made, ptr);
        f.add_arg(made, len);
        f.append_to_block(entry, made);

        let got_len = f.make_value(Op::SliceLen, i64_ty);
        f.add_arg(got_len, made);
        f.append_to_block(entry, got_len);

        run(&mut f).unwrap();

        assert_eq!(f.value(got_len).op, Op::Copy);
        assert_eq!(f.value(got_len).args[0], len);
    }
}
