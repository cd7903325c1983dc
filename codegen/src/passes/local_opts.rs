//! `early_copyelim` + `early_deadcode` (spec §4.4.5), the last stage of the
//! pass pipeline: chase `copy` chains down to their real source, then
//! remove anything left with no uses and no side effect. Runs to a
//! fixpoint since removing one dead value can make another one dead.

use crate::result::CodegenResult;
use crate::ssa::{BlockId, Function, Op, ValueId};
use std::collections::HashSet;

pub fn run(func: &mut Function) -> CodegenResult<()> {
    copyelim(func);
    deadcode(func);
    Ok(())
}

fn resolve_copy(func: &Function, mut v: ValueId) -> ValueId {
    loop {
        let val = func.value(v);
        if val.op == Op::Copy {
            v = val.args[0];
        } else {
            return v;
        }
    }
}

fn copyelim(func: &mut Function) {
    let all_values: Vec<ValueId> = func.values().map(|(id, _)| id).collect();
    for v in all_values {
        let args: Vec<ValueId> = func.value(v).args.iter().copied().collect();
        for (i, a) in args.iter().enumerate() {
            let resolved = resolve_copy(func, *a);
            if resolved != *a {
                func.set_arg(v, i, resolved);
            }
        }
    }

    let block_ids: Vec<BlockId> = func.blocks().map(|(id, _)| id).collect();
    for b in block_ids {
        for slot in 0..2 {
            if let Some(c) = func.block(b).control[slot] {
                let resolved = resolve_copy(func, c);
                if resolved != c {
                    func.block_mut(b).control[slot] = Some(resolved);
                }
            }
        }
    }
}

fn deadcode(func: &mut Function) {
    let mut changed = true;
    while changed {
        changed = false;

        let control_refs: HashSet<ValueId> = func
            .blocks()
            .flat_map(|(_, b)| b.control.iter().flatten().copied())
            .collect();

        let block_ids: Vec<BlockId> = func.blocks().map(|(id, _)| id).collect();
        for b in block_ids {
            let values = func.block(b).values.clone();
            for v in values {
                let val = func.value(v);
                if val.uses() == 0 && !val.has_side_effect() && !control_refs.contains(&v) {
                    func.reset_args(v);
                    func.remove_from_block(b, v);
                    changed = true;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Primitive, TypeRegistry};

    #[test]
    fn chases_copy_chains_to_their_source() {
        let reg = TypeRegistry::new();
        let i64_ty = reg.primitive(Primitive::I64);
        let mut f = Function::new("f", 8);
        let entry = f.entry;
        let c1 = f.const_int(entry, 1, i64_ty);
        let copy1 = f.make_value(Op::Copy, i64_ty);
        f.add_arg(copy1, c1);
        f.append_to_block(entry, copy1);
        let copy2 = f.make_value(Op::Copy, i64_ty);
        f.add_arg(copy2, copy1);
        f.append_to_block(entry, copy2);
        let user = f.make_value(Op::Add, i64_ty);
        f.add_arg(user, copy2);
        f.add_arg(user, copy2);
        f.append_to_block(entry, user);

        run(&mut f).unwrap();

        assert_eq!(f.value(user).args[0], c1);
        assert_eq!(f.value(user).args[1], c1);
        // copy1/copy2 are now unused and side-effect-free, so dead code
        // elimination should have dropped both from the block.
        assert!(!f.block(entry).values.contains(&copy1));
        assert!(!f.block(entry).values.contains(&copy2));
    }

    #[test]
    fn keeps_side_effecting_values_even_with_no_uses() {
        let reg = TypeRegistry::new();
        let i64_ty = reg.primitive(Primitive::I64);
        let mut f = Function::new("f", 0);
        let entry = f.entry;
        let addr = f.make_value(Op::LocalAddr, i64_ty);
        f.append_to_block(entry, addr);
        let val = f.const_int(entry, 9, i64_ty);
        let store = f.make_value(Op::Store, reg.primitive(Primitive::Void));
        f.add_arg(store, addr);
        f.add_arg(store, val);
        f.append_to_block(entry, store);

        run(&mut f).unwrap();

        assert!(f.block(entry).values.contains(&store));
    }
}
