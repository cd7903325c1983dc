//! `lower` (spec §4.4.3): constant folding and strength reduction. Gated by
//! `OptLevel` — at `OptLevel::None` this pass is a no-op, per spec §1's
//! Non-goal that optimization never changes correctness, only whether these
//! local rewrites run at all.

use crate::result::CodegenResult;
use crate::settings::OptLevel;
use crate::ssa::{Function, Op, ValueId};
use crate::types::TypeId;

pub fn run(func: &mut Function, opt_level: OptLevel) -> CodegenResult<()> {
    if opt_level == OptLevel::None {
        return Ok(());
    }
    let all_values: Vec<ValueId> = func.values().map(|(id, _)| id).collect();
    for v in all_values {
        fold_or_reduce(func, v);
    }
    Ok(())
}

fn const_int_of(func: &Function, v: ValueId) -> Option<i64> {
    let val = func.value(v);
    (val.op == Op::ConstInt).then_some(val.aux_int).flatten()
}

fn fold_or_reduce(func: &mut Function, v: ValueId) {
    let val = func.value(v);
    let op = val.op;
    let args: Vec<ValueId> = val.args.iter().copied().collect();
    let ty = val.result_ty;

    if args.len() != 2 {
        return;
    }
    let (a, b) = (args[0], args[1]);

    if let (Some(x), Some(y)) = (const_int_of(func, a), const_int_of(func, b)) {
        if let Some(result) = fold_constants(op, x, y) {
            let const_v = make_const(func, ty, result);
            rewrite_as_copy(func, v, const_v);
            return;
        }
    }

    if op == Op::Mul {
        if let Some(y) = const_int_of(func, b) {
            if y == 0 {
                let const_v = make_const(func, ty, 0);
                rewrite_as_copy(func, v, const_v);
                return;
            }
            if y == 1 {
                rewrite_as_copy(func, v, a);
                return;
            }
            if y > 0 && (y & (y - 1)) == 0 {
                let shift = y.trailing_zeros() as i64;
                let shift_v = make_const(func, ty, shift);
                func.reset_args(v);
                func.add_arg(v, a);
                func.add_arg(v, shift_v);
                set_op(func, v, Op::Shl);
                return;
            }
        }
    }

    if matches!(op, Op::Add | Op::Sub) {
        if let Some(0) = const_int_of(func, b) {
            rewrite_as_copy(func, v, a);
        }
    }
}

fn fold_constants(op: Op, x: i64, y: i64) -> Option<i64> {
    match op {
        Op::Add => Some(x.wrapping_add(y)),
        Op::Sub => Some(x.wrapping_sub(y)),
        Op::Mul => Some(x.wrapping_mul(y)),
        Op::BAnd => Some(x & y),
        Op::BOr => Some(x | y),
        Op::BXor => Some(x ^ y),
        Op::SDiv if y != 0 => Some(x.wrapping_div(y)),
        Op::SMod if y != 0 => Some(x.wrapping_rem(y)),
        Op::Eq => Some((x == y) as i64),
        Op::Ne => Some((x != y) as i64),
        Op::Slt => Some((x < y) as i64),
        Op::Sle => Some((x <= y) as i64),
        Op::Sgt => Some((x > y) as i64),
        Op::Sge => Some((x >= y) as i64),
        _ => None,
    }
}

fn make_const(func: &mut Function, ty: TypeId, value: i64) -> ValueId {
    let entry = func.entry;
    func.const_int(entry, value, ty)
}

fn rewrite_as_copy(func: &mut Function, v: ValueId, new_arg: ValueId) {
    func.reset_args(v);
    func.add_arg(v, new_arg);
    set_op(func, v, Op::Copy);
}

fn set_op(func: &mut Function, v: ValueId, op: Op) {
    let vm = func.value_mut(v);
    vm.op = op;
    vm.rematerializable = op.meta().rematerializable;
}
