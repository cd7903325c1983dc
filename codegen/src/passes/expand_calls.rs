//! `expand_calls`: the first pass in the pipeline (spec §4.4.1), run before
//! `decompose`/`lower` so every later pass sees calls already shaped to the
//! ABI they'll actually compile to.
//!
//! For every `static_call`/`closure_call`:
//!  1. consult [`AbiResolver`] for the callee's signature;
//!  2. split any ≤16-byte aggregate argument that decomposes into more than
//!     one register word into that many `field_value` extractions, spliced
//!     in before the call;
//!  3. rewrite a >16-byte aggregate argument to the source address of its
//!     `load` — the callee's parameter slot holds a pointer, not the
//!     aggregate's bytes, so the caller passes its copy's address rather
//!     than the loaded value;
//!  4. tag hidden-return calls with their buffer size;
//!  5. splice a `select_n` value after the call per register-sized piece of
//!     a multi-register (non-hidden) return.
//!
//! All rewriting goes through `reset_args`/`add_arg`, never direct field
//! access, per the use-count discipline in `ssa::Function`.

use crate::abi::AbiResolver;
use crate::result::CodegenResult;
use crate::ssa::{BlockId, Function, Op, ValueId};
use crate::trace::{Phase, Tracer};
use crate::types::{Primitive, TypeId, TypeRegistry};

pub fn run(func: &mut Function, types: &TypeRegistry, tracer: &Tracer) -> CodegenResult<()> {
    let block_ids: Vec<BlockId> = func.blocks().map(|(id, _)| id).collect();
    for block in block_ids {
        let mut i = 0;
        loop {
            let len = func.block(block).values.len();
            if i >= len {
                break;
            }
            let v = func.block(block).values[i];
            let op = func.value(v).op;
            if op == Op::StaticCall || op == Op::ClosureCall {
                let inserted = expand_one_call(func, types, block, i, v, tracer)?;
                i += 1 + inserted;
            } else {
                i += 1;
            }
        }
    }
    Ok(())
}

fn expand_one_call(
    func: &mut Function,
    types: &TypeRegistry,
    block: BlockId,
    pos: usize,
    call: ValueId,
    tracer: &Tracer,
) -> CodegenResult<usize> {
    let ret_ty = func.value(call).result_ty;
    let old_args: Vec<ValueId> = func.value(call).args.iter().copied().collect();
    let param_types: Vec<TypeId> = old_args.iter().map(|&a| func.value(a).result_ty).collect();

    let resolver = AbiResolver::new(types);
    let abi = resolver.resolve(&param_types, ret_ty, None);

    tracer.trace(Phase::Codegen, || {
        format!(
            "expand_calls: call {:?}, {} params, hidden_return={}",
            call,
            abi.params.len(),
            abi.uses_hidden_return
        )
    });

    let word_ty = types.primitive(Primitive::I64);
    let mut insert_at = pos;
    let mut new_args = Vec::with_capacity(old_args.len());

    for (arg, pabi) in old_args.iter().zip(abi.params.iter()) {
        if pabi.by_reference {
            // The callee's parameter is a pointer; the caller only ever
            // has this aggregate as a `load` of some address (there is no
            // other way to produce an aggregate-typed SSA value), so pass
            // that address through instead of the loaded value itself.
            let load = func.value(*arg);
            debug_assert_eq!(load.op, Op::Load, "by-reference arg must be a load");
            new_args.push(load.args[0]);
        } else if pabi.slots.len() > 1 {
            for word_index in 0..pabi.slots.len() {
                let fv = func.make_value(Op::FieldValue, word_ty);
                func.set_aux_int(fv, (word_index as i64) * 8);
                func.add_arg(fv, *arg);
                func.block_mut(block).values.insert(insert_at, fv);
                insert_at += 1;
                new_args.push(fv);
            }
        } else {
            new_args.push(*arg);
        }
    }

    func.reset_args(call);
    for a in new_args {
        func.add_arg(call, a);
    }

    if abi.uses_hidden_return {
        func.set_aux_int(call, abi.hidden_return_size as i64);
    }

    let num_field_values = insert_at - pos;
    let mut num_selects = 0;
    if !abi.uses_hidden_return && abi.returns.len() > 1 {
        for slot in 0..abi.returns.len() {
            let sel = func.make_value(Op::SelectN, word_ty);
            func.set_aux_int(sel, slot as i64);
            func.add_arg(sel, call);
            func.block_mut(block)
                .values
                .insert(insert_at + 1 + num_selects, sel);
            num_selects += 1;
        }
    }

    Ok(num_field_values + num_selects)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssa::AuxPtr;

    #[test]
    fn multi_register_return_gets_select_n_values() {
        let reg = TypeRegistry::new();
        let i64_ty = reg.primitive(Primitive::I64);
        let mut reg = reg;
        let pair = reg.intern_struct(
            "Pair",
            &[("a".into(), i64_ty), ("b".into(), i64_ty)],
        );

        let mut f = Function::new("f", 16);
        let entry = f.entry;
        let call = f.make_value(Op::StaticCall, pair);
        f.set_aux_ptr(call, AuxPtr::CalleeName("make_pair".into()));
        f.append_to_block(entry, call);

        let tracer = Tracer::disabled();
        run(&mut f, &reg, &tracer).unwrap();

        let values = &f.block(entry).values;
        assert_eq!(values.len(), 3);
        assert_eq!(f.value(values[0]).op, Op::StaticCall);
        assert_eq!(f.value(values[1]).op, Op::SelectN);
        assert_eq!(f.value(values[2]).op, Op::SelectN);
        assert_eq!(f.value(values[1]).aux_int, Some(0));
        assert_eq!(f.value(values[2]).aux_int, Some(1));
    }

    #[test]
    fn large_aggregate_arg_is_rewritten_to_its_load_address() {
        let mut reg = TypeRegistry::new();
        let i64_ty = reg.primitive(Primitive::I64);
        let big = reg.intern_struct(
            "Triple",
            &[
                ("a".into(), i64_ty),
                ("b".into(), i64_ty),
                ("c".into(), i64_ty),
            ],
        );
        let ptr_ty = reg.intern_pointer(big);

        let mut f = Function::new("f", 0);
        let entry = f.entry;
        let addr = f.make_value(Op::LocalAddr, ptr_ty);
        f.append_to_block(entry, addr);
        // Simulate an already-decayed-to-pointer large-aggregate arg.
        let arg_val = f.make_value(Op::Load, big);
        f.add_arg(arg_val, addr);
        f.append_to_block(entry, arg_val);

        let call = f.make_value(Op::StaticCall, reg.primitive(Primitive::Void));
        f.add_arg(call, arg_val);
        f.append_to_block(entry, call);

        let tracer = Tracer::disabled();
        run(&mut f, &reg, &tracer).unwrap();

        // The callee expects a pointer, so the call now carries the load's
        // own address operand rather than the loaded struct value.
        assert_eq!(f.value(call).args.len(), 1);
        assert_eq!(f.value(call).args[0], addr);
    }
}
