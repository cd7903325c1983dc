//! The invariant verifier (spec §8.1): recomputes the properties every pass
//! is supposed to preserve and fails loudly the moment one doesn't, rather
//! than letting a broken invariant surface as a miscompile three passes
//! later. Cheap enough to run after every pass in debug builds, the way
//! `cranelift-codegen`'s own `verifier.rs` is wired into `Context::compile`.

use crate::regalloc::{Location, RegallocResult};
use crate::result::SsaError;
use crate::ssa::{Function, Op, ValueId};
use std::collections::HashMap;

/// Recompute every value's use count from scratch (arg-edges plus control
/// references) and compare against what `Function::add_arg`/`reset_args`
/// maintained incrementally. A mismatch means something mutated `Value::args`
/// directly instead of going through the use-count-safe API (spec §9).
pub fn verify_use_counts(func: &Function) -> Result<(), SsaError> {
    let mut actual: HashMap<ValueId, u32> = HashMap::new();
    for (_, val) in func.values() {
        for &arg in &val.args {
            *actual.entry(arg).or_insert(0) += 1;
        }
    }
    for (_, block) in func.blocks() {
        for ctrl in block.control.iter().flatten() {
            *actual.entry(*ctrl).or_insert(0) += 1;
        }
    }

    for (id, val) in func.values() {
        let expected = actual.get(&id).copied().unwrap_or(0);
        if val.uses() != expected {
            return Err(SsaError::UseCountMismatch {
                value: id,
                expected,
                actual: val.uses(),
            });
        }
    }
    Ok(())
}

/// Every successor edge must be mirrored by exactly one predecessor edge on
/// the other end, at the index each side records for the other (spec §8.1
/// #2, spec §3.3's `SuccEdge`/`PredEdge` doc comments).
pub fn verify_bidirectional_edges(func: &Function) -> Result<(), SsaError> {
    for (b, block) in func.blocks() {
        for (i, succ) in block.succs.iter().enumerate() {
            let dest_preds = &func.block(succ.block).preds;
            match dest_preds.get(succ.dest_index) {
                Some(pred) if pred.block == b && pred.src_index == i => {}
                _ => return Err(SsaError::AsymmetricEdge(b)),
            }
        }
        for (i, pred) in block.preds.iter().enumerate() {
            let src_succs = &func.block(pred.block).succs;
            match src_succs.get(pred.src_index) {
                Some(succ) if succ.block == b && succ.dest_index == i => {}
                _ => return Err(SsaError::AsymmetricEdge(b)),
            }
        }
    }
    Ok(())
}

/// Every `phi` must have exactly as many arguments as its block has
/// predecessors, in matching order (spec §8.1 #3).
pub fn verify_phi_arity(func: &Function) -> Result<(), SsaError> {
    for (b, block) in func.blocks() {
        let want = block.preds.len();
        for &v in &block.values {
            let val = func.value(v);
            if val.op == Op::Phi && val.args.len() != want {
                return Err(SsaError::PhiArityMismatch {
                    phi: v,
                    block: b,
                    got: val.args.len(),
                    want,
                });
            }
        }
    }
    Ok(())
}

/// After register allocation, every value actually consulted at a use site
/// must have been assigned a location (spec §8.1 #4: "post-regalloc
/// eviction safety" — an evicted value's new home must still be resolvable
/// wherever it's read).
pub fn verify_locations_assigned(func: &Function, regalloc: &RegallocResult) -> Result<(), SsaError> {
    for (_, val) in func.values() {
        for &arg in &val.args {
            if regalloc.allocations.locations[arg] == Location::Unassigned {
                return Err(SsaError::UseCountMismatch {
                    value: arg,
                    expected: 1,
                    actual: 0,
                });
            }
        }
    }
    Ok(())
}

/// After the shuffle phase, every edge whose predecessor/successor sides
/// disagree on a phi's location must have a copy resolving the disagreement
/// (spec §8.1 #5). We only have the means to check this at the `shuffle`
/// module's own level (`PhiReconciliation`), so this is a structural
/// sanity check: every block with outgoing shuffles targets a real
/// successor.
pub fn verify_shuffles_target_real_edges(func: &Function, regalloc: &RegallocResult) -> Result<(), SsaError> {
    for (b, block) in func.blocks() {
        let shuffles = regalloc.shuffles.get(b);
        if !shuffles.is_empty() && block.succs.is_empty() {
            return Err(SsaError::AsymmetricEdge(b));
        }
    }
    Ok(())
}

/// Run every check in order, stopping at the first failure (spec §8.1:
/// these are meant to be cheap enough to run unconditionally after each
/// pass, not just once at the end).
pub fn verify_after_passes(func: &Function) -> Result<(), SsaError> {
    verify_use_counts(func)?;
    verify_bidirectional_edges(func)?;
    verify_phi_arity(func)?;
    Ok(())
}

/// The subset of checks that only make sense once registers have been
/// assigned and the shuffle phase has run.
pub fn verify_after_regalloc(func: &Function, regalloc: &RegallocResult) -> Result<(), SsaError> {
    verify_locations_assigned(func, regalloc)?;
    verify_shuffles_target_real_edges(func, regalloc)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Primitive, TypeRegistry};

    #[test]
    fn fresh_function_has_consistent_use_counts() {
        let reg = TypeRegistry::new();
        let i64_ty = reg.primitive(Primitive::I64);
        let mut f = Function::new("f", 8);
        let entry = f.entry;
        let c1 = f.const_int(entry, 1, i64_ty);
        let add = f.make_value(Op::Add, i64_ty);
        f.add_arg(add, c1);
        f.add_arg(add, c1);
        f.append_to_block(entry, add);
        f.block_mut(entry).control[0] = Some(add);

        assert!(verify_use_counts(&f).is_ok());
    }

    #[test]
    fn detects_a_tampered_use_count() {
        let reg = TypeRegistry::new();
        let i64_ty = reg.primitive(Primitive::I64);
        let mut f = Function::new("f", 8);
        let entry = f.entry;
        let c1 = f.const_int(entry, 1, i64_ty);
        let add = f.make_value(Op::Add, i64_ty);
        f.add_arg(add, c1);
        f.append_to_block(entry, add);

        // Directly corrupt the use count, bypassing `add_arg`/`reset_args`.
        f.value_mut(c1).bump_uses(5);

        assert!(matches!(
            verify_use_counts(&f),
            Err(SsaError::UseCountMismatch { .. })
        ));
    }

    #[test]
    fn edges_added_via_add_edge_are_bidirectional() {
        let reg = TypeRegistry::new();
        let mut f = Function::new("f", 0);
        let _ = reg;
        let entry = f.entry;
        let b2 = f.new_block();
        f.add_edge(entry, b2);
        assert!(verify_bidirectional_edges(&f).is_ok());
    }

    #[test]
    fn phi_with_wrong_arity_is_caught() {
        let reg = TypeRegistry::new();
        let i64_ty = reg.primitive(Primitive::I64);
        let mut f = Function::new("f", 8);
        let entry = f.entry;
        let pred2 = f.new_block();
        let join = f.new_block();
        f.add_edge(entry, join);
        f.add_edge(pred2, join);

        let phi = f.make_value(Op::Phi, i64_ty);
        let only_one_arg = f.const_int(entry, 1, i64_ty);
        f.add_arg(phi, only_one_arg);
        f.append_to_block(join, phi);

        assert!(matches!(
            verify_phi_arity(&f),
            Err(SsaError::PhiArityMismatch { .. })
        ));
    }
}
