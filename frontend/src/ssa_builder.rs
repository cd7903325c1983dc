//! The variable-to-value side of SSA construction (spec §4.2 steps 3 and 7):
//! `def_var`/`use_var`, incomplete-phi insertion, and `try_remove_trivial_phi`
//! run to a fixed point. This is the same algorithm as `cranelift-frontend`'s
//! `ssa::SSABuilder` (Braun et al.'s variable-versioned construction).
//!
//! Unlike Cranelift, whose frontend builds blocks while parsing source (so
//! most blocks stay unsealed until parsing moves past them), this IR's whole
//! CFG is known up front, so `translate::build_ssa` seals a block the
//! instant the last edge into it is wired rather than waiting for an
//! explicit caller signal. The one case that still goes through genuine
//! deferred phi-filling is a loop header: its back edge is only wired once
//! the loop body is translated, by which point the header may already have
//! been read from — exactly the scenario `seal_block`'s `incomplete_phis`
//! bookkeeping below exists for.

use crate::variable::Variable;
use cot_codegen::ssa::{BlockId, Function, Op, ValueId};
use cot_codegen::types::TypeId;
use log::debug;
use std::collections::HashMap;

/// Per-function scratch state for SSA construction, analogous to
/// `cranelift-frontend::FunctionBuilderContext`: the variable type table and
/// the per-(block, variable) current-definition map.
#[derive(Default)]
pub struct SsaBuilder {
    defs: HashMap<(BlockId, Variable), ValueId>,
    types: HashMap<Variable, TypeId>,
    sealed: HashMap<BlockId, bool>,
    /// Phis created for a not-yet-sealed block, waiting for its final
    /// predecessor list so their argument lists can be filled in.
    incomplete_phis: HashMap<BlockId, Vec<(Variable, ValueId)>>,
}

impl SsaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare_var(&mut self, var: Variable, ty: TypeId) {
        self.types.insert(var, ty);
    }

    pub fn var_type(&self, var: Variable) -> TypeId {
        *self
            .types
            .get(&var)
            .unwrap_or_else(|| panic!("{var:?} used before declare_var"))
    }

    fn is_sealed(&self, block: BlockId) -> bool {
        self.sealed.get(&block).copied().unwrap_or(false)
    }

    /// Mark `block`'s predecessor list as final and fill in every phi that
    /// was left incomplete while it wasn't: `translate::build_ssa` calls
    /// this exactly once, the moment the last edge into `block` has been
    /// wired via `Function::add_edge`, so `func.block(block).preds` is
    /// guaranteed complete by the time this runs.
    pub fn seal_block(&mut self, func: &mut Function, block: BlockId) {
        self.sealed.insert(block, true);
        let Some(pending) = self.incomplete_phis.remove(&block) else {
            return;
        };
        debug!("sealing {block:?}, filling {} incomplete phi(s)", pending.len());
        let preds: Vec<BlockId> = func.block(block).preds.iter().map(|p| p.block).collect();
        for (var, phi) in pending {
            for &p in &preds {
                let arg = self.read_var(func, p, var);
                func.add_arg(phi, arg);
            }
            if let Some(same) = try_remove_trivial_phi(func, phi) {
                debug!("{phi:?} turned out trivial, replaced by {same:?}");
                self.def_var(block, var, same);
            }
        }
    }

    /// Convenience for blocks whose predecessors are all already wired
    /// (tests, and any block with zero or one macro predecessor) — equivalent
    /// to calling `seal_block` on every block in `func` in order.
    pub fn seal_all_blocks(&mut self, func: &mut Function) {
        let ids: Vec<BlockId> = func.blocks().map(|(b, _)| b).collect();
        for b in ids {
            self.seal_block(func, b);
        }
    }

    /// Register `val` as the current definition of `var` at the end of
    /// `block`.
    pub fn def_var(&mut self, block: BlockId, var: Variable, val: ValueId) {
        self.defs.insert((block, var), val);
    }

    /// Resolve the current value of `var` visible at the end of `block`,
    /// inserting phis as needed.
    pub fn use_var(&mut self, func: &mut Function, block: BlockId, var: Variable) -> ValueId {
        self.read_var(func, block, var)
    }

    fn read_var(&mut self, func: &mut Function, block: BlockId, var: Variable) -> ValueId {
        if let Some(&v) = self.defs.get(&(block, var)) {
            return v;
        }

        if !self.is_sealed(block) {
            // `block` hasn't seen its last predecessor edge yet (the
            // classic case: a loop header, read from before its body's
            // back edge is wired). Leave a placeholder phi whose argument
            // list `seal_block` fills in once the predecessor list is
            // final, per Braun et al.
            let ty = self.var_type(var);
            let phi = func.make_value(Op::Phi, ty);
            func.append_to_block(block, phi);
            self.def_var(block, var, phi);
            self.incomplete_phis.entry(block).or_default().push((var, phi));
            return phi;
        }

        let preds: Vec<BlockId> = func.block(block).preds.iter().map(|p| p.block).collect();

        let val = match preds.as_slice() {
            [] => panic!(
                "read_var: {var:?} has no definition and {block:?} has no predecessors \
                 (use of an unassigned variable should have been rejected before codegen)"
            ),
            [only] => {
                // A block with a single predecessor never needs a phi: the
                // value visible at its end is whatever was visible at the
                // end of that predecessor.
                let v = self.read_var(func, *only, var);
                self.def_var(block, var, v);
                v
            }
            _ => {
                let ty = self.var_type(var);
                let phi = func.make_value(Op::Phi, ty);
                // Record the (now complete) phi as this (block, var)'s
                // definition *before* recursing into predecessors: a
                // predecessor chain that loops back to `block` (legal even
                // for a sealed block if the back edge was wired earlier in
                // the same `seal_block` call that's filling a *different*
                // variable's phi) must see this placeholder rather than
                // recurse forever.
                self.def_var(block, var, phi);
                func.append_to_block(block, phi);

                for p in preds {
                    let arg = self.read_var(func, p, var);
                    func.add_arg(phi, arg);
                }

                match try_remove_trivial_phi(func, phi) {
                    Some(same) => {
                        self.def_var(block, var, same);
                        same
                    }
                    None => phi,
                }
            }
        };
        val
    }
}

/// If every argument of `phi` is either `phi` itself or one other single
/// value `same`, `phi` is redundant: rewrite every use of it to `same`,
/// delete it, and return `Some(same)`. Otherwise returns `None`.
fn try_remove_trivial_phi(func: &mut Function, phi: ValueId) -> Option<ValueId> {
    let args: Vec<ValueId> = func.value(phi).args.iter().copied().collect();
    let mut same: Option<ValueId> = None;
    for a in args {
        if a == phi {
            continue;
        }
        match same {
            None => same = Some(a),
            Some(s) if s == a => {}
            Some(_) => return None, // two distinct non-self args: genuinely a merge.
        }
    }
    let same = same?;

    replace_all_uses(func, phi, same);
    func.reset_args(phi);
    remove_value_from_its_block(func, phi);
    Some(same)
}

/// Rewrite every arg-edge and block control slot that names `old` to name
/// `new` instead, keeping use counts consistent (the same scan-and-`set_arg`
/// idiom `local_opts::copyelim` uses).
fn replace_all_uses(func: &mut Function, old: ValueId, new: ValueId) {
    let all_values: Vec<ValueId> = func.values().map(|(id, _)| id).collect();
    for v in all_values {
        if v == old {
            continue;
        }
        let args: Vec<ValueId> = func.value(v).args.iter().copied().collect();
        for (i, a) in args.iter().enumerate() {
            if *a == old {
                func.set_arg(v, i, new);
            }
        }
    }

    let block_ids: Vec<BlockId> = func.blocks().map(|(id, _)| id).collect();
    for b in block_ids {
        for slot in 0..2 {
            if func.block(b).control[slot] == Some(old) {
                func.block_mut(b).control[slot] = Some(new);
            }
        }
    }
}

fn remove_value_from_its_block(func: &mut Function, v: ValueId) {
    let block_ids: Vec<BlockId> = func.blocks().map(|(id, _)| id).collect();
    for b in block_ids {
        if func.block(b).values.contains(&v) {
            func.remove_from_block(b, v);
            return;
        }
    }
}

/// Spec §4.2 step 7: after the whole function is built, keep re-scanning
/// every remaining `phi` and try to collapse it, since simplifying one phi
/// can make another trivial (a phi whose only non-self arg was itself just
/// simplified away).
pub fn remove_trivial_phis_to_fixpoint(func: &mut Function) {
    loop {
        let phis: Vec<ValueId> = func
            .values()
            .filter(|(_, val)| val.op == Op::Phi)
            .map(|(id, _)| id)
            .collect();

        let mut changed = false;
        for phi in phis {
            // A previous iteration's removal may have already deleted this
            // phi as someone else's trivial replacement target; `func.value`
            // stays valid (values are never reused), but it may no longer
            // sit in any block. Check liveness via its block membership.
            if !func.blocks().any(|(_, b)| b.values.contains(&phi)) {
                continue;
            }
            if try_remove_trivial_phi(func, phi).is_some() {
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
}
