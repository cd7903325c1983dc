//! Liveness analysis (C5, spec §4.6).
//!
//! Per block, walking values in reverse order, builds for every `Value` a
//! use-distance list in strictly decreasing distance order (nearest use at
//! the head) plus a `next_call` array. This feeds the register allocator's
//! farthest-next-use spill heuristic (spec GLOSSARY).
//!
//! Represented as a plain `Vec` rather than a linked list of `Use` records:
//! a `Vec`'s first element gives the same O(1) head access without the
//! ownership headaches of a hand-rolled linked list in safe Rust, and
//! nothing downstream needs to splice the middle of the list.

use crate::ssa::{BlockId, Function, ValueId};
use cot_entity::SecondaryMap;
use std::collections::{HashSet, VecDeque};

/// One recorded use of a value: how many scheduled instructions away it is
/// from the point of interest, and which instruction position that is.
#[derive(Copy, Clone, Debug)]
pub struct Use {
    pub distance: u32,
    pub position: usize,
}

pub const NO_CALL: usize = usize::MAX;

/// Liveness information for one block.
#[derive(Default)]
pub struct BlockLiveness {
    /// `uses[v]`: nearest-first list of this value's uses within the block,
    /// recorded while walking the block backward.
    pub uses: SecondaryMap<ValueId, Vec<Use>>,
    /// `next_call[i]`: index of the next call at or after position `i`, or
    /// `NO_CALL`.
    pub next_call: Vec<usize>,
    /// Values live at the start of the block (computed from the separate
    /// cross-block live-out/live-in fixpoint).
    pub live_in: HashSet<ValueId>,
    pub live_out: HashSet<ValueId>,
}

/// Liveness for every block of a function.
pub struct Liveness {
    pub blocks: SecondaryMap<BlockId, BlockLiveness>,
}

impl Liveness {
    /// Compute per-instruction use distances, `next_call` arrays, and
    /// cross-block live-in/live-out sets for `func`. `func.layout` must
    /// already be populated (i.e. `schedule` has run).
    pub fn compute(func: &Function) -> Self {
        let mut blocks: SecondaryMap<BlockId, BlockLiveness> = SecondaryMap::new();

        for &b in &func.layout {
            blocks[b] = compute_block_local(func, b);
        }

        compute_cross_block(func, &mut blocks);
        Self { blocks }
    }
}

fn compute_block_local(func: &Function, b: BlockId) -> BlockLiveness {
    let block = func.block(b);
    let n = block.values.len();
    let mut next_call = vec![NO_CALL; n];
    let mut uses: SecondaryMap<ValueId, Vec<Use>> = SecondaryMap::new();

    // next_call: walk backward, carrying forward the nearest call index.
    let mut last_call = NO_CALL;
    for i in (0..n).rev() {
        let v = block.values[i];
        if func.value(v).op.meta().is_call {
            last_call = i;
        }
        next_call[i] = last_call;
    }

    // Use-distance lists: walk backward from the block's virtual end
    // (position `n`, where the control value — branch condition or return
    // value — lives) down to position 0. Since `distance = n - i` grows
    // monotonically as `i` shrinks, appending while scanning in this order
    // builds each value's list already nearest-first (smallest distance,
    // i.e. position `n`, pushed first) with no separate sort/reverse step.
    for ctrl in block.control.iter().flatten() {
        uses.get_mut(*ctrl).push(Use {
            distance: 0,
            position: n,
        });
    }
    for i in (0..n).rev() {
        let v = block.values[i];
        for &arg in &func.value(v).args {
            uses.get_mut(arg).push(Use {
                distance: (n - i) as u32,
                position: i,
            });
        }
    }

    BlockLiveness {
        uses,
        next_call,
        live_in: HashSet::new(),
        live_out: HashSet::new(),
    }
}

fn compute_cross_block(func: &Function, blocks: &mut SecondaryMap<BlockId, BlockLiveness>) {
    // defs[b]: values this block itself defines.
    let mut defs: SecondaryMap<BlockId, HashSet<ValueId>> = SecondaryMap::new();
    let mut local_uses: SecondaryMap<BlockId, HashSet<ValueId>> = SecondaryMap::new();
    for &b in &func.layout {
        let block = func.block(b);
        let mut d = HashSet::new();
        for &v in &block.values {
            d.insert(v);
        }
        let mut u = HashSet::new();
        for &v in &block.values {
            for &arg in &func.value(v).args {
                if !d.contains(&arg) {
                    u.insert(arg);
                }
            }
        }
        for ctrl in block.control.iter().flatten() {
            if !d.contains(ctrl) {
                u.insert(*ctrl);
            }
        }
        defs[b] = d;
        local_uses[b] = u;
    }

    // Iterative backward dataflow to a fixpoint.
    let mut worklist: VecDeque<BlockId> = func.layout.iter().rev().copied().collect();
    let mut in_worklist: HashSet<BlockId> = worklist.iter().copied().collect();

    while let Some(b) = worklist.pop_front() {
        in_worklist.remove(&b);
        let block = func.block(b);

        let mut live_out: HashSet<ValueId> = HashSet::new();
        for succ in &block.succs {
            let s = succ.block;
            live_out.extend(blocks[s].live_in.iter().copied());
            // Phi handling: the predecessor-matching arg of each phi in
            // `s` is live at the end of `b` (spec §4.6), independent of
            // whether it shows up in `s`'s generic live_in.
            let spred_index = succ.dest_index;
            for &phi in &func.block(s).values {
                if func.value(phi).op == crate::ssa::Op::Phi {
                    if let Some(&arg) = func.value(phi).args.get(spred_index) {
                        live_out.insert(arg);
                    }
                }
            }
        }

        let mut live_in = local_uses[b].clone();
        for v in &live_out {
            if !defs[b].contains(v) {
                live_in.insert(*v);
            }
        }

        let changed = live_out != blocks[b].live_out || live_in != blocks[b].live_in;
        blocks[b].live_out = live_out;
        blocks[b].live_in = live_in;

        if changed {
            for pred in &block.preds {
                if in_worklist.insert(pred.block) {
                    worklist.push_back(pred.block);
                }
            }
        }
    }
}

impl BlockLiveness {
    /// True if `v`'s next use lies strictly after the next call at
    /// position `at` — i.e. it's safe to reclaim `v`'s register across
    /// that call without a reload before the call (spec §4.6).
    pub fn is_spill_eligible_across_call(&self, v: ValueId, at: usize) -> bool {
        let next_call = self.next_call.get(at).copied().unwrap_or(NO_CALL);
        if next_call == NO_CALL {
            return false;
        }
        match self.uses.get(v).iter().find(|u| u.position >= at) {
            Some(u) => u.position > next_call,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Primitive, TypeRegistry};

    #[test]
    fn use_list_is_nearest_first() {
        let reg = TypeRegistry::new();
        let i64_ty = reg.primitive(Primitive::I64);
        let mut f = Function::new("f", 8);
        let entry = f.entry;
        let c1 = f.const_int(entry, 1, i64_ty);
        let add1 = f.make_value(crate::ssa::Op::Add, i64_ty);
        f.add_arg(add1, c1);
        f.add_arg(add1, c1);
        f.append_to_block(entry, add1);
        let add2 = f.make_value(crate::ssa::Op::Add, i64_ty);
        f.add_arg(add2, c1);
        f.add_arg(add2, add1);
        f.append_to_block(entry, add2);
        f.layout = vec![entry];
        f.scheduled = true;

        let live = Liveness::compute(&f);
        let uses_c1 = live.blocks[entry].uses.get(c1);
        // c1 is used at position 1 (add2) and position 0 (add1, twice).
        assert_eq!(uses_c1.len(), 3);
        // Nearest-first: strictly non-decreasing distance, and the use at
        // position 1 (closer to the block's end) must come before either
        // use at position 0.
        assert!(uses_c1.windows(2).all(|w| w[0].distance <= w[1].distance));
        assert_eq!(uses_c1[0].position, 1);
        assert_eq!(uses_c1[1].position, 0);
        assert_eq!(uses_c1[2].position, 0);
    }
}
