//! Linear-scan register allocation (C6, spec §4.7): walk each block's
//! values in schedule order, handing out registers from the allocatable
//! set; when none are free, evict whichever currently-active value has the
//! farthest next use (Belady's rule, applied with the per-block `Use`
//! lists `liveness.rs` already built).
//!
//! Every value gets exactly one [`Location`] for its whole lifetime —
//! either a register or a spill slot, never both at different points. This
//! is a deliberate simplification relative to interval-splitting allocators
//! like `regalloc2`: once spilled, a value is reloaded (by the emitter)
//! at every remaining use rather than ever being promoted back into a
//! register. It keeps the allocator itself a single linear pass per block.

use crate::liveness::{BlockLiveness, Liveness};
use crate::regalloc::register_set::{Reg, RegisterFile, ALLOCATABLE};
use crate::ssa::{BlockId, Function, Op, ValueId};
use cot_entity::SecondaryMap;
use std::collections::HashMap;

/// Where one value lives after allocation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum Location {
    #[default]
    Unassigned,
    Reg(u8),
    /// A stack spill slot index, or `u32::MAX` for a rematerializable
    /// value that is never actually stored anywhere (spec GLOSSARY:
    /// "Rematerializable value" — recomputed at each use instead).
    Spill(u32),
}

pub const REMATERIALIZE: u32 = u32::MAX;

pub struct Allocations {
    pub locations: SecondaryMap<ValueId, Location>,
    pub spill_slots: u32,
}

pub fn run(func: &Function, liveness: &Liveness) -> Allocations {
    let mut locations: SecondaryMap<ValueId, Location> = SecondaryMap::new();
    let mut next_spill_slot = 0u32;
    let mut active: [Option<ValueId>; 32] = [None; 32];
    let mut regfile = RegisterFile::new(ALLOCATABLE);

    // A value used only as a block's `if`/`ret` control operand has
    // `uses() == 0` (control slots don't go through `add_arg`), but it
    // still needs somewhere to live.
    let control_refs: std::collections::HashSet<ValueId> = func
        .blocks()
        .flat_map(|(_, b)| b.control.iter().flatten().copied())
        .collect();

    // End-of-block register snapshots, keyed by block, so a successor can
    // inherit its start state instead of beginning from a fully free
    // register file (spec §4.7 step 1).
    let mut end_regs: HashMap<BlockId, Vec<(ValueId, Reg)>> = HashMap::new();

    for &b in &func.layout {
        let block = func.block(b);
        let bl = &liveness.blocks[b];
        let n = block.values.len();

        if let Some(pred) = best_predecessor(block, &end_regs, bl) {
            for &(v, r) in &end_regs[&pred] {
                if bl.live_in.contains(&v) && regfile.is_avail(r) {
                    regfile.take(r);
                    active[r as usize] = Some(v);
                }
            }
        }

        for (i, &v) in block.values.iter().enumerate() {
            let val = func.value(v);

            if val.rematerializable {
                locations[v] = Location::Spill(REMATERIALIZE);
                continue;
            }
            if val.op == Op::Phi {
                // Assigned later by `shuffle::reconcile_phis`.
                continue;
            }

            let needs_result =
                val.uses() > 0 || bl.live_out.contains(&v) || control_refs.contains(&v);
            if !needs_result {
                continue;
            }

            if let Some(r) = regfile.alloc_within(ALLOCATABLE) {
                active[r as usize] = Some(v);
                locations[v] = Location::Reg(r);
                continue;
            }

            match farthest_next_use(&active, bl, i, n) {
                Some(victim) => {
                    let vreg = match locations[victim] {
                        Location::Reg(r) => r,
                        _ => unreachable!("active table only tracks register-resident values"),
                    };
                    active[vreg as usize] = None;
                    locations[victim] = Location::Spill(next_spill_slot);
                    next_spill_slot += 1;
                    regfile.free(vreg);

                    let r = regfile
                        .alloc_within(ALLOCATABLE)
                        .expect("a register was just freed");
                    active[r as usize] = Some(v);
                    locations[v] = Location::Reg(r);
                }
                None => {
                    locations[v] = Location::Spill(next_spill_slot);
                    next_spill_slot += 1;
                }
            }
        }

        // Block boundary: snapshot which value occupies which register so
        // a successor can inherit this state (above), then release
        // everything back to the shared pool. Phi-bound cross-block
        // values are still reconciled through `shuffle::reconcile_phis`;
        // this snapshot only covers the direct single/best-predecessor
        // carry-forward, not the full multi-predecessor merge.
        let mut snapshot = Vec::new();
        for (r, slot) in active.iter_mut().enumerate() {
            if let Some(v) = slot.take() {
                snapshot.push((v, r as Reg));
                if let Location::Reg(reg) = locations[v] {
                    regfile.free(reg);
                }
            }
        }
        end_regs.insert(b, snapshot);
    }

    Allocations {
        locations,
        spill_slots: next_spill_slot,
    }
}

/// Pick which predecessor's end-of-block register state this block should
/// inherit as its own start state (spec §4.7 step 1): for a single
/// predecessor there's only one candidate; for a merge block, the
/// predecessor with the most registers holding values this block actually
/// needs ("most useful value overlap"). Predecessors not yet processed
/// (back-edges in this reverse-postorder walk) have no recorded state and
/// are never chosen.
fn best_predecessor(
    block: &crate::ssa::Block,
    end_regs: &HashMap<BlockId, Vec<(ValueId, Reg)>>,
    bl: &BlockLiveness,
) -> Option<BlockId> {
    block
        .preds
        .iter()
        .map(|p| p.block)
        .filter(|p| end_regs.contains_key(p))
        .max_by_key(|p| {
            end_regs[p]
                .iter()
                .filter(|(v, _)| bl.live_in.contains(v))
                .count()
        })
}

fn farthest_next_use(
    active: &[Option<ValueId>; 32],
    bl: &BlockLiveness,
    at: usize,
    n: usize,
) -> Option<ValueId> {
    let mut best: Option<(ValueId, u32)> = None;
    for v in active.iter().flatten().copied() {
        let dist = next_use_distance(bl, v, at, n);
        if best.map(|(_, d)| dist > d).unwrap_or(true) {
            best = Some((v, dist));
        }
    }
    best.map(|(v, _)| v)
}

fn next_use_distance(bl: &BlockLiveness, v: ValueId, at: usize, n: usize) -> u32 {
    match bl.uses.get(v).iter().filter(|u| u.position >= at).min_by_key(|u| u.position) {
        Some(u) => (u.position - at) as u32,
        None => {
            if bl.live_out.contains(&v) {
                n as u32 + 1
            } else {
                u32::MAX
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::schedule;
    use crate::types::{Primitive, TypeRegistry};

    #[test]
    fn two_values_fit_in_distinct_registers() {
        let reg = TypeRegistry::new();
        let i64_ty = reg.primitive(Primitive::I64);
        let mut f = Function::new("f", 8);
        let entry = f.entry;
        let a = f.make_value(Op::LoadReg, i64_ty);
        f.append_to_block(entry, a);
        let b = f.make_value(Op::LoadReg, i64_ty);
        f.append_to_block(entry, b);
        let add = f.make_value(Op::Add, i64_ty);
        f.add_arg(add, a);
        f.add_arg(add, b);
        f.append_to_block(entry, add);
        f.block_mut(entry).control[0] = Some(add);

        schedule::run(&mut f).unwrap();
        let live = Liveness::compute(&f);
        let alloc = run(&f, &live);

        let loc_a = alloc.locations[a];
        let loc_b = alloc.locations[b];
        assert!(matches!(loc_a, Location::Reg(_)));
        assert!(matches!(loc_b, Location::Reg(_)));
        assert_ne!(loc_a, loc_b);
    }

    #[test]
    fn a_value_forwarded_across_a_single_pred_edge_keeps_its_own_register() {
        // entry: a = load_reg; (falls through, no phi needed)
        // next:  b = load_reg; add = a + b; ret add
        // `a` is defined in `entry` and used only in `next` — the SSA
        // builder's single-predecessor forwarding never inserts a phi for
        // it, so nothing but this block-boundary inheritance protects its
        // register from being handed straight to `b`.
        let reg = TypeRegistry::new();
        let i64_ty = reg.primitive(Primitive::I64);
        let mut f = Function::new("f", 8);
        let entry = f.entry;
        let a = f.make_value(Op::LoadReg, i64_ty);
        f.append_to_block(entry, a);

        let next = f.new_block();
        f.add_edge(entry, next);

        let b = f.make_value(Op::LoadReg, i64_ty);
        f.append_to_block(next, b);
        let add = f.make_value(Op::Add, i64_ty);
        f.add_arg(add, a);
        f.add_arg(add, b);
        f.append_to_block(next, add);
        f.block_mut(next).control[0] = Some(add);

        schedule::run(&mut f).unwrap();
        let live = Liveness::compute(&f);
        let alloc = run(&f, &live);

        assert!(matches!(alloc.locations[a], Location::Reg(_)));
        assert!(matches!(alloc.locations[b], Location::Reg(_)));
        assert_ne!(
            alloc.locations[a], alloc.locations[b],
            "a live-in value and a fresh value in the same block must not share a register"
        );
    }

    #[test]
    fn rematerializable_constants_never_get_a_register() {
        let reg = TypeRegistry::new();
        let i64_ty = reg.primitive(Primitive::I64);
        let mut f = Function::new("f", 8);
        let entry = f.entry;
        let c = f.const_int(entry, 42, i64_ty);
        f.block_mut(entry).control[0] = Some(c);

        schedule::run(&mut f).unwrap();
        let live = Liveness::compute(&f);
        let alloc = run(&f, &live);

        assert_eq!(alloc.locations[c], Location::Spill(REMATERIALIZE));
    }
}
