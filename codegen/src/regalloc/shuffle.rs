//! Phi reconciliation and shuffle-phase parallel copies (C6, spec §4.7).
//!
//! A `phi` doesn't get a [`Location`] from `linear_scan` — its predecessors
//! may have put its incoming values in different registers or spill slots,
//! so reconciling it is a separate three-pass step:
//!  1. gather each predecessor's incoming location for this phi;
//!  2. pick the phi's own location by majority vote across those;
//!  3. for every predecessor that disagrees with the chosen location,
//!     record a parallel-copy obligation on that predecessor's outgoing
//!     edge.
//!
//! Those per-edge parallel copies can't always be emitted as a plain
//! sequence of moves — two copies can swap each other's locations, which a
//! naive sequence would clobber — so `sequentialize` breaks any cycles
//! through a scratch register before handing back a safe move order.

use crate::regalloc::linear_scan::{Allocations, Location};
use crate::regalloc::register_set::Reg;
use crate::ssa::{BlockId, Function, Op, ValueId};
use cot_entity::SecondaryMap;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct EdgeCopy {
    pub from: Location,
    pub to: Location,
}

pub struct PhiReconciliation {
    pub phi_locations: SecondaryMap<ValueId, Location>,
    pub edge_copies: SecondaryMap<BlockId, Vec<EdgeCopy>>,
}

pub fn reconcile_phis(func: &Function, allocations: &mut Allocations) -> PhiReconciliation {
    let mut phi_locations: SecondaryMap<ValueId, Location> = SecondaryMap::new();
    let mut edge_copies: SecondaryMap<BlockId, Vec<EdgeCopy>> = SecondaryMap::new();

    for (_, block) in func.blocks() {
        for &v in &block.values {
            if func.value(v).op != Op::Phi {
                continue;
            }
            let args = func.value(v).args.clone();

            // Pass 1: gather predecessor locations.
            let candidates: Vec<Location> = block
                .preds
                .iter()
                .filter_map(|pred| args.get(pred.src_index).map(|&a| allocations.locations[a]))
                .collect();

            // Pass 2: majority vote; an unreached phi (no predecessors, or
            // every predecessor disagrees equally) gets a fresh slot.
            let chosen = majority(&candidates).unwrap_or_else(|| {
                let slot = allocations.spill_slots;
                allocations.spill_slots += 1;
                Location::Spill(slot)
            });
            phi_locations[v] = chosen;
            allocations.locations[v] = chosen;

            // Pass 3: shuffle obligations for every disagreeing predecessor.
            for pred in &block.preds {
                if let Some(&incoming) = args.get(pred.src_index) {
                    let from = allocations.locations[incoming];
                    if from != chosen {
                        edge_copies[pred.block].push(EdgeCopy { from, to: chosen });
                    }
                }
            }
        }
    }

    PhiReconciliation {
        phi_locations,
        edge_copies,
    }
}

fn majority(candidates: &[Location]) -> Option<Location> {
    let mut counts: Vec<(Location, usize)> = Vec::new();
    for &c in candidates {
        match counts.iter_mut().find(|(loc, _)| *loc == c) {
            Some(entry) => entry.1 += 1,
            None => counts.push((c, 1)),
        }
    }
    counts.into_iter().max_by_key(|(_, n)| *n).map(|(loc, _)| loc)
}

/// Turn a parallel-copy set into a safe sequence of single moves, breaking
/// any cycles through `scratch` (spec §4.7).
pub fn sequentialize(copies: &[EdgeCopy], scratch: Reg) -> Vec<(Location, Location)> {
    let mut remaining: Vec<EdgeCopy> = copies.to_vec();
    let mut out = Vec::new();

    while !remaining.is_empty() {
        let ready: Vec<usize> = remaining
            .iter()
            .enumerate()
            .filter(|(i, c)| {
                !remaining
                    .iter()
                    .enumerate()
                    .any(|(j, other)| j != *i && other.from == c.to)
            })
            .map(|(i, _)| i)
            .collect();

        if !ready.is_empty() {
            for &i in ready.iter().rev() {
                let c = remaining.remove(i);
                out.push((c.from, c.to));
            }
            continue;
        }

        // Everything left forms one or more disjoint simple cycles (a
        // parallel-copy set never has two copies sharing a destination).
        // Walk one cycle out from an arbitrary starting copy, save its
        // source to `scratch`, replay the rest of the chain in reverse,
        // then close the loop from `scratch`.
        let start = remaining[0];
        let mut chain = vec![start];
        let mut cursor = start;
        while let Some(next) = remaining
            .iter()
            .find(|c| c.from == cursor.to && **c != start)
            .copied()
        {
            chain.push(next);
            cursor = next;
        }
        for c in &chain {
            remaining.retain(|o| o != c);
        }

        out.push((start.from, Location::Reg(scratch)));
        for c in chain.iter().skip(1).rev() {
            out.push((c.from, c.to));
        }
        out.push((Location::Reg(scratch), start.to));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn independent_copies_emit_in_any_safe_order() {
        let copies = vec![
            EdgeCopy {
                from: Location::Reg(0),
                to: Location::Reg(1),
            },
            EdgeCopy {
                from: Location::Reg(2),
                to: Location::Reg(3),
            },
        ];
        let seq = sequentialize(&copies, 17);
        assert_eq!(seq.len(), 2);
        assert!(seq.contains(&(Location::Reg(0), Location::Reg(1))));
        assert!(seq.contains(&(Location::Reg(2), Location::Reg(3))));
    }

    #[test]
    fn a_swap_cycle_breaks_through_scratch() {
        // reg0 <-> reg1: a two-cycle.
        let copies = vec![
            EdgeCopy {
                from: Location::Reg(0),
                to: Location::Reg(1),
            },
            EdgeCopy {
                from: Location::Reg(1),
                to: Location::Reg(0),
            },
        ];
        let seq = sequentialize(&copies, 17);
        assert_eq!(seq.len(), 3);
        assert_eq!(seq[0], (Location::Reg(0), Location::Reg(17)));
        assert_eq!(seq[1], (Location::Reg(1), Location::Reg(0)));
        assert_eq!(seq[2], (Location::Reg(17), Location::Reg(1)));
    }
}
