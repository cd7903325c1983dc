//! `schedule` (spec §4.4.4): fixes the function's block layout (reverse
//! postorder from the entry block) and, within each block, reorders values
//! so phis come first, then parameters, then everything else — control
//! values are never part of `Block::values` to begin with, so "control
//! last" is already satisfied by the data layout.

use crate::result::CodegenResult;
use crate::ssa::{BlockId, Function, Op};
use std::collections::HashSet;

pub fn run(func: &mut Function) -> CodegenResult<()> {
    let order = reverse_postorder(func);
    for &b in &order {
        reorder_block(func, b);
    }
    func.layout = order;
    func.scheduled = true;
    Ok(())
}

fn reverse_postorder(func: &Function) -> Vec<BlockId> {
    let mut visited = HashSet::new();
    let mut postorder = Vec::with_capacity(func.num_blocks());
    let mut stack = vec![(func.entry, false)];

    while let Some((b, children_pushed)) = stack.pop() {
        if children_pushed {
            postorder.push(b);
            continue;
        }
        if !visited.insert(b) {
            continue;
        }
        stack.push((b, true));
        for succ in func.block(b).succs.iter().rev() {
            if !visited.contains(&succ.block) {
                stack.push((succ.block, false));
            }
        }
    }

    postorder.reverse();
    postorder
}

fn reorder_block(func: &mut Function, b: BlockId) {
    let values = func.block(b).values.clone();
    let mut phis = Vec::new();
    let mut params = Vec::new();
    let mut rest = Vec::new();

    for v in values {
        match func.value(v).op {
            Op::Phi => phis.push(v),
            Op::Arg => params.push(v),
            _ => rest.push(v),
        }
    }

    phis.extend(params);
    phis.extend(rest);
    func.block_mut(b).values = phis;
}
