//! Register allocation (C6, spec §4.7): linear scan per block, phi
//! reconciliation across block boundaries, and shuffle-phase parallel
//! copies to make every edge agree on where a value lives.

pub mod linear_scan;
pub mod register_set;
pub mod shuffle;

use crate::liveness::Liveness;
use crate::regalloc::register_set::Reg;
use crate::result::CodegenResult;
use crate::ssa::{BlockId, Function};
use cot_entity::SecondaryMap;

pub use linear_scan::{Allocations, Location, REMATERIALIZE};
pub use shuffle::{reconcile_phis, sequentialize, EdgeCopy, PhiReconciliation};

/// Reserved purely for breaking shuffle cycles; `linear_scan` never hands
/// this register out to an ordinary value (spec §4.7).
pub const SCRATCH_REG: Reg = 17;

pub struct RegallocResult {
    pub allocations: Allocations,
    pub shuffles: SecondaryMap<BlockId, Vec<(Location, Location)>>,
}

pub fn run(func: &Function, liveness: &Liveness) -> CodegenResult<RegallocResult> {
    let mut allocations = linear_scan::run(func, liveness);
    let reconciliation = reconcile_phis(func, &mut allocations);

    let mut shuffles: SecondaryMap<BlockId, Vec<(Location, Location)>> = SecondaryMap::new();
    for (b, _) in func.blocks() {
        let copies = reconciliation.edge_copies.get(b);
        if !copies.is_empty() {
            shuffles[b] = sequentialize(copies, SCRATCH_REG);
        }
    }

    Ok(RegallocResult {
        allocations,
        shuffles,
    })
}
