//! The per-function compilation pipeline driver (spec §4: the full
//! IR → SSA → passes → ABI → liveness → regalloc → stack → emit sequence),
//! modeled on `cranelift-codegen::Context` (`cranelift-codegen/src/context.rs`):
//! one object per function, reused across calls so its internal scratch
//! state doesn't get reallocated every time.
//!
//! SSA construction itself (C2) lives in the sibling `cot-frontend` crate
//! and has already run by the time a `Context` is built — this module picks
//! up from a finished `ssa::Function` plus the `ir::IrFunction` it was built
//! from (still needed for local stack-slot layout).

use crate::abi::AbiResolver;
use crate::isa::arm64::{encode_function, EncodedFunction};
use crate::ir::IrFunction;
use crate::liveness::Liveness;
use crate::passes;
use crate::regalloc::{self, register_set::{RegMask, CALLEE_SAVED}, Location};
use crate::result::CodegenResult;
use crate::settings::Flags;
use crate::ssa::Function;
use crate::stack::{self, FrameLayout};
use crate::types::TypeRegistry;
use crate::verify;

/// Owns one function's SSA form across the whole back-half of the pipeline.
pub struct Context {
    pub func: Function,
}

impl Context {
    pub fn new(func: Function) -> Self {
        Self { func }
    }

    /// Run the pass pipeline, register allocation, stack layout and
    /// encoding for `self.func`, returning the final machine code and its
    /// relocations. `ir_func` is the pre-SSA function `self.func` was built
    /// from (only its `Local` table is consulted, for `stack::layout_frame`
    /// and `local_addr` rematerialization).
    pub fn compile(
        &mut self,
        ir_func: &mut IrFunction,
        types: &TypeRegistry,
        flags: &Flags,
    ) -> CodegenResult<EncodedFunction> {
        passes::run_pipeline(&mut self.func, types, flags)?;
        verify::verify_after_passes(&self.func)?;

        let liveness = Liveness::compute(&self.func);
        let result = regalloc::run(&self.func, &liveness)?;
        verify::verify_after_regalloc(&self.func, &result)?;

        let callee_saved_used = used_callee_saved(&self.func, &result.allocations.locations);
        let uses_hidden_return = self.signature_uses_hidden_return(ir_func, types);

        let frame = stack::layout_frame(
            ir_func,
            types,
            result.allocations.spill_slots,
            callee_saved_used,
            uses_hidden_return,
        );

        encode_function(&self.func, ir_func, &result, &frame)
    }

    fn signature_uses_hidden_return(&self, ir_func: &IrFunction, types: &TypeRegistry) -> bool {
        let param_types: Vec<_> = ir_func.params.iter().map(|&p| ir_func.local(p).ty).collect();
        AbiResolver::new(types)
            .resolve(&param_types, ir_func.ret_ty, None)
            .uses_hidden_return
    }
}

fn used_callee_saved(
    func: &Function,
    locations: &cot_entity::SecondaryMap<crate::ssa::ValueId, Location>,
) -> RegMask {
    let mut used = RegMask::EMPTY;
    for (v, _) in func.values() {
        if let Location::Reg(r) = locations[v] {
            if CALLEE_SAVED.contains(r) {
                used.insert(r);
            }
        }
    }
    used
}
