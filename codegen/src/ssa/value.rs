//! The SSA `Value` (spec §3.3).

use crate::ssa::entities::ValueId;
use crate::ssa::op::Op;
use crate::types::TypeId;
use smallvec::SmallVec;

/// `Value::aux_ptr` payload: a call target or global name. Kept as an owned
/// `String` rather than an interned handle — at this stage call/global
/// names are few and the indirection isn't worth it; the object writer
/// (C9) is what actually interns symbol names (spec §4.9).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuxPtr {
    CalleeName(String),
    GlobalName(String),
}

/// A single SSA value. Argument lists are inline (`SmallVec`) since most
/// ops take 0-3 arguments; `phi`/`static_call` spill to the heap.
#[derive(Clone, Debug)]
pub struct Value {
    pub id: ValueId,
    pub op: Op,
    pub result_ty: TypeId,
    pub args: SmallVec<[ValueId; 4]>,
    /// Constant payload, stack/field offset, or local index — meaning is
    /// op-dependent (e.g. the integer value for `const_int`, the local
    /// index for `local_addr`, the byte offset for `off_ptr`).
    pub aux_int: Option<i64>,
    pub aux_ptr: Option<AuxPtr>,
    /// Maintained exclusively through `Function::reset_args`/`add_arg` —
    /// never mutate this directly (spec §9: "Direct mutation of a Value's
    /// arg array is forbidden").
    uses: u32,
    pub rematerializable: bool,
}

impl Value {
    pub(crate) fn new(id: ValueId, op: Op, result_ty: TypeId) -> Self {
        let rematerializable = op.meta().rematerializable;
        Self {
            id,
            op,
            result_ty,
            args: SmallVec::new(),
            aux_int: None,
            aux_ptr: None,
            uses: 0,
            rematerializable,
        }
    }

    pub fn uses(&self) -> u32 {
        self.uses
    }

    pub(crate) fn bump_uses(&mut self, delta: i32) {
        self.uses = (self.uses as i32 + delta).max(0) as u32;
    }

    pub fn has_side_effect(&self) -> bool {
        self.op.meta().has_side_effect
    }
}
