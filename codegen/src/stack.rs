//! The stack allocator (C7, spec §4.8.1/4.8.2): lays out one function's
//! frame — locals by actual size, spill slots, the callee-saved register
//! save area, and the saved frame-pointer/link-register pair — then
//! decides whether the prologue can allocate the whole frame with a single
//! pre-indexed `stp`, or needs a separate `sub sp, sp, #n` first.

use crate::ir::IrFunction;
use crate::regalloc::register_set::{Reg, RegMask, CALLEE_SAVED};
use crate::types::TypeRegistry;

/// `stp`'s pre-indexed immediate is a signed 7-bit multiple of 8, so it can
/// only move `sp` down by at most 504 bytes in the same instruction that
/// saves fp/lr (spec §4.8.2).
pub const MAX_COMBINED_STP_OFFSET: u32 = 504;

fn align_up(n: u32, align: u32) -> u32 {
    (n + align - 1) & !(align - 1)
}

/// How the prologue establishes the frame.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PrologueShape {
    /// `stp x29, x30, [sp, #-frame_size]!` does both the allocation and the
    /// fp/lr save in one instruction.
    Combined { frame_size: u32 },
    /// `sub sp, sp, #frame_size` first, then a non-writeback `stp x29, x30,
    /// [sp, #offset]`, then `add x29, sp, #offset`.
    SubThenStp { frame_size: u32, fp_lr_offset: u32 },
}

impl PrologueShape {
    pub fn decide(frame_size: u32) -> Self {
        if frame_size <= MAX_COMBINED_STP_OFFSET {
            PrologueShape::Combined { frame_size }
        } else {
            PrologueShape::SubThenStp {
                frame_size,
                fp_lr_offset: frame_size - 16,
            }
        }
    }
}

/// The laid-out frame for one function.
#[derive(Debug)]
pub struct FrameLayout {
    /// Byte offsets from the frame pointer, for the spill slots indexed
    /// 0..spill_slots (negative: below fp).
    pub spill_offsets: Vec<i32>,
    /// Which callee-saved registers this function's allocator actually
    /// handed to a value and so must save/restore (spec §4.8.1: "only
    /// registers actually clobbered").
    pub callee_saved_used: Vec<Reg>,
    /// Offset of the saved-x8 slot, if this function itself returns a
    /// large aggregate and needs to keep the hidden-return pointer around
    /// across intervening calls.
    pub hidden_return_slot: Option<i32>,
    pub prologue: PrologueShape,
    pub total_size: u32,
}

/// Lay out `func`'s frame: fill every `Local::stack_offset`, allocate
/// `spill_slots` 8-byte slots, reserve space for callee-saves actually in
/// `callee_saved_used` and (if `hidden_return_size > 0`) a slot to save the
/// incoming x8 pointer, then round the whole thing to 16 bytes.
pub fn layout_frame(
    func: &mut IrFunction,
    types: &TypeRegistry,
    spill_slots: u32,
    callee_saved_used: RegMask,
    uses_hidden_return: bool,
) -> FrameLayout {
    let mut offset = 0u32;

    // Locals, in declaration order (params first), each aligned to its own
    // natural alignment.
    let local_ids: Vec<_> = func.locals().map(|(id, _)| id).collect();
    for id in local_ids {
        let local = func.local(id);
        let align = types.align_of(local.ty).max(1);
        let size = local.size.max(1);
        offset = align_up(offset, align);
        let this_offset = offset;
        offset += size;
        func.local_mut(id).stack_offset = Some(-(this_offset as i32) - size as i32);
    }

    let hidden_return_slot = if uses_hidden_return {
        offset = align_up(offset, 8);
        let this_offset = offset;
        offset += 8;
        Some(-(this_offset as i32) - 8)
    } else {
        None
    };

    offset = align_up(offset, 8);
    let mut spill_offsets = Vec::with_capacity(spill_slots as usize);
    for _ in 0..spill_slots {
        let this_offset = offset;
        offset += 8;
        spill_offsets.push(-(this_offset as i32) - 8);
    }

    let callee_saved_used: Vec<Reg> = (0..32)
        .filter(|&r| CALLEE_SAVED.contains(r) && callee_saved_used.contains(r))
        .collect();
    offset += (callee_saved_used.len() as u32) * 8;

    // The saved fp/lr pair sits at the top of the frame, nearest the
    // caller's frame.
    let total_size = align_up(offset + 16, 16);

    FrameLayout {
        spill_offsets,
        callee_saved_used,
        hidden_return_slot,
        prologue: PrologueShape::decide(total_size),
        total_size,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Primitive;

    #[test]
    fn locals_get_distinct_aligned_offsets() {
        let mut reg = TypeRegistry::new();
        let i64_ty = reg.primitive(Primitive::I64);
        let i8_ty = reg.primitive(Primitive::I8);
        let mut f = IrFunction::new("f", i64_ty);
        let a = f.add_local("a", i8_ty, 1, false);
        let b = f.add_local("b", i64_ty, 8, false);

        let layout = layout_frame(&mut f, &reg, 0, RegMask::EMPTY, false);

        assert!(f.local(a).stack_offset.is_some());
        assert!(f.local(b).stack_offset.is_some());
        assert_ne!(f.local(a).stack_offset, f.local(b).stack_offset);
        assert_eq!(layout.total_size % 16, 0);
    }

    #[test]
    fn small_frame_uses_combined_prologue() {
        let reg = TypeRegistry::new();
        let mut f = IrFunction::new("f", reg.primitive(Primitive::Void));
        let layout = layout_frame(&mut f, &reg, 2, RegMask::EMPTY, false);
        assert!(matches!(layout.prologue, PrologueShape::Combined { .. }));
    }

    #[test]
    fn oversized_frame_splits_sub_and_stp() {
        let reg = TypeRegistry::new();
        let mut f = IrFunction::new("f", reg.primitive(Primitive::Void));
        // 80 spill slots * 8 bytes = 640 bytes, well past the 504-byte cap.
        let layout = layout_frame(&mut f, &reg, 80, RegMask::EMPTY, false);
        assert!(matches!(layout.prologue, PrologueShape::SubThenStp { .. }));
        assert!(layout.total_size > MAX_COMBINED_STP_OFFSET);
    }

    #[test]
    fn hidden_return_pointer_gets_its_own_slot() {
        let reg = TypeRegistry::new();
        let mut f = IrFunction::new("f", reg.primitive(Primitive::Void));
        let layout = layout_frame(&mut f, &reg, 0, RegMask::EMPTY, true);
        assert!(layout.hidden_return_slot.is_some());
    }
}
