//! ARM64 register naming (C8, spec §4.8.3).
//!
//! `cot-codegen` only ever allocates plain general-purpose integer
//! registers (no SIMD/FP bank yet, per spec §1's Non-goals) so this is a
//! thin naming layer over the plain `u8` register numbers already used by
//! `regalloc::register_set`.

pub const FP: u8 = 29;
pub const LR: u8 = 30;
pub const SP_OR_ZR: u8 = 31;

/// x16/x17, reserved by the emitter itself for rematerializing spilled
/// operands (`regalloc::register_set::ALLOCATABLE` excludes both).
pub const SCRATCH_A: u8 = 17;
pub const SCRATCH_B: u8 = 16;

pub fn reg_name(r: u8) -> String {
    match r {
        FP => "x29".to_string(),
        LR => "x30".to_string(),
        SP_OR_ZR => "sp".to_string(),
        n => format!("x{n}"),
    }
}
