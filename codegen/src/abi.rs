//! The ABI resolver (C4, spec §3.4, §4.5): AAPCS64-style parameter/return
//! placement, consulted by `expand_calls`, by the emitter, and by the stack
//! allocator.

use crate::types::{TypeId, TypeRegistry};

/// Integer/pointer argument registers, x0..=x7 (spec §4.5).
pub const INT_ARG_REGS: u8 = 8;

/// Names the emitter recognizes as C variadic functions, whose variadic
/// arguments always go on the stack even when register slots are free
/// (spec §4.5).
pub const VARIADIC_C_FUNCTIONS: &[&str] = &["open", "openat", "fcntl", "ioctl"];

pub fn is_variadic_c_function(name: &str) -> bool {
    VARIADIC_C_FUNCTIONS.contains(&name)
}

/// Where one parameter or return slot lives.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Placement {
    /// Integer/pointer register, 0-7.
    Register(u8),
    /// Byte offset into the stack argument area, 16-byte aligned per slot
    /// group (spec §4.5).
    Stack(u32),
}

/// The placement computed for one parameter: either up to two register
/// slots (decomposed aggregates ≤ 16 bytes), one stack slot, or — for an
/// aggregate > 16 bytes — a single register/stack slot holding a pointer to
/// the caller's copy (spec §4.5).
#[derive(Clone, Debug)]
pub struct ParamAbi {
    pub slots: Vec<Placement>,
    /// True if this parameter is passed by reference because its value
    /// type exceeds 16 bytes.
    pub by_reference: bool,
}

/// The ABI assignment for one call site or function signature (spec §3.4).
#[derive(Clone, Debug)]
pub struct AbiSignature {
    pub params: Vec<ParamAbi>,
    pub returns: Vec<Placement>,
    pub uses_hidden_return: bool,
    pub hidden_return_size: u32,
}

/// Resolves AAPCS64-ish signatures. Stateless beyond the type registry it
/// borrows to query sizes (`call_conv.rs`/`isa/registers.rs` in
/// `cranelift-codegen` model the same register-class-vs-ABI-shape split).
pub struct AbiResolver<'a> {
    types: &'a TypeRegistry,
}

impl<'a> AbiResolver<'a> {
    pub fn new(types: &'a TypeRegistry) -> Self {
        Self { types }
    }

    /// Resolve the ABI for a call/function signature. `variadic_from`, if
    /// set, is the index of the first variadic parameter (forced to the
    /// stack per spec §4.5, even when a register slot would otherwise be
    /// free).
    pub fn resolve(
        &self,
        param_types: &[TypeId],
        ret_type: TypeId,
        variadic_from: Option<usize>,
    ) -> AbiSignature {
        let mut next_reg = 0u8;
        let mut stack_offset = 0u32;
        let mut params = Vec::with_capacity(param_types.len());

        for (i, &ty) in param_types.iter().enumerate() {
            let forced_stack = variadic_from.map(|v| i >= v).unwrap_or(false);
            let size = self.types.size_of(ty);

            if self.types.is_large_aggregate(ty) {
                // > 16 bytes: passed by reference, one pointer-sized slot.
                let slot = if forced_stack || next_reg >= INT_ARG_REGS {
                    let off = align_up(stack_offset, 16);
                    stack_offset = off + 8;
                    Placement::Stack(off)
                } else {
                    let r = next_reg;
                    next_reg += 1;
                    Placement::Register(r)
                };
                params.push(ParamAbi {
                    slots: vec![slot],
                    by_reference: true,
                });
                continue;
            }

            let word_count = ((size.max(1) + 7) / 8).max(1) as u8;
            if forced_stack || next_reg + word_count > INT_ARG_REGS {
                let off = align_up(stack_offset, 16);
                stack_offset = off + (word_count as u32) * 8;
                // One stack slot big enough for the whole (possibly
                // 2-word-decomposed) aggregate.
                params.push(ParamAbi {
                    slots: vec![Placement::Stack(off)],
                    by_reference: false,
                });
            } else {
                let mut slots = Vec::with_capacity(word_count as usize);
                for _ in 0..word_count {
                    slots.push(Placement::Register(next_reg));
                    next_reg += 1;
                }
                params.push(ParamAbi {
                    slots,
                    by_reference: false,
                });
            }
        }

        let ret_size = self.types.size_of(ret_type);
        let uses_hidden_return = self.types.is_large_aggregate(ret_type);
        let returns = if uses_hidden_return {
            Vec::new() // the caller-allocated buffer is addressed via x8, not a normal return slot.
        } else {
            let word_count = ((ret_size.max(1) + 7) / 8).max(1).min(2);
            (0..word_count).map(|i| Placement::Register(i as u8)).collect()
        };

        AbiSignature {
            params,
            returns,
            uses_hidden_return,
            hidden_return_size: if uses_hidden_return { ret_size } else { 0 },
        }
    }
}

fn align_up(offset: u32, align: u32) -> u32 {
    (offset + align - 1) & !(align - 1)
}
