//! The SSA operation vocabulary (spec §4.3).
//!
//! Deliberately a flat, code-reviewable `enum` rather than a generated
//! instruction table — the op set here is small and fixed, unlike
//! Cranelift's own hundreds of code-generated opcodes, so a `match`-based
//! static metadata table (`OpMeta`) is simpler and just as fast.

/// One SSA operation. Payload (constant value, offset, callee name, ...)
/// lives on `Value::aux_int`/`Value::aux_ptr`, not here — this tag alone
/// decides arity, commutativity and register-allocation constraints.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Op {
    // Constants
    ConstInt,
    ConstBool,
    ConstNil,
    ConstFloat,
    ConstString,
    // Arithmetic
    Add,
    Sub,
    Mul,
    SDiv,
    UDiv,
    SMod,
    Neg,
    // Bitwise
    BAnd,
    BOr,
    BXor,
    BNot,
    Shl,
    Shr,
    AShr,
    // Logical
    Not,
    // Comparisons
    Eq,
    Ne,
    Slt,
    Sle,
    Sgt,
    Sge,
    Ult,
    Ule,
    // Memory
    Load,
    Store,
    LoadReg,
    StoreReg,
    Copy,
    // Addresses
    LocalAddr,
    GlobalAddr,
    OffPtr,
    AddPtr,
    FieldValue,
    IndexValue,
    // Aggregates
    SliceMake,
    SlicePtr,
    SliceLen,
    StringMake,
    StringPtr,
    StringLen,
    // Calls
    StaticCall,
    ClosureCall,
    SelectN,
    // Control
    Phi,
    Arg,
    Select,
}

/// Arity of an op's argument list. `Variadic` covers `static_call`,
/// `closure_call`, `phi` (one arg per predecessor) and `select_n`-producing
/// calls.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Arity {
    Fixed(u8),
    Variadic,
}

/// Static per-op metadata consulted by the passes, the allocator and the
/// emitter.
#[derive(Copy, Clone, Debug)]
pub struct OpMeta {
    pub arity: Arity,
    pub commutative: bool,
    /// The output register must equal arg[0]'s register (e.g. ARM64's
    /// 2-address-like patterns such as `smod`'s internal expansion).
    pub result_in_arg0: bool,
    /// True for a `static_call`/`closure_call`: caller-saved registers are
    /// clobbered, and the allocator must spill everything live across it
    /// that isn't itself an argument or the hidden-return pointer.
    pub is_call: bool,
    /// Cheap enough to recompute on demand rather than spill (spec
    /// GLOSSARY: "Rematerializable value").
    pub rematerializable: bool,
    /// Has no result (a statement, not an expression): stores, calls with
    /// no used result, and all control ops.
    pub has_side_effect: bool,
}

impl Op {
    pub fn meta(self) -> OpMeta {
        use Arity::*;
        match self {
            Op::ConstInt | Op::ConstBool | Op::ConstNil | Op::ConstFloat | Op::ConstString => OpMeta {
                arity: Fixed(0),
                commutative: false,
                result_in_arg0: false,
                is_call: false,
                rematerializable: true,
                has_side_effect: false,
            },
            Op::Add | Op::Mul | Op::BAnd | Op::BOr | Op::BXor | Op::Eq | Op::Ne => OpMeta {
                arity: Fixed(2),
                commutative: true,
                result_in_arg0: false,
                is_call: false,
                rematerializable: false,
                has_side_effect: false,
            },
            Op::Sub
            | Op::SDiv
            | Op::UDiv
            | Op::SMod
            | Op::Shl
            | Op::Shr
            | Op::AShr
            | Op::Slt
            | Op::Sle
            | Op::Sgt
            | Op::Sge
            | Op::Ult
            | Op::Ule => OpMeta {
                arity: Fixed(2),
                commutative: false,
                result_in_arg0: false,
                is_call: false,
                rematerializable: false,
                has_side_effect: false,
            },
            Op::Neg | Op::BNot | Op::Not => OpMeta {
                arity: Fixed(1),
                commutative: false,
                result_in_arg0: false,
                is_call: false,
                rematerializable: false,
                has_side_effect: false,
            },
            Op::Load => OpMeta {
                arity: Fixed(1),
                commutative: false,
                result_in_arg0: false,
                is_call: false,
                rematerializable: false,
                has_side_effect: false,
            },
            Op::Store => OpMeta {
                arity: Fixed(2),
                commutative: false,
                result_in_arg0: false,
                is_call: false,
                rematerializable: false,
                has_side_effect: true,
            },
            Op::LoadReg => OpMeta {
                arity: Fixed(0),
                commutative: false,
                result_in_arg0: false,
                is_call: false,
                rematerializable: false,
                has_side_effect: false,
            },
            Op::StoreReg => OpMeta {
                arity: Fixed(1),
                commutative: false,
                result_in_arg0: false,
                is_call: false,
                rematerializable: false,
                has_side_effect: true,
            },
            Op::Copy => OpMeta {
                arity: Fixed(1),
                commutative: false,
                result_in_arg0: false,
                is_call: false,
                rematerializable: false,
                has_side_effect: false,
            },
            Op::LocalAddr | Op::GlobalAddr => OpMeta {
                arity: Fixed(0),
                commutative: false,
                result_in_arg0: false,
                is_call: false,
                rematerializable: true,
                has_side_effect: false,
            },
            Op::OffPtr | Op::AddPtr => OpMeta {
                arity: Fixed(1),
                commutative: false,
                result_in_arg0: false,
                is_call: false,
                rematerializable: true,
                has_side_effect: false,
            },
            Op::FieldValue | Op::IndexValue => OpMeta {
                arity: Fixed(1),
                commutative: false,
                result_in_arg0: false,
                is_call: false,
                rematerializable: false,
                has_side_effect: false,
            },
            Op::SliceMake | Op::StringMake => OpMeta {
                arity: Fixed(2),
                commutative: false,
                result_in_arg0: false,
                is_call: false,
                rematerializable: false,
                has_side_effect: false,
            },
            Op::SlicePtr | Op::SliceLen | Op::StringPtr | Op::StringLen => OpMeta {
                arity: Fixed(1),
                commutative: false,
                result_in_arg0: false,
                is_call: false,
                rematerializable: false,
                has_side_effect: false,
            },
            Op::StaticCall | Op::ClosureCall => OpMeta {
                arity: Variadic,
                commutative: false,
                result_in_arg0: false,
                is_call: true,
                rematerializable: false,
                has_side_effect: true,
            },
            Op::SelectN => OpMeta {
                arity: Fixed(1),
                commutative: false,
                result_in_arg0: false,
                is_call: false,
                rematerializable: false,
                has_side_effect: false,
            },
            Op::Phi => OpMeta {
                arity: Variadic,
                commutative: false,
                result_in_arg0: false,
                is_call: false,
                rematerializable: false,
                has_side_effect: false,
            },
            Op::Arg => OpMeta {
                arity: Fixed(0),
                commutative: false,
                result_in_arg0: false,
                is_call: false,
                rematerializable: false,
                has_side_effect: false,
            },
            Op::Select => OpMeta {
                arity: Fixed(3),
                commutative: false,
                result_in_arg0: false,
                is_call: false,
                rematerializable: false,
                has_side_effect: false,
            },
        }
    }
}
