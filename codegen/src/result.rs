//! The error taxonomy (spec §7).

use crate::ssa::{BlockId, ValueId};
use thiserror::Error;

/// IR malformed: fatal, aborts the function (spec §7).
#[derive(Debug, Error)]
pub enum IrError {
    #[error("node {0:?} referenced out of its defining block")]
    InvalidNodeIndex(crate::ir::NodeId),
    #[error("block {0:?} has no terminator")]
    MissingTerminator(crate::ir::IrBlock),
}

/// SSA construction / invariant violation (spec §4.2 failure modes, §8.1).
#[derive(Debug, Error)]
pub enum SsaError {
    #[error("read_var reached an unsealed predecessor of block {0:?}")]
    UnsealedPredecessor(BlockId),
    #[error("value {value:?} has {actual} uses but {expected} arg-edges reference it")]
    UseCountMismatch {
        value: ValueId,
        expected: u32,
        actual: u32,
    },
    #[error("block {0:?} edge table is not bidirectional")]
    AsymmetricEdge(BlockId),
    #[error("phi {phi:?} in block {block:?} has {got} args but block has {want} predecessors")]
    PhiArityMismatch {
        phi: ValueId,
        block: BlockId,
        got: usize,
        want: usize,
    },
}

/// Register allocation failure (spec §4.7 failure modes).
#[derive(Debug, Error)]
#[error("value {value:?} needs a register no allocation strategy could satisfy, even after spilling every non-pinned register (op {op:?})")]
pub struct RegallocError {
    pub value: ValueId,
    pub op: crate::ssa::Op,
}

/// Encoding overflow (spec §4.8.4, §7).
#[derive(Debug, Error)]
pub enum EncodingError {
    #[error("immediate {0} does not fit in {1} bits")]
    ImmediateOverflow(i64, u32),
    #[error("branch offset {0} bytes exceeds the {1}-bit encoding's range")]
    BranchTooFar(i64, u32),
    #[error("value {0:?} has no instruction selection rule for op {1:?}")]
    UnsupportedOp(crate::ssa::ValueId, crate::ssa::Op),
}

/// The top-level error type threaded through the pipeline, matching
/// `cranelift-codegen`'s `CodegenResult<T> = Result<T, CodegenError>` shape
/// (`cranelift-codegen/src/lib.rs`).
#[derive(Debug, Error)]
pub enum CodegenError {
    #[error("IR error: {0}")]
    Ir(#[from] IrError),
    #[error("SSA error: {0}")]
    Ssa(#[from] SsaError),
    #[error("register allocation error: {0}")]
    RegisterAllocator(#[from] RegallocError),
    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type CodegenResult<T> = Result<T, CodegenError>;
