//! The Cot compiler's core pipeline: a flat pre-SSA IR (C1), SSA construction
//! support types (C2's builder itself lives in `cot-frontend`), the pass
//! pipeline (C3), ABI resolution (C4), liveness analysis (C5), linear-scan
//! register allocation (C6), stack frame layout (C7) and ARM64 instruction
//! selection/encoding (C8). Modeled end to end on `cranelift-codegen`'s own
//! crate layout: a `Context` driving passes over a `Function`, an `isa`
//! module for target-specific lowering, and a `settings` module for the
//! handful of knobs the pipeline actually exposes.
//!
//! Object file emission (C9) is a separate crate, `cot-object`; SSA
//! construction's actual variable-to-value mapping (C2) is `cot-frontend`.

pub mod abi;
pub mod context;
pub mod diag;
pub mod ir;
pub mod isa;
pub mod liveness;
pub mod passes;
pub mod print_errors;
pub mod regalloc;
pub mod result;
pub mod settings;
pub mod ssa;
pub mod stack;
pub mod trace;
pub mod types;
pub mod verify;

pub use context::Context;
pub use result::{CodegenError, CodegenResult};
pub use settings::Flags;
