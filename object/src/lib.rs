//! The Mach-O object writer (C9): turns `cot-codegen`'s per-function
//! machine code and relocations into one `aarch64-apple-darwin` object
//! file. See the crate README for how this relates to `cranelift-object`.

mod module;
mod result;

pub use module::ObjectModule;
pub use result::{ObjectError, ObjectResult};
