//! ARM64 instruction selection and encoding (C8).

pub mod emit;
pub mod registers;

pub use emit::{encode_function, EncodedFunction, Reloc, RelocKind};
