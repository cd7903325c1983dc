//! Target-specific instruction selection (spec §1: ARM64 macOS only).

pub mod arm64;
