//! Core library for determining which x86-64 CPUID feature extensions a
//! binary requires.
//!
//! The heavy lifting lives in [`isa`]: compiling Intel-manual opcode
//! notation into byte-level templates, matching observed instruction
//! bytes against those templates, and aggregating the union of CPUID
//! requirements. Everything outside of `isa` is external collaborator
//! surface (CLI, logging) and lives in the `cpuid-reqs` binary crate.

pub mod error;
pub mod isa;
pub mod util;

pub use error::ScanError;
