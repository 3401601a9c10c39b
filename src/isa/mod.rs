//! Instruction dictionary, encoding compiler, and match engine.
//!
//! Everything needed to go from a CSV instruction dictionary plus a
//! stream of observed `(mnemonic, bytes, decoded_text)` triples to an
//! aggregated, ordered, deduplicated set of required CPUID flags lives
//! in this module tree. The binary crate's `app` module is the only
//! caller of this surface; nothing here touches a terminal or a CLI
//! flag.

pub mod aggregate;
pub mod cpuid;
pub mod definition;
pub mod matcher;
pub mod objdump;
pub mod store;
pub mod strategy;
pub mod template;
pub mod token;

pub use aggregate::{Aggregator, Report};
pub use cpuid::CpuidFlags;
pub use definition::InstructionDefinition;
pub use matcher::MatchEngine;
pub use objdump::{DisassembledInstruction, Disassembler};
pub use store::DefinitionStore;
