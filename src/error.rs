//! Error kinds for the scanning pipeline (see spec's ERROR HANDLING DESIGN table).
//!
//! Every variant here is fatal by construction: `UnsupportedMnemonic` is
//! intentionally absent, since it is the one recoverable path and is
//! surfaced only through [`crate::isa::aggregate::Report`]'s warning block.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("failed to load definitions from `{path}`: {reason}")]
    Load { path: PathBuf, reason: String },

    #[error("instruction definition `{name}` ({opcode:?}) had an illegitimate duplicate id")]
    DuplicateDefinition { name: String, opcode: String },

    #[error("opcode spec `{spec}` could not be compiled: {reason}")]
    Compile { spec: String, reason: String },

    #[error("binary is not in 64-bit long mode (file format: `{file_format}`)")]
    Mode { file_format: String },

    #[error(
        "no definition, alias, or segment-override rescue resolved mnemonic `{mnemonic}` \
         (bytes: {bytes:?}, decoded: `{decoded}`)"
    )]
    UnknownMnemonic {
        mnemonic: String,
        bytes: Vec<String>,
        decoded: String,
    },

    #[error("no candidate template matched instruction bytes {bytes:?} (mnemonic `{mnemonic}`)")]
    NoMatch { mnemonic: String, bytes: Vec<String> },

    #[error(
        "ambiguous match for mnemonic `{mnemonic}` (bytes: {bytes:?}): candidates disagree on \
         cpuid requirements and no tie-breaker applies"
    )]
    AmbiguousMatch {
        mnemonic: String,
        bytes: Vec<String>,
        candidates: Vec<String>,
    },

    #[error("failed to invoke external disassembler: {0}")]
    Disassembler(String),
}
