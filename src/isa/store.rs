//! Loads the instruction dictionary CSV into an immutable, indexed
//! [`DefinitionStore`].

use crate::error::ScanError;
use crate::isa::cpuid::CpuidFlags;
use crate::isa::definition::{
    DefinitionId, InstructionDefinition, Valid32, Valid64, DUPLICATE_TOLERATED, UNSUPPORTED_MNEMONICS,
};
use std::collections::HashMap;
use std::path::Path;

/// The dictionary, loaded once and never mutated again. Lookups go
/// through the lowercased-mnemonic index; nothing outside `load`
/// touches the CSV reader.
pub struct DefinitionStore {
    definitions: Vec<InstructionDefinition>,
    by_mnemonic: HashMap<String, Vec<usize>>,
}

impl DefinitionStore {
    pub fn load(path: &Path) -> Result<Self, ScanError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(path)
            .map_err(|e| ScanError::Load {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let mut definitions = Vec::new();
        let mut by_mnemonic: HashMap<String, Vec<usize>> = HashMap::new();
        let mut seen_ids: HashMap<DefinitionId, String> = HashMap::new();

        for result in reader.records() {
            let record = result.map_err(|e| ScanError::Load {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

            let field = |idx: usize| -> Result<&str, ScanError> {
                record.get(idx).ok_or_else(|| ScanError::Load {
                    path: path.to_path_buf(),
                    reason: format!("row {} is missing column {}", record.position().map(|p| p.line()).unwrap_or(0), idx),
                })
            };

            let name = field(0)?.trim().to_string();
            let opcode_spec = field(1)?.trim().to_string();
            let operand_sig = field(2)?.trim().to_string();
            let valid64 = Valid64::parse(field(3)?);
            let valid32 = Valid32::parse(field(4)?);
            let cpuid_flags = CpuidFlags::from_pipe_separated(field(5)?.trim());

            let lower = name.to_lowercase();
            if UNSUPPORTED_MNEMONICS.contains(&lower.as_str()) {
                continue;
            }

            let definition =
                InstructionDefinition::compile(name.clone(), opcode_spec.clone(), operand_sig, valid64, valid32, cpuid_flags)?;

            if let Some(prior_name) = seen_ids.get(&definition.id) {
                if !DUPLICATE_TOLERATED.contains(&name.as_str()) {
                    return Err(ScanError::DuplicateDefinition {
                        name: format!("{} (collides with `{}`)", name, prior_name),
                        opcode: opcode_spec,
                    });
                }
            } else {
                seen_ids.insert(definition.id, name.clone());
            }

            let index = definitions.len();
            by_mnemonic.entry(lower).or_default().push(index);
            definitions.push(definition);
        }

        Ok(DefinitionStore {
            definitions,
            by_mnemonic,
        })
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Candidate definitions for a lowercased mnemonic, in CSV order.
    pub fn candidates(&self, lower_mnemonic: &str) -> Option<&[usize]> {
        self.by_mnemonic.get(lower_mnemonic).map(|v| v.as_slice())
    }

    pub fn get(&self, index: usize) -> &InstructionDefinition {
        &self.definitions[index]
    }

    pub fn is_blacklisted(&self, lower_mnemonic: &str) -> bool {
        UNSUPPORTED_MNEMONICS.contains(&lower_mnemonic)
    }
}
