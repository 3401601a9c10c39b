//! Resolves an observed instruction to a dictionary definition and
//! reports its CPUID requirements, or a tallied failure.

use crate::error::ScanError;
use crate::isa::cpuid::CpuidFlags;
use crate::isa::definition::{resolve_pseudo_op, InstructionDefinition};
use crate::isa::store::DefinitionStore;
use crate::isa::strategy;
use once_cell::sync::Lazy;
use regex::Regex;

/// One disassembled instruction, ready to resolve.
pub struct Observation<'a> {
    pub mnemonic: &'a str,
    pub bytes: &'a [u8],
    pub decoded_text: &'a str,
}

/// The outcome of resolving a single observation: either a winning
/// definition's CPUID requirements, or a description of why none could
/// be chosen. Callers decide whether a resolution failure is fatal.
pub enum Resolution {
    Matched(CpuidFlags),
    /// No surviving candidate carried any CPUID flag; nothing to add.
    Trivial,
    /// Observed mnemonic is on the unsupported blacklist; recoverable,
    /// tallied by the caller rather than attempted against templates.
    Unsupported,
}

pub struct MatchEngine<'a> {
    store: &'a DefinitionStore,
    careful: bool,
}

impl<'a> MatchEngine<'a> {
    pub fn new(store: &'a DefinitionStore, careful: bool) -> Self {
        MatchEngine { store, careful }
    }

    pub fn resolve(&self, observation: &Observation<'_>) -> Result<Resolution, ScanError> {
        let lower = observation.mnemonic.to_lowercase();
        if self.store.is_blacklisted(&lower) {
            return Ok(Resolution::Unsupported);
        }
        let indices = self.resolve_mnemonic(&lower, observation)?;

        let valid_indices: Vec<usize> = indices
            .iter()
            .copied()
            .filter(|&i| self.store.get(i).valid64.is_valid())
            .collect();

        if valid_indices.is_empty() {
            return Err(ScanError::NoMatch {
                mnemonic: observation.mnemonic.to_string(),
                bytes: hex_bytes(observation.bytes),
            });
        }

        if !self.careful && !valid_indices.iter().any(|&i| !self.store.get(i).cpuid_flags.is_empty()) {
            return Ok(Resolution::Trivial);
        }

        let mut survivors: Vec<(usize, usize)> = Vec::new();
        for &i in &valid_indices {
            let def = self.store.get(i);
            if let Some(m) = strategy::best_match(&def.templates, observation.bytes, def.no_prefix, def.no_mandatory_fx) {
                survivors.push((i, m.prefix_cost));
            }
        }

        if survivors.is_empty() {
            return Err(ScanError::NoMatch {
                mnemonic: observation.mnemonic.to_string(),
                bytes: hex_bytes(observation.bytes),
            });
        }

        let min_cost = survivors.iter().map(|&(_, c)| c).min().unwrap();
        let cheapest: Vec<usize> = survivors
            .iter()
            .filter(|&&(_, c)| c == min_cost)
            .map(|&(i, _)| i)
            .collect();

        let winner = self.break_tie(&cheapest, observation)?;
        Ok(Resolution::Matched(self.store.get(winner).cpuid_flags.clone()))
    }

    fn resolve_mnemonic(&self, lower: &str, observation: &Observation<'_>) -> Result<Vec<usize>, ScanError> {
        if let Some(indices) = self.store.candidates(lower) {
            return Ok(indices.to_vec());
        }

        if let Some(canonical) = resolve_pseudo_op(lower) {
            if let Some(indices) = self.store.candidates(canonical) {
                return Ok(indices.to_vec());
            }
        }

        if lower == "cs" || lower == "ds" {
            if let Some(second) = observation.decoded_text.split_whitespace().nth(1) {
                let rescued = second.to_lowercase();
                if let Some(indices) = self.store.candidates(&rescued) {
                    return Ok(indices.to_vec());
                }
            }
        }

        Err(ScanError::UnknownMnemonic {
            mnemonic: observation.mnemonic.to_string(),
            bytes: hex_bytes(observation.bytes),
            decoded: observation.decoded_text.to_string(),
        })
    }

    /// Among equal-cost survivors, require CPUID agreement or resolve
    /// via the memory/register operand tie-breaker; otherwise the match
    /// is genuinely ambiguous.
    fn break_tie(&self, cheapest: &[usize], observation: &Observation<'_>) -> Result<usize, ScanError> {
        if cheapest.len() == 1 {
            return Ok(cheapest[0]);
        }

        let first_flags = &self.store.get(cheapest[0]).cpuid_flags;
        if cheapest.iter().all(|&i| &self.store.get(i).cpuid_flags == first_flags) {
            return Ok(cheapest[0]);
        }

        if cheapest.len() == 2 {
            let a = self.store.get(cheapest[0]);
            let b = self.store.get(cheapest[1]);
            if a.has_memory_operand() != b.has_memory_operand() {
                let decoded_has_ptr = PTR_TOKEN.is_match(observation.decoded_text);
                let mem_index = if a.has_memory_operand() { cheapest[0] } else { cheapest[1] };
                let reg_index = if a.has_memory_operand() { cheapest[1] } else { cheapest[0] };
                return Ok(if decoded_has_ptr { mem_index } else { reg_index });
            }
        }

        Err(ScanError::AmbiguousMatch {
            mnemonic: observation.mnemonic.to_string(),
            bytes: hex_bytes(observation.bytes),
            candidates: cheapest.iter().map(|&i| self.store.get(i).opcode_spec.clone()).collect(),
        })
    }
}

static PTR_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bPTR\b").expect("valid regex"));

fn hex_bytes(bytes: &[u8]) -> Vec<String> {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::cpuid::CpuidFlags;
    use crate::isa::definition::{InstructionDefinition, Valid32, Valid64};
    use std::io::Write;

    fn store_with(rows: &[&str]) -> DefinitionStore {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "name,opcode,instruction,valid64,valid32,cpuid").unwrap();
        for row in rows {
            writeln!(file, "{}", row).unwrap();
        }
        DefinitionStore::load(file.path()).unwrap()
    }

    #[test]
    fn plain_match_returns_cpuid_flags() {
        let store = store_with(&["ADDPS,0F 58 /r,\"xmm1, xmm2/m128\",V,V,SSE"]);
        let engine = MatchEngine::new(&store, true);
        let obs = Observation {
            mnemonic: "addps",
            bytes: &[0x0F, 0x58, 0xC1],
            decoded_text: "addps  %xmm1,%xmm0",
        };
        match engine.resolve(&obs).unwrap() {
            Resolution::Matched(flags) => assert_eq!(flags, CpuidFlags::from_pipe_separated("SSE")),
            _ => panic!("expected a match"),
        }
    }

    #[test]
    fn unknown_mnemonic_with_no_alias_errors() {
        let store = store_with(&["ADDPS,0F 58 /r,\"xmm1, xmm2/m128\",V,V,SSE"]);
        let engine = MatchEngine::new(&store, true);
        let obs = Observation {
            mnemonic: "bogus",
            bytes: &[0x00],
            decoded_text: "bogus",
        };
        assert!(matches!(engine.resolve(&obs), Err(ScanError::UnknownMnemonic { .. })));
    }

    #[test]
    fn pseudo_op_alias_resolves_to_canonical_definition() {
        let store = store_with(&["CMPPS,0F C2 /r ib,\"xmm1, xmm2/m128, imm8\",V,V,SSE"]);
        let engine = MatchEngine::new(&store, true);
        let obs = Observation {
            mnemonic: "cmpeqps",
            bytes: &[0x0F, 0xC2, 0xC1, 0x00],
            decoded_text: "cmpeqps %xmm1,%xmm0",
        };
        assert!(matches!(engine.resolve(&obs).unwrap(), Resolution::Matched(_)));
    }

    #[test]
    fn non_careful_mode_reports_trivial_for_flagless_candidates() {
        let store = store_with(&["NOP,90,none,V,V,"]);
        let engine = MatchEngine::new(&store, false);
        let obs = Observation {
            mnemonic: "nop",
            bytes: &[0x90],
            decoded_text: "nop",
        };
        assert!(matches!(engine.resolve(&obs).unwrap(), Resolution::Trivial));
    }

    #[test]
    fn segment_override_rescue_reresolves_via_decoded_text() {
        let store = store_with(&["LSS,0F B2 /r,\"r32, m16:32\",V,V,"]);
        let engine = MatchEngine::new(&store, true);
        let obs = Observation {
            mnemonic: "cs",
            bytes: &[0x2E, 0x0F, 0xB2, 0xC1],
            decoded_text: "cs lss 0x0(%rax),%eax",
        };
        assert!(engine.resolve(&obs).is_ok());
    }

    #[test]
    fn blacklisted_mnemonic_resolves_as_unsupported_before_any_lookup() {
        let store = store_with(&["ADDPS,0F 58 /r,\"xmm1, xmm2/m128\",V,V,SSE"]);
        let engine = MatchEngine::new(&store, true);
        let obs = Observation {
            mnemonic: "movbe",
            bytes: &[0x0F, 0x38, 0xF0, 0xC1],
            decoded_text: "movbe  %eax,%ecx",
        };
        assert!(matches!(engine.resolve(&obs).unwrap(), Resolution::Unsupported));
    }
}
