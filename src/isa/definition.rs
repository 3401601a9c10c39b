//! One row of the instruction dictionary, and the pseudo-op alias table
//! used to resolve comparison-predicate mnemonics like `cmpeqps`.

use crate::isa::cpuid::CpuidFlags;
use crate::isa::template::{self, EncodingTemplate};
use crate::isa::token;
use once_cell::sync::Lazy;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// 64-bit validity column values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Valid64 {
    Valid,
    Invalid,
    NotEncodable,
    NotPromoted,
    NotImplemented,
    NotSupported,
}

impl Valid64 {
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "V" => Valid64::Valid,
            "I" => Valid64::Invalid,
            "N.E." => Valid64::NotEncodable,
            "N.P." => Valid64::NotPromoted,
            "N.I." => Valid64::NotImplemented,
            "N.S." => Valid64::NotSupported,
            _ => Valid64::Invalid,
        }
    }

    pub fn is_valid(self) -> bool {
        matches!(self, Valid64::Valid)
    }
}

/// 32-bit validity column values. Recorded for completeness even though
/// the match engine never branches on it (only 64-bit mode is in scope).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Valid32 {
    Valid,
    Invalid,
    NotEncodable,
    NotApplicable,
}

impl Valid32 {
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "V" => Valid32::Valid,
            "I" => Valid32::Invalid,
            "N.E." => Valid32::NotEncodable,
            "N.A." => Valid32::NotApplicable,
            _ => Valid32::Invalid,
        }
    }
}

/// Stable content hash of `(opcode_spec, operand_sig)`, used in place of
/// the reference tool's salt-randomized `hash()` (spec's Open Question
/// (a)): `DefaultHasher` uses fixed keys, so this is stable across runs
/// and processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DefinitionId(u64);

impl DefinitionId {
    pub fn compute(opcode_spec: &str, operand_sig: &str) -> Self {
        let mut hasher = DefaultHasher::new();
        opcode_spec.hash(&mut hasher);
        operand_sig.hash(&mut hasher);
        DefinitionId(hasher.finish())
    }
}

pub struct InstructionDefinition {
    pub id: DefinitionId,
    pub name: String,
    pub opcode_spec: String,
    pub operand_sig: String,
    pub valid64: Valid64,
    pub valid32: Valid32,
    pub cpuid_flags: CpuidFlags,
    pub templates: Vec<EncodingTemplate>,
    /// Whether `NP` appeared in the spec (forbids `66`/`F2`/`F3` during
    /// the extra-legacy-prefix match strategy).
    pub no_prefix: bool,
    /// Whether `NFx` appeared in the spec (forbids `F2`/`F3`).
    pub no_mandatory_fx: bool,
}

impl InstructionDefinition {
    pub fn compile(
        name: String,
        opcode_spec: String,
        operand_sig: String,
        valid64: Valid64,
        valid32: Valid32,
        cpuid_flags: CpuidFlags,
    ) -> Result<Self, crate::error::ScanError> {
        let tokens = token::tokenize(&opcode_spec);
        let templates = template::compile(&opcode_spec, &tokens)?;
        let no_prefix = tokens.iter().any(|t| t == "NP");
        let no_mandatory_fx = tokens.iter().any(|t| t == "NFx");
        let id = DefinitionId::compute(&opcode_spec, &operand_sig);
        Ok(InstructionDefinition {
            id,
            name,
            opcode_spec,
            operand_sig,
            valid64,
            valid32,
            cpuid_flags,
            templates,
            no_prefix,
            no_mandatory_fx,
        })
    }

    pub fn has_memory_operand(&self) -> bool {
        MEM_OPERAND.is_match(&self.operand_sig)
    }
}

static MEM_OPERAND: Lazy<regex::Regex> =
    Lazy::new(|| regex::Regex::new(r"m(32|64|128)").expect("valid regex"));

/// Mnemonics whitelisted to collide on `(opcode_spec, operand_sig)` —
/// these are true aliases in the dictionary, not extraction errors.
pub const DUPLICATE_TOLERATED: &[&str] = &["JZ", "LEAVE", "POP", "REP"];

/// Mnemonics excluded from the index at load but tallied if encountered.
pub const UNSUPPORTED_MNEMONICS: &[&str] =
    &["repz", "data16", "data32", "movabs", "endbr64", "endbr66", "movbe"];

/// Redirects a compound comparison/pclmulqdq mnemonic to its canonical
/// form, e.g. `cmpeqps` -> `cmpps`, `vpcmpltub` -> `vpcmpub`.
pub static PSEUDO_OP_TABLE: Lazy<Vec<(Vec<&'static str>, &'static str)>> = Lazy::new(build_pseudo_op_table);

pub fn resolve_pseudo_op(mnemonic: &str) -> Option<&'static str> {
    PSEUDO_OP_TABLE
        .iter()
        .find(|(aliases, _)| aliases.iter().any(|a| *a == mnemonic))
        .map(|(_, canonical)| *canonical)
}

fn build_pseudo_op_table() -> Vec<(Vec<&'static str>, &'static str)> {
    let mut table = vec![
        (
            vec![
                "cmpeqps", "cmpltps", "cmpleps", "cmpunordps", "cmpneqps", "cmpnltps", "cmpnleps",
                "cmpordps",
            ],
            "cmpps",
        ),
        (
            vec![
                "cmpeqss", "cmpltss", "cmpless", "cmpunordss", "cmpneqss", "cmpnltss", "cmpnless",
                "cmpordss",
            ],
            "cmpss",
        ),
        (
            vec![
                "cmpeqpd", "cmpltpd", "cmplepd", "cmpunordpd", "cmpneqpd", "cmpnltpd", "cmpnlepd",
                "cmpordpd",
            ],
            "cmppd",
        ),
        (
            vec![
                "cmpeqsd", "cmpltsd", "cmplesd", "cmpunordsd", "cmpneqsd", "cmpnltsd", "cmpnlesd",
                "cmpordsd",
            ],
            "cmpsd",
        ),
        (
            vec![
                "vcmpeqps", "vcmpltps", "vcmpleps", "vcmpunordps", "vcmpneqps", "vcmpnltps",
                "vcmpnleps", "vcmpordps",
            ],
            "vcmpps",
        ),
        (
            vec![
                "vcmpeqss", "vcmpltss", "vcmpless", "vcmpunordss", "vcmpneqss", "vcmpnltss",
                "vcmpnless", "vcmpordss",
            ],
            "vcmpss",
        ),
        (
            vec![
                "vcmpeqpd", "vcmpltpd", "vcmplepd", "vcmpunordpd", "vcmpneqpd", "vcmpnltpd",
                "vcmpnlepd", "vcmpordpd",
            ],
            "vcmppd",
        ),
        (
            vec![
                "vcmpeqsd", "vcmpltsd", "vcmplesd", "vcmpunordsd", "vcmpneqsd", "vcmpnltsd",
                "vcmpnlesd", "vcmpordsd",
            ],
            "vcmpsd",
        ),
        (
            vec!["vpcmpeq", "vpcmplt", "vpcmple", "vpcmpneq", "vpcmpnlt", "vpcmpnle"],
            "vpcmp",
        ),
        (
            vec!["pclmullqlqdq", "pclmulhqlqdq", "pclmullqhqdq", "pclmulhqhqdq"],
            "pclmulqdq",
        ),
        (
            vec!["vpclmullqlqdq", "vpclmulhqlqdq", "vpclmullqhqdq", "vpclmulhqhqdq"],
            "vpclmulqdq",
        ),
    ];

    // Predicate-embedded AVX-512 integer compares: vpcmp{eq,lt,le,false,neq,nlt,nle,true}{b,d,q,w,ub,ud,uq,uw}
    for ty in ["b", "d", "q", "w", "ub", "ud", "uq", "uw"] {
        let aliases: Vec<&'static str> = ["eq", "lt", "le", "false", "neq", "nlt", "nle", "true"]
            .iter()
            .map(|pred| -> &'static str {
                Box::leak(format!("vpcmp{}{}", pred, ty).into_boxed_str())
            })
            .collect();
        let canonical: &'static str = Box::leak(format!("vpcmp{}", ty).into_boxed_str());
        table.push((aliases, canonical));
    }

    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn definition_id_is_stable_across_calls() {
        let a = DefinitionId::compute("0F 58 /r", "xmm1, xmm2/m128");
        let b = DefinitionId::compute("0F 58 /r", "xmm1, xmm2/m128");
        assert_eq!(a, b);
    }

    #[test]
    fn definition_id_distinguishes_operand_sig() {
        let a = DefinitionId::compute("0F 58 /r", "xmm1, xmm2/m128");
        let b = DefinitionId::compute("0F 58 /r", "xmm1, xmm2");
        assert_ne!(a, b);
    }

    #[test]
    fn pseudo_op_resolves_cmpeqps_to_cmpps() {
        assert_eq!(resolve_pseudo_op("cmpeqps"), Some("cmpps"));
    }

    #[test]
    fn pseudo_op_resolves_generated_avx512_predicate_family() {
        assert_eq!(resolve_pseudo_op("vpcmpequb"), Some("vpcmpub"));
    }

    #[test]
    fn pseudo_op_unknown_mnemonic_is_none() {
        assert_eq!(resolve_pseudo_op("addps"), None);
    }
}
