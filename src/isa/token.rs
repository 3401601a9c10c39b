//! Normalizes a raw Intel-manual opcode spec string and splits it into
//! tokens for [`crate::isa::template`] to compile.
//!
//! The rewrite rules below are applied once, in the fixed order given
//! in spec.md §6 ("Opcode normalization rules"). The list is ported
//! directly from the dictionary-extraction tooling's own cleanup pass
//! over the raw manual text, which is why some rules look narrowly
//! targeted at specific quirks (`0F38.0` → `0F38.W0`, `38 30.WIG` →
//! `38.WIG 30`) rather than general grammar fixes: they correct specific
//! OCR/table-extraction artifacts rather than expressing anything about
//! the encoding grammar itself.

use once_cell::sync::Lazy;
use regex::Regex;

struct Rule {
    pattern: Regex,
    replacement: &'static str,
}

fn rule(pattern: &str, replacement: &'static str) -> Rule {
    Rule {
        pattern: Regex::new(pattern).expect("normalization rule must compile"),
        replacement,
    }
}

static RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    vec![
        rule(r"([0-9A-F][0-9A-F])(\+[rw]*)", "$1 $2"),
        rule(r"([0-9A-F][0-9A-F])(/[0-7])", "$1 $2"),
        rule(r"([0-9A-F][0-9A-F])(/r)", "$1 $2"),
        rule(r"([0-9A-F][0-9A-F])/ ", "$1 /"),
        rule(r"LLIG", "LIG"),
        rule(r"0F38\.0 ", "0F38.W0 "),
        rule(r"38 30\.WIG ", "38.WIG 30 "),
        rule(r"0F 38\.WIG ", "0F38.WIG "),
        rule(r"(,|\*)", ""),
        rule(r"660F", "66.0F"),
        rule(r" 0F3A ", " 0F 3A "),
        rule(r" 0F38 ", " 0F 38 "),
        rule(r"0f", "0F"),
        rule(r" / ([0-7])( |$)", " /$1$2"),
        rule(r"([0-9A-Z\.]*\.) ([0-9A-Z\.])", "$1$2"),
        rule(r"([0-9A-Z\.]*[0-9A-Z]) (\.[0-9A-Z\.]*)", "$1$2"),
        rule(r"/ r", "/r"),
        rule(r"/ ib", "/ib"),
        rule(r"/$", "/r"),
        rule(r" ib$", " /ib"),
        rule(r"\+ (rb|rw|rd|io|id|iw|cb|cw|cd)", "+$1"),
        rule(r" \+ ", " "),
    ]
});

/// Applies the ordered rewrite rules once and splits the result into
/// whitespace-separated tokens.
pub fn tokenize(raw_opcode_spec: &str) -> Vec<String> {
    let mut normalized = raw_opcode_spec.trim().to_string();
    for r in RULES.iter() {
        normalized = r
            .pattern
            .replace_all(&normalized, r.replacement)
            .into_owned();
    }
    normalized
        .split_whitespace()
        .map(|s| s.to_string())
        .collect()
}
