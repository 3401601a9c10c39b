//! Compiles a tokenized opcode spec into one or more [`EncodingTemplate`]s.
//!
//! This is the core of the crate: the Intel manual's encoding notation
//! (`VEX.256.66.0F38.W0 2C /r`, `REX.W + 03 /r`, ...) compiles to a
//! family of concrete `(value, mask)` byte sequences. A byte `b`
//! matches a pair iff `b & mask == value`; a `mask == 0` pair accepts
//! any byte (used for immediates, displacements, and free ModR/M bytes
//! whose length is fixed but whose value is not).

use crate::error::ScanError;

/// One compiled `(value, mask)` byte predicate.
pub type ValMask = (u8, u8);

/// A compiled encoding alternative: an ordered sequence of byte
/// predicates. Matching is prefix-oriented — a template shorter than
/// the observed byte string matches on a prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodingTemplate(Vec<ValMask>);

impl EncodingTemplate {
    fn new(pairs: Vec<ValMask>) -> Self {
        debug_assert!(
            pairs.iter().all(|&(v, m)| v & !m == 0),
            "template value bits must lie under mask bits"
        );
        EncodingTemplate(pairs)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn pairs(&self) -> &[ValMask] {
        &self.0
    }

    /// Checks whether `bytes` matches this template, prefix-oriented:
    /// only the overlapping `min(len(self), len(bytes))` positions are
    /// compared.
    pub fn matches(&self, bytes: &[u8]) -> bool {
        let n = self.0.len().min(bytes.len());
        if n <= 8 {
            return self.matches_packed(bytes, n);
        }
        self.0[..n]
            .iter()
            .zip(&bytes[..n])
            .all(|(&(value, mask), &b)| b & mask == value)
    }

    /// Batches the first `n` (<= 8) byte comparisons into a single
    /// wide-integer compare, per the crate's hot-path design note.
    fn matches_packed(&self, bytes: &[u8], n: usize) -> bool {
        let mut value_word: u64 = 0;
        let mut mask_word: u64 = 0;
        let mut input_word: u64 = 0;
        for i in 0..n {
            let (value, mask) = self.0[i];
            let shift = (i as u32) * 8;
            value_word |= (value as u64) << shift;
            mask_word |= (mask as u64) << shift;
            input_word |= (bytes[i] as u64) << shift;
        }
        (input_word & mask_word) == value_word
    }
}

const LEGACY_PREFIX_GROUPS: [&[u8]; 4] = [
    &[0xF0, 0xF2, 0xF3],
    &[0x2E, 0x36, 0x3E, 0x26, 0x64, 0x65],
    &[0x66],
    &[0x67],
];

/// Is `byte` one of the canonical legacy-prefix bytes?
pub fn is_legacy_prefix(byte: u8) -> bool {
    LEGACY_PREFIX_GROUPS.iter().any(|group| group.contains(&byte))
}

pub fn legacy_prefix_groups() -> &'static [&'static [u8]] {
    &LEGACY_PREFIX_GROUPS
}

const IMMEDIATE_OPERANDS: [(&str, usize); 4] = [("ib", 1), ("iw", 2), ("id", 4), ("io", 8)];
const CODE_SEGMENT_OFFSETS: [(&str, usize); 6] =
    [("cb", 1), ("cw", 2), ("cd", 4), ("cp", 6), ("co", 8), ("ct", 10)];
const OPCODE_BYTE_MODIFIERS: [&str; 4] = ["+rb", "+rw", "+rd", "+ro"];

/// Compiles a tokenized opcode spec into its family of templates.
///
/// Never returns an empty list on success: a definition's compiled
/// `templates` is never empty (spec's "Output contract").
pub fn compile(spec: &str, tokens: &[String]) -> Result<Vec<EncodingTemplate>, ScanError> {
    let mut templates: Vec<Vec<ValMask>> = vec![Vec::new()];
    let mut mod_rm_seen = false;

    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i].as_str();

        if is_plain_byte(token) {
            let byte = u8::from_str_radix(token, 16).expect("validated hex digits");
            push_all(&mut templates, (byte, 0xFF));
        } else if token.contains("EX") {
            compile_ex_prefix(spec, token, &mut templates)?;
        } else if token == "/is4" || token == "imm8" {
            push_all(&mut templates, (0x00, 0x00));
        } else if token == "NP" || token == "NFx" {
            // Negative prefix constraints carry no bytes; the match
            // engine reads them back off the raw spec string.
        } else if let Some(&(_, size)) = IMMEDIATE_OPERANDS.iter().find(|(tok, _)| token.contains(tok)) {
            for _ in 0..size {
                push_all(&mut templates, (0x00, 0x00));
            }
        } else if OPCODE_BYTE_MODIFIERS.iter().any(|m| token.contains(m)) {
            mutate_last_byte(&mut templates, spec)?;
        } else if let Some(&(_, size)) =
            CODE_SEGMENT_OFFSETS.iter().find(|(tok, _)| token.contains(tok))
        {
            for _ in 0..size {
                push_all(&mut templates, (0x00, 0x00));
            }
        } else if let Some(digit) = modrm_digit(token) {
            push_all(&mut templates, (digit << 3, 0x38));
            mod_rm_seen = true;
        } else if token == "/r" {
            if !mod_rm_seen {
                push_all(&mut templates, (0x00, 0x00));
                mod_rm_seen = true;
            }
        } else if token == "+i" {
            mutate_last_byte(&mut templates, spec)?;
        } else {
            return Err(ScanError::Compile {
                spec: spec.to_string(),
                reason: format!("unrecognized opcode token `{}`", token),
            });
        }

        i += 1;
    }

    Ok(templates.into_iter().map(EncodingTemplate::new).collect())
}

fn is_plain_byte(token: &str) -> bool {
    token.len() == 2 && token.bytes().all(|b| b.is_ascii_digit() || (b'A'..=b'F').contains(&b))
}

fn modrm_digit(token: &str) -> Option<u8> {
    let bytes = token.as_bytes();
    if bytes.len() == 2 && bytes[0] == b'/' && (b'0'..=b'7').contains(&bytes[1]) {
        Some(bytes[1] - b'0')
    } else {
        None
    }
}

fn push_all(templates: &mut [Vec<ValMask>], pair: ValMask) {
    for t in templates.iter_mut() {
        t.push(pair);
    }
}

/// Strips the bottom 3 bits from the value and mask of every template's
/// last byte, embedding a register operand (`+rb`/`+rw`/`+rd`/`+ro`/`+i`).
fn mutate_last_byte(templates: &mut [Vec<ValMask>], spec: &str) -> Result<(), ScanError> {
    const REGISTER_MASK: u8 = 0xF8;
    for t in templates.iter_mut() {
        let last = t.last_mut().ok_or_else(|| ScanError::Compile {
            spec: spec.to_string(),
            reason: "register-in-opcode modifier with no preceding byte".to_string(),
        })?;
        last.0 &= REGISTER_MASK;
        last.1 &= REGISTER_MASK;
    }
    Ok(())
}

fn compile_ex_prefix(
    spec: &str,
    token: &str,
    templates: &mut Vec<Vec<ValMask>>,
) -> Result<(), ScanError> {
    if token.starts_with("REX") {
        let pair = match token {
            "REX" => (0x40, 0xF0),
            "REX.W" | "REX.w" => (0x48, 0xF8),
            "REX.R" => (0x42, 0xF2),
            other => {
                return Err(ScanError::Compile {
                    spec: spec.to_string(),
                    reason: format!("unrecognized REX prefix `{}`", other),
                })
            }
        };
        push_all(templates, pair);
        Ok(())
    } else if token.starts_with("VEX") {
        compile_vex(spec, token, templates)
    } else if token.starts_with("EVEX") {
        compile_evex(spec, token, templates)
    } else {
        Err(ScanError::Compile {
            spec: spec.to_string(),
            reason: format!("unrecognized `EX`-bearing token `{}`", token),
        })
    }
}

fn compile_vex(spec: &str, token: &str, templates: &mut Vec<Vec<ValMask>>) -> Result<(), ScanError> {
    if templates.len() != 1 {
        return Err(ScanError::Compile {
            spec: spec.to_string(),
            reason: "VEX prefix encountered after templates already diverged".to_string(),
        });
    }
    let parts: Vec<&str> = token.split('.').skip(1).collect();
    let l_fragment = parts.first().copied().ok_or_else(|| ScanError::Compile {
        spec: spec.to_string(),
        reason: "VEX prefix missing `L` fragment".to_string(),
    })?;

    let (l, l_mask) = match l_fragment {
        "128" | "L0" | "LZ" => (0u8, 1u8),
        "256" | "L1" => (1, 1),
        "LIG" => (0, 0),
        other => {
            return Err(ScanError::Compile {
                spec: spec.to_string(),
                reason: format!("unrecognized VEX.L fragment `{}`", other),
            })
        }
    };

    let (pp, pp_mask) = resolve_pp(&parts);
    let (mm, mm_mask, mm_forces_3byte) = resolve_vex_mm(&parts);
    let (w, w_mask, w_forces_3byte) = resolve_w(&parts);
    let three_byte_only = mm_forces_3byte || w_forces_3byte;

    if three_byte_only {
        let base = templates.remove(0);
        let mut three = base;
        three.push((0xC4, 0xFF));
        three.push((mm, mm_mask));
        three.push((
            (w << 7) | (l << 2) | pp,
            (w_mask << 7) | (l_mask << 2) | pp_mask,
        ));
        templates.push(three);
    } else {
        let base = templates[0].clone();
        templates[0].push((0xC5, 0xFF));
        templates[0].push(((l << 2) | pp, (l_mask << 2) | pp_mask));

        let mut three = base;
        three.push((0xC4, 0xFF));
        three.push((mm, mm_mask));
        three.push((
            (w << 7) | (l << 2) | pp,
            (w_mask << 7) | (l_mask << 2) | pp_mask,
        ));
        templates.push(three);
    }

    Ok(())
}

fn compile_evex(spec: &str, token: &str, templates: &mut Vec<Vec<ValMask>>) -> Result<(), ScanError> {
    if templates.len() != 1 {
        return Err(ScanError::Compile {
            spec: spec.to_string(),
            reason: "EVEX prefix encountered after templates already diverged".to_string(),
        });
    }
    let parts: Vec<&str> = token.split('.').skip(1).collect();
    let ll_fragment = parts.first().copied().ok_or_else(|| ScanError::Compile {
        spec: spec.to_string(),
        reason: "EVEX prefix missing `LL` fragment".to_string(),
    })?;

    let (ll, ll_mask) = match ll_fragment {
        "128" => (0u8, 3u8),
        "256" => (1, 3),
        "512" => (2, 3),
        "LIG" => (0, 0),
        other => {
            return Err(ScanError::Compile {
                spec: spec.to_string(),
                reason: format!("unrecognized EVEX.LL fragment `{}`", other),
            })
        }
    };

    let (pp, pp_mask) = resolve_pp(&parts);
    let mm = if parts.iter().any(|p| *p == "0F") {
        1u8
    } else if parts.iter().any(|p| *p == "0F38") {
        2
    } else if parts.iter().any(|p| *p == "0F3A") {
        3
    } else {
        return Err(ScanError::Compile {
            spec: spec.to_string(),
            reason: "EVEX prefix missing a `0F`/`0F38`/`0F3A` escape map fragment".to_string(),
        });
    };
    let (w, w_mask, _) = resolve_w(&parts);

    templates[0].push((0x62, 0xFF));
    templates[0].push((mm, 0x03));
    templates[0].push(((w << 7) | pp, (w_mask << 7) | pp_mask));
    templates[0].push((ll << 5, ll_mask << 5));

    Ok(())
}

fn resolve_pp(parts: &[&str]) -> (u8, u8) {
    if parts.iter().any(|p| *p == "66") {
        (0b01, 0b11)
    } else if parts.iter().any(|p| *p == "F3") {
        (0b10, 0b11)
    } else if parts.iter().any(|p| *p == "F2") {
        (0b11, 0b11)
    } else {
        (0, 0)
    }
}

/// Returns `(value, mask, forces_three_byte)` for the VEX `mmmmm` field.
fn resolve_vex_mm(parts: &[&str]) -> (u8, u8, bool) {
    if parts.iter().any(|p| *p == "0F") {
        (0b00001, 0x1F, false)
    } else if parts.iter().any(|p| *p == "0F38") {
        (0b00010, 0x1F, true)
    } else if parts.iter().any(|p| *p == "0F3A") {
        (0b00011, 0x1F, true)
    } else {
        (0, 0, false)
    }
}

/// Returns `(value, mask, forces_three_byte)` for the `W` field, shared
/// between VEX and EVEX (EVEX never actually forces a 3-byte form since
/// it has no 2-/3-byte alternation; the caller ignores that flag there).
fn resolve_w(parts: &[&str]) -> (u8, u8, bool) {
    if parts.iter().any(|p| *p == "W0") {
        (0, 1, false)
    } else if parts.iter().any(|p| *p == "W1") {
        (1, 1, true)
    } else if parts.iter().any(|p| *p == "WIG") {
        (0, 0, false)
    } else {
        (0, 1, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::token;

    fn compile_spec(spec: &str) -> Vec<EncodingTemplate> {
        let tokens = token::tokenize(spec);
        compile(spec, &tokens).unwrap()
    }

    // S1: `0F 58 /r`
    #[test]
    fn single_literal_spec_compiles_to_one_template() {
        let templates = compile_spec("0F 58 /r");
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].pairs(), &[(0x0F, 0xFF), (0x58, 0xFF), (0x00, 0x00)]);

        assert!(templates[0].matches(&[0x0F, 0x58, 0xC1]));
        assert!(!templates[0].matches(&[0x0F, 0x59, 0xC1]));
    }

    // S2: `REX.W + 03 /r`
    #[test]
    fn rex_w_spec_matches_with_zero_prefix_cost() {
        let templates = compile_spec("REX.W + 03 /r");
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].pairs()[0], (0x48, 0xF8));
        assert!(templates[0].matches(&[0x48, 0x03, 0xD8]));
    }

    // S4: `VEX.128.66.0F.WIG 58 /r`
    #[test]
    fn vex_without_forcing_fragments_yields_two_templates() {
        let templates = compile_spec("VEX.128.66.0F.WIG 58 /r");
        assert_eq!(templates.len(), 2);
        assert!(templates.iter().any(|t| t.matches(&[0xC5, 0xF9, 0x58, 0xC1])));
        assert!(templates
            .iter()
            .any(|t| t.matches(&[0xC4, 0xE1, 0x79, 0x58, 0xC1])));
    }

    #[test]
    fn vex_forced_three_byte_yields_single_template() {
        let templates = compile_spec("VEX.256.66.0F38.W0 2C /r");
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].pairs()[0], (0xC4, 0xFF));
    }

    // S5: `EVEX.512.66.0F.W1 58 /r`
    #[test]
    fn evex_spec_always_starts_with_0x62() {
        let templates = compile_spec("EVEX.512.66.0F.W1 58 /r");
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].pairs()[0], (0x62, 0xFF));
        assert!(templates[0].matches(&[0x62, 0xF1, 0xFD, 0x48, 0x58, 0xC1]));
        assert!(!templates[0].matches(&[0xC5, 0xF1, 0xFD, 0x48, 0x58, 0xC1]));
        assert!(!templates[0].matches(&[0xC4, 0xF1, 0xFD, 0x48, 0x58, 0xC1]));
    }

    #[test]
    fn prefix_oriented_matching_ignores_trailing_bytes() {
        let templates = compile_spec("0F 58 /r");
        assert!(templates[0].matches(&[0x0F, 0x58, 0xC1, 0xFF, 0xFF]));
    }

    #[test]
    fn every_value_bit_lies_under_its_mask() {
        for spec in [
            "0F 58 /r",
            "REX.W + 03 /r",
            "VEX.128.66.0F.WIG 58 /r",
            "EVEX.512.66.0F.W1 58 /r",
            "B8 +rd id",
            "04 ib",
        ] {
            for t in compile_spec(spec) {
                for &(value, mask) in t.pairs() {
                    assert_eq!(value & !mask, 0, "spec {} template {:?}", spec, t);
                }
            }
        }
    }

    #[test]
    fn register_in_opcode_embeds_into_preceding_byte() {
        let templates = compile_spec("B8 +rd id");
        assert_eq!(templates.len(), 1);
        // B8 with the bottom 3 bits free for the embedded register.
        assert_eq!(templates[0].pairs()[0], (0xB8 & 0xF8, 0xF8));
    }

    #[test]
    fn unknown_token_is_a_compile_error() {
        let tokens = token::tokenize("0F ???");
        assert!(compile("0F ???", &tokens).is_err());
    }
}
