//! The four ordered byte-matching strategies.
//!
//! Real-world disassembler output sometimes carries prefixes the
//! dictionary's plain template doesn't literally spell out (a REX byte
//! the encoder emitted even though it wasn't load-bearing, a redundant
//! legacy prefix). Each strategy tries a different way of reconciling
//! observed bytes with a compiled template and reports its prefix
//! cost — the number of extra bytes it had to explain away. Strategies
//! are tried in order; the match engine keeps the first one that
//! succeeds for each candidate.

use crate::isa::template::{self, EncodingTemplate};

/// Which strategy produced a match, and at what prefix cost (bytes
/// inserted/assumed before the template could apply). Lower cost wins
/// ties between candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct StrategyMatch {
    pub prefix_cost: usize,
    pub strategy: Strategy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Strategy {
    Plain,
    ExtraRex,
    ExtraLegacyPrefix,
    InsertedRex,
}

/// Tries every template under every strategy (in strategy order) and
/// returns the cheapest successful match, if any.
pub fn best_match(
    templates: &[EncodingTemplate],
    bytes: &[u8],
    no_prefix: bool,
    no_mandatory_fx: bool,
) -> Option<StrategyMatch> {
    let mut best: Option<StrategyMatch> = None;
    for template in templates {
        if let Some(m) = match_template(template, bytes, no_prefix, no_mandatory_fx) {
            best = Some(match best {
                Some(b) if b.prefix_cost <= m.prefix_cost => b,
                _ => m,
            });
        }
    }
    best
}

fn match_template(
    template: &EncodingTemplate,
    bytes: &[u8],
    no_prefix: bool,
    no_mandatory_fx: bool,
) -> Option<StrategyMatch> {
    if template.matches(bytes) {
        return Some(StrategyMatch {
            prefix_cost: 0,
            strategy: Strategy::Plain,
        });
    }

    if let Some(rest) = strip_one_rex(bytes) {
        if template.matches(rest) {
            return Some(StrategyMatch {
                prefix_cost: 1,
                strategy: Strategy::ExtraRex,
            });
        }
    }

    if let Some((rest, cost)) = strip_legacy_prefixes(bytes, no_prefix, no_mandatory_fx) {
        if cost > 0 && template.matches(rest) {
            return Some(StrategyMatch {
                prefix_cost: cost,
                strategy: Strategy::ExtraLegacyPrefix,
            });
        }
    }

    if let Some(with_rex) = insert_rex(template, bytes) {
        if template.matches(&with_rex) {
            return Some(StrategyMatch {
                prefix_cost: 1,
                strategy: Strategy::InsertedRex,
            });
        }
    }

    None
}

/// If the observed bytes start with a REX byte the template doesn't
/// need, try matching what comes after it.
fn strip_one_rex(bytes: &[u8]) -> Option<&[u8]> {
    match bytes.first() {
        Some(&b) if (0x40..=0x4F).contains(&b) => Some(&bytes[1..]),
        _ => None,
    }
}

/// Strips a maximal run of legacy prefix bytes (one from each of the
/// four groups, in any order objdump happened to emit them) from the
/// front of `bytes`, honoring `NP`/`NFx` constraints on which groups
/// are eligible. `NP` forbids consuming `66`/`F2`/`F3` only — segment
/// override and address-size prefixes remain eligible.
fn strip_legacy_prefixes(bytes: &[u8], no_prefix: bool, no_mandatory_fx: bool) -> Option<(&[u8], usize)> {
    let groups = template::legacy_prefix_groups();
    let mut cursor = 0;
    while cursor < bytes.len() {
        let b = bytes[cursor];
        if (no_prefix || no_mandatory_fx) && (b == 0xF2 || b == 0xF3) {
            break;
        }
        if no_prefix && b == 0x66 {
            break;
        }
        let eligible = groups.iter().any(|group| group.contains(&b));
        if !eligible || !template::is_legacy_prefix(b) {
            break;
        }
        cursor += 1;
    }
    if cursor == 0 {
        None
    } else {
        Some((&bytes[cursor..], cursor))
    }
}

/// Inserts the REX byte a REX-leading template demands before the
/// observed bytes and tries matching — covers the case where the
/// dictionary spec assumes a REX prefix the disassembler elided because
/// it carried no operand-affecting bits (a plain `0x40`, dropped since
/// it's a no-op on the decode).
fn insert_rex(template: &EncodingTemplate, bytes: &[u8]) -> Option<Vec<u8>> {
    let &(value, mask) = template.pairs().first()?;
    if mask & 0xF0 != 0xF0 || value & 0xF0 != 0x40 {
        return None;
    }
    let mut with_rex = Vec::with_capacity(bytes.len() + 1);
    with_rex.push(value);
    with_rex.extend_from_slice(bytes);
    Some(with_rex)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::token;

    fn compile_one(spec: &str) -> EncodingTemplate {
        let tokens = token::tokenize(spec);
        template::compile(spec, &tokens).unwrap().remove(0)
    }

    #[test]
    fn plain_strategy_wins_when_bytes_match_directly() {
        let t = compile_one("0F 58 /r");
        let m = best_match(&[t], &[0x0F, 0x58, 0xC1], false, false).unwrap();
        assert_eq!(m.prefix_cost, 0);
        assert_eq!(m.strategy, Strategy::Plain);
    }

    #[test]
    fn extra_rex_strategy_strips_unneeded_rex_byte() {
        let t = compile_one("0F 58 /r");
        let m = best_match(&[t], &[0x41, 0x0F, 0x58, 0xC1], false, false).unwrap();
        assert_eq!(m.prefix_cost, 1);
        assert_eq!(m.strategy, Strategy::ExtraRex);
    }

    #[test]
    fn extra_legacy_prefix_strategy_strips_operand_size_override() {
        let t = compile_one("0F 58 /r");
        let m = best_match(&[t], &[0x66, 0x0F, 0x58, 0xC1], false, false).unwrap();
        assert_eq!(m.prefix_cost, 1);
        assert_eq!(m.strategy, Strategy::ExtraLegacyPrefix);
    }

    #[test]
    fn no_prefix_flag_blocks_legacy_prefix_strategy() {
        let t = compile_one("0F 58 /r");
        assert!(best_match(&[t], &[0x66, 0x0F, 0x58, 0xC1], true, false).is_none());
    }

    #[test]
    fn no_prefix_flag_still_allows_segment_override_and_address_size_prefixes() {
        let t = compile_one("0F 58 /r");
        let m = best_match(&[t.clone()], &[0x2E, 0x0F, 0x58, 0xC1], true, false).unwrap();
        assert_eq!(m.strategy, Strategy::ExtraLegacyPrefix);
        let m2 = best_match(&[t], &[0x67, 0x0F, 0x58, 0xC1], true, false).unwrap();
        assert_eq!(m2.strategy, Strategy::ExtraLegacyPrefix);
    }

    #[test]
    fn inserted_rex_strategy_matches_rex_w_templates_missing_their_byte() {
        let t = compile_one("REX.W + 03 /r");
        let m = best_match(&[t], &[0x03, 0xD8], false, false).unwrap();
        assert_eq!(m.strategy, Strategy::InsertedRex);
    }

    #[test]
    fn no_strategy_matches_unrelated_bytes() {
        let t = compile_one("0F 58 /r");
        assert!(best_match(&[t], &[0x90], false, false).is_none());
    }
}
