//! End-to-end exercise of the dictionary loader and match engine over a
//! small fixture dictionary and a handful of hand-built observations.
//! Does not invoke `objdump`; that boundary is exercised only inside
//! `isa::objdump`'s own unit tests.

use isa_reqs::isa::matcher::{MatchEngine, Observation, Resolution};
use isa_reqs::isa::{Aggregator, CpuidFlags, DefinitionStore};
use std::io::Write;

fn fixture_store(rows: &[&str]) -> (tempfile::NamedTempFile, DefinitionStore) {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "name,opcode,instruction,valid64,valid32,cpuid").unwrap();
    for row in rows {
        writeln!(file, "{}", row).unwrap();
    }
    let store = DefinitionStore::load(file.path()).unwrap();
    (file, store)
}

#[test]
fn aggregates_distinct_flag_sequences_across_a_scan() {
    let (_file, store) = fixture_store(&[
        "ADDPS,0F 58 /r,\"xmm1, xmm2/m128\",V,V,SSE",
        "VADDPD,VEX.128.66.0F.WIG 58 /r,\"xmm1, xmm2, xmm3/m128\",V,V,AVX",
        "NOP,90,none,V,V,",
    ]);

    let observations: Vec<(&str, Vec<u8>, &str)> = vec![
        ("addps", vec![0x0F, 0x58, 0xC1], "addps  %xmm1,%xmm0"),
        ("vaddpd", vec![0xC5, 0xF9, 0x58, 0xC1], "vaddpd %xmm1,%xmm0,%xmm0"),
        ("addps", vec![0x0F, 0x58, 0xC2], "addps  %xmm2,%xmm0"),
        ("nop", vec![0x90], "nop"),
    ];

    let engine = MatchEngine::new(&store, false);
    let mut aggregator = Aggregator::new(false);

    for (mnemonic, bytes, decoded_text) in &observations {
        let observation = Observation {
            mnemonic,
            bytes,
            decoded_text,
        };
        match engine.resolve(&observation).unwrap() {
            Resolution::Matched(flags) => aggregator.record(flags),
            Resolution::Trivial => {}
            Resolution::Unsupported => aggregator.record_unsupported(mnemonic),
        }
    }

    let report = aggregator.into_report();
    assert!(!report.is_trivial());

    // Render it to a buffer to confirm printing doesn't panic and
    // mentions both extensions without duplicating SSE (seen twice).
    let mut buf = termcolor::Buffer::no_color();
    report.print(&mut buf, "fixture.bin").unwrap();
    let rendered = String::from_utf8(buf.into_inner()).unwrap();
    assert_eq!(rendered.matches("[SSE]").count(), 1);
    assert!(rendered.contains("[AVX]"));
}

#[test]
fn unresolvable_mnemonic_is_fatal_not_tallied() {
    let (_file, store) = fixture_store(&["ADDPS,0F 58 /r,\"xmm1, xmm2/m128\",V,V,SSE"]);
    let engine = MatchEngine::new(&store, false);

    let observation = Observation {
        mnemonic: "vfmadd213ps",
        bytes: &[0x62, 0x00],
        decoded_text: "vfmadd213ps %zmm1,%zmm2,%zmm0",
    };

    match engine.resolve(&observation) {
        Ok(_) => panic!("expected an unknown-mnemonic error"),
        Err(err) => assert!(err.to_string().contains("vfmadd213ps")),
    }
}

#[test]
fn blacklisted_mnemonic_is_tallied_as_unsupported_not_fatal() {
    let (_file, store) = fixture_store(&["ADDPS,0F 58 /r,\"xmm1, xmm2/m128\",V,V,SSE"]);
    let engine = MatchEngine::new(&store, false);
    let mut aggregator = Aggregator::new(false);

    let observation = Observation {
        mnemonic: "movbe",
        bytes: &[0x0F, 0x38, 0xF0, 0xC1],
        decoded_text: "movbe  %eax,%ecx",
    };

    match engine.resolve(&observation).unwrap() {
        Resolution::Unsupported => aggregator.record_unsupported("movbe"),
        _ => panic!("expected an unsupported resolution"),
    }

    let report = aggregator.into_report();
    assert!(report.is_trivial());
    let mut buf = termcolor::Buffer::no_color();
    report.print(&mut buf, "fixture.bin").unwrap();
    let rendered = String::from_utf8(buf.into_inner()).unwrap();
    assert!(rendered.contains("movbe"));
}

#[test]
fn duplicate_definition_with_disagreeing_encoding_fails_to_load() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "name,opcode,instruction,valid64,valid32,cpuid").unwrap();
    writeln!(file, "ADDPS,0F 58 /r,\"xmm1, xmm2/m128\",V,V,SSE").unwrap();
    writeln!(file, "ADDPS,0F 58 /r,\"xmm1, xmm2/m128\",V,V,SSE").unwrap();
    assert!(DefinitionStore::load(file.path()).is_err());
}

#[test]
fn cpuid_flags_equality_is_order_sensitive_end_to_end() {
    let a = CpuidFlags::from_pipe_separated("AVX|AVX2");
    let b = CpuidFlags::from_pipe_separated("AVX2|AVX");
    assert_ne!(a, b);
}
