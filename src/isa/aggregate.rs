//! Accumulates resolved CPUID requirements across a scan and renders
//! the final report.

use crate::isa::cpuid::CpuidFlags;
use std::collections::HashMap;
use termcolor::{Color, ColorSpec, WriteColor};

/// First-seen-ordered, deduplicated set of required CPUID flag
/// sequences, plus bookkeeping for `--full-stats` and unsupported
/// mnemonics.
#[derive(Default)]
pub struct Aggregator {
    seen: Vec<CpuidFlags>,
    /// Present only in full-stats mode: how many observations each
    /// distinct flag sequence accounted for.
    hit_counts: HashMap<usize, usize>,
    full_stats: bool,
    unsupported: HashMap<String, usize>,
}

impl Aggregator {
    pub fn new(full_stats: bool) -> Self {
        Aggregator {
            seen: Vec::new(),
            hit_counts: HashMap::new(),
            full_stats,
            unsupported: HashMap::new(),
        }
    }

    /// Adds a winning candidate's flags, skipping empty sequences (no
    /// extension requirement to report) and deduplicating by sequence
    /// equality while preserving first-seen order.
    pub fn record(&mut self, flags: CpuidFlags) {
        if flags.is_empty() {
            return;
        }
        let index = match self.seen.iter().position(|f| f == &flags) {
            Some(i) => i,
            None => {
                self.seen.push(flags);
                self.seen.len() - 1
            }
        };
        if self.full_stats {
            *self.hit_counts.entry(index).or_insert(0) += 1;
        }
    }

    pub fn record_unsupported(&mut self, mnemonic: &str) {
        *self.unsupported.entry(mnemonic.to_string()).or_insert(0) += 1;
    }

    pub fn into_report(self) -> Report {
        Report {
            flag_sequences: self.seen,
            hit_counts: self.hit_counts,
            full_stats: self.full_stats,
            unsupported: self.unsupported,
        }
    }
}

pub struct Report {
    flag_sequences: Vec<CpuidFlags>,
    hit_counts: HashMap<usize, usize>,
    full_stats: bool,
    unsupported: HashMap<String, usize>,
}

impl Report {
    pub fn is_trivial(&self) -> bool {
        self.flag_sequences.is_empty()
    }

    pub fn print(&self, stream: &mut dyn WriteColor, input_path: &str) -> std::io::Result<()> {
        if self.flag_sequences.is_empty() {
            let mut spec = ColorSpec::new();
            spec.set_fg(Some(Color::Green));
            stream.set_color(&spec)?;
            writeln!(stream, "No special extensions are required to run `{}`.", input_path)?;
            stream.reset()?;
        } else {
            let mut spec = ColorSpec::new();
            spec.set_fg(Some(Color::Cyan)).set_bold(true);
            stream.set_color(&spec)?;
            writeln!(stream, "Extension Requirements:")?;
            stream.reset()?;
            for (index, flags) in self.flag_sequences.iter().enumerate() {
                if self.full_stats {
                    let hits = self.hit_counts.get(&index).copied().unwrap_or(0);
                    writeln!(stream, "  {} (seen in {} instruction(s))", flags, hits)?;
                } else {
                    writeln!(stream, "  {}", flags)?;
                }
            }
        }

        if !self.unsupported.is_empty() {
            let mut spec = ColorSpec::new();
            spec.set_fg(Some(Color::Yellow));
            stream.set_color(&spec)?;
            writeln!(stream, "Unsupported mnemonics encountered (skipped):")?;
            stream.reset()?;
            let mut names: Vec<&String> = self.unsupported.keys().collect();
            names.sort();
            for name in names {
                writeln!(stream, "  {} x{}", name, self.unsupported[name])?;
            }
        }

        Ok(())
    }
}

use std::io::Write as _;
