pub mod cli;
pub mod logging;

use anyhow::Context as _;
use clap::Parser as _;
use cli::Opts;
use indicatif::{ProgressBar, ProgressStyle};
use isa_reqs::isa::matcher::{MatchEngine, Observation, Resolution};
use isa_reqs::isa::{Aggregator, DefinitionStore, Disassembler};
use isa_reqs::util::DurationDisplay;
use logging::AppLogger;
use std::time::Instant;
use termcolor::{ColorChoice, StandardStream};

pub fn run() -> anyhow::Result<()> {
    let opts = Opts::parse();

    unsafe { AppLogger::instance().set_level(opts.log_level_filter()) };
    let color_choice = match opts.color_choice {
        ColorChoice::Auto => unsafe {
            let out_choice = if atty::is(atty::Stream::Stdout) {
                ColorChoice::Always
            } else {
                ColorChoice::Never
            };
            AppLogger::instance().set_color_choice(out_choice);
            out_choice
        },
        choice => unsafe {
            AppLogger::instance().set_color_choice(choice);
            choice
        },
    };

    let load_timer = Instant::now();
    let store = DefinitionStore::load(&opts.definitions)
        .with_context(|| format!("failed to load definitions from `{}`", opts.definitions.display()))?;
    log::debug!(
        "loaded {} definitions in {}",
        store.len(),
        DurationDisplay(load_timer.elapsed())
    );

    let disassembler = Disassembler::resolve(opts.objdump_location.as_deref())
        .context("failed to resolve an objdump binary")?;

    let disasm_timer = Instant::now();
    let instructions = disassembler
        .disassemble(&opts.input)
        .with_context(|| format!("failed to disassemble `{}`", opts.input.display()))?;
    log::debug!(
        "disassembled {} instructions in {}",
        instructions.len(),
        DurationDisplay(disasm_timer.elapsed())
    );

    let progress = if opts.progress {
        let bar = ProgressBar::new(instructions.len() as u64);
        bar.set_style(
            ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        Some(bar)
    } else {
        None
    };

    let engine = MatchEngine::new(&store, opts.careful);
    let mut aggregator = Aggregator::new(opts.full_stats);

    let match_timer = Instant::now();
    for instruction in &instructions {
        let observation = Observation {
            mnemonic: &instruction.mnemonic,
            bytes: &instruction.bytes,
            decoded_text: &instruction.decoded_text,
        };

        match engine.resolve(&observation)? {
            Resolution::Matched(flags) => aggregator.record(flags),
            Resolution::Trivial => {}
            Resolution::Unsupported => aggregator.record_unsupported(&instruction.mnemonic),
        }

        if let Some(bar) = &progress {
            bar.inc(1);
        }
    }
    if let Some(bar) = progress {
        bar.finish_and_clear();
    }
    log::debug!(
        "matched {} instructions in {}",
        instructions.len(),
        DurationDisplay(match_timer.elapsed())
    );

    let report = aggregator.into_report();
    let mut stdout = StandardStream::stdout(color_choice);
    report
        .print(&mut stdout, &opts.input.display().to_string())
        .context("error occurred while printing report")?;

    Ok(())
}
