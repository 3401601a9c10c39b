use clap::Parser;
use std::path::PathBuf;
use termcolor::ColorChoice;

#[derive(Parser)]
#[command(name = "cpuid-reqs", version = env!("CARGO_PKG_VERSION"), author = "Adolph C.")]
pub struct Opts {
    /// Path of the binary to scan.
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,

    /// Path to the instruction dictionary CSV.
    #[arg(short = 'd', long = "definitions", default_value = "instructions_fixed.csv")]
    pub definitions: PathBuf,

    /// Path to the `objdump` binary to invoke. Defaults to the first
    /// `objdump` found on `PATH`.
    #[arg(long = "objdump-location")]
    pub objdump_location: Option<String>,

    /// Requires agreement (or a resolvable tie-break) even for
    /// candidates that carry no CPUID requirement, instead of
    /// discarding them outright.
    #[arg(short = 'c', long = "careful")]
    pub careful: bool,

    /// Shows a progress bar while scanning.
    #[arg(short = 'p', long = "progress")]
    pub progress: bool,

    /// Reports a per-definition hit count alongside each distinct
    /// CPUID requirement.
    #[arg(long = "full-stats")]
    pub full_stats: bool,

    /// Sets the log level: (default)=+warning, 0=+info, 1=+debug, 2=+trace
    /// The `quiet` flag can be used to turn off logging completely.
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Disables logging.
    #[arg(short, long)]
    pub quiet: bool,

    /// Coloring: auto, always, never, and always-ansi (only uses ansi color codes).
    #[arg(long = "color", default_value = "auto", value_parser = parse_colorchoice)]
    pub color_choice: ColorChoice,
}

impl Opts {
    pub fn log_level_filter(&self) -> log::LevelFilter {
        use log::LevelFilter;

        if self.quiet {
            return LevelFilter::Off;
        }

        match self.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

pub fn parse_colorchoice(s: &str) -> Result<ColorChoice, String> {
    if s.eq_ignore_ascii_case("auto") {
        Ok(ColorChoice::Auto)
    } else if s.eq_ignore_ascii_case("always") {
        Ok(ColorChoice::Always)
    } else if s.eq_ignore_ascii_case("never") {
        Ok(ColorChoice::Never)
    } else if s.eq_ignore_ascii_case("always-ansi") {
        Ok(ColorChoice::AlwaysAnsi)
    } else {
        Err(format!("{} is not a valid color value", s))
    }
}
