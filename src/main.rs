//! CLI entrypoint for `lsareport`.
//!
//! Loads saved extraction results (a single JSON document, or a directory of
//! them), renders them in the selected output format to stdout or a file,
//! and optionally exports recovered Kerberos tickets to a directory.
use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use log::{LevelFilter, error};
use lsareport::{
    engine::{Engine, LoadOptions},
    export::export_tickets,
    io::DEFAULT_MMAP_THRESHOLD_BYTES,
    report::{Destination, OutputMode, emit},
};

#[derive(Parser, Debug)]
#[command(
    name = "lsareport",
    version,
    about = "Render LSASS credential extraction results"
)]
struct Args {
    /// Saved extraction result, or a directory of them with -d
    input: PathBuf,

    /// Print credentials in JSON format
    #[arg(long, conflicts_with_all = ["json_short", "grep"])]
    json: bool,

    /// Print credentials in abbreviated JSON format
    #[arg(long = "json-short", conflicts_with = "grep")]
    json_short: bool,

    /// Print credentials in greppable format
    #[arg(short = 'g', long)]
    grep: bool,

    /// Save results to a file instead of printing them
    #[arg(short = 'o', long)]
    outfile: Option<PathBuf>,

    /// Save kerberos tickets to a directory
    #[arg(short = 'k', long = "kerberos-dir")]
    kerberos_dir: Option<PathBuf>,

    /// Treat the input as a directory of results
    #[arg(short = 'd', long)]
    directory: bool,

    /// Descend into subdirectories (with -d)
    #[arg(short = 'r', long, requires = "directory")]
    recursive: bool,

    /// Stop when a source cannot be parsed or reports package errors
    #[arg(short = 'e', long = "halt-on-error")]
    halt_on_error: bool,

    /// Load sources in parallel
    #[arg(long)]
    parallel: bool,

    /// Override mmap threshold in bytes. If zero, disable mmap.
    #[arg(long = "mmap-threshold", default_value_t = DEFAULT_MMAP_THRESHOLD_BYTES)]
    mmap_threshold: u64,

    /// Increase verbosity (-v, -vv)
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,

    /// Control color of diagnostics (auto, always, never)
    #[arg(long = "color", value_enum, default_value_t = ColorChoice::Auto)]
    color: ColorChoice,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ColorChoice {
    Auto,
    Always,
    Never,
}

impl Args {
    fn output_mode(&self) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else if self.json_short {
            OutputMode::JsonShort
        } else if self.grep {
            OutputMode::Grep
        } else {
            OutputMode::Text
        }
    }

    fn destination(&self) -> Destination {
        match &self.outfile {
            Some(p) => Destination::File(p.clone()),
            None => Destination::Stdout,
        }
    }
}

fn init_logger(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    let _ = env_logger::Builder::from_default_env()
        .filter_level(level)
        .try_init();
}

fn verify_inputs(args: &Args) -> Result<()> {
    if !args.input.exists() {
        bail!("input not found: {}", args.input.display());
    }
    if args.directory && !args.input.is_dir() {
        bail!("not a directory: {}", args.input.display());
    }
    if !args.directory && args.input.is_dir() {
        bail!("{} is a directory (use -d)", args.input.display());
    }
    Ok(())
}

fn main() {
    let args = Args::parse();
    init_logger(args.verbose);
    match args.color {
        ColorChoice::Always => colored::control::set_override(true),
        ColorChoice::Never => colored::control::set_override(false),
        ColorChoice::Auto => {}
    }
    if let Err(e) = verify_inputs(&args) {
        error!("{}", e);
        std::process::exit(2);
    }

    let opts = LoadOptions {
        halt_on_error: args.halt_on_error,
        parallel: args.parallel,
        mmap_threshold_bytes: if args.mmap_threshold == 0 {
            u64::MAX
        } else {
            args.mmap_threshold
        },
    };
    let mut engine = Engine::new();
    let loaded = if args.directory {
        engine.load_directory(&args.input, args.recursive, &opts)
    } else {
        engine.load_paths(&[&args.input], &opts)
    };
    if let Err(e) = loaded {
        error!("{}", e);
        std::process::exit(3);
    }
    if !engine.failed_sources.is_empty() {
        eprintln!(
            "{}",
            format!("{} source(s) could not be parsed", engine.failed_sources.len())
                .yellow()
                .bold()
        );
    }

    if let Err(e) = emit(
        &engine.results,
        &engine.failed_sources,
        args.output_mode(),
        args.directory,
        &args.destination(),
    ) {
        error!("failed to write report: {}", e);
        std::process::exit(4);
    }

    if let Some(dir) = &args.kerberos_dir {
        if let Err(e) = export_tickets(dir, &engine.results) {
            error!("ticket export failed: {:#}", e);
            std::process::exit(5);
        }
    }
}
