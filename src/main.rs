//! SID Relocator CLI
//!
//! Command-line tool that relocates a batch of PSID/RSID tunes according
//! to a JSON plan, writing one flat binary per tune plus an optional
//! assembler include file, and printing a human or JSON summary of each
//! job's statistics.

use clap::{Parser, ValueEnum};
use sid_relocator::container;
use sid_relocator::formatter::{HumanFormatter, JsonFormatter, ReportFormatter};
use sid_relocator::incfile::{self, IncludeEntry};
use sid_relocator::plan::RelocationBatch;
use sid_relocator::{relocate, RelocatorOptions};
use std::path::PathBuf;
use std::process::ExitCode;

/// Relocate C64 SID tunes to new base addresses and SID I/O pages.
///
/// Reads a JSON relocation plan, parses each source PSID/RSID file,
/// relocates its payload, and writes the patched flat binary plus a
/// summary report.
#[derive(Parser, Debug)]
#[command(name = "sid-relocate")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the JSON relocation plan.
    plan: PathBuf,

    /// Output report format.
    #[arg(short, long, default_value = "human")]
    format: OutputFormat,

    /// Fallback behavior for ambiguous data pointer tables.
    #[arg(long, default_value = "default")]
    fallback: FallbackMode,

    /// Directory to write the assembler include file into, if any.
    #[arg(long)]
    incfile: Option<PathBuf>,

    /// Include the full patch log in the report.
    #[arg(short, long)]
    verbose: bool,
}

/// Output format options.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable output.
    Human,
    /// JSON output.
    Json,
}

/// How aggressively Stage C's heuristic fallback may patch ambiguous
/// data pointer tables.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum FallbackMode {
    /// Balanced defaults (heuristic fallback on, jump-table discovery off).
    Default,
    /// No heuristic fallback; only provably-classified tables are patched.
    Strict,
    /// Heuristic fallback and jump-table entry-point discovery both on.
    Lenient,
}

impl From<FallbackMode> for RelocatorOptions {
    fn from(mode: FallbackMode) -> Self {
        match mode {
            FallbackMode::Default => RelocatorOptions::new(),
            FallbackMode::Strict => RelocatorOptions::strict(),
            FallbackMode::Lenient => RelocatorOptions::lenient(),
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    if args.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("sid_relocator=debug")
            .init();
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let batch = RelocationBatch::load(&args.plan)?;
    let options: RelocatorOptions = args.fallback.into();

    let mut include_entries = Vec::new();
    let mut jobs_and_results = Vec::new();

    for entry in &batch.entries {
        tracing::debug!(source = %entry.source.display(), "relocating tune");

        let data = std::fs::read(&entry.source)?;
        let (header, payload) = container::parse(&data)?;
        let job = entry.to_job(&header, payload);
        let result = relocate(&job, &options)?;

        std::fs::write(&entry.output, &result.bytes)?;

        match args.format {
            OutputFormat::Human => {
                let formatter = if args.verbose {
                    HumanFormatter::verbose()
                } else {
                    HumanFormatter::quiet()
                };
                println!(
                    "{}",
                    formatter.format_report(&result, &entry.source, &entry.output)
                );
            }
            OutputFormat::Json => {
                let formatter = JsonFormatter {
                    include_log: args.verbose,
                };
                println!(
                    "{}",
                    formatter.render(&result, &entry.source, &entry.output)?
                );
            }
        }

        jobs_and_results.push((entry.clone(), job, result));
    }

    if let Some(incfile_path) = &args.incfile {
        let entries: Vec<IncludeEntry<'_>> = jobs_and_results
            .iter()
            .enumerate()
            .map(|(i, (entry, job, result))| IncludeEntry {
                label: format!("tune{}", i + 1),
                entry,
                job,
                result,
            })
            .collect();
        let rendered = incfile::render(&entries);
        std::fs::write(incfile_path, rendered)?;
    }

    Ok(())
}
