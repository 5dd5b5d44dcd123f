use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::Args;
use serde::Serialize;

use crate::annotate::{
    AnnotateOptions, Annotator, RunSummary, WriterConfig, DEFAULT_BATCH_SIZE,
    DEFAULT_MISSING_VALUE, DEFAULT_PREFIX,
};
use crate::cli::index::load_or_build_index;
use crate::cli::OutputFormat;
use crate::index::{default_index_path, IndexConfig, DEFAULT_INDEX_STRIDE};
use crate::matching::{MatchingConfig, DEFAULT_MAX_WINDOW};
use crate::parsing::source::{open_input, DatabaseSource, OutputSink};

#[derive(Args)]
pub struct AnnotateArgs {
    /// Input VCF (plain, gzip or BGZF)
    /// Use '-' for stdin
    #[arg(short, long, required = true)]
    pub input: PathBuf,

    /// Database VCF (plain, gzip or BGZF), sorted by chromosome and position
    #[arg(short = 'a', long = "annotation", visible_alias = "database", required = true)]
    pub database: PathBuf,

    /// Output table; '-' writes stdout, a '.gz' suffix compresses
    #[arg(short, long, default_value = "-")]
    pub output: PathBuf,

    /// Matching threads (0 uses every CPU)
    #[arg(short = 't', long, default_value = "1")]
    pub threads: usize,

    /// Records per unit of work when running threaded
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Database records between index seek points
    #[arg(long, default_value_t = DEFAULT_INDEX_STRIDE)]
    pub stride: usize,

    /// Cap, in bases, on how far before a variant to look for
    /// differently padded database records
    #[arg(long, default_value_t = DEFAULT_MAX_WINDOW)]
    pub max_window: u64,

    /// Also match database records with REF and ALT exchanged
    #[arg(long)]
    pub allow_swapped: bool,

    /// Database INFO key to add as its own column (repeatable)
    #[arg(long = "info-field", value_name = "KEY")]
    pub info_fields: Vec<String>,

    /// Prefix for annotation column names
    #[arg(long, default_value = DEFAULT_PREFIX)]
    pub prefix: String,

    /// Text written for absent values (default: empty)
    #[arg(long)]
    pub missing_value: Option<String>,

    /// Index file to read or write (defaults to <database>.vai)
    #[arg(long)]
    pub index: Option<PathBuf>,

    /// Save the database index for later runs
    #[arg(long)]
    pub save_index: bool,

    /// Ignore any saved index and always rebuild
    #[arg(long, conflicts_with = "save_index")]
    pub no_index_cache: bool,
}

/// Everything a run was configured with, echoed in JSON output
#[derive(Serialize)]
struct AnnotateReport<'a> {
    input: String,
    database: String,
    output: String,
    elapsed_seconds: f64,
    summary: &'a RunSummary,
    index: &'a IndexConfig,
    matching: &'a MatchingConfig,
    writer: &'a WriterConfig,
    options: &'a AnnotateOptions,
}

/// Execute annotate subcommand
///
/// # Errors
///
/// Returns an error if an option is invalid, a file cannot be read or
/// written, or the database is not sorted.
#[allow(clippy::needless_pass_by_value)] // CLI entry point, values from clap
pub fn run(args: AnnotateArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let writer_config = WriterConfig {
        prefix: args.prefix.clone(),
        missing_value: args
            .missing_value
            .clone()
            .unwrap_or_else(|| DEFAULT_MISSING_VALUE.to_string()),
        info_fields: args.info_fields.clone(),
    };
    writer_config
        .validate()
        .context("Invalid annotation column options")?;

    let index_config = IndexConfig {
        stride: args.stride,
    };
    let matching_config = MatchingConfig {
        max_window: args.max_window,
        allow_swapped: args.allow_swapped,
    };
    let options = AnnotateOptions {
        threads: args.threads,
        batch_size: args.batch_size,
    };

    let started = Instant::now();
    let database = DatabaseSource::open(&args.database)?;
    let sidecar = args
        .index
        .clone()
        .unwrap_or_else(|| default_index_path(database.path()));
    let index = load_or_build_index(
        &database,
        &sidecar,
        &index_config,
        !args.no_index_cache,
        args.save_index,
    )?;

    if verbose {
        eprintln!(
            "Database index: {} chromosomes, {} records",
            index.len(),
            index.stats().records
        );
    }

    let input = open_input(&args.input)?;
    let mut sink = OutputSink::create(&args.output)?;

    let annotator = Annotator::new(
        &database,
        &index,
        matching_config.clone(),
        writer_config.clone(),
        options.clone(),
    );
    let summary = annotator
        .run(input, &mut sink)
        .with_context(|| format!("Failed to annotate '{}'", args.input.display()))?;
    sink.finish()
        .with_context(|| format!("Failed to finish writing '{}'", args.output.display()))?;

    let report = AnnotateReport {
        input: args.input.display().to_string(),
        database: args.database.display().to_string(),
        output: args.output.display().to_string(),
        elapsed_seconds: started.elapsed().as_secs_f64(),
        summary: &summary,
        index: &index_config,
        matching: &matching_config,
        writer: &writer_config,
        options: &options,
    };

    // The table may be on stdout, so the summary always goes to stderr
    match format {
        OutputFormat::Text => print_text_summary(&report),
        OutputFormat::Json => eprintln!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Tsv => print_tsv_summary(&summary),
    }

    Ok(())
}

fn print_text_summary(report: &AnnotateReport<'_>) {
    let summary = report.summary;
    eprintln!(
        "Annotated {} records: {} matched, {} unmatched ({:.1}s, {} thread{})",
        summary.records,
        summary.matched,
        summary.unmatched,
        report.elapsed_seconds,
        summary.threads,
        if summary.threads == 1 { "" } else { "s" },
    );
    if summary.malformed_input > 0 {
        eprintln!("Skipped {} malformed input lines", summary.malformed_input);
    }
    if summary.malformed_database > 0 {
        eprintln!(
            "Skipped {} malformed database lines",
            summary.malformed_database
        );
    }
}

fn print_tsv_summary(summary: &RunSummary) {
    eprintln!("records\tmatched\tunmatched\tmalformed_input\tmalformed_database\tthreads");
    eprintln!(
        "{}\t{}\t{}\t{}\t{}\t{}",
        summary.records,
        summary.matched,
        summary.unmatched,
        summary.malformed_input,
        summary.malformed_database,
        summary.threads,
    );
}
