use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;

use crate::cli::OutputFormat;
use crate::index::{default_index_path, IndexConfig, PositionalIndex, DEFAULT_INDEX_STRIDE};
use crate::parsing::source::DatabaseSource;

#[derive(Args)]
pub struct IndexArgs {
    /// Database VCF (plain, gzip or BGZF), sorted by chromosome and position
    #[arg(required = true)]
    pub database: PathBuf,

    /// Records between seek points (1 indexes every distinct position)
    #[arg(long, default_value_t = DEFAULT_INDEX_STRIDE)]
    pub stride: usize,

    /// Where to write the index (defaults to <database>.vai)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Execute index subcommand
///
/// # Errors
///
/// Returns an error if the database cannot be read, is not sorted, or the
/// index cannot be written.
#[allow(clippy::needless_pass_by_value)] // CLI entry point, values from clap
pub fn run(args: IndexArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let database = DatabaseSource::open(&args.database)?;
    let config = IndexConfig {
        stride: args.stride,
    };

    let index = build_index(&database, &config)?;
    let path = args
        .output
        .clone()
        .unwrap_or_else(|| default_index_path(database.path()));
    index
        .save(&path, database.path())
        .with_context(|| format!("Failed to write index to '{}'", path.display()))?;

    match format {
        OutputFormat::Text => print_text_stats(&args.database, &path, &index, verbose),
        OutputFormat::Json => print_json_stats(&args.database, &path, &index)?,
        OutputFormat::Tsv => print_tsv_stats(&index),
    }

    Ok(())
}

/// Load a fresh cached index or build one, optionally caching the result.
///
/// # Errors
///
/// Returns an error if the database cannot be read or is not sorted, or if
/// saving was requested and fails.
pub fn load_or_build_index(
    database: &DatabaseSource,
    sidecar: &Path,
    config: &IndexConfig,
    use_cache: bool,
    save: bool,
) -> anyhow::Result<PositionalIndex> {
    if use_cache {
        if let Some(index) =
            PositionalIndex::load_if_fresh(sidecar, database.path(), config.effective_stride())?
        {
            tracing::info!(path = %sidecar.display(), "Using cached database index");
            return Ok(index);
        }
    }

    let index = build_index(database, config)?;

    if save {
        index
            .save(sidecar, database.path())
            .with_context(|| format!("Failed to write index to '{}'", sidecar.display()))?;
    }

    Ok(index)
}

fn build_index(database: &DatabaseSource, config: &IndexConfig) -> anyhow::Result<PositionalIndex> {
    let mut reader = database.reader()?;
    PositionalIndex::build(&mut reader, config)
        .with_context(|| format!("Failed to index '{}'", database.path().display()))
}

fn print_text_stats(database: &Path, path: &Path, index: &PositionalIndex, verbose: bool) {
    let stats = index.stats();
    println!("Indexed {}", database.display());
    println!("  Chromosomes: {}", index.len());
    println!("  Records: {}", stats.records);
    println!("  Seek points: {} (stride {})", stats.entries, index.stride());
    if stats.malformed_lines > 0 {
        println!("  Malformed lines skipped: {}", stats.malformed_lines);
    }
    println!("Wrote {}", path.display());

    if verbose {
        println!();
        for name in index.chromosome_names() {
            if let Some(chrom) = index.chromosome(name) {
                println!(
                    "  {name}: {} records, {}-{}, {} seek points, longest REF {}",
                    chrom.record_count,
                    chrom.first_position,
                    chrom.last_position,
                    chrom.entries.len(),
                    chrom.max_reference_length,
                );
            }
        }
    }
}

fn print_json_stats(database: &Path, path: &Path, index: &PositionalIndex) -> anyhow::Result<()> {
    let chromosomes: Vec<_> = index
        .chromosome_names()
        .filter_map(|name| index.chromosome(name).map(|c| (name, c)))
        .map(|(name, c)| {
            serde_json::json!({
                "name": name,
                "records": c.record_count,
                "first_position": c.first_position,
                "last_position": c.last_position,
                "seek_points": c.entries.len(),
                "max_reference_length": c.max_reference_length,
            })
        })
        .collect();

    let output = serde_json::json!({
        "database": database.display().to_string(),
        "index": path.display().to_string(),
        "stride": index.stride(),
        "stats": index.stats(),
        "chromosomes": chromosomes,
    });

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn print_tsv_stats(index: &PositionalIndex) {
    println!("chromosome\trecords\tfirst_position\tlast_position\tseek_points\tmax_reference_length");
    for name in index.chromosome_names() {
        if let Some(c) = index.chromosome(name) {
            println!(
                "{name}\t{}\t{}\t{}\t{}\t{}",
                c.record_count,
                c.first_position,
                c.last_position,
                c.entries.len(),
                c.max_reference_length,
            );
        }
    }
}
