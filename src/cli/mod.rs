//! Command-line interface for vcf-annotator.
//!
//! This module implements the CLI using clap. Available commands:
//!
//! - **annotate**: Join an input VCF against a database VCF and write a table
//! - **index**: Build the positional index for a database and cache it
//!
//! ## Usage
//!
//! ```text
//! # Annotate against dbSNP, writing to stdout
//! vcf-annotator annotate -i sample.vcf.gz -a dbsnp.vcf.gz
//!
//! # Project INFO keys into columns, use four threads, compress the output
//! vcf-annotator annotate -i sample.vcf -a dbsnp.vcf.gz -o out.tsv.gz \
//!     --info-field FREQ --info-field GENEINFO --threads 4
//!
//! # Build and cache the index once for repeated runs
//! vcf-annotator index dbsnp.vcf.gz
//! ```

use clap::{Parser, Subcommand};

pub mod annotate;
pub mod index;

#[derive(Parser)]
#[command(name = "vcf-annotator")]
#[command(author = "Fulcrum Genomics")]
#[command(version)]
#[command(about = "Annotate VCF records with matching variants from a database VCF")]
#[command(
    long_about = "vcf-annotator joins each record of an input VCF to a position-sorted database VCF such as dbSNP.\n\nAlleles are normalized before comparison so that indels written with different padding still match, multi-allelic records are matched allele by allele, and the output is a flat table with one row per input record, in input order."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format for run summaries and statistics
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Annotate an input VCF against a database VCF
    Annotate(annotate::AnnotateArgs),

    /// Build and save the positional index for a database VCF
    Index(index::IndexArgs),
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Tsv,
}
