//! # vcf-annotator
//!
//! A library for annotating VCF records with matching variants from a
//! reference variant database such as dbSNP.
//!
//! Both files can be far larger than memory. The database is indexed once
//! by position (and the index optionally cached next to it), then each input
//! record is matched by seeking near its locus and scanning a short window.
//!
//! ## Features
//!
//! - **Allele normalization**: indels written with different padding match
//! - **Multi-allelic matching**: each alternate allele is matched on its own
//! - **Allele-specific INFO**: `Number=A`/`Number=R` values and dbSNP `FREQ`
//!   are reduced to the matched allele
//! - **Transparent compression**: plain, gzip and BGZF input and database
//! - **Parallel matching**: worker threads with output identical to a
//!   sequential run
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::fs::File;
//! use std::io::BufReader;
//! use std::path::Path;
//!
//! use vcf_annotator::{AnnotateOptions, Annotator, IndexConfig, MatchingConfig, PositionalIndex, WriterConfig};
//! use vcf_annotator::parsing::source::DatabaseSource;
//!
//! let database = DatabaseSource::open(Path::new("dbsnp.vcf.gz")).unwrap();
//! let index = PositionalIndex::build(&mut database.reader().unwrap(), &IndexConfig::default()).unwrap();
//!
//! let annotator = Annotator::new(
//!     &database,
//!     &index,
//!     MatchingConfig::default(),
//!     WriterConfig::default(),
//!     AnnotateOptions::default(),
//! );
//! let input = BufReader::new(File::open("sample.vcf").unwrap());
//! let summary = annotator.run(input, std::io::stdout()).unwrap();
//! eprintln!("{} of {} records matched", summary.matched, summary.records);
//! ```
//!
//! ## Modules
//!
//! - [`parsing`]: VCF record and header parsing, file transports
//! - [`core`]: Variant types and allele normalization
//! - [`index`]: Positional index over the database
//! - [`matching`]: Match engine and database cursor
//! - [`annotate`]: Output writer and the annotation pipeline
//! - [`cli`]: Command-line interface implementation

pub mod annotate;
pub mod cli;
pub mod core;
pub mod index;
pub mod matching;
pub mod parsing;
pub mod utils;

// Re-export commonly used types for convenience
pub use annotate::{AnnotateError, AnnotateOptions, Annotator, RunSummary, WriterConfig};
pub use core::normalize::normalize;
pub use core::variant::{NormalizedVariant, Variant};
pub use index::{IndexConfig, IndexError, PositionalIndex};
pub use matching::{DatabaseCursor, MatchEngine, MatchResult, MatchingConfig};
pub use parsing::vcf::{parse_line, ParseError, ParsedLine, VcfHeader};
