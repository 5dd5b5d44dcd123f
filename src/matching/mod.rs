//! Variant matching against an indexed database.
//!
//! - [`MatchEngine`]: finds the database record, if any, that describes the
//!   same allele as an input record
//! - [`DatabaseCursor`]: a caller-owned read position over the database
//!
//! ## Matching Algorithm
//!
//! 1. Normalize every alternate allele of the input record.
//! 2. Seek via the [`PositionalIndex`](crate::index::PositionalIndex) to a
//!    little before the earliest normalized position. The look-back window
//!    reaches the first nearby index block holding a record long enough to
//!    normalize onto that position, capped by [`MatchingConfig::max_window`].
//! 3. Scan forward through the latest normalized position, normalizing each
//!    database allele and comparing (position, ref, alt). INFO is parsed
//!    only for the record finally chosen.
//! 4. Exact matches beat swapped ones (when enabled), then the smallest
//!    distance between original positions, then file order.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use vcf_annotator::index::{IndexConfig, PositionalIndex};
//! use vcf_annotator::matching::{DatabaseCursor, MatchEngine, MatchingConfig};
//! use vcf_annotator::parsing::source::DatabaseSource;
//! use vcf_annotator::parsing::vcf::parse_record;
//!
//! let database = DatabaseSource::open(Path::new("dbsnp.vcf.gz")).unwrap();
//! let index = PositionalIndex::build(&mut database.reader().unwrap(), &IndexConfig::default()).unwrap();
//!
//! let engine = MatchEngine::new(&index, MatchingConfig::default());
//! let mut cursor = DatabaseCursor::new(database.reader().unwrap());
//! let input = parse_record("chr1\t100\t.\tA\tG,T\t.\t.\t.").unwrap();
//!
//! let result = engine.match_variant(input, &mut cursor).unwrap();
//! if let Some(m) = &result.matched {
//!     println!("{:?} (allele {})", m.variant.identifier, m.allele_index);
//! }
//! ```

pub mod cursor;
pub mod engine;

pub use cursor::DatabaseCursor;
pub use engine::{AlleleMatch, MatchEngine, MatchResult, MatchingConfig, DEFAULT_MAX_WINDOW};
