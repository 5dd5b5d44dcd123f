//! Reading VCF text and the files that carry it.
//!
//! - [`vcf`]: record and header parsing
//! - [`source`]: plain, gzip and BGZF readers, seekable database access and
//!   output sinks
//!
//! ## Example
//!
//! ```rust
//! use vcf_annotator::parsing::vcf::{parse_line, ParsedLine};
//!
//! let line = "chr1\t100\trs1\tA\tG,T\t.\tPASS\tAF=0.1,0.2";
//! match parse_line(line).unwrap() {
//!     ParsedLine::Record(variant) => assert_eq!(variant.alternate_alleles.len(), 2),
//!     ParsedLine::Header => unreachable!(),
//! }
//! ```
//!
//! ## Compression
//!
//! | Magic bytes            | Treatment                                   |
//! |------------------------|---------------------------------------------|
//! | gzip with `BC` extra   | BGZF, seeked by virtual position            |
//! | gzip                   | decompressed (databases go to a temp file)  |
//! | anything else          | plain text, seeked by byte offset           |

pub mod source;
pub mod vcf;
