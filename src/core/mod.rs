//! Core data types and allele normalization.
//!
//! - [`Variant`](variant::Variant): one parsed VCF record, with its original
//!   columns kept for passthrough output
//! - [`NormalizedVariant`](variant::NormalizedVariant): the minimal
//!   (position, ref, alt) form of a single alternate allele
//! - [`normalize`](normalize::normalize): expands a record into one
//!   normalized allele per alternate
//!
//! ## Representation
//!
//! The same deletion can be written with any amount of shared context:
//!
//! | Position | REF    | ALT  |
//! |----------|--------|------|
//! | 500      | `ATG`  | `A`  |
//! | 499      | `CATG` | `CA` |
//!
//! Both normalize to `500 ATG A`, so matching compares normalized triples
//! rather than raw columns.

pub mod normalize;
pub mod variant;
