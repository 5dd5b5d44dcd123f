//! Positional index over a sorted database VCF.
//!
//! The index maps each chromosome to a sorted list of (position, offset)
//! seek points so that matching can jump close to a locus instead of
//! scanning the whole database. It is built in one pass, is read-only
//! afterwards, and can be cached next to the database as a `.vai` file.

pub mod builder;
pub mod store;

pub use builder::{IndexConfig, DEFAULT_INDEX_STRIDE};
pub use store::{
    default_index_path, ChromosomeIndex, IndexEntry, IndexError, IndexStats, PositionalIndex,
};
