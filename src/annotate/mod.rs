//! Joining input records to the database and writing the annotated table.
//!
//! - [`Annotator`]: drives a run, sequentially or across worker threads
//! - [`AnnotationWriter`]: formats one tab-separated row per input record
//! - [`info`]: reduces allele-specific INFO values to the matched allele
//! - [`ReorderBuffer`]: puts out-of-order worker results back in sequence

pub mod info;
pub mod pipeline;
pub mod reorder;
pub mod writer;

pub use pipeline::{AnnotateError, AnnotateOptions, Annotator, RunSummary, DEFAULT_BATCH_SIZE};
pub use reorder::ReorderBuffer;
pub use writer::{AnnotationWriter, WriterConfig, DEFAULT_MISSING_VALUE, DEFAULT_PREFIX};
