use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::store::{ChromosomeIndex, IndexEntry, IndexError, IndexStats, PositionalIndex};
use crate::parsing::source::LineSource;
use crate::core::normalize::max_forward_shift;
use crate::parsing::vcf::{decode_line, parse_line, ParseError, ParsedLine, VcfHeader};

/// Default number of records between seek points
pub const DEFAULT_INDEX_STRIDE: usize = 16;

/// Malformed lines reported individually before the log goes quiet
const MAX_MALFORMED_WARNINGS: u64 = 10;

/// Index construction options
#[derive(Debug, Clone, Serialize)]
pub struct IndexConfig {
    /// Minimum records between seek points; 1 records every distinct position
    pub stride: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            stride: DEFAULT_INDEX_STRIDE,
        }
    }
}

impl IndexConfig {
    /// Stride actually used; zero is treated as one
    #[must_use]
    pub fn effective_stride(&self) -> usize {
        self.stride.max(1)
    }
}

impl PositionalIndex {
    /// Build an index with a single pass over a database.
    ///
    /// A seek point is recorded at the first record of every chromosome and
    /// then at the first record of a new position once at least `stride`
    /// records have gone by since the previous seek point.
    ///
    /// # Errors
    ///
    /// Returns `IndexError::UnsortedInput` if a position decreases within a
    /// chromosome or a chromosome's records are not contiguous, and
    /// `IndexError::Io` if reading fails. Malformed lines are skipped and
    /// counted, never fatal.
    pub fn build<S: LineSource>(source: &mut S, config: &IndexConfig) -> Result<Self, IndexError> {
        let stride = config.effective_stride();
        let mut builder = Builder::new(stride);
        let mut line = Vec::new();
        let mut line_number: u64 = 0;

        loop {
            let offset = source.offset();
            line.clear();
            if source.read_line(&mut line)? == 0 {
                break;
            }
            line_number += 1;

            let text = match decode_line(&line) {
                Ok(text) => text,
                Err(e) => {
                    builder.note_malformed(line_number, &e);
                    continue;
                }
            };

            match parse_line(&text) {
                Ok(ParsedLine::Header) => {
                    if !builder.seen_records {
                        builder.header.push_line(&text);
                    }
                }
                Ok(ParsedLine::Record(variant)) => {
                    builder.add(
                        &variant.chromosome,
                        variant.position,
                        variant.reference_allele.len(),
                        offset,
                        line_number,
                    )?;
                }
                Err(e) => builder.note_malformed(line_number, &e),
            }
        }

        let index = builder.finish();
        info!(
            chromosomes = index.len(),
            records = index.stats.records,
            entries = index.stats.entries,
            malformed = index.stats.malformed_lines,
            stride,
            "Built database index"
        );
        Ok(index)
    }
}

/// Accumulates index state while streaming the database
struct Builder {
    stride: usize,
    header: VcfHeader,
    chromosomes: IndexMap<String, ChromosomeIndex>,
    stats: IndexStats,
    seen_records: bool,
    since_entry: usize,
}

impl Builder {
    fn new(stride: usize) -> Self {
        Self {
            stride,
            header: VcfHeader::new(),
            chromosomes: IndexMap::new(),
            stats: IndexStats::default(),
            seen_records: false,
            since_entry: 0,
        }
    }

    fn add(
        &mut self,
        chromosome: &str,
        position: u64,
        reference_length: usize,
        offset: u64,
        line: u64,
    ) -> Result<(), IndexError> {
        self.seen_records = true;
        self.stats.records += 1;

        let current = self.chromosomes.last().map(|(name, _)| name.as_str());
        if current != Some(chromosome) {
            self.start_chromosome(chromosome, position, line)?;
        }

        let Some((_, chrom)) = self.chromosomes.last_mut() else {
            return Ok(());
        };

        if position < chrom.last_position {
            return Err(IndexError::UnsortedInput {
                chromosome: chromosome.to_string(),
                position,
                line,
                detail: format!("follows position {}", chrom.last_position),
            });
        }

        let reach = position + max_forward_shift(reference_length);
        let new_position = position != chrom.last_position;
        if chrom.entries.is_empty() || (new_position && self.since_entry >= self.stride) {
            chrom.entries.push(IndexEntry {
                position,
                offset,
                reach,
            });
            self.stats.entries += 1;
            self.since_entry = 0;
        } else if let Some(entry) = chrom.entries.last_mut() {
            entry.reach = entry.reach.max(reach);
        }

        self.since_entry += 1;
        chrom.record_count += 1;
        chrom.last_position = position;
        chrom.max_reference_length = chrom.max_reference_length.max(reference_length);
        Ok(())
    }

    fn note_malformed(&mut self, line: u64, error: &ParseError) {
        self.stats.malformed_lines += 1;
        if self.stats.malformed_lines <= MAX_MALFORMED_WARNINGS {
            warn!(line, error = %error, "Skipping malformed database line");
        }
    }

    fn start_chromosome(&mut self, chromosome: &str, position: u64, line: u64) -> Result<(), IndexError> {
        if self.chromosomes.contains_key(chromosome) {
            return Err(IndexError::UnsortedInput {
                chromosome: chromosome.to_string(),
                position,
                line,
                detail: "reappears after records for other chromosomes".to_string(),
            });
        }

        if let Some((previous, finished)) = self.chromosomes.last() {
            debug!(
                chromosome = %previous,
                records = finished.record_count,
                "Finished indexing chromosome"
            );
        }

        self.chromosomes.insert(
            chromosome.to_string(),
            ChromosomeIndex {
                first_position: position,
                last_position: position,
                ..ChromosomeIndex::default()
            },
        );
        self.since_entry = 0;
        Ok(())
    }

    fn finish(self) -> PositionalIndex {
        PositionalIndex {
            chromosomes: self.chromosomes,
            header: self.header,
            stats: self.stats,
            stride: self.stride,
        }
    }
}
