use std::io;

use serde::Serialize;
use tracing::{debug, trace};

use crate::core::normalize::normalize;
use crate::core::variant::{NormalizedVariant, Variant};
use crate::index::{ChromosomeIndex, PositionalIndex};
use crate::matching::cursor::DatabaseCursor;
use crate::parsing::source::LineSource;
use crate::parsing::vcf::parse_info;

/// Default upper bound on how far before the input position to scan
pub const DEFAULT_MAX_WINDOW: u64 = 1000;

/// Configuration for the matching engine
#[derive(Debug, Clone, Serialize)]
pub struct MatchingConfig {
    /// Cap on the anchor window, in bases
    pub max_window: u64,
    /// Also accept database records with reference and alternate exchanged
    pub allow_swapped: bool,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            max_window: DEFAULT_MAX_WINDOW,
            allow_swapped: false,
        }
    }
}

/// The database allele an input record was joined to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlleleMatch {
    /// The matched database record
    pub variant: Variant,
    /// Zero-based index into the database record's alternate alleles
    pub allele_index: usize,
    /// Zero-based index into the input record's alternate alleles
    pub query_allele_index: usize,
    /// Database position minus input position (original coordinates)
    pub distance: i64,
    /// True if reference and alternate were exchanged
    pub swapped: bool,
}

/// Outcome of matching one input record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    pub input: Variant,
    pub matched: Option<AlleleMatch>,
}

impl MatchResult {
    #[must_use]
    pub fn unmatched(input: Variant) -> Self {
        Self {
            input,
            matched: None,
        }
    }

    #[must_use]
    pub fn matched_variant(&self) -> Option<&Variant> {
        self.matched.as_ref().map(|m| &m.variant)
    }

    #[must_use]
    pub fn matched_allele_index(&self) -> Option<usize> {
        self.matched.as_ref().map(|m| m.allele_index)
    }

    #[must_use]
    pub fn is_match(&self) -> bool {
        self.matched.is_some()
    }
}

/// Ordering key for competing candidates; smaller is better
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Rank {
    swapped: bool,
    distance: u64,
}

/// Joins input records to database records through a shared index.
///
/// The engine itself holds only the read-only index and configuration;
/// every file position lives in the caller's [`DatabaseCursor`].
pub struct MatchEngine<'a> {
    index: &'a PositionalIndex,
    config: MatchingConfig,
}

impl<'a> MatchEngine<'a> {
    #[must_use]
    pub fn new(index: &'a PositionalIndex, config: MatchingConfig) -> Self {
        Self { index, config }
    }

    #[must_use]
    pub fn index(&self) -> &'a PositionalIndex {
        self.index
    }

    #[must_use]
    pub fn config(&self) -> &MatchingConfig {
        &self.config
    }

    /// How far before `position` a database record can start and still
    /// normalize onto it, judged from the index blocks around `position`.
    #[must_use]
    pub fn window(&self, chromosome: &ChromosomeIndex, position: u64) -> u64 {
        chromosome.look_back(position, self.config.max_window)
    }

    /// Find the best database match for one input record.
    ///
    /// Each alternate allele of the input is normalized, then database
    /// records from `min(position) - window` through `max(position)` on the
    /// same chromosome are normalized and compared by (position, ref, alt).
    /// Only the chosen record has its INFO column parsed.
    /// Exact matches beat swapped ones, then the smallest distance between
    /// original positions wins, then the earliest record in the file.
    ///
    /// A chromosome missing from the index is not an error; the result is
    /// simply unmatched.
    ///
    /// # Errors
    ///
    /// Returns an IO error if seeking or reading the database fails.
    pub fn match_variant<S: LineSource>(
        &self,
        input: Variant,
        cursor: &mut DatabaseCursor<S>,
    ) -> io::Result<MatchResult> {
        let queries = normalize(&input);
        let (Some(lowest), Some(highest)) = (
            queries.iter().map(|q| q.position).min(),
            queries.iter().map(|q| q.position).max(),
        ) else {
            return Ok(MatchResult::unmatched(input));
        };

        let Some(chromosome) = self.index.chromosome(&input.chromosome) else {
            trace!(chrom = %input.chromosome, "Chromosome absent from database");
            return Ok(MatchResult::unmatched(input));
        };

        let start = lowest.saturating_sub(self.window(chromosome, lowest));
        let end = highest;
        let Some(offset) = chromosome.seek(start) else {
            return Ok(MatchResult::unmatched(input));
        };
        cursor.seek(offset)?;

        let mut best: Option<(Rank, AlleleMatch)> = None;

        while let Some(record) = cursor.next_record()? {
            if record.chromosome != input.chromosome || record.position > end {
                break;
            }
            if record.position < start {
                continue;
            }

            let Some((rank, allele_index, query_allele_index)) =
                self.best_allele(&input, &queries, &record)
            else {
                continue;
            };

            if best.as_ref().map_or(true, |(current, _)| rank < *current) {
                let distance = record.position as i64 - input.position as i64;
                best = Some((
                    rank,
                    AlleleMatch {
                        variant: record,
                        allele_index,
                        query_allele_index,
                        distance,
                        swapped: rank.swapped,
                    },
                ));
                if !rank.swapped && rank.distance == 0 {
                    break;
                }
            }
        }

        if let Some((_, m)) = &best {
            debug!(
                locus = %input.locus(),
                db_locus = %m.variant.locus(),
                swapped = m.swapped,
                "Matched database record"
            );
        }

        Ok(MatchResult {
            input,
            matched: best.map(|(_, mut m)| {
                m.variant.info = parse_info(m.variant.info_text());
                m
            }),
        })
    }

    /// Best-ranked (database allele, input allele) pair within one record
    fn best_allele(
        &self,
        input: &Variant,
        queries: &[NormalizedVariant],
        record: &Variant,
    ) -> Option<(Rank, usize, usize)> {
        let distance = record.position.abs_diff(input.position);
        let mut best: Option<(Rank, usize, usize)> = None;

        for candidate in normalize(record) {
            for query in queries {
                let swapped = if candidate.triple() == query.triple() {
                    false
                } else if self.config.allow_swapped && candidate.is_swap_of(query) {
                    true
                } else {
                    continue;
                };
                let rank = Rank { swapped, distance };
                if best.map_or(true, |(current, _, _)| rank < current) {
                    best = Some((rank, candidate.allele_index, query.allele_index));
                }
            }
        }

        best
    }
}
