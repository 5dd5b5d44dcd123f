use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use bincode::Options;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::parsing::source::SourceError;
use crate::parsing::vcf::VcfHeader;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("Database is not sorted at line {line}: {chromosome}:{position} {detail}")]
    UnsortedInput {
        chromosome: String,
        position: u64,
        line: u64,
        detail: String,
    },

    #[error("Chromosome '{0}' is not in the database index")]
    NotFound(String),

    #[error("Failed to read index file: {0}")]
    Decode(#[from] bincode::Error),
}

/// Sidecar format version for compatibility checking
pub const INDEX_VERSION: u32 = 2;

/// Suffix appended to the database file name for the sidecar index
pub const INDEX_SUFFIX: &str = "vai";

/// One seek point: the first database record at `position`, heading a block
/// of records that runs up to the next entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub position: u64,
    /// Opaque offset understood by the database's line source
    pub offset: u64,
    /// Furthest position any record in the block can normalize onto
    pub reach: u64,
}

/// Seek points and summary data for one chromosome
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChromosomeIndex {
    /// Entries in strictly increasing position order
    pub entries: Vec<IndexEntry>,
    pub record_count: u64,
    pub first_position: u64,
    pub last_position: u64,
    /// Longest REF allele seen on the chromosome
    pub max_reference_length: usize,
}

impl ChromosomeIndex {
    /// Offset of the last entry at or before `position`, or of the first
    /// entry when `position` precedes them all.
    #[must_use]
    pub fn seek(&self, position: u64) -> Option<u64> {
        let idx = self.entries.partition_point(|e| e.position <= position);
        let entry = if idx == 0 {
            self.entries.first()
        } else {
            self.entries.get(idx - 1)
        };
        entry.map(|e| e.offset)
    }

    /// Distance back from `position` to the first block holding a record
    /// that can normalize onto `position` or later, capped at `cap`.
    ///
    /// Only blocks near `position` are consulted, so one long REF elsewhere
    /// on the chromosome does not widen every scan.
    #[must_use]
    pub fn look_back(&self, position: u64, cap: u64) -> u64 {
        let floor = position.saturating_sub(cap);
        let end = self.entries.partition_point(|e| e.position <= position);
        let mut start = position;
        for entry in self.entries[..end].iter().rev() {
            if entry.reach >= position {
                start = start.min(entry.position);
            }
            if entry.position <= floor {
                break;
            }
        }
        (position - start).min(cap)
    }
}

/// Counters gathered while building the index
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub records: u64,
    pub malformed_lines: u64,
    pub entries: u64,
}

/// Chromosome → sorted (position, offset) seek points over one database file.
///
/// Built once per run (or loaded from its sidecar) and read-only afterwards;
/// matching workers share it by reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionalIndex {
    /// Chromosomes in database order
    pub(crate) chromosomes: IndexMap<String, ChromosomeIndex>,
    /// Database header (INFO definitions are needed when writing)
    pub(crate) header: VcfHeader,
    pub(crate) stats: IndexStats,
    /// Minimum records between seek points
    pub(crate) stride: usize,
}

impl PositionalIndex {
    /// Find an offset at or before `position` on `chromosome`.
    ///
    /// # Errors
    ///
    /// Returns `IndexError::NotFound` if the chromosome has no records.
    pub fn seek(&self, chromosome: &str, position: u64) -> Result<u64, IndexError> {
        self.chromosomes
            .get(chromosome)
            .and_then(|c| c.seek(position))
            .ok_or_else(|| IndexError::NotFound(chromosome.to_string()))
    }

    #[must_use]
    pub fn chromosome(&self, name: &str) -> Option<&ChromosomeIndex> {
        self.chromosomes.get(name)
    }

    /// Chromosome names in database order
    pub fn chromosome_names(&self) -> impl Iterator<Item = &str> {
        self.chromosomes.keys().map(String::as_str)
    }

    #[must_use]
    pub fn header(&self) -> &VcfHeader {
        &self.header
    }

    #[must_use]
    pub fn stats(&self) -> IndexStats {
        self.stats
    }

    #[must_use]
    pub fn stride(&self) -> usize {
        self.stride
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.chromosomes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chromosomes.is_empty()
    }

    /// Write the index next to `database` (or wherever `path` says).
    ///
    /// # Errors
    ///
    /// Returns `IndexError::Io` if the file cannot be written or
    /// `IndexError::Decode` if serialization fails.
    pub fn save(&self, path: &Path, database: &Path) -> Result<(), IndexError> {
        let file = IndexFile {
            version: INDEX_VERSION,
            created_at: chrono::Utc::now().to_rfc3339(),
            fingerprint: DatabaseFingerprint::of(database)?,
            index: self.clone(),
        };
        let mut writer = BufWriter::new(File::create(path)?);
        sidecar_codec().serialize_into(&mut writer, &file)?;
        writer.flush()?;
        info!(path = %path.display(), "Saved database index");
        Ok(())
    }

    /// Load a sidecar index if it is compatible with and at least as new as
    /// `database`, and was built with `stride`. Returns `Ok(None)` for a
    /// missing, stale or incompatible sidecar.
    ///
    /// # Errors
    ///
    /// Returns `IndexError::Io` if the database metadata cannot be read.
    pub fn load_if_fresh(
        path: &Path,
        database: &Path,
        stride: usize,
    ) -> Result<Option<Self>, IndexError> {
        if !path.is_file() {
            return Ok(None);
        }

        let file: IndexFile = match read_index_file(path) {
            Ok(file) => file,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable index file");
                return Ok(None);
            }
        };

        if file.version != INDEX_VERSION {
            warn!(
                path = %path.display(),
                expected = INDEX_VERSION,
                found = file.version,
                "Index version mismatch, rebuilding"
            );
            return Ok(None);
        }

        if file.fingerprint != DatabaseFingerprint::of(database)? {
            info!(path = %path.display(), "Index is stale, rebuilding");
            return Ok(None);
        }

        if file.index.stride != stride {
            debug!(
                saved = file.index.stride,
                requested = stride,
                "Index stride differs, rebuilding"
            );
            return Ok(None);
        }

        debug!(path = %path.display(), created_at = %file.created_at, "Loaded database index");
        Ok(Some(file.index))
    }
}

/// Encoding shared by writer and reader
fn sidecar_codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .allow_trailing_bytes()
}

/// Decode a sidecar, refusing any length prefix larger than the file itself
/// so a damaged file fails to decode instead of exhausting memory.
fn read_index_file(path: &Path) -> Result<IndexFile, IndexError> {
    let file = File::open(path)?;
    let limit = file.metadata()?.len();
    Ok(sidecar_codec()
        .with_limit(limit)
        .deserialize_from(BufReader::new(file))?)
}

/// Default sidecar path: `<database>.vai`
#[must_use]
pub fn default_index_path(database: &Path) -> PathBuf {
    let mut name = database.as_os_str().to_owned();
    name.push(".");
    name.push(INDEX_SUFFIX);
    PathBuf::from(name)
}

/// Serializable sidecar format
#[derive(Debug, Serialize, Deserialize)]
struct IndexFile {
    version: u32,
    created_at: String,
    fingerprint: DatabaseFingerprint,
    index: PositionalIndex,
}

/// Identifies the exact database file an index was built from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct DatabaseFingerprint {
    len: u64,
    modified_nanos: Option<u128>,
}

impl DatabaseFingerprint {
    fn of(path: &Path) -> std::io::Result<Self> {
        let metadata = std::fs::metadata(path)?;
        let modified_nanos = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_nanos());
        Ok(Self {
            len: metadata.len(),
            modified_nanos,
        })
    }
}
