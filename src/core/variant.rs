use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::utils::validation::is_nucleotide_sequence;

/// Ordered INFO key/value pairs. Flag entries map to the empty string.
pub type InfoFields = IndexMap<String, String>;

/// Number of fixed VCF columns (CHROM through INFO)
pub const FIXED_COLUMNS: usize = 8;

/// A single VCF data record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    /// Chromosome / contig name (CHROM)
    pub chromosome: String,

    /// 1-based leftmost coordinate of the reference allele (POS)
    pub position: u64,

    /// Record identifier (ID), `None` when the column is `.`
    pub identifier: Option<String>,

    /// Reference allele (REF)
    pub reference_allele: String,

    /// Alternate alleles in file order (ALT). Empty when the column is `.`
    pub alternate_alleles: Vec<String>,

    /// Raw QUAL column
    pub quality: String,

    /// Raw FILTER column
    pub filter: String,

    /// Parsed INFO column
    pub info: InfoFields,

    /// Every original tab-separated column, verbatim
    columns: Vec<String>,
}

impl Variant {
    /// Build a variant from already-split columns.
    ///
    /// The caller (the record parser) is responsible for validating the
    /// fixed columns; this only stores them.
    pub(crate) fn from_parts(
        columns: Vec<String>,
        position: u64,
        alternate_alleles: Vec<String>,
        info: InfoFields,
    ) -> Self {
        let identifier = match columns[2].as_str() {
            "." | "" => None,
            id => Some(id.to_string()),
        };

        Self {
            chromosome: columns[0].clone(),
            position,
            identifier,
            reference_allele: columns[3].clone(),
            alternate_alleles,
            quality: columns[5].clone(),
            filter: columns[6].clone(),
            info,
            columns,
        }
    }

    /// Original columns, untouched, for passthrough output
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Raw INFO column text
    #[must_use]
    pub fn info_text(&self) -> &str {
        &self.columns[7]
    }

    /// Look up a single INFO value. Flags return `Some("")`.
    #[must_use]
    pub fn info_value(&self, key: &str) -> Option<&str> {
        self.info.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn is_multiallelic(&self) -> bool {
        self.alternate_alleles.len() > 1
    }

    /// `chrom:pos` label used in diagnostics
    #[must_use]
    pub fn locus(&self) -> String {
        format!("{}:{}", self.chromosome, self.position)
    }
}

/// Kind of allele for comparison purposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlleleKind {
    /// Sequence over A, C, G, T, N (any case)
    Sequence,
    /// Symbolic or structural token (`<DEL>`, `*`, breakends, ...)
    Symbolic,
}

impl AlleleKind {
    #[must_use]
    pub fn classify(allele: &str) -> Self {
        if is_nucleotide_sequence(allele) {
            Self::Sequence
        } else {
            Self::Symbolic
        }
    }
}

/// Minimal (position, ref, alt) representation of one alternate allele
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NormalizedVariant {
    /// Position after prefix trimming
    pub position: u64,
    /// Trimmed reference allele
    pub reference: String,
    /// Trimmed alternate allele
    pub alternate: String,
    /// Index of the source allele in `Variant::alternate_alleles`
    pub allele_index: usize,
}

impl NormalizedVariant {
    /// Comparison key; allele index is provenance, not identity
    #[must_use]
    pub fn triple(&self) -> (u64, &str, &str) {
        (self.position, self.reference.as_str(), self.alternate.as_str())
    }

    /// Same locus with reference and alternate exchanged
    #[must_use]
    pub fn is_swap_of(&self, other: &NormalizedVariant) -> bool {
        self.position == other.position
            && self.reference == other.alternate
            && self.alternate == other.reference
    }
}
