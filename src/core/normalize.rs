//! Allele normalization for position-independent comparison.
//!
//! Two records can describe the same change with different amounts of
//! flanking context, e.g. `chr2:500 ATG>A` and `chr2:499 CATG>CA`. Both
//! reduce to the same minimal triple once shared bases are trimmed:
//!
//! 1. Trim the longest common suffix.
//! 2. Trim the longest common prefix, moving the position forward by one for
//!    each base removed.
//!
//! Neither allele is ever trimmed to empty; one base always remains to anchor
//! the position. Symbolic alleles (`<DEL>`, `*`, breakends) are left alone and
//! only ever compare by exact token.

use crate::core::variant::{AlleleKind, NormalizedVariant, Variant};

/// Expand a variant into one normalized triple per alternate allele
#[must_use]
pub fn normalize(variant: &Variant) -> Vec<NormalizedVariant> {
    variant
        .alternate_alleles
        .iter()
        .enumerate()
        .map(|(allele_index, alternate)| {
            let (position, reference, alternate) =
                normalize_pair(variant.position, &variant.reference_allele, alternate);
            NormalizedVariant {
                position,
                reference,
                alternate,
                allele_index,
            }
        })
        .collect()
}

/// Normalize a single reference/alternate pair.
///
/// Sequence alleles are upper-cased before trimming. Idempotent: feeding the
/// output back in returns it unchanged.
#[must_use]
pub fn normalize_pair(position: u64, reference: &str, alternate: &str) -> (u64, String, String) {
    if AlleleKind::classify(reference) == AlleleKind::Symbolic
        || AlleleKind::classify(alternate) == AlleleKind::Symbolic
    {
        return (position, reference.to_string(), alternate.to_string());
    }

    let reference = reference.to_ascii_uppercase();
    let alternate = alternate.to_ascii_uppercase();
    let r = reference.as_bytes();
    let a = alternate.as_bytes();

    // Suffix first
    let mut end_r = r.len();
    let mut end_a = a.len();
    while end_r > 1 && end_a > 1 && r[end_r - 1] == a[end_a - 1] {
        end_r -= 1;
        end_a -= 1;
    }

    // Then prefix, bounded so one base is always left on each side
    let mut start = 0;
    while end_r - start > 1 && end_a - start > 1 && r[start] == a[start] {
        start += 1;
    }

    (
        position + start as u64,
        reference[start..end_r].to_string(),
        alternate[start..end_a].to_string(),
    )
}

/// Number of bases normalization may move a record of this reference length.
///
/// Prefix trimming can advance the position by at most `len - 1`.
#[must_use]
pub fn max_forward_shift(reference_len: usize) -> u64 {
    reference_len.saturating_sub(1) as u64
}
