//! Allele-specific INFO reduction.
//!
//! A multi-allelic database record carries per-allele INFO values for every
//! alternate allele. When only one of those alleles matched, the annotation
//! keeps just the values that belong to it:
//!
//! | Declared `Number` | Input         | Matched allele 2 |
//! |-------------------|---------------|------------------|
//! | `A`               | `AF=0.1,0.2`  | `AF=0.2`         |
//! | `R`               | `AD=5,3,2`    | `AD=5,2`         |
//! | dbSNP `FREQ`      | `FREQ=KG:0.9,0.06,0.04\|TOPMED:0.8,0.1,0.1` | `FREQ=KG:0.9,0.04\|TOPMED:0.8,0.1` |
//!
//! Values whose element count does not fit the declaration are left as-is.

use std::borrow::Cow;

use crate::core::variant::Variant;
use crate::parsing::vcf::{InfoNumber, VcfHeader};

/// dbSNP's per-source frequency key, `FREQ=source:ref,alt1,alt2|...`
pub const FREQ_KEY: &str = "FREQ";

/// Reduce one INFO value to the matched alternate allele.
///
/// `allele_index` is zero-based into the record's alternate alleles and
/// `alternate_count` is how many alternates the record has.
#[must_use]
pub fn reduce_value<'a>(
    key: &str,
    value: &'a str,
    number: Option<&InfoNumber>,
    allele_index: usize,
    alternate_count: usize,
) -> Cow<'a, str> {
    if alternate_count < 2 || value.is_empty() || allele_index >= alternate_count {
        return Cow::Borrowed(value);
    }

    if key == FREQ_KEY {
        return reduce_frequencies(value, allele_index, alternate_count)
            .map_or(Cow::Borrowed(value), Cow::Owned);
    }

    let values: Vec<&str> = value.split(',').collect();
    match number {
        Some(InfoNumber::PerAlternate) if values.len() == alternate_count => {
            Cow::Borrowed(values[allele_index])
        }
        Some(InfoNumber::PerAllele) if values.len() == alternate_count + 1 => {
            Cow::Owned(format!("{},{}", values[0], values[allele_index + 1]))
        }
        _ => Cow::Borrowed(value),
    }
}

/// Reduce `src:r,a1,a2|...` to `src:r,aN|...`; `None` if any source has the
/// wrong number of frequencies.
fn reduce_frequencies(value: &str, allele_index: usize, alternate_count: usize) -> Option<String> {
    let mut reduced = Vec::new();
    for source in value.split('|') {
        let (name, frequencies) = source.split_once(':')?;
        let frequencies: Vec<&str> = frequencies.split(',').collect();
        if frequencies.len() != alternate_count + 1 {
            return None;
        }
        reduced.push(format!(
            "{name}:{},{}",
            frequencies[0],
            frequencies[allele_index + 1]
        ));
    }
    Some(reduced.join("|"))
}

/// Value of `key` on a matched database record, reduced to `allele_index`.
/// Flags yield an empty string.
#[must_use]
pub fn matched_value<'a>(
    header: &VcfHeader,
    variant: &'a Variant,
    key: &str,
    allele_index: usize,
) -> Option<Cow<'a, str>> {
    let value = variant.info_value(key)?;
    let number = header.info_definition(key).map(|d| &d.number);
    Some(reduce_value(
        key,
        value,
        number,
        allele_index,
        variant.alternate_alleles.len(),
    ))
}

/// The record's INFO column with every allele-specific value reduced.
/// Entry order and flags are preserved; single-allele records come back
/// verbatim.
#[must_use]
pub fn reduced_info_text<'a>(
    header: &VcfHeader,
    variant: &'a Variant,
    allele_index: usize,
) -> Cow<'a, str> {
    let text = variant.info_text();
    if !variant.is_multiallelic() || text == "." || text.is_empty() {
        return Cow::Borrowed(text);
    }

    let alternate_count = variant.alternate_alleles.len();
    let entries: Vec<Cow<'_, str>> = text
        .split(';')
        .map(|entry| match entry.split_once('=') {
            Some((key, value)) => {
                let number = header.info_definition(key).map(|d| &d.number);
                match reduce_value(key, value, number, allele_index, alternate_count) {
                    Cow::Borrowed(v) if v == value => Cow::Borrowed(entry),
                    reduced => Cow::Owned(format!("{key}={reduced}")),
                }
            }
            None => Cow::Borrowed(entry),
        })
        .collect();

    Cow::Owned(entries.join(";"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::vcf::parse_record;

    fn header() -> VcfHeader {
        VcfHeader::from_text(
            "##fileformat=VCFv4.2\n\
##INFO=<ID=AF,Number=A,Type=Float,Description=\"Allele frequency\">\n\
##INFO=<ID=AD,Number=R,Type=Integer,Description=\"Allele depths\">\n\
##INFO=<ID=DP,Number=1,Type=Integer,Description=\"Depth\">\n\
##INFO=<ID=COMMON,Number=0,Type=Flag,Description=\"Common\">\n\
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n",
        )
    }

    #[test]
    fn test_per_alternate_reduction() {
        assert_eq!(
            reduce_value("AF", "0.1,0.2,0.3", Some(&InfoNumber::PerAlternate), 1, 3),
            "0.2"
        );
    }

    #[test]
    fn test_per_allele_reduction() {
        assert_eq!(
            reduce_value("AD", "5,3,2", Some(&InfoNumber::PerAllele), 1, 2),
            "5,2"
        );
    }

    #[test]
    fn test_freq_reduction() {
        assert_eq!(
            reduce_value(
                "FREQ",
                "1000Genomes:0.9,0.06,0.04|TOPMED:0.8,0.1,0.1",
                None,
                1,
                2
            ),
            "1000Genomes:0.9,0.04|TOPMED:0.8,0.1"
        );
    }

    #[test]
    fn test_inconsistent_counts_unchanged() {
        assert_eq!(
            reduce_value("AF", "0.1,0.2", Some(&InfoNumber::PerAlternate), 0, 3),
            "0.1,0.2"
        );
        assert_eq!(
            reduce_value("FREQ", "KG:0.9,0.1|GnomAD:0.8,0.1,0.1", None, 0, 2),
            "KG:0.9,0.1|GnomAD:0.8,0.1,0.1"
        );
        assert_eq!(reduce_value("FREQ", "no-source", None, 0, 2), "no-source");
    }

    #[test]
    fn test_single_allele_and_fixed_numbers_unchanged() {
        assert_eq!(
            reduce_value("AF", "0.1", Some(&InfoNumber::PerAlternate), 0, 1),
            "0.1"
        );
        assert_eq!(
            reduce_value("DP", "40", Some(&InfoNumber::Count(1)), 1, 2),
            "40"
        );
        assert_eq!(reduce_value("XX", "1,2", None, 1, 2), "1,2");
    }

    #[test]
    fn test_matched_value() {
        let variant = parse_record(
            "chr1\t100\trs1\tA\tG,T\t.\t.\tAF=0.1,0.2;DP=40;COMMON;FREQ=KG:0.7,0.1,0.2",
        )
        .unwrap();
        let header = header();

        assert_eq!(
            matched_value(&header, &variant, "AF", 1).as_deref(),
            Some("0.2")
        );
        assert_eq!(
            matched_value(&header, &variant, "DP", 1).as_deref(),
            Some("40")
        );
        assert_eq!(
            matched_value(&header, &variant, "COMMON", 1).as_deref(),
            Some("")
        );
        assert_eq!(
            matched_value(&header, &variant, "FREQ", 0).as_deref(),
            Some("KG:0.7,0.1")
        );
        assert!(matched_value(&header, &variant, "MISSING", 0).is_none());
    }

    #[test]
    fn test_reduced_info_text() {
        let variant = parse_record(
            "chr1\t100\trs1\tA\tG,T\t.\t.\tAF=0.1,0.2;AD=5,3,2;DP=40;COMMON;FREQ=KG:0.7,0.1,0.2",
        )
        .unwrap();
        assert_eq!(
            reduced_info_text(&header(), &variant, 1),
            "AF=0.2;AD=5,2;DP=40;COMMON;FREQ=KG:0.7,0.2"
        );
    }

    #[test]
    fn test_reduced_info_text_single_allele_verbatim() {
        let variant = parse_record("chr1\t100\trs1\tA\tG\t.\t.\tAF=0.1;COMMON").unwrap();
        assert!(matches!(
            reduced_info_text(&header(), &variant, 0),
            Cow::Borrowed("AF=0.1;COMMON")
        ));
    }
}
