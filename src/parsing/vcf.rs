//! Parser for VCF data lines and the header lines the annotator needs.
//!
//! Data lines are split on tabs into the eight fixed columns plus any
//! FORMAT/sample columns:
//! `CHROM  POS  ID  REF  ALT  QUAL  FILTER  INFO  [FORMAT  SAMPLE...]`
//!
//! Header lines start with `#`. Of those, only `##INFO=<...>` definitions and
//! the `#CHROM` column line carry information the annotator uses; everything
//! else is kept verbatim.

use std::borrow::Cow;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::core::variant::{InfoFields, Variant, FIXED_COLUMNS};
use crate::utils::validation::is_unusual_allele;

/// The eight mandatory VCF column names
pub const STANDARD_COLUMNS: [&str; FIXED_COLUMNS] =
    ["#CHROM", "POS", "ID", "REF", "ALT", "QUAL", "FILTER", "INFO"];

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    #[error("Expected a data record, found a header line")]
    HeaderLine,

    #[error("Line is not valid UTF-8: {0}")]
    InvalidEncoding(#[from] std::str::Utf8Error),
}

/// Outcome of parsing one line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedLine {
    /// `#`-prefixed meta or column line; produces no variant
    Header,
    /// A data record
    Record(Variant),
}

/// Parse one line of a VCF file.
///
/// Header lines are reported as [`ParsedLine::Header`] rather than as errors
/// so callers can skip them without touching their malformed-line counters.
/// Blank lines count as header lines for the same reason.
///
/// # Errors
///
/// Returns `ParseError::MalformedRecord` if fewer than eight columns are
/// present, the position is not a positive integer, or CHROM/REF/ALT (or an
/// allele inside ALT) is empty.
pub fn parse_line(line: &str) -> Result<ParsedLine, ParseError> {
    let line = line.trim_end_matches(['\n', '\r']);
    if line.starts_with('#') || line.is_empty() {
        return Ok(ParsedLine::Header);
    }
    parse_data_line(line, true).map(ParsedLine::Record)
}

/// Parse a line as [`parse_line`] does, but leave the INFO map empty and skip
/// the unusual-allele warnings. The raw INFO text is still available through
/// [`Variant::info_text`].
///
/// # Errors
///
/// As [`parse_line`].
pub fn parse_line_without_info(line: &str) -> Result<ParsedLine, ParseError> {
    let line = line.trim_end_matches(['\n', '\r']);
    if line.starts_with('#') || line.is_empty() {
        return Ok(ParsedLine::Header);
    }
    parse_data_line(line, false).map(ParsedLine::Record)
}

/// Decode a raw line read from disk.
///
/// `#` lines are decoded lossily so a stray byte in a header description
/// cannot hide the column line. Data lines must be valid UTF-8.
///
/// # Errors
///
/// Returns `ParseError::InvalidEncoding` for a data line that is not UTF-8.
pub fn decode_line(bytes: &[u8]) -> Result<Cow<'_, str>, ParseError> {
    if bytes.first() == Some(&b'#') {
        return Ok(String::from_utf8_lossy(bytes));
    }
    Ok(Cow::Borrowed(std::str::from_utf8(bytes)?))
}

/// Parse a line that must be a data record.
///
/// # Errors
///
/// Returns `ParseError::HeaderLine` for `#` lines, otherwise as [`parse_line`].
pub fn parse_record(line: &str) -> Result<Variant, ParseError> {
    match parse_line(line)? {
        ParsedLine::Record(variant) => Ok(variant),
        ParsedLine::Header => Err(ParseError::HeaderLine),
    }
}

fn parse_data_line(line: &str, full: bool) -> Result<Variant, ParseError> {
    let columns: Vec<String> = line.split('\t').map(str::to_string).collect();

    if columns.len() < FIXED_COLUMNS {
        return Err(ParseError::MalformedRecord(format!(
            "expected at least {FIXED_COLUMNS} tab-separated columns, found {}",
            columns.len()
        )));
    }

    if columns[0].is_empty() {
        return Err(ParseError::MalformedRecord("empty CHROM".to_string()));
    }

    let position: u64 = columns[1].parse().map_err(|_| {
        ParseError::MalformedRecord(format!("non-numeric POS '{}'", columns[1]))
    })?;
    if position == 0 {
        return Err(ParseError::MalformedRecord(format!(
            "POS must be 1-based, found 0 at {}",
            columns[0]
        )));
    }

    let reference = &columns[3];
    if reference.is_empty() || reference == "." {
        return Err(ParseError::MalformedRecord(format!(
            "empty REF at {}:{position}",
            columns[0]
        )));
    }

    let alternate_alleles = parse_alternates(&columns[4]).ok_or_else(|| {
        ParseError::MalformedRecord(format!(
            "empty ALT allele in '{}' at {}:{position}",
            columns[4], columns[0]
        ))
    })?;

    if !full {
        let info = InfoFields::new();
        return Ok(Variant::from_parts(columns, position, alternate_alleles, info));
    }

    if is_unusual_allele(reference) {
        warn!(
            chrom = %columns[0],
            pos = position,
            allele = %reference,
            "Unexpected symbol in reference allele"
        );
    }
    for alt in &alternate_alleles {
        if is_unusual_allele(alt) {
            warn!(
                chrom = %columns[0],
                pos = position,
                allele = %alt,
                "Unexpected symbol in alternate allele"
            );
        }
    }

    let info = parse_info(&columns[7]);

    Ok(Variant::from_parts(columns, position, alternate_alleles, info))
}

/// Split the ALT column. `.` means no alternate alleles.
/// Returns `None` if the column or any allele in it is empty.
fn parse_alternates(alt: &str) -> Option<Vec<String>> {
    if alt == "." {
        return Some(Vec::new());
    }
    let alleles: Vec<String> = alt.split(',').map(str::to_string).collect();
    if alleles.iter().any(String::is_empty) {
        None
    } else {
        Some(alleles)
    }
}

/// Parse an INFO column into ordered key/value pairs.
///
/// `.` and empty columns give an empty map; flags map to `""`.
#[must_use]
pub fn parse_info(info: &str) -> InfoFields {
    let mut fields = InfoFields::new();
    if info == "." || info.is_empty() {
        return fields;
    }
    for entry in info.split(';').filter(|e| !e.is_empty()) {
        match entry.split_once('=') {
            Some((key, value)) => fields.insert(key.to_string(), value.to_string()),
            None => fields.insert(entry.to_string(), String::new()),
        };
    }
    fields
}

/// `Number=` cardinality of an INFO field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InfoNumber {
    /// One value per alternate allele
    PerAlternate,
    /// One value per allele including the reference
    PerAllele,
    /// One value per genotype
    PerGenotype,
    /// Fixed count
    Count(u32),
    /// Unbounded (`.`)
    Unknown,
}

impl InfoNumber {
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "A" => Self::PerAlternate,
            "R" => Self::PerAllele,
            "G" => Self::PerGenotype,
            other => other.parse().map_or(Self::Unknown, Self::Count),
        }
    }
}

/// An `##INFO=<ID=...,Number=...,Type=...,Description="...">` definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoDefinition {
    pub id: String,
    pub number: InfoNumber,
    pub description: Option<String>,
}

/// The parts of a VCF header used for output columns and INFO handling
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VcfHeader {
    /// `##` lines, verbatim and in order
    pub meta_lines: Vec<String>,

    /// Names from the `#CHROM` line (leading `#` kept on the first)
    pub columns: Vec<String>,

    /// INFO definitions keyed by ID, in header order
    pub info: IndexMap<String, InfoDefinition>,
}

impl VcfHeader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse every header line in a block of text, stopping at the first
    /// data record.
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        let mut header = Self::new();
        for line in text.lines() {
            if !header.push_line(line) {
                break;
            }
        }
        header
    }

    /// Feed one line. Returns `false` if the line is not a header line.
    pub fn push_line(&mut self, line: &str) -> bool {
        let line = line.trim_end_matches(['\n', '\r']);
        if let Some(meta) = line.strip_prefix("##") {
            if meta.starts_with("INFO=") {
                match parse_info_definition(line) {
                    Some(def) => {
                        self.info.insert(def.id.clone(), def);
                    }
                    None => warn!(line = %line, "Ignoring malformed INFO header line"),
                }
            }
            self.meta_lines.push(line.to_string());
            true
        } else if line.starts_with("#CHROM") {
            self.columns = line.split('\t').map(str::to_string).collect();
            true
        } else {
            line.starts_with('#')
        }
    }

    /// Column names for data rows; the standard eight when no `#CHROM` line
    /// was seen.
    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        if self.columns.is_empty() {
            STANDARD_COLUMNS.iter().map(|s| (*s).to_string()).collect()
        } else {
            self.columns.clone()
        }
    }

    #[must_use]
    pub fn info_definition(&self, id: &str) -> Option<&InfoDefinition> {
        self.info.get(id)
    }
}

/// Parse a single `##INFO=<...>` line
fn parse_info_definition(line: &str) -> Option<InfoDefinition> {
    // Format: ##INFO=<ID=AF,Number=A,Type=Float,Description="Allele frequency, per ALT">
    let content = line
        .strip_prefix("##INFO=<")
        .and_then(|s| s.strip_suffix('>'))?;

    let mut id: Option<String> = None;
    let mut number = InfoNumber::Unknown;
    let mut description: Option<String> = None;

    for part in split_structured_fields(content) {
        if let Some((key, value)) = part.split_once('=') {
            let value = value.trim().trim_matches('"');
            match key.trim() {
                "ID" => id = Some(value.to_string()),
                "Number" => number = InfoNumber::parse(value),
                "Description" => description = Some(value.to_string()),
                _ => {}
            }
        }
    }

    id.filter(|id| !id.is_empty()).map(|id| InfoDefinition {
        id,
        number,
        description,
    })
}

/// Split structured header fields, handling commas inside quoted values.
///
/// This is UTF-8 safe because:
/// - Commas are single-byte ASCII (0x2C)
/// - `char_indices()` yields byte positions at character boundaries
/// - After a comma at position `i`, `i + 1` is always a valid boundary
fn split_structured_fields(content: &str) -> Vec<&str> {
    let mut fields = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;

    for (i, c) in content.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                fields.push(&content[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }

    if start <= content.len() {
        fields.push(&content[start..]);
    }

    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_record() {
        let v = parse_record("chr1\t100\trs123\tA\tG\t50\tPASS\tDP=10;DB").unwrap();
        assert_eq!(v.chromosome, "chr1");
        assert_eq!(v.position, 100);
        assert_eq!(v.identifier.as_deref(), Some("rs123"));
        assert_eq!(v.reference_allele, "A");
        assert_eq!(v.alternate_alleles, vec!["G".to_string()]);
        assert_eq!(v.quality, "50");
        assert_eq!(v.filter, "PASS");
        assert_eq!(v.info_value("DP"), Some("10"));
        assert_eq!(v.info_value("DB"), Some(""));
        assert_eq!(v.info_value("AF"), None);
        assert_eq!(v.columns().len(), 8);
    }

    #[test]
    fn test_parse_record_with_samples() {
        let line = "2\t5\t.\tC\tT,G\t.\t.\t.\tGT\t0/1\t1/2";
        let v = parse_record(line).unwrap();
        assert!(v.identifier.is_none());
        assert_eq!(v.alternate_alleles.len(), 2);
        assert!(v.is_multiallelic());
        assert!(v.info.is_empty());
        assert_eq!(v.columns().len(), 11);
        assert_eq!(v.columns().join("\t"), line);
    }

    #[test]
    fn test_info_order_preserved() {
        let v = parse_record("1\t1\t.\tA\tC\t.\t.\tZ=1;A=2;M=3").unwrap();
        let keys: Vec<&str> = v.info.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["Z", "A", "M"]);
        assert_eq!(v.info_text(), "Z=1;A=2;M=3");
    }

    #[test]
    fn test_header_lines_are_not_errors() {
        assert_eq!(parse_line("##fileformat=VCFv4.2"), Ok(ParsedLine::Header));
        assert_eq!(
            parse_line("#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO"),
            Ok(ParsedLine::Header)
        );
        assert_eq!(parse_line(""), Ok(ParsedLine::Header));
        assert_eq!(parse_record("##x"), Err(ParseError::HeaderLine));
    }

    #[test]
    fn test_parse_without_info_keeps_raw_text() {
        let line = "chr1\t100\trs1\tA\tG\t.\t.\tAF=0.5;DB";
        let ParsedLine::Record(v) = parse_line_without_info(line).unwrap() else {
            panic!("expected a record");
        };
        assert!(v.info.is_empty());
        assert_eq!(v.info_text(), "AF=0.5;DB");
        assert_eq!(v.alternate_alleles, vec!["G".to_string()]);
        assert_eq!(parse_line_without_info("#CHROM"), Ok(ParsedLine::Header));
        assert!(parse_line_without_info("chr1\tx\t.\tA\tG\t.\t.\t.").is_err());
    }

    #[test]
    fn test_decode_line() {
        assert_eq!(decode_line(b"chr1\t1\n").unwrap(), "chr1\t1\n");
        assert!(matches!(
            decode_line(b"chr1\t1\t.\tA\tG\t.\t.\tNOTE=caf\xe9\n"),
            Err(ParseError::InvalidEncoding(_))
        ));
        // A bad byte in a header line is replaced rather than rejected
        let header = decode_line(b"##INFO=<ID=X,Description=\"caf\xe9\">\n").unwrap();
        assert!(header.starts_with("##INFO=<ID=X"));
        assert!(header.contains('\u{fffd}'));
    }

    #[test]
    fn test_crlf_stripped() {
        let v = parse_record("chr1\t100\t.\tA\tG\t.\t.\tDP=3\r\n").unwrap();
        assert_eq!(v.info_value("DP"), Some("3"));
        assert_eq!(v.columns()[7], "DP=3");
    }

    #[test]
    fn test_missing_alt_is_empty_list() {
        let v = parse_record("chr1\t100\t.\tA\t.\t.\t.\t.").unwrap();
        assert!(v.alternate_alleles.is_empty());
    }

    #[test]
    fn test_symbolic_alts_accepted() {
        let v = parse_record("chr1\t100\t.\tA\t<DEL>,*\t.\t.\t.").unwrap();
        assert_eq!(v.alternate_alleles, vec!["<DEL>".to_string(), "*".to_string()]);
    }

    #[test]
    fn test_malformed_records() {
        let cases = [
            "chr1\t100\t.\tA\tG",                // too few columns
            "chr1\tabc\t.\tA\tG\t.\t.\t.",        // non-numeric pos
            "chr1\t0\t.\tA\tG\t.\t.\t.",          // zero pos
            "chr1\t-5\t.\tA\tG\t.\t.\t.",         // negative pos
            "\t100\t.\tA\tG\t.\t.\t.",            // empty chrom
            "chr1\t100\t.\t\tG\t.\t.\t.",         // empty ref
            "chr1\t100\t.\tA\t\t.\t.\t.",         // empty alt
            "chr1\t100\t.\tA\tG,,T\t.\t.\t.",     // empty allele inside list
        ];
        for line in cases {
            assert!(
                matches!(parse_line(line), Err(ParseError::MalformedRecord(_))),
                "expected malformed: {line:?}"
            );
        }
    }

    #[test]
    fn test_parse_header() {
        let vcf = r#"##fileformat=VCFv4.2
##INFO=<ID=AF,Number=A,Type=Float,Description="Allele frequency, per ALT">
##INFO=<ID=FREQ,Number=.,Type=String,Description="Frequencies">
##INFO=<ID=AC,Number=R,Type=Integer,Description="Counts">
##INFO=<ID=NS,Number=1,Type=Integer,Description="Samples">
#CHROM	POS	ID	REF	ALT	QUAL	FILTER	INFO	FORMAT	S1
chr1	1	.	A	C	.	.	.	GT	0/1
"#;
        let header = VcfHeader::from_text(vcf);
        assert_eq!(header.meta_lines.len(), 5);
        assert_eq!(header.columns.len(), 10);
        assert_eq!(header.columns[9], "S1");
        assert_eq!(header.info.len(), 4);

        let af = header.info_definition("AF").unwrap();
        assert_eq!(af.number, InfoNumber::PerAlternate);
        assert_eq!(af.description.as_deref(), Some("Allele frequency, per ALT"));
        assert_eq!(header.info_definition("FREQ").unwrap().number, InfoNumber::Unknown);
        assert_eq!(header.info_definition("AC").unwrap().number, InfoNumber::PerAllele);
        assert_eq!(header.info_definition("NS").unwrap().number, InfoNumber::Count(1));
    }

    #[test]
    fn test_default_column_names() {
        let header = VcfHeader::new();
        assert_eq!(header.column_names().len(), 8);
        assert_eq!(header.column_names()[0], "#CHROM");
    }

    #[test]
    fn test_malformed_info_definition_skipped() {
        let header = VcfHeader::from_text("##INFO=<Number=1>\n##INFO=broken\n");
        assert!(header.info.is_empty());
        assert_eq!(header.meta_lines.len(), 2);
    }

    #[test]
    fn test_split_structured_fields() {
        let fields = split_structured_fields(r#"ID=X,Number=1,Description="foo,bar""#);
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[0], "ID=X");
        assert_eq!(fields[1], "Number=1");
        assert_eq!(fields[2], r#"Description="foo,bar""#);
    }

    #[test]
    fn test_split_structured_fields_utf8() {
        let fields = split_structured_fields("ID=α,Number=1,Description=日本語");
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[2], "Description=日本語");
    }
}
