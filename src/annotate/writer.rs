use std::io::{self, Write};

use serde::Serialize;
use tracing::warn;

use crate::annotate::info::{matched_value, reduced_info_text};
use crate::matching::MatchResult;
use crate::parsing::vcf::VcfHeader;
use crate::utils::validation::{sanitize_field, validate_column_name, ValidationError};

/// Default prefix for annotation columns
pub const DEFAULT_PREFIX: &str = "snp";

/// Default text for absent annotation values
pub const DEFAULT_MISSING_VALUE: &str = "";

/// Value written for a requested INFO flag that is present
pub const FLAG_PRESENT: &str = "1";

/// Fixed annotation columns, after the prefix
const ANNOTATION_COLUMNS: [&str; 5] = ["id", "pos", "ref", "alt", "info"];

/// Output layout options
#[derive(Debug, Clone, Serialize)]
pub struct WriterConfig {
    /// Prefix for annotation column names
    pub prefix: String,
    /// Placeholder for values that are absent or unmatched
    pub missing_value: String,
    /// Database INFO keys to project into their own columns
    pub info_fields: Vec<String>,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            missing_value: DEFAULT_MISSING_VALUE.to_string(),
            info_fields: Vec::new(),
        }
    }
}

impl WriterConfig {
    /// Check the prefix and every requested INFO key.
    ///
    /// # Errors
    ///
    /// Returns the first `ValidationError` found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_column_name(&self.prefix)?;
        for key in &self.info_fields {
            validate_column_name(key)?;
        }
        Ok(())
    }

    /// Annotation column names in output order
    #[must_use]
    pub fn annotation_columns(&self) -> Vec<String> {
        ANNOTATION_COLUMNS
            .iter()
            .map(|c| (*c).to_string())
            .chain(self.info_fields.iter().cloned())
            .map(|c| format!("{}_{c}", self.prefix))
            .collect()
    }
}

/// Writes one tab-separated row per match result, in the order given.
///
/// Each row is the input record's original columns followed by the
/// annotation columns. Rows with fewer columns than the header are padded
/// with the missing value and rows with more are cut to the header width, so
/// the annotation values always sit under their own column names.
pub struct AnnotationWriter<'h, W: Write> {
    out: W,
    config: WriterConfig,
    missing: String,
    /// Database header, for allele-specific INFO reduction
    database_header: &'h VcfHeader,
    width: usize,
    /// Set once a row wider than the header has been reported
    truncation_reported: bool,
    line: String,
    rows: u64,
    matched: u64,
}

impl<'h, W: Write> AnnotationWriter<'h, W> {
    pub fn new(out: W, config: WriterConfig, database_header: &'h VcfHeader) -> Self {
        let missing = sanitize_field(&config.missing_value).into_owned();
        Self {
            out,
            config,
            missing,
            database_header,
            width: 0,
            truncation_reported: false,
            line: String::new(),
            rows: 0,
            matched: 0,
        }
    }

    /// Write the header row: the input's `#CHROM` columns (or the eight
    /// fixed VCF columns) followed by the annotation columns.
    ///
    /// Requested INFO keys the database does not declare are reported but
    /// keep their column.
    ///
    /// # Errors
    ///
    /// Returns an IO error if writing fails.
    pub fn write_header(&mut self, input_header: &VcfHeader) -> io::Result<()> {
        for key in &self.config.info_fields {
            if self.database_header.info_definition(key).is_none() {
                warn!(key = %key, "INFO field is not declared in the database header");
            }
        }

        let mut columns = input_header.column_names();
        self.width = columns.len();
        columns.extend(self.config.annotation_columns());
        writeln!(self.out, "{}", columns.join("\t"))
    }

    /// Write one row.
    ///
    /// # Errors
    ///
    /// Returns an IO error if writing fails.
    pub fn emit(&mut self, result: &MatchResult) -> io::Result<()> {
        self.line.clear();

        let mut columns = result.input.columns();
        if self.width > 0 && columns.len() > self.width {
            if !self.truncation_reported {
                warn!(
                    locus = %result.input.locus(),
                    columns = columns.len(),
                    header_columns = self.width,
                    "Input rows have more columns than the header; extra columns are dropped"
                );
                self.truncation_reported = true;
            }
            columns = &columns[..self.width];
        }
        for (i, column) in columns.iter().enumerate() {
            if i > 0 {
                self.line.push('\t');
            }
            self.line.push_str(column);
        }
        for _ in columns.len()..self.width {
            self.line.push('\t');
            self.line.push_str(&self.missing);
        }

        match &result.matched {
            Some(m) => {
                let variant = &m.variant;
                let position = variant.position.to_string();
                let alternate = variant
                    .alternate_alleles
                    .get(m.allele_index)
                    .map(String::as_str);
                let info = reduced_info_text(self.database_header, variant, m.allele_index);

                self.push_value(variant.identifier.as_deref());
                self.push_value(Some(position.as_str()));
                self.push_value(Some(variant.reference_allele.as_str()));
                self.push_value(alternate);
                self.push_value(Some(info.as_ref()));

                for i in 0..self.config.info_fields.len() {
                    let value = matched_value(
                        self.database_header,
                        variant,
                        &self.config.info_fields[i],
                        m.allele_index,
                    );
                    let value = match value.as_deref() {
                        Some("") => Some(FLAG_PRESENT),
                        other => other,
                    };
                    self.push_value(value);
                }
                self.matched += 1;
            }
            None => {
                for _ in 0..ANNOTATION_COLUMNS.len() + self.config.info_fields.len() {
                    self.push_value(None);
                }
            }
        }

        self.line.push('\n');
        self.out.write_all(self.line.as_bytes())?;
        self.rows += 1;
        Ok(())
    }

    fn push_value(&mut self, value: Option<&str>) {
        self.line.push('\t');
        match value {
            Some(v) => self.line.push_str(&sanitize_field(v)),
            None => self.line.push_str(&self.missing),
        }
    }

    /// Rows written so far, excluding the header
    #[must_use]
    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Rows that carried a database match
    #[must_use]
    pub fn matched(&self) -> u64 {
        self.matched
    }

    /// Flush buffered output.
    ///
    /// # Errors
    ///
    /// Returns an IO error if flushing fails.
    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::AlleleMatch;
    use crate::parsing::vcf::parse_record;

    fn database_header() -> VcfHeader {
        VcfHeader::from_text(
            "##INFO=<ID=AF,Number=A,Type=Float,Description=\"Allele frequency\">\n\
##INFO=<ID=COMMON,Number=0,Type=Flag,Description=\"Common\">\n\
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n",
        )
    }

    fn matched(input: &str, db: &str, allele_index: usize) -> MatchResult {
        MatchResult {
            input: parse_record(input).unwrap(),
            matched: Some(AlleleMatch {
                variant: parse_record(db).unwrap(),
                allele_index,
                query_allele_index: 0,
                distance: 0,
                swapped: false,
            }),
        }
    }

    fn render(config: WriterConfig, results: &[MatchResult]) -> String {
        let db_header = database_header();
        let mut out = Vec::new();
        let mut writer = AnnotationWriter::new(&mut out, config, &db_header);
        writer.write_header(&VcfHeader::new()).unwrap();
        for r in results {
            writer.emit(r).unwrap();
        }
        writer.flush().unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_header_defaults_to_fixed_columns() {
        let text = render(WriterConfig::default(), &[]);
        assert_eq!(
            text,
            "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tsnp_id\tsnp_pos\tsnp_ref\tsnp_alt\tsnp_info\n"
        );
    }

    #[test]
    fn test_matched_row() {
        let result = matched(
            "chr1\t100\t.\tA\tT\t50\tPASS\tDP=10",
            "chr1\t100\trs1\tA\tG,T\t.\t.\tAF=0.1,0.2;COMMON",
            1,
        );
        let config = WriterConfig {
            info_fields: vec!["AF".to_string(), "COMMON".to_string()],
            ..WriterConfig::default()
        };
        let text = render(config, &[result]);
        let row = text.lines().nth(1).unwrap();
        assert_eq!(
            row,
            "chr1\t100\t.\tA\tT\t50\tPASS\tDP=10\trs1\t100\tA\tT\tAF=0.2;COMMON\t0.2\t1"
        );
    }

    #[test]
    fn test_unmatched_row_uses_missing_value() {
        let result = MatchResult::unmatched(parse_record("chr9\t5\t.\tC\tG\t.\t.\t.").unwrap());
        let config = WriterConfig {
            missing_value: "\\N".to_string(),
            info_fields: vec!["AF".to_string()],
            ..WriterConfig::default()
        };
        let text = render(config, &[result]);
        let row = text.lines().nth(1).unwrap();
        assert_eq!(row, "chr9\t5\t.\tC\tG\t.\t.\t.\t\\N\t\\N\t\\N\t\\N\t\\N\t\\N");
    }

    #[test]
    fn test_absent_identifier_and_info_key() {
        let result = matched(
            "chr1\t100\t.\tA\tG\t.\t.\t.",
            "chr1\t100\t.\tA\tG\t.\t.\tDP=3",
            0,
        );
        let config = WriterConfig {
            info_fields: vec!["AF".to_string()],
            ..WriterConfig::default()
        };
        let text = render(config, &[result]);
        let row = text.lines().nth(1).unwrap();
        assert_eq!(row, "chr1\t100\t.\tA\tG\t.\t.\t.\t\t100\tA\tG\tDP=3\t");
    }

    #[test]
    fn test_custom_prefix_and_input_columns() {
        let db_header = database_header();
        let input_header = VcfHeader::from_text(
            "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tSAMPLE1\n",
        );
        let mut out = Vec::new();
        let config = WriterConfig {
            prefix: "dbsnp".to_string(),
            info_fields: vec!["AF".to_string()],
            ..WriterConfig::default()
        };
        let mut writer = AnnotationWriter::new(&mut out, config, &db_header);
        writer.write_header(&input_header).unwrap();
        writer
            .emit(&MatchResult::unmatched(
                parse_record("chr1\t1\t.\tA\tG\t.\t.\t.").unwrap(),
            ))
            .unwrap();
        assert_eq!(writer.rows(), 1);
        assert_eq!(writer.matched(), 0);

        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert!(lines
            .next()
            .unwrap()
            .ends_with("SAMPLE1\tdbsnp_id\tdbsnp_pos\tdbsnp_ref\tdbsnp_alt\tdbsnp_info\tdbsnp_AF"));
        // Short row padded to the header width
        assert_eq!(lines.next().unwrap().split('\t').count(), 16);
    }

    #[test]
    fn test_wide_row_cut_to_header_width() {
        let db_header = database_header();
        let mut out = Vec::new();
        let mut writer = AnnotationWriter::new(&mut out, WriterConfig::default(), &db_header);
        writer.write_header(&VcfHeader::new()).unwrap();
        for line in [
            "chr1\t1\t.\tA\tG\t.\t.\t.\tGT\t0/1",
            "chr1\t2\t.\tA\tG\t.\t.\t.\tGT\t1/1\t0/0",
        ] {
            writer
                .emit(&MatchResult::unmatched(parse_record(line).unwrap()))
                .unwrap();
        }
        writer.flush().unwrap();

        let text = String::from_utf8(out).unwrap();
        let widths: Vec<usize> = text.lines().map(|l| l.split('\t').count()).collect();
        assert_eq!(widths, vec![13, 13, 13]);
        assert_eq!(text.lines().nth(2).unwrap(), "chr1\t2\t.\tA\tG\t.\t.\t.\t\t\t\t\t");
    }

    #[test]
    fn test_validate_config() {
        assert!(WriterConfig::default().validate().is_ok());
        let bad = WriterConfig {
            info_fields: vec!["A F".to_string()],
            ..WriterConfig::default()
        };
        assert!(matches!(
            bad.validate(),
            Err(ValidationError::InvalidName(_))
        ));
    }
}
