use std::io;

use crate::core::variant::Variant;
use crate::parsing::source::LineSource;
use crate::parsing::vcf::{decode_line, parse_line_without_info, ParsedLine};

/// A private read position over the database.
///
/// Each matching worker owns one cursor; nothing about it is shared, so
/// concurrent workers never disturb each other's file position.
pub struct DatabaseCursor<S> {
    source: S,
    buf: Vec<u8>,
    /// Offset of the most recently returned record
    last_offset: Option<u64>,
    /// Chromosome and position of the most recently returned record
    last: Option<(String, u64)>,
}

impl<S: LineSource> DatabaseCursor<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            buf: Vec::new(),
            last_offset: None,
            last: None,
        }
    }

    /// Move to an offset taken from the positional index.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the underlying seek fails.
    pub fn seek(&mut self, offset: u64) -> io::Result<()> {
        self.source.seek_to(offset)?;
        self.last_offset = None;
        self.last = None;
        Ok(())
    }

    /// Read the next well-formed record, skipping header and malformed lines.
    /// Returns `None` at end of file.
    ///
    /// Malformed lines were already counted when the index was built, so they
    /// are passed over silently here. Records come back with an empty INFO
    /// map; the raw column is kept in [`Variant::info_text`].
    ///
    /// # Errors
    ///
    /// Returns an IO error if reading fails.
    pub fn next_record(&mut self) -> io::Result<Option<Variant>> {
        loop {
            let offset = self.source.offset();
            self.buf.clear();
            if self.source.read_line(&mut self.buf)? == 0 {
                return Ok(None);
            }
            let parsed = decode_line(&self.buf).and_then(|text| parse_line_without_info(&text));
            if let Ok(ParsedLine::Record(variant)) = parsed {
                self.last_offset = Some(offset);
                self.last = Some((variant.chromosome.clone(), variant.position));
                return Ok(Some(variant));
            }
        }
    }

    /// Locus of the most recently returned record
    #[must_use]
    pub fn last_locus(&self) -> Option<(&str, u64)> {
        self.last.as_ref().map(|(c, p)| (c.as_str(), *p))
    }

    /// Offset of the most recently returned record
    #[must_use]
    pub fn last_offset(&self) -> Option<u64> {
        self.last_offset
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::parsing::source::PlainLines;

    const DB: &[u8] = b"##fileformat=VCFv4.2\n\
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n\
chr1\t100\trs1\tA\tG\t.\t.\t.\n\
chr1\tbad\trs2\tA\tG\t.\t.\t.\n\
chr1\t150\trs4\tA\tG\t.\t.\tNOTE=caf\xe9\n\
chr1\t200\trs3\tC\tT\t.\t.\t.\n";

    fn cursor() -> DatabaseCursor<PlainLines<Cursor<Vec<u8>>>> {
        DatabaseCursor::new(PlainLines::new(Cursor::new(DB.to_vec())))
    }

    #[test]
    fn test_skips_headers_and_malformed_lines() {
        let mut cursor = cursor();
        let first = cursor.next_record().unwrap().unwrap();
        assert_eq!(first.identifier.as_deref(), Some("rs1"));
        assert!(first.info.is_empty());
        assert_eq!(cursor.last_locus(), Some(("chr1", 100)));

        let second = cursor.next_record().unwrap().unwrap();
        assert_eq!(second.identifier.as_deref(), Some("rs3"));
        assert!(cursor.next_record().unwrap().is_none());
    }

    #[test]
    fn test_seek_rereads_record() {
        let mut cursor = cursor();
        cursor.next_record().unwrap();
        cursor.next_record().unwrap();
        let offset = cursor.last_offset().unwrap();
        let expected = DB.windows(8).position(|w| w == b"chr1\t200").unwrap();
        assert_eq!(offset, expected as u64);

        cursor.seek(0).unwrap();
        assert!(cursor.last_locus().is_none());
        cursor.seek(offset).unwrap();
        let again = cursor.next_record().unwrap().unwrap();
        assert_eq!(again.position, 200);
    }
}
