//! Report decoding - UTF-16 byte stream to raw rows
//!
//! Format of a published report:
//! - UTF-16 text (byte-order mark optional, little-endian without one)
//! - Stray U+0000 characters scattered through the text
//! - One header line, then one record per line
//! - Each record is a CSV line whose first field holds the TAB-separated columns
//!
//! Decoding is lenient: a record the CSV layer cannot read is logged and skipped.

use crate::domain::point::RawRow;
use std::io::{self, Read};
use tracing::{debug, warn};

const CHUNK_SIZE: usize = 8 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    #[inline]
    fn unit(self, pair: &[u8]) -> u16 {
        match self {
            ByteOrder::Little => u16::from_le_bytes([pair[0], pair[1]]),
            ByteOrder::Big => u16::from_be_bytes([pair[0], pair[1]]),
        }
    }
}

/// Streaming UTF-16 to UTF-8 adapter
///
/// Drops U+0000 and substitutes U+FFFD for unpaired surrogates or a dangling odd
/// byte at end of stream.
pub struct Utf16Decoder<R> {
    inner: R,
    order: Option<ByteOrder>,
    pending: Vec<u8>,
    out: Vec<u8>,
    out_pos: usize,
    eof: bool,
}

impl<R: Read> Utf16Decoder<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            order: None,
            pending: Vec::with_capacity(CHUNK_SIZE + 2),
            out: Vec::with_capacity(CHUNK_SIZE * 2),
            out_pos: 0,
            eof: false,
        }
    }

    fn read_chunk(&mut self) -> io::Result<()> {
        let mut chunk = [0u8; CHUNK_SIZE];
        loop {
            match self.inner.read(&mut chunk) {
                Ok(0) => {
                    self.eof = true;
                    return Ok(());
                }
                Ok(n) => {
                    self.pending.extend_from_slice(&chunk[..n]);
                    return Ok(());
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Sniff the byte-order mark once at least two bytes (or EOF) are available
    fn byte_order(&mut self) -> Option<ByteOrder> {
        if let Some(order) = self.order {
            return Some(order);
        }
        if self.pending.len() < 2 && !self.eof {
            return None;
        }
        let order = match self.pending.get(..2) {
            Some([0xFF, 0xFE]) => {
                self.pending.drain(..2);
                ByteOrder::Little
            }
            Some([0xFE, 0xFF]) => {
                self.pending.drain(..2);
                ByteOrder::Big
            }
            _ => ByteOrder::Little,
        };
        self.order = Some(order);
        Some(order)
    }

    fn push_char(&mut self, c: char) {
        let mut utf8 = [0u8; 4];
        self.out.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
    }

    /// Decode the next chunk into `out`. May produce nothing (e.g. only NULs read).
    fn fill(&mut self) -> io::Result<()> {
        self.out.clear();
        self.out_pos = 0;
        self.read_chunk()?;

        let Some(order) = self.byte_order() else {
            return Ok(());
        };

        let mut units: Vec<u16> = self.pending.chunks_exact(2).map(|p| order.unit(p)).collect();
        // Hold back a trailing high surrogate until its partner arrives
        if !self.eof && units.last().is_some_and(|u| (0xD800..=0xDBFF).contains(u)) {
            units.pop();
        }
        self.pending.drain(..units.len() * 2);

        for decoded in char::decode_utf16(units) {
            let c = decoded.unwrap_or(char::REPLACEMENT_CHARACTER);
            if c != '\0' {
                self.push_char(c);
            }
        }

        if self.eof && !self.pending.is_empty() {
            self.pending.clear();
            self.push_char(char::REPLACEMENT_CHARACTER);
        }
        Ok(())
    }
}

impl<R: Read> Read for Utf16Decoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.out_pos >= self.out.len() {
            if self.eof {
                return Ok(0);
            }
            self.fill()?;
        }
        let available = &self.out[self.out_pos..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.out_pos += n;
        Ok(n)
    }
}

/// Lazy iterator over the data rows of one report
///
/// The header record is consumed by the CSV reader and never yielded.
pub struct ReportRows<R: Read> {
    records: csv::StringRecordsIntoIter<Utf16Decoder<R>>,
    skipped: u64,
    done: bool,
}

/// Start decoding a report stream
pub fn read_report<R: Read>(reader: R) -> ReportRows<R> {
    let records = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(Utf16Decoder::new(reader))
        .into_records();

    ReportRows { records, skipped: 0, done: false }
}

impl<R: Read> ReportRows<R> {
    /// Records the CSV layer could not read
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

impl<R: Read> Iterator for ReportRows<R> {
    type Item = RawRow;

    fn next(&mut self) -> Option<RawRow> {
        if self.done {
            return None;
        }
        loop {
            match self.records.next()? {
                Ok(record) => {
                    let Some(first) = record.get(0) else {
                        continue;
                    };
                    return Some(RawRow::new(first.split('\t').map(str::to_string).collect()));
                }
                Err(e) if e.is_io_error() => {
                    warn!(error = %e, "report_read_failed");
                    self.done = true;
                    return None;
                }
                Err(e) => {
                    self.skipped += 1;
                    debug!(
                        line = ?e.position().map(|p| p.line()),
                        error = %e,
                        "report_record_skipped"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utf16le(text: &str, bom: bool) -> Vec<u8> {
        let mut bytes = if bom { vec![0xFF, 0xFE] } else { Vec::new() };
        for unit in text.encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        bytes
    }

    fn utf16be(text: &str) -> Vec<u8> {
        let mut bytes = vec![0xFE, 0xFF];
        for unit in text.encode_utf16() {
            bytes.extend_from_slice(&unit.to_be_bytes());
        }
        bytes
    }

    fn decode(bytes: &[u8]) -> String {
        let mut out = String::new();
        Utf16Decoder::new(bytes).read_to_string(&mut out).unwrap();
        out
    }

    /// Reader that hands out one byte per call
    struct Trickle<'a>(&'a [u8]);

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.0.is_empty() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.0[0];
            self.0 = &self.0[1..];
            Ok(1)
        }
    }

    #[test]
    fn test_decode_little_endian_with_bom() {
        assert_eq!(decode(&utf16le("Datum\tWert\n", true)), "Datum\tWert\n");
    }

    #[test]
    fn test_decode_without_bom_defaults_to_little_endian() {
        assert_eq!(decode(&utf16le("abc", false)), "abc");
    }

    #[test]
    fn test_decode_big_endian() {
        assert_eq!(decode(&utf16be("Österreich")), "Österreich");
    }

    #[test]
    fn test_decode_strips_nul_characters() {
        assert_eq!(decode(&utf16le("a\0b\0\0c", true)), "abc");
    }

    #[test]
    fn test_decode_surrogate_pair_split_across_reads() {
        let bytes = utf16le("x\u{1F50C}y", true);
        let mut out = String::new();
        Utf16Decoder::new(Trickle(&bytes)).read_to_string(&mut out).unwrap();
        assert_eq!(out, "x\u{1F50C}y");
    }

    #[test]
    fn test_decode_dangling_byte_becomes_replacement() {
        let mut bytes = utf16le("ab", true);
        bytes.push(0x41);
        assert_eq!(decode(&bytes), "ab\u{FFFD}");
    }

    #[test]
    fn test_decode_empty_stream() {
        assert_eq!(decode(&[]), "");
    }

    #[test]
    fn test_rows_skip_header_and_split_on_tab() {
        let text = "DateTime\tResolution\tValue\n2021-05-01 00:00:00.000\tPT15M\t10.0\n2021-05-01 00:15:00.000\tPT15M\t11.5\n";
        let rows: Vec<RawRow> = read_report(&utf16le(text, true)[..]).collect();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].tokens(), &["2021-05-01 00:00:00.000", "PT15M", "10.0"]);
        assert_eq!(rows[1].get(2), Some("11.5"));
    }

    #[test]
    fn test_rows_ignore_blank_lines_and_nuls() {
        let text = "h1\th2\n\na\0\tb\n\r\nc\td\n";
        let rows: Vec<RawRow> = read_report(&utf16le(text, true)[..]).collect();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].tokens(), &["a", "b"]);
        assert_eq!(rows[1].tokens(), &["c", "d"]);
    }

    #[test]
    fn test_rows_take_first_csv_field_only() {
        // A comma splits the CSV record; only the first field carries columns
        let text = "header\na\tb,ignored\n";
        let rows: Vec<RawRow> = read_report(&utf16le(text, true)[..]).collect();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].tokens(), &["a", "b"]);
    }

    #[test]
    fn test_rows_header_only() {
        let rows: Vec<RawRow> = read_report(&utf16le("a\tb\tc\n", true)[..]).collect();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_rows_empty_stream() {
        let mut rows = read_report(&[0u8; 0][..]);
        assert!(rows.next().is_none());
        assert_eq!(rows.skipped(), 0);
    }
}
