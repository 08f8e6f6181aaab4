//! Line codec for the reference file.
//!
//! On-disk format, one record per line:
//!
//! ```text
//! origin,alias,status\n
//! ```
//!
//! A path field containing `,`, `"`, `\r`, `\n`, or leading/trailing
//! whitespace is wrapped in double quotes with embedded quotes doubled.
//! Every other field is written bare, so files written by the older tools
//! (`/src/a.txt,/dst/a.txt,ss`) decode unchanged. A quoted field may span
//! physical lines; the reader keeps joining lines while a field that opened
//! with a quote is still open. A quote inside a bare field opens nothing: the
//! line is reported as corrupt and reading resumes at the next line.

use std::io::{self, BufRead};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{Result, StoreError};
use crate::types::{Record, Status};

const FIELD_SEP: char = ',';
const QUOTE: char = '"';
const RECORD_SEP: u8 = b'\n';

/// Encode a record as one newline-terminated line.
///
/// Fails with [`StoreError::Encoding`] if a path is empty, relative, not
/// valid UTF-8, or contains a NUL byte.
pub fn encode_record(record: &Record) -> Result<String> {
    let mut line = String::new();
    encode_path("origin", &record.origin, &mut line)?;
    line.push(FIELD_SEP);
    encode_path("alias", &record.alias, &mut line)?;
    line.push(FIELD_SEP);
    line.push_str(record.status.as_str());
    line.push(RECORD_SEP as char);
    Ok(line)
}

fn encode_path(field: &'static str, path: &Path, out: &mut String) -> Result<()> {
    let encoding_error = |reason: &str| StoreError::Encoding {
        field,
        value: path.to_string_lossy().into_owned(),
        reason: reason.to_string(),
    };

    let text = path
        .to_str()
        .ok_or_else(|| encoding_error("path is not valid UTF-8"))?;
    if text.is_empty() {
        return Err(encoding_error("path is empty"));
    }
    if text.contains('\0') {
        return Err(encoding_error("path contains a NUL byte"));
    }
    if !path.is_absolute() {
        return Err(encoding_error("path must be absolute"));
    }

    if needs_quoting(text) {
        out.push(QUOTE);
        for ch in text.chars() {
            if ch == QUOTE {
                out.push(QUOTE);
            }
            out.push(ch);
        }
        out.push(QUOTE);
    } else {
        out.push_str(text);
    }
    Ok(())
}

fn needs_quoting(text: &str) -> bool {
    text.contains([FIELD_SEP, QUOTE, '\r', '\n'])
        || text.starts_with(char::is_whitespace)
        || text.ends_with(char::is_whitespace)
}

/// Decode one record from the text of a line (without its trailing `\n`).
///
/// `index` and `line` only label the error.
pub fn decode_record(text: &str, index: usize, line: usize) -> Result<Record> {
    let corrupt = |reason: String| StoreError::Corrupt {
        index,
        line,
        reason,
    };

    let text = text.strip_suffix('\r').unwrap_or(text);
    let fields = split_fields(text).map_err(corrupt)?;
    let [origin, alias, status]: [String; 3] = fields
        .try_into()
        .map_err(|fields: Vec<String>| corrupt(format!("expected 3 fields, found {}", fields.len())))?;

    if origin.is_empty() {
        return Err(corrupt("empty origin".into()));
    }
    if alias.is_empty() {
        return Err(corrupt("empty alias".into()));
    }
    let status: Status = status.parse().map_err(|e| corrupt(format!("{e}")))?;

    Ok(Record {
        origin: PathBuf::from(origin),
        alias: PathBuf::from(alias),
        status,
    })
}

fn split_fields(text: &str) -> std::result::Result<Vec<String>, String> {
    let mut fields = Vec::with_capacity(3);
    let mut chars = text.chars().peekable();
    loop {
        let mut field = String::new();
        let more = if chars.peek() == Some(&QUOTE) {
            chars.next();
            loop {
                match chars.next() {
                    Some(QUOTE) if chars.peek() == Some(&QUOTE) => {
                        chars.next();
                        field.push(QUOTE);
                    }
                    Some(QUOTE) => break,
                    Some(ch) => field.push(ch),
                    None => return Err("unterminated quoted field".into()),
                }
            }
            match chars.next() {
                None => false,
                Some(FIELD_SEP) => true,
                Some(ch) => return Err(format!("unexpected {ch:?} after quoted field")),
            }
        } else {
            loop {
                match chars.next() {
                    None => break false,
                    Some(FIELD_SEP) => break true,
                    Some(QUOTE) => return Err("stray quote in unquoted field".into()),
                    Some(ch) => field.push(ch),
                }
            }
        };
        fields.push(field);
        if !more {
            return Ok(fields);
        }
    }
}

/// One logical entry read from the store file.
///
/// `bytes` holds the exact text read, terminator included, so a rewrite can
/// carry an undecodable entry through untouched.
#[derive(Debug)]
pub(crate) struct RawEntry {
    pub(crate) index: usize,
    pub(crate) line: usize,
    pub(crate) bytes: Vec<u8>,
    pub(crate) record: Result<Record>,
}

/// Lazy reader over the records of a store file.
///
/// Yields `(index, record)` in file order, where `index` counts non-blank
/// entries from zero. Undecodable entries yield [`StoreError::Corrupt`] and
/// iteration continues. A final entry without a terminating newline (a torn
/// append) is skipped and kept aside in [`RecordIter::torn_tail`]; a quote
/// still open at end of input makes the joined lines one corrupt entry. An I/O
/// error ends the iteration after being yielded once.
pub struct RecordIter<R> {
    reader: R,
    next_index: usize,
    line: usize,
    torn: Option<Vec<u8>>,
    failed: bool,
}

impl<R: BufRead> RecordIter<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            next_index: 0,
            line: 0,
            torn: None,
            failed: false,
        }
    }

    /// The unterminated tail found at end of input, if any.
    pub fn torn_tail(&self) -> Option<&[u8]> {
        self.torn.as_deref()
    }

    pub(crate) fn next_entry(&mut self) -> Option<io::Result<RawEntry>> {
        loop {
            let first_line = self.line + 1;
            let mut bytes = Vec::new();
            loop {
                match self.reader.read_until(RECORD_SEP, &mut bytes) {
                    Ok(0) => break,
                    Ok(_) => {}
                    Err(e) => return Some(Err(e)),
                }
                self.line += 1;
                if !bytes.ends_with(&[RECORD_SEP]) || !ends_in_quoted_field(&bytes) {
                    break;
                }
            }

            if bytes.is_empty() {
                return None;
            }
            if !bytes.ends_with(&[RECORD_SEP]) {
                warn!(line = first_line, len = bytes.len(), "torn record at end of store; skipping");
                self.torn = Some(bytes);
                return None;
            }
            if bytes.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            let index = self.next_index;
            self.next_index += 1;
            let body = &bytes[..bytes.len() - 1];
            let record = match std::str::from_utf8(body) {
                Ok(text) => decode_record(text, index, first_line),
                Err(_) => Err(StoreError::Corrupt {
                    index,
                    line: first_line,
                    reason: "line is not valid UTF-8".into(),
                }),
            };
            return Some(Ok(RawEntry {
                index,
                line: first_line,
                bytes,
                record,
            }));
        }
    }
}

impl<R: BufRead> Iterator for RecordIter<R> {
    type Item = Result<(usize, Record)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.next_entry()? {
            Ok(entry) => Some(entry.record.map(|record| (entry.index, record))),
            Err(e) => {
                self.failed = true;
                Some(Err(StoreError::Io(e)))
            }
        }
    }
}

/// Returns `true` if `bytes` stops inside a field that began with a quote,
/// so the record continues on the next physical line.
fn ends_in_quoted_field(bytes: &[u8]) -> bool {
    let quote = QUOTE as u8;
    let sep = FIELD_SEP as u8;
    let mut field_start = true;
    let mut quoted = false;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if quoted {
            if b == quote {
                if bytes.get(i + 1) == Some(&quote) {
                    i += 1;
                } else {
                    quoted = false;
                }
            }
            field_start = false;
        } else if b == sep {
            field_start = true;
        } else {
            quoted = field_start && b == quote;
            field_start = false;
        }
        i += 1;
    }
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn read_all(input: &str) -> Vec<Result<(usize, Record)>> {
        RecordIter::new(input.as_bytes()).collect()
    }

    #[test]
    fn plain_paths_are_written_bare() {
        let record = Record::linked("/tmp/a.txt", "/tmp/links/a.txt");
        assert_eq!(
            encode_record(&record).unwrap(),
            "/tmp/a.txt,/tmp/links/a.txt,linked\n"
        );
    }

    #[test]
    fn delimiters_in_paths_are_quoted() {
        let record = Record::linked("/tmp/a,b.txt", "/tmp/say \"hi\".txt");
        let line = encode_record(&record).unwrap();
        assert_eq!(
            line,
            "\"/tmp/a,b.txt\",\"/tmp/say \"\"hi\"\".txt\",linked\n"
        );
        let decoded = decode_record(line.trim_end_matches('\n'), 0, 1).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn newline_in_path_spans_physical_lines() {
        let record = Record::linked("/tmp/two\nlines", "/tmp/alias");
        let second = Record::linked("/tmp/c", "/tmp/d");
        let text = encode_record(&record).unwrap() + &encode_record(&second).unwrap();

        let items = read_all(&text);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), &(0, record));
        assert_eq!(items[1].as_ref().unwrap(), &(1, second));
    }

    #[test]
    fn legacy_lines_decode() {
        let items = read_all("/src/a.txt,/dst/a.txt,ss\r\n/src/b,/dst/b,hit\n");
        let first = items[0].as_ref().unwrap();
        assert_eq!(first.1.status, Status::Linked);
        assert_eq!(first.1.alias, PathBuf::from("/dst/a.txt"));
        assert_eq!(items[1].as_ref().unwrap().1.status, Status::Transferred);
    }

    #[test]
    fn reject_unencodable_paths() {
        let relative = Record::linked("a.txt", "/tmp/b");
        let err = encode_record(&relative).unwrap_err();
        assert!(matches!(err, StoreError::Encoding { field: "origin", .. }));

        let empty = Record::linked("/tmp/a", "");
        let err = encode_record(&empty).unwrap_err();
        assert!(matches!(err, StoreError::Encoding { field: "alias", .. }));

        let nul = Record::linked("/tmp/a\0b", "/tmp/b");
        assert!(encode_record(&nul).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn reject_non_utf8_path() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let origin = PathBuf::from(OsStr::from_bytes(b"/tmp/\xff.bin"));
        let err = encode_record(&Record::linked(origin, "/tmp/b")).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::EncodingError);
    }

    #[test]
    fn corrupt_lines_are_reported_and_skipped() {
        let items = read_all("/a,/b\n/c,/d,linked\n/e,/f,maybe\n");
        assert_eq!(items.len(), 3);
        assert!(matches!(items[0], Err(StoreError::Corrupt { index: 0, line: 1, .. })));
        assert_eq!(items[1].as_ref().unwrap().0, 1);
        assert!(matches!(items[2], Err(StoreError::Corrupt { index: 2, line: 3, .. })));
    }

    #[test]
    fn blank_lines_are_not_indexed() {
        let items = read_all("\n/a,/b,linked\n\n  \n/c,/d,deleted\n");
        let indices: Vec<usize> = items.into_iter().map(|r| r.unwrap().0).collect();
        assert_eq!(indices, vec![0, 1]);
    }

    #[test]
    fn torn_tail_is_skipped() {
        let mut iter = RecordIter::new("/a,/b,linked\n/c,/d,lin".as_bytes());
        assert!(iter.next().unwrap().is_ok());
        assert!(iter.next().is_none());
        assert_eq!(iter.torn_tail(), Some(&b"/c,/d,lin"[..]));
    }

    #[test]
    fn stray_quote_is_corrupt() {
        assert!(decode_record("/a\"b\",/c,linked", 0, 1).is_err());
        assert!(decode_record("\"/a\"x,/c,linked", 0, 1).is_err());
    }

    #[test]
    fn quote_inside_bare_field_does_not_swallow_later_lines() {
        let items = read_all("/src/say\"hi.txt,/dst/q,ss\n/src/a,/dst/y,ss\n");
        assert_eq!(items.len(), 2);
        assert!(matches!(items[0], Err(StoreError::Corrupt { index: 0, line: 1, .. })));
        let (index, record) = items[1].as_ref().unwrap();
        assert_eq!(*index, 1);
        assert_eq!(record.alias, PathBuf::from("/dst/y"));
    }

    #[test]
    fn open_quoted_field_detection() {
        assert!(ends_in_quoted_field(b"\"/a\n"));
        assert!(ends_in_quoted_field(b"/a,\"/b\n"));
        assert!(ends_in_quoted_field(b"\"/say \"\"hi\"\"\n"));
        assert!(!ends_in_quoted_field(b"\"/a\",/b,linked\n"));
        assert!(!ends_in_quoted_field(b"/say\"hi,/b,ss\n"));
        assert!(!ends_in_quoted_field(b"/a,/b\"\n"));
    }

    fn path_strategy() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9 ,\"._\\-\n]{1,24}".prop_map(|tail| format!("/{tail}"))
    }

    fn status_strategy() -> impl Strategy<Value = Status> {
        prop_oneof![
            Just(Status::Linked),
            Just(Status::Transferred),
            Just(Status::Deleted),
        ]
    }

    proptest! {
        #[test]
        fn append_then_read_returns_the_same_records(
            rows in proptest::collection::vec((path_strategy(), path_strategy(), status_strategy()), 0..8)
        ) {
            let records: Vec<Record> = rows
                .into_iter()
                .map(|(origin, alias, status)| Record { origin: origin.into(), alias: alias.into(), status })
                .collect();
            let mut text = String::new();
            for record in &records {
                text.push_str(&encode_record(record).unwrap());
            }

            let decoded: Vec<Record> = RecordIter::new(text.as_bytes())
                .map(|item| item.unwrap().1)
                .collect();
            prop_assert_eq!(decoded, records);
        }
    }
}
