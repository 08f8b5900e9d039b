use log::warn;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::errors::{PrepError, Result};
use crate::types::MIN_RECORD_FIELDS;

/// Classification of one line of the master annotation file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsedLine<'a> {
    /// Blank line or `#` comment.
    Skip,
    /// Data line with fewer than [`MIN_RECORD_FIELDS`] fields.
    Malformed,
    Record(Record<'a>),
}

/// A well-formed annotation line, borrowed from the read buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record<'a> {
    pub record_id: &'a str,
    /// The line with surrounding whitespace removed.
    pub line: &'a str,
}

impl<'a> Record<'a> {
    pub fn folder_id(&self) -> &'a str {
        folder_id(self.record_id)
    }
}

/// Page-level folder id: the first two dash-delimited components of a record id.
///
/// `a01-000u-00-00` maps to `a01-000u`. Ids with fewer than two components are
/// returned unchanged and will not match any real split entry.
pub fn folder_id(record_id: &str) -> &str {
    match record_id.match_indices('-').nth(1) {
        Some((idx, _)) => &record_id[..idx],
        None => record_id,
    }
}

pub fn parse_line(raw: &str) -> ParsedLine<'_> {
    let line = raw.trim();
    if line.is_empty() || line.starts_with('#') {
        return ParsedLine::Skip;
    }

    let mut fields = line.split_whitespace();
    let record_id = match fields.next() {
        Some(id) => id,
        None => return ParsedLine::Skip,
    };
    if fields.take(MIN_RECORD_FIELDS - 1).count() < MIN_RECORD_FIELDS - 1 {
        return ParsedLine::Malformed;
    }

    ParsedLine::Record(Record { record_id, line })
}

/// Stream the annotation file at `path`, handing every parsed line to `visit`.
///
/// A missing file is a configuration error. Lines that are not valid UTF-8
/// are reported as [`ParsedLine::Malformed`]. The first error returned by
/// `visit` stops the scan and is propagated.
pub fn scan_annotations<F>(path: &Path, mut visit: F) -> Result<()>
where
    F: FnMut(ParsedLine<'_>) -> Result<()>,
{
    if !path.is_file() {
        return Err(PrepError::missing_path(path));
    }

    let mut reader = BufReader::new(File::open(path)?);
    let mut buf = Vec::new();
    let mut line_no = 0usize;
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        line_no += 1;
        match std::str::from_utf8(&buf) {
            Ok(line) => visit(parse_line(line))?,
            Err(e) => {
                warn!("{}:{}: not valid UTF-8 ({})", path.display(), line_no, e);
                visit(ParsedLine::Malformed)?;
            }
        }
    }
    Ok(())
}
