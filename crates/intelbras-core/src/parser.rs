// ── Access record log parser ──
//
// The device's recordFinder output is a flat block of assignments:
//
//     found=2
//     records[0].RecNo=1
//     records[0].CreateTime=1700000000
//     records[1].RecNo=2
//     ...
//
// Indices are zero-based and expected to be dense.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use tracing::{debug, error, warn};

use crate::error::ParseError;
use crate::model::{EventRecord, FieldValue};

const RECORD_PREFIX: &str = "records[";
const FOUND_PREFIX: &str = "found=";

/// Fields the device always fills with integers.
const NUMERIC_FIELDS: &[&str] = &[
    "AttendanceState",
    "CardType",
    "CreateTime",
    "Door",
    "ErrorCode",
    "Mask",
    "Method",
    "ReaderID",
    "RecNo",
    "RemainingTimes",
    "ReservedInt",
    "Status",
    "UserType",
];

/// Parser for the `records[i].Field=value` event log format.
///
/// In lenient mode (the default) malformed lines, bad numeric values and
/// index gaps are logged and skipped; in strict mode the first problem is
/// returned as a [`ParseError`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventLogParser {
    strict: bool,
}

impl EventLogParser {
    pub const fn new(strict: bool) -> Self {
        Self { strict }
    }

    pub const fn strict() -> Self {
        Self::new(true)
    }

    pub const fn lenient() -> Self {
        Self::new(false)
    }

    pub const fn is_strict(&self) -> bool {
        self.strict
    }

    /// Parse raw bytes from the device.
    ///
    /// Non-UTF-8 input is [`ParseError::NotText`] in strict mode and an
    /// empty result otherwise.
    pub fn parse_bytes(&self, raw: &[u8]) -> Result<Vec<EventRecord>, ParseError> {
        match std::str::from_utf8(raw) {
            Ok(text) => self.parse(text),
            Err(e) => {
                let err = ParseError::NotText {
                    reason: e.to_string(),
                };
                if self.strict {
                    return Err(err);
                }
                error!(error = %err, "discarding non-text event data");
                Ok(Vec::new())
            }
        }
    }

    /// Parse an event log into records ordered by ascending index.
    pub fn parse(&self, raw: &str) -> Result<Vec<EventRecord>, ParseError> {
        if raw.trim().is_empty() {
            debug!("empty event data");
            return Ok(Vec::new());
        }

        let mut records: BTreeMap<usize, IndexMap<String, FieldValue>> = BTreeMap::new();
        let mut found = None;

        for (idx, line) in raw.lines().enumerate() {
            let line_number = idx + 1;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if line.starts_with(RECORD_PREFIX) {
                let Some((index, field, value)) = split_record_line(line) else {
                    self.tolerate(ParseError::MalformedRecordLine {
                        line_number,
                        line: line.to_owned(),
                    })?;
                    continue;
                };
                if !is_plain_field_name(field) {
                    warn!(field, line_number, "suspicious field name");
                }
                let value = self.convert(field, value, line_number)?;
                records
                    .entry(index)
                    .or_default()
                    .insert(field.to_owned(), value);
            } else if let Some(count) = line.strip_prefix(FOUND_PREFIX) {
                match parse_digits(count) {
                    Some(n) => found = Some(n),
                    None => self.tolerate(ParseError::MalformedFoundLine {
                        line_number,
                        line: line.to_owned(),
                    })?,
                }
            } else {
                debug!(line_number, line, "skipping unrecognized line");
            }
        }

        let events = self.collect_in_order(records)?;

        if let Some(found) = found {
            if found != events.len() {
                debug!(found, parsed = events.len(), "found count differs from parsed records");
            }
        }
        debug!(count = events.len(), "parsed access records");
        Ok(events)
    }

    /// Emit records in index order, reporting gaps from 0 upward.
    fn collect_in_order(
        &self,
        records: BTreeMap<usize, IndexMap<String, FieldValue>>,
    ) -> Result<Vec<EventRecord>, ParseError> {
        let mut events = Vec::with_capacity(records.len());
        let mut expected = 0;

        for (index, fields) in records {
            if index > expected {
                if self.strict {
                    return Err(ParseError::MissingRecordIndex { index: expected });
                }
                warn!(first = expected, last = index - 1, "missing records in index range");
            }
            events.push(EventRecord::new(fields));
            expected = index.saturating_add(1);
        }

        Ok(events)
    }

    /// Convert a value, turning known-numeric fields into integers.
    fn convert(
        &self,
        field: &str,
        value: &str,
        line_number: usize,
    ) -> Result<FieldValue, ParseError> {
        if value.is_empty() || !NUMERIC_FIELDS.contains(&field) {
            return Ok(FieldValue::Text(value.to_owned()));
        }

        match value.trim().parse::<i64>() {
            Ok(n) => Ok(FieldValue::Int(n)),
            Err(_) => {
                warn!(field, value, line_number, "expected numeric value");
                if self.strict {
                    return Err(ParseError::InvalidFieldValue {
                        field: field.to_owned(),
                        value: value.to_owned(),
                        line_number,
                    });
                }
                Ok(FieldValue::Text(value.to_owned()))
            }
        }
    }

    /// Propagate in strict mode, log and carry on otherwise.
    fn tolerate(&self, err: ParseError) -> Result<(), ParseError> {
        if self.strict {
            return Err(err);
        }
        warn!(error = %err, "skipping unparseable line");
        Ok(())
    }
}

/// Split `records[<index>].<Field>=<value>`. The value is everything after
/// the first `=` and may itself be empty or contain `=`.
fn split_record_line(line: &str) -> Option<(usize, &str, &str)> {
    let rest = line.strip_prefix(RECORD_PREFIX)?;
    let (index, rest) = rest.split_once("].")?;
    let index = parse_digits(index)?;
    let (field, value) = rest.split_once('=')?;
    if field.is_empty() {
        return None;
    }
    Some((index, field, value))
}

/// Strictly decimal digits (no sign, no whitespace).
fn parse_digits(s: &str) -> Option<usize> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

fn is_plain_field_name(field: &str) -> bool {
    field
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
}
