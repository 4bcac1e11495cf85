//! Incremental decoder for the producer's stdout
//!
//! The producer writes a bare sequence of JSON objects with string values,
//! no array around them and no required separator:
//!
//! ```text
//! {"cpu":"12"}{"mem":"40"}
//! {"cpu":"13","mem":"41"}
//! ```
//!
//! Bytes arrive in arbitrary chunks, so a record may straddle two reads.

use serde_json::Value;

use super::error::DecodeError;
use crate::telemetry::Record;

/// Largest unfinished record kept in memory
pub const MAX_RECORD_BYTES: usize = 1024 * 1024;

/// Input being thrown away after a bad record
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum Resync {
    #[default]
    None,
    /// Dropping the rest of the line that held the error
    LineEnd,
    /// Dropping everything up to the next `{`
    NextObject,
}

/// Streaming decoder for concatenated telemetry records
#[derive(Debug, Default)]
pub struct RecordDecoder {
    /// Undecoded input
    buf: Vec<u8>,
    resync: Resync,
    /// The buffer ends inside an object or array; parsing again cannot
    /// succeed until a closing bracket arrives
    incomplete: bool,
}

impl RecordDecoder {
    /// Create a decoder with an empty buffer
    ///
    /// Feed it with [`push`](Self::push) and drain it with
    /// [`next_record`](Self::next_record) after every chunk.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append freshly read bytes
    pub fn push(&mut self, chunk: &[u8]) {
        let Some(start) = self.resync_start(chunk) else {
            return;
        };
        let chunk = &chunk[start..];
        if chunk.iter().any(|&b| b == b'}' || b == b']') {
            self.incomplete = false;
        }
        self.buf.extend_from_slice(chunk);
    }

    /// Decode the next record, if a complete one is buffered
    ///
    /// Returns `None` when more input is needed. An `Err` means one record
    /// was dropped; call again to continue with the rest of the buffer.
    pub fn next_record(&mut self) -> Option<Result<Record, DecodeError>> {
        if self.incomplete {
            return self.check_oversized();
        }
        if self.buf.is_empty() {
            return None;
        }

        let (item, consumed) = {
            let mut stream = serde_json::Deserializer::from_slice(&self.buf).into_iter::<Value>();
            let item = stream.next();
            (item, stream.byte_offset())
        };

        match item {
            None => {
                // Whitespace only
                self.buf.clear();
                None
            }
            Some(Ok(value)) => {
                self.buf.drain(..consumed);
                Some(into_record(value))
            }
            Some(Err(e)) if e.is_eof() => {
                self.incomplete = matches!(
                    self.buf.iter().find(|b| !b.is_ascii_whitespace()),
                    Some(&b'{') | Some(&b'[')
                );
                self.check_oversized()
            }
            Some(Err(e)) => {
                self.skip_from_line(e.line());
                Some(Err(DecodeError::Syntax(e)))
            }
        }
    }

    /// Signal end of stream
    ///
    /// Reports leftover bytes of an unfinished record, if any.
    pub fn finish(&mut self) -> Option<DecodeError> {
        let leftover = std::mem::take(&mut self.buf);
        self.resync = Resync::None;
        self.incomplete = false;
        if leftover.iter().all(u8::is_ascii_whitespace) {
            None
        } else {
            Some(DecodeError::Truncated(leftover.len()))
        }
    }

    /// Drop an unfinished record that grew past [`MAX_RECORD_BYTES`]
    fn check_oversized(&mut self) -> Option<Result<Record, DecodeError>> {
        if self.buf.len() <= MAX_RECORD_BYTES {
            return None;
        }
        let len = self.buf.len();
        self.buf.clear();
        self.incomplete = false;
        self.resync = Resync::LineEnd;
        Some(Err(DecodeError::Oversized(len)))
    }

    /// Discard the buffer through the end of `line` (1-based), then up to
    /// the next object
    fn skip_from_line(&mut self, line: usize) {
        let before = line.saturating_sub(1);
        let data = std::mem::take(&mut self.buf);
        let start = if before == 0 {
            0
        } else {
            data.iter()
                .enumerate()
                .filter(|&(_, &b)| b == b'\n')
                .nth(before - 1)
                .map_or(data.len(), |(pos, _)| pos + 1)
        };

        self.incomplete = false;
        self.resync = Resync::LineEnd;
        let rest = &data[start..];
        if let Some(keep) = self.resync_start(rest) {
            self.buf.extend_from_slice(&rest[keep..]);
        }
    }

    /// Advance the resync state over `data`
    ///
    /// Returns the offset from which `data` should be kept, or `None` if
    /// all of it is discarded.
    fn resync_start(&mut self, data: &[u8]) -> Option<usize> {
        let mut start = 0;
        if self.resync == Resync::LineEnd {
            let pos = data.iter().position(|&b| b == b'\n')?;
            start = pos + 1;
            self.resync = Resync::NextObject;
        }
        if self.resync == Resync::NextObject {
            let pos = data[start..].iter().position(|&b| b == b'{')?;
            start += pos;
            self.resync = Resync::None;
        }
        Some(start)
    }
}

fn into_record(value: Value) -> Result<Record, DecodeError> {
    let map = match value {
        Value::Object(map) => map,
        other => {
            return Err(DecodeError::NotAStringMap(format!(
                "expected an object, found {}",
                kind(&other)
            )))
        }
    };

    let mut record = Record::with_capacity(map.len());
    for (key, value) in map {
        match value {
            Value::String(s) => {
                record.insert(key, s);
            }
            other => {
                return Err(DecodeError::NotAStringMap(format!(
                    "key `{}` holds {}",
                    key,
                    kind(&other)
                )))
            }
        }
    }
    Ok(record)
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
