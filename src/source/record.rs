//! Record parsing shared by file replay and live streams.

use std::io::{self, Read};

use crate::buffer::{ChannelId, Sample};

/// Size of one binary record: `f64` timestamp, `u32` channel, `f64` value.
pub const BINARY_RECORD_LEN: usize = 20;

/// On-disk framing of records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum RecordFormat {
    /// One `timestamp,channel,value` line per record.
    #[default]
    Text,
    /// Fixed 20-byte little-endian records.
    Binary,
}

/// Why a text line could not be turned into a sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// Line content (trimmed).
    pub line: String,
    /// What was wrong with it.
    pub reason: String,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} in '{}'", self.reason, self.line)
    }
}

/// Parse one text record.
///
/// Fields are separated by commas or whitespace. Three fields are
/// `timestamp, channel, value`; two fields are `timestamp, value` on channel 0.
/// Blank lines and `#` comments yield `Ok(None)`.
pub fn parse_line(line: &str) -> Result<Option<Sample>, ParseError> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }

    let fail = |reason: String| ParseError {
        line: trimmed.to_string(),
        reason,
    };

    let fields: Vec<&str> = trimmed
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|f| !f.is_empty())
        .collect();

    let number = |field: &str, what: &str| {
        field
            .parse::<f64>()
            .map_err(|_| fail(format!("invalid {} '{}'", what, field)))
    };

    match fields[..] {
        [t, v] => Ok(Some(Sample::new(number(t, "timestamp")?, 0, number(v, "value")?))),
        [t, ch, v] => {
            let timestamp = number(t, "timestamp")?;
            let channel: ChannelId = ch
                .parse()
                .map_err(|_| fail(format!("invalid channel '{}'", ch)))?;
            Ok(Some(Sample::new(timestamp, channel, number(v, "value")?)))
        },
        _ => Err(fail(format!("expected 2 or 3 fields, found {}", fields.len()))),
    }
}

/// Parse one raw text line, including its line terminator if any.
///
/// Bytes that are not UTF-8 make the line malformed like any other bad record.
pub fn parse_bytes(raw: &[u8]) -> Result<Option<Sample>, ParseError> {
    match std::str::from_utf8(raw) {
        Ok(line) => parse_line(line),
        Err(e) => Err(ParseError {
            line: String::from_utf8_lossy(raw).trim().to_string(),
            reason: format!("invalid UTF-8 at byte {}", e.valid_up_to()),
        }),
    }
}

/// Decode one binary record.
pub fn decode_record(bytes: &[u8; BINARY_RECORD_LEN]) -> Sample {
    let mut ts = [0u8; 8];
    let mut ch = [0u8; 4];
    let mut val = [0u8; 8];
    ts.copy_from_slice(&bytes[0..8]);
    ch.copy_from_slice(&bytes[8..12]);
    val.copy_from_slice(&bytes[12..20]);
    Sample::new(
        f64::from_le_bytes(ts),
        u32::from_le_bytes(ch),
        f64::from_le_bytes(val),
    )
}

/// Encode one binary record.
pub fn encode_record(sample: &Sample) -> [u8; BINARY_RECORD_LEN] {
    let mut out = [0u8; BINARY_RECORD_LEN];
    out[0..8].copy_from_slice(&sample.timestamp.to_le_bytes());
    out[8..12].copy_from_slice(&sample.channel.to_le_bytes());
    out[12..20].copy_from_slice(&sample.value.to_le_bytes());
    out
}

/// Read the next binary record.
///
/// Returns `Ok(None)` at a clean end of input. A truncated trailing record is
/// reported as `UnexpectedEof`.
pub fn read_record<R: Read>(reader: &mut R) -> io::Result<Option<Sample>> {
    let mut bytes = [0u8; BINARY_RECORD_LEN];
    let mut filled = 0;
    while filled < BINARY_RECORD_LEN {
        match reader.read(&mut bytes[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    match filled {
        0 => Ok(None),
        BINARY_RECORD_LEN => Ok(Some(decode_record(&bytes))),
        partial => Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("truncated record: {} of {} bytes", partial, BINARY_RECORD_LEN),
        )),
    }
}
