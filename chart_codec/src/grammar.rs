//! Low-level entry grammar shared by every section decoder.
//!
//! A track entry line reads `<position> = <type-code> <data...>`. The
//! right-hand side is split at most once more, so embedded spaces in the
//! final data field survive intact.

use chart_model::Ticks;

use crate::error::EntryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Note,
    Special,
    Event,
    TimeSignature,
    Tempo,
    Anchor,
    Unknown,
}

impl EntryKind {
    fn from_token(token: &str) -> Self {
        match token {
            "N" => Self::Note,
            "S" => Self::Special,
            "E" => Self::Event,
            "TS" => Self::TimeSignature,
            "B" => Self::Tempo,
            "A" => Self::Anchor,
            _ => Self::Unknown,
        }
    }
}

/// One typed, positioned record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackEntry<'a> {
    pub position: Ticks,
    pub kind: EntryKind,
    pub data: &'a str,
}

pub fn parse_entry(line: &str) -> Result<TrackEntry<'_>, EntryError> {
    let trimmed = line.trim();
    let (lhs, rhs) = trimmed.split_once('=').ok_or(EntryError::MissingSeparator)?;

    let position = parse_int(lhs.trim(), "position")?;

    let rhs = rhs.trim();
    let mut parts = rhs.splitn(2, char::is_whitespace);
    let token = parts.next().unwrap_or("");
    if token.is_empty() {
        return Err(EntryError::MissingType);
    }
    let data = parts.next().unwrap_or("").trim();

    Ok(TrackEntry {
        position,
        kind: EntryKind::from_token(token),
        data,
    })
}

/// Metadata line grammar: `<key> = <value>`, value kept verbatim.
pub fn parse_key_value(line: &str) -> Option<(&str, &str)> {
    let trimmed = line.trim();
    let (key, value) = trimmed.split_once('=')?;
    Some((key.trim(), value.trim()))
}

pub fn parse_int(s: &str, field: &'static str) -> Result<u32, EntryError> {
    s.parse().map_err(|_| EntryError::BadInteger { field })
}

pub fn parse_u64(s: &str, field: &'static str) -> Result<u64, EntryError> {
    s.parse().map_err(|_| EntryError::BadInteger { field })
}

pub fn parse_float(s: &str, field: &'static str) -> Result<f64, EntryError> {
    s.parse().map_err(|_| EntryError::BadFloat { field })
}

/// Time-signature denominators are stored as powers of two.
pub fn expand_denominator(exponent: u32) -> Result<u8, EntryError> {
    if exponent > 7 {
        return Err(EntryError::BadDenominator(exponent));
    }
    Ok(1u8 << exponent)
}

pub fn reduce_denominator(value: u8) -> u32 {
    value.trailing_zeros()
}

/// Tempo and anchor values are stored scaled by 1000. Encoding rounds to
/// the nearest millipoint so decode-encode cycles are stable.
pub fn decode_scaled(raw: u64) -> f64 {
    raw as f64 / 1000.0
}

pub fn encode_scaled(value: f64) -> u64 {
    (value * 1000.0).round() as u64
}

/// Event payloads in the global section are conventionally double-quoted.
pub fn strip_quotes(s: &str) -> &str {
    let s = s.trim();
    s.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(s)
}
