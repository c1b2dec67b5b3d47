//! Raw and decoded record types

use encoding_rs::SHIFT_JIS;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Vendor feed a record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Source {
    /// JRA-VAN (central racing)
    #[serde(rename = "JRA", alias = "jra")]
    Jra,
    /// UmaConn (regional racing)
    #[serde(rename = "NAR", alias = "nar")]
    Nar,
}

impl Source {
    /// Upper-case code used in decoded output
    pub fn code(&self) -> &'static str {
        match self {
            Source::Jra => "JRA",
            Source::Nar => "NAR",
        }
    }

    /// Lower-case segment used in storage paths
    pub fn path_segment(&self) -> &'static str {
        match self {
            Source::Jra => "jra",
            Source::Nar => "nar",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "JRA" => Ok(Source::Jra),
            "NAR" => Ok(Source::Nar),
            other => Err(format!("unknown source: {}", other)),
        }
    }
}

/// A single fixed-width record as read from the source
///
/// The payload is the Shift_JIS byte stream; all layout offsets are byte positions into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    /// Two-character record kind (e.g. "O1", "RA")
    pub kind: String,
    /// Feed the record came from
    pub source: Source,
    /// Encoded record bytes
    pub payload: Vec<u8>,
}

impl RawRecord {
    /// Wrap an encoded payload, reading the kind from its first two bytes
    pub fn new(source: Source, payload: Vec<u8>) -> Self {
        let kind = payload
            .get(0..2)
            .map(|b| String::from_utf8_lossy(b).to_ascii_uppercase())
            .unwrap_or_default();
        Self {
            kind,
            source,
            payload,
        }
    }

    /// Encode a text record to Shift_JIS and wrap it
    pub fn from_text(source: Source, text: &str) -> Self {
        let (bytes, _, _) = SHIFT_JIS.encode(text);
        Self::new(source, bytes.into_owned())
    }
}

/// A decoded scalar field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Int(i64),
    Text(String),
}

impl FieldValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(v) => Some(*v),
            FieldValue::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::Int(_) => None,
        }
    }
}

/// Decoded field set keyed by field name
pub type FieldMap = BTreeMap<String, FieldValue>;

/// Single-odds entry (win, bracket, quinella)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OddsEntry {
    /// Decimal odds (raw tenths divided by ten)
    pub odds: Decimal,
    /// Popularity rank
    pub rank: u32,
}

/// Show (place) odds carry a min/max band
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShowOddsEntry {
    pub odds_min: Decimal,
    pub odds_max: Decimal,
    pub rank: u32,
}

/// Odds record (O1 win/show/bracket, O2 quinella)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OddsRecord {
    pub record_type: String,
    pub source: Source,
    pub race_id: String,
    pub place_code: String,
    pub race_num: String,
    /// Announcement time as MMDDHHMM, present only when all-digit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub announced_at: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub win_odds: BTreeMap<u32, OddsEntry>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub show_odds: BTreeMap<u32, ShowOddsEntry>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub bracket_odds: BTreeMap<String, OddsEntry>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub quinella_odds: BTreeMap<String, OddsEntry>,
}

/// One runner's entry in a WH (body weight) record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HorseWeight {
    pub runner_id: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub horse_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight_sign: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight_diff: Option<String>,
}

/// Race metadata record (RA, SE, WE, WH)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InfoRecord {
    pub record_type: String,
    pub source: Source,
    pub race_id: String,
    #[serde(flatten)]
    pub fields: FieldMap,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub horse_weights: Vec<HorseWeight>,
}

/// Record whose layout is unknown or undecodable; keeps the raw text
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FallbackRecord {
    pub record_type: String,
    pub source: Source,
    pub race_id: String,
    pub raw_payload: String,
}

/// Output of the decoder. Every variant carries a non-empty race id.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DecodedRecord {
    Odds(OddsRecord),
    Info(InfoRecord),
    Fallback(FallbackRecord),
}

impl DecodedRecord {
    pub fn race_id(&self) -> &str {
        match self {
            DecodedRecord::Odds(r) => &r.race_id,
            DecodedRecord::Info(r) => &r.race_id,
            DecodedRecord::Fallback(r) => &r.race_id,
        }
    }

    pub fn record_type(&self) -> &str {
        match self {
            DecodedRecord::Odds(r) => &r.record_type,
            DecodedRecord::Info(r) => &r.record_type,
            DecodedRecord::Fallback(r) => &r.record_type,
        }
    }

    pub fn source(&self) -> Source {
        match self {
            DecodedRecord::Odds(r) => r.source,
            DecodedRecord::Info(r) => r.source,
            DecodedRecord::Fallback(r) => r.source,
        }
    }

    /// Announced timestamp, only ever set on odds records
    pub fn announced_at(&self) -> Option<&str> {
        match self {
            DecodedRecord::Odds(r) => r.announced_at.as_deref(),
            _ => None,
        }
    }

    /// Declared post time (HHMM) of an info record
    pub fn start_time_hhmm(&self) -> Option<&str> {
        match self {
            DecodedRecord::Info(r) => r.fields.get("start_time_hhmm").and_then(|v| match v {
                FieldValue::Text(s) => Some(s.as_str()),
                FieldValue::Int(_) => None,
            }),
            _ => None,
        }
    }
}

/// Record decode failures. Field-level errors degrade to an absent field.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Declared slice lies beyond the payload
    #[error("field {field} ({start}..{end}) exceeds payload length {len}")]
    OutOfRange {
        field: String,
        start: usize,
        end: usize,
        len: usize,
    },
    /// Integer field held non-digit content
    #[error("field {field} is not an integer: {raw:?}")]
    InvalidInteger { field: String, raw: String },
    /// Layout declares an inverted range
    #[error("field {field} has an invalid range {start}..{end}")]
    InvalidRange {
        field: String,
        start: usize,
        end: usize,
    },
    /// No race id could be recovered
    #[error("{kind} record has no race id")]
    MissingRaceId { kind: String },
}
