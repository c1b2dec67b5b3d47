//! Byte-position record decoder
//!
//! Slices the encoded payload at declared byte offsets, decodes each slice as
//! Shift_JIS and coerces it to the declared type. A field that fails to decode is
//! left out; the record survives as long as a race id can be recovered.

use super::layout::{
    FieldSpec, FieldType, GroupLayout, LayoutTable, RecordLayout, RACE_ID_RANGE,
};
use super::types::{
    DecodeError, DecodedRecord, FallbackRecord, FieldMap, FieldValue, HorseWeight, InfoRecord,
    OddsEntry, OddsRecord, RawRecord, ShowOddsEntry,
};
use encoding_rs::SHIFT_JIS;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Record kinds decoded into [`OddsRecord`]
pub const ODDS_KINDS: [&str; 2] = ["O1", "O2"];

/// Odds are transmitted in tenths (`0055` is 5.5)
pub const ODDS_DECIMALS: u32 = 1;

/// Rank reported when a single-odds slot carries none
const UNRANKED: u32 = 99;
/// Rank reported when a combination slot carries none
const UNRANKED_COMBINATION: u32 = 999;

/// Stateless decoder over an injected layout table
#[derive(Debug, Clone)]
pub struct RecordDecoder {
    layouts: LayoutTable,
}

impl Default for RecordDecoder {
    fn default() -> Self {
        Self::new(LayoutTable::jv_data())
    }
}

impl RecordDecoder {
    pub fn new(layouts: LayoutTable) -> Self {
        Self { layouts }
    }

    pub fn layouts(&self) -> &LayoutTable {
        &self.layouts
    }

    /// Decode a record, dropping it when no race id can be recovered
    pub fn decode(&self, raw: &RawRecord) -> Option<DecodedRecord> {
        match self.try_decode(raw) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::debug!(kind = %raw.kind, source = %raw.source, error = %e, "Dropping record");
                None
            }
        }
    }

    /// Decode a record, reporting why it was rejected
    pub fn try_decode(&self, raw: &RawRecord) -> Result<DecodedRecord, DecodeError> {
        let Some(layout) = self.layouts.get(raw.source, &raw.kind) else {
            return fallback(raw);
        };

        let fields = decode_fields(&raw.payload, &layout.fields);
        let race_id = match fields.get("race_id").and_then(FieldValue::as_text) {
            Some(id) => id.to_string(),
            None => return fallback(raw),
        };

        if ODDS_KINDS.contains(&raw.kind.as_str()) {
            Ok(DecodedRecord::Odds(build_odds(raw, race_id, fields, layout)))
        } else {
            Ok(DecodedRecord::Info(build_info(raw, race_id, fields, layout)))
        }
    }
}

/// Decode every declared field, leaving out the ones that fail
pub fn decode_fields(payload: &[u8], fields: &BTreeMap<String, FieldSpec>) -> FieldMap {
    let mut out = FieldMap::new();
    for (name, spec) in fields {
        match extract_field(payload, name, spec) {
            Ok(Some(value)) => {
                out.insert(name.clone(), value);
            }
            Ok(None) => {}
            Err(e) => tracing::trace!(error = %e, "Field left out"),
        }
    }
    out
}

/// Decode the used slots of a repeating group.
///
/// Iteration stops at the first slot cut short by the end of the payload; slots whose
/// key fields are blank are skipped.
pub fn decode_group(payload: &[u8], group: &GroupLayout, limit: Option<usize>) -> Vec<FieldMap> {
    let count = limit.map_or(group.max_count, |l| l.min(group.max_count));
    let mut slots = Vec::new();
    for i in 0..count {
        let start = group.base + i * group.stride;
        let Some(slot) = payload.get(start..start + group.stride) else {
            break;
        };
        let fields = decode_fields(slot, &group.fields);
        if group.key_fields.iter().all(|key| fields.contains_key(key)) {
            slots.push(fields);
        }
    }
    slots
}

/// Slice, decode and coerce one field
pub fn extract_field(
    payload: &[u8],
    name: &str,
    spec: &FieldSpec,
) -> Result<Option<FieldValue>, DecodeError> {
    if spec.start > spec.end {
        return Err(DecodeError::InvalidRange {
            field: name.to_string(),
            start: spec.start,
            end: spec.end,
        });
    }
    let Some(bytes) = payload.get(spec.start..spec.end) else {
        return Err(DecodeError::OutOfRange {
            field: name.to_string(),
            start: spec.start,
            end: spec.end,
            len: payload.len(),
        });
    };
    let Some(text) = decode_text(bytes) else {
        return Ok(None);
    };

    match spec.field_type {
        FieldType::Str => Ok(Some(FieldValue::Text(text))),
        FieldType::Int | FieldType::Float => parse_digits(&text)
            .map(|v| Some(FieldValue::Int(v)))
            .ok_or_else(|| DecodeError::InvalidInteger {
                field: name.to_string(),
                raw: text,
            }),
    }
}

/// Shift_JIS decode and trim (including U+3000); blank is `None`
pub fn decode_text(bytes: &[u8]) -> Option<String> {
    let (text, _) = SHIFT_JIS.decode_without_bom_handling(bytes);
    let trimmed = text.trim_matches(|c: char| c.is_whitespace() || c == '\u{3000}');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn parse_digits(text: &str) -> Option<i64> {
    if !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

fn fallback(raw: &RawRecord) -> Result<DecodedRecord, DecodeError> {
    let spec = FieldSpec::new(RACE_ID_RANGE.0, RACE_ID_RANGE.1, FieldType::Str);
    let race_id = extract_field(&raw.payload, "race_id", &spec)
        .ok()
        .flatten()
        .and_then(|v| v.as_text().map(str::to_string))
        .ok_or_else(|| DecodeError::MissingRaceId {
            kind: raw.kind.clone(),
        })?;

    let (text, _) = SHIFT_JIS.decode_without_bom_handling(&raw.payload);
    Ok(DecodedRecord::Fallback(FallbackRecord {
        record_type: raw.kind.clone(),
        source: raw.source,
        race_id,
        raw_payload: text.trim_end_matches(['\r', '\n']).to_string(),
    }))
}

fn int_field(fields: &FieldMap, name: &str) -> Option<i64> {
    fields.get(name).and_then(FieldValue::as_int)
}

fn text_field(fields: &FieldMap, name: &str) -> Option<String> {
    fields.get(name).and_then(FieldValue::as_text).map(str::to_string)
}

fn u32_field(fields: &FieldMap, name: &str) -> Option<u32> {
    int_field(fields, name).and_then(|v| u32::try_from(v).ok())
}

/// Positive tenths-encoded odds scaled to their decimal value
fn odds_field(fields: &FieldMap, name: &str) -> Option<Decimal> {
    int_field(fields, name)
        .filter(|v| *v > 0)
        .map(|v| Decimal::new(v, ODDS_DECIMALS))
}

fn build_odds(
    raw: &RawRecord,
    race_id: String,
    fields: FieldMap,
    layout: &RecordLayout,
) -> OddsRecord {
    let runner_limit = u32_field(&fields, "horse_count").map(|n| n as usize);
    let announced_at =
        text_field(&fields, "announced_at").filter(|s| s.len() == 8 && s.bytes().all(|b| b.is_ascii_digit()));

    let mut record = OddsRecord {
        record_type: raw.kind.clone(),
        source: raw.source,
        place_code: race_id.get(8..10).unwrap_or_default().to_string(),
        race_num: race_id.get(14..16).unwrap_or_default().to_string(),
        race_id,
        announced_at,
        win_odds: BTreeMap::new(),
        show_odds: BTreeMap::new(),
        bracket_odds: BTreeMap::new(),
        quinella_odds: BTreeMap::new(),
    };

    if let Some(group) = layout.groups.get("win") {
        for slot in decode_group(&raw.payload, group, runner_limit) {
            if let (Some(runner), Some(odds)) = (u32_field(&slot, "runner_id"), odds_field(&slot, "odds")) {
                let rank = u32_field(&slot, "rank").unwrap_or(UNRANKED);
                record.win_odds.insert(runner, OddsEntry { odds, rank });
            }
        }
    }

    if let Some(group) = layout.groups.get("show") {
        for slot in decode_group(&raw.payload, group, runner_limit) {
            if let (Some(runner), Some(odds_min)) =
                (u32_field(&slot, "runner_id"), odds_field(&slot, "odds_min"))
            {
                let entry = ShowOddsEntry {
                    odds_min,
                    odds_max: odds_field(&slot, "odds_max").unwrap_or(odds_min),
                    rank: u32_field(&slot, "rank").unwrap_or(UNRANKED),
                };
                record.show_odds.insert(runner, entry);
            }
        }
    }

    if let Some(group) = layout.groups.get("bracket") {
        for slot in decode_group(&raw.payload, group, None) {
            if let (Some(a), Some(b), Some(odds)) = (
                int_field(&slot, "bracket_1"),
                int_field(&slot, "bracket_2"),
                odds_field(&slot, "odds"),
            ) {
                let rank = u32_field(&slot, "rank").unwrap_or(UNRANKED);
                record
                    .bracket_odds
                    .insert(format!("{a}-{b}"), OddsEntry { odds, rank });
            }
        }
    }

    if let Some(group) = layout.groups.get("quinella") {
        for slot in decode_group(&raw.payload, group, None) {
            if let (Some(a), Some(b), Some(odds)) = (
                int_field(&slot, "runner_1"),
                int_field(&slot, "runner_2"),
                odds_field(&slot, "odds"),
            ) {
                let rank = u32_field(&slot, "rank").unwrap_or(UNRANKED_COMBINATION);
                record
                    .quinella_odds
                    .insert(format!("{a}-{b}"), OddsEntry { odds, rank });
            }
        }
    }

    record
}

fn build_info(
    raw: &RawRecord,
    race_id: String,
    mut fields: FieldMap,
    layout: &RecordLayout,
) -> InfoRecord {
    fields.remove("race_id");

    let horse_weights = layout
        .groups
        .get("horse_weights")
        .map(|group| {
            decode_group(&raw.payload, group, None)
                .into_iter()
                .filter_map(|slot| {
                    Some(HorseWeight {
                        runner_id: u32_field(&slot, "runner_id").filter(|id| *id > 0)?,
                        horse_name: text_field(&slot, "horse_name"),
                        weight: int_field(&slot, "weight"),
                        weight_sign: text_field(&slot, "weight_sign"),
                        weight_diff: text_field(&slot, "weight_diff"),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    InfoRecord {
        record_type: raw.kind.clone(),
        source: raw.source,
        race_id,
        fields,
        horse_weights,
    }
}
