//! Byte layouts for fixed-width records
//!
//! Offsets follow the JV-Data record specification (0-based, end-exclusive byte
//! positions into the Shift_JIS payload). A field that is not declared here is never
//! decoded; there is no guessing of undeclared offsets.

use super::types::Source;
use std::collections::{BTreeMap, HashMap};

/// Byte range every record kind stores its race id in
pub const RACE_ID_RANGE: (usize, usize) = (11, 27);

/// Announcement timestamp (MMDDHHMM) of odds records
pub const ANNOUNCED_AT_RANGE: (usize, usize) = (27, 35);

/// Declared type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Trimmed text
    Str,
    /// All-digit integer
    Int,
    /// Fixed-point decimal; decodes to the raw integer magnitude, callers scale it
    Float,
}

/// Location and type of one field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub start: usize,
    pub end: usize,
    pub field_type: FieldType,
}

impl FieldSpec {
    pub const fn new(start: usize, end: usize, field_type: FieldType) -> Self {
        Self {
            start,
            end,
            field_type,
        }
    }

    pub fn width(&self) -> usize {
        self.end.saturating_sub(self.start)
    }
}

/// A repeating fixed-stride sub-group (one slot per runner, pair, ...)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupLayout {
    /// Byte offset of the first slot
    pub base: usize,
    /// Width of one slot
    pub stride: usize,
    /// Upper bound on slots
    pub max_count: usize,
    /// Fields that must all be present for a slot to count as used
    pub key_fields: Vec<String>,
    /// Field offsets relative to the slot start
    pub fields: BTreeMap<String, FieldSpec>,
}

/// Full layout of one record kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordLayout {
    pub fields: BTreeMap<String, FieldSpec>,
    pub groups: BTreeMap<String, GroupLayout>,
}

impl RecordLayout {
    fn with_fields(fields: &[(&str, FieldSpec)]) -> Self {
        Self {
            fields: to_map(fields),
            groups: BTreeMap::new(),
        }
    }

    fn group(mut self, name: &str, group: GroupLayout) -> Self {
        self.groups.insert(name.to_string(), group);
        self
    }
}

fn to_map(fields: &[(&str, FieldSpec)]) -> BTreeMap<String, FieldSpec> {
    fields
        .iter()
        .map(|(name, spec)| (name.to_string(), *spec))
        .collect()
}

fn group(
    base: usize,
    stride: usize,
    max_count: usize,
    key_fields: &[&str],
    fields: &[(&str, FieldSpec)],
) -> GroupLayout {
    GroupLayout {
        base,
        stride,
        max_count,
        key_fields: key_fields.iter().map(|k| k.to_string()).collect(),
        fields: to_map(fields),
    }
}

/// Immutable layout configuration keyed by `(source, kind)`
#[derive(Debug, Clone, Default)]
pub struct LayoutTable {
    layouts: HashMap<(Source, String), RecordLayout>,
}

impl LayoutTable {
    /// Empty table; every record decodes to a fallback
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a layout, replacing any previous one for the key
    pub fn with_layout(mut self, source: Source, kind: &str, layout: RecordLayout) -> Self {
        self.layouts
            .insert((source, kind.to_ascii_uppercase()), layout);
        self
    }

    pub fn get(&self, source: Source, kind: &str) -> Option<&RecordLayout> {
        self.layouts.get(&(source, kind.to_string()))
    }

    pub fn len(&self) -> usize {
        self.layouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }

    /// Layouts for the JV-Data record kinds this crate understands.
    ///
    /// UmaConn shares the JV-Data layout, so NAR gets the same table.
    pub fn jv_data() -> Self {
        let mut table = Self::new();
        for source in [Source::Jra, Source::Nar] {
            table = table
                .with_layout(source, "O1", o1_layout())
                .with_layout(source, "O2", o2_layout())
                .with_layout(source, "RA", ra_layout())
                .with_layout(source, "SE", se_layout())
                .with_layout(source, "WE", we_layout())
                .with_layout(source, "WH", wh_layout());
        }
        table
    }
}

use FieldType::{Float, Int, Str};

const RACE_ID: FieldSpec = FieldSpec::new(RACE_ID_RANGE.0, RACE_ID_RANGE.1, Str);
const ANNOUNCED_AT: FieldSpec = FieldSpec::new(ANNOUNCED_AT_RANGE.0, ANNOUNCED_AT_RANGE.1, Str);

/// O1: win, show and bracket odds
fn o1_layout() -> RecordLayout {
    RecordLayout::with_fields(&[
        ("race_id", RACE_ID),
        ("announced_at", ANNOUNCED_AT),
        ("horse_count", FieldSpec::new(35, 37, Int)),
    ])
    .group(
        "win",
        group(
            43,
            8,
            18,
            &["runner_id"],
            &[
                ("runner_id", FieldSpec::new(0, 2, Int)),
                ("odds", FieldSpec::new(2, 6, Float)),
                ("rank", FieldSpec::new(6, 8, Int)),
            ],
        ),
    )
    .group(
        "show",
        group(
            267,
            12,
            18,
            &["runner_id"],
            &[
                ("runner_id", FieldSpec::new(0, 2, Int)),
                ("odds_min", FieldSpec::new(2, 6, Float)),
                ("odds_max", FieldSpec::new(6, 10, Float)),
                ("rank", FieldSpec::new(10, 12, Int)),
            ],
        ),
    )
    .group(
        "bracket",
        group(
            603,
            8,
            36,
            &["bracket_1", "bracket_2"],
            &[
                ("bracket_1", FieldSpec::new(0, 1, Int)),
                ("bracket_2", FieldSpec::new(1, 2, Int)),
                ("odds", FieldSpec::new(2, 6, Float)),
                ("rank", FieldSpec::new(6, 8, Int)),
            ],
        ),
    )
}

/// O2: quinella odds
fn o2_layout() -> RecordLayout {
    RecordLayout::with_fields(&[("race_id", RACE_ID), ("announced_at", ANNOUNCED_AT)]).group(
        "quinella",
        group(
            40,
            13,
            153,
            &["runner_1", "runner_2"],
            &[
                ("runner_1", FieldSpec::new(0, 2, Int)),
                ("runner_2", FieldSpec::new(2, 4, Int)),
                ("odds", FieldSpec::new(4, 10, Float)),
                ("rank", FieldSpec::new(10, 13, Int)),
            ],
        ),
    )
}

/// RA: race details (record length 1272)
fn ra_layout() -> RecordLayout {
    RecordLayout::with_fields(&[
        ("race_id", RACE_ID),
        ("race_name_abbr", FieldSpec::new(572, 592, Str)),
        ("distance", FieldSpec::new(697, 701, Int)),
        ("track_type", FieldSpec::new(705, 707, Str)),
        ("course_div", FieldSpec::new(709, 711, Str)),
        ("start_time_hhmm", FieldSpec::new(873, 877, Str)),
        ("weather_code", FieldSpec::new(887, 888, Str)),
        ("turf_condition", FieldSpec::new(888, 889, Str)),
        ("dirt_condition", FieldSpec::new(889, 890, Str)),
    ])
}

/// SE: per-runner race entry (record length 555)
fn se_layout() -> RecordLayout {
    RecordLayout::with_fields(&[
        ("race_id", RACE_ID),
        ("wakuban", FieldSpec::new(27, 28, Int)),
        ("umaban", FieldSpec::new(28, 30, Int)),
        ("blood_id", FieldSpec::new(30, 40, Str)),
        ("horse_name", FieldSpec::new(40, 76, Str)),
        ("sex_code", FieldSpec::new(78, 79, Str)),
        ("age", FieldSpec::new(82, 84, Int)),
        ("jockey_name", FieldSpec::new(306, 314, Str)),
        ("weight", FieldSpec::new(324, 327, Int)),
        ("weight_diff", FieldSpec::new(328, 331, Str)),
        ("win_odds", FieldSpec::new(359, 363, Str)),
        ("win_ninki", FieldSpec::new(363, 365, Int)),
    ])
}

/// WE: weather and going (record length 42)
fn we_layout() -> RecordLayout {
    RecordLayout::with_fields(&[
        ("race_id", RACE_ID),
        ("weather_code", FieldSpec::new(34, 35, Str)),
        ("turf_condition", FieldSpec::new(35, 36, Str)),
        ("dirt_condition", FieldSpec::new(36, 37, Str)),
    ])
}

/// WH: body weights, one 45-byte slot per runner
fn wh_layout() -> RecordLayout {
    RecordLayout::with_fields(&[("race_id", RACE_ID), ("announced_at", ANNOUNCED_AT)]).group(
        "horse_weights",
        group(
            35,
            45,
            18,
            &["runner_id"],
            &[
                ("runner_id", FieldSpec::new(0, 2, Int)),
                ("horse_name", FieldSpec::new(2, 38, Str)),
                ("weight", FieldSpec::new(38, 41, Int)),
                ("weight_sign", FieldSpec::new(41, 42, Str)),
                ("weight_diff", FieldSpec::new(42, 45, Str)),
            ],
        ),
    )
}
