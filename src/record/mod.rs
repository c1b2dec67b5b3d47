//! Record decoding module
//!
//! Turns fixed-width JV-Data records into typed odds, race-info and fallback records

mod builder;
mod decoder;
mod layout;
mod types;

pub use builder::RecordBuilder;
pub use decoder::{
    decode_fields, decode_group, decode_text, extract_field, RecordDecoder, ODDS_DECIMALS,
    ODDS_KINDS,
};
pub use layout::{
    FieldSpec, FieldType, GroupLayout, LayoutTable, RecordLayout, ANNOUNCED_AT_RANGE,
    RACE_ID_RANGE,
};
pub use types::{
    DecodeError, DecodedRecord, FallbackRecord, FieldMap, FieldValue, HorseWeight, InfoRecord,
    OddsEntry, OddsRecord, RawRecord, ShowOddsEntry, Source,
};
