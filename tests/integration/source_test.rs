//! Record source integration tests

use chrono::NaiveDate;
use keiba_ingest::record::{DecodedRecord, FieldValue, RecordBuilder, RecordDecoder, Source};
use keiba_ingest::source::{
    collect_batch, BatchLimits, RealtimeKeys, RecordSource, ReplaySource, SourceRequest,
};
use tempfile::TempDir;

const RACE: &str = "2024061505030211";

fn entry_record() -> Vec<u8> {
    let mut b = RecordBuilder::new("SE", 400);
    b.race_id(RACE)
        .put_num(27, 1, 3)
        .put_num(28, 2, 5)
        .put(40, "ディープインパクト")
        .put(78, "1")
        .put_num(82, 2, 4);
    b.bytes().to_vec()
}

fn weight_record() -> Vec<u8> {
    let mut b = RecordBuilder::new("WH", 35 + 45 * 2);
    b.race_id(RACE).announced_at("06151420");
    b.put_num(35, 2, 1).put(37, "キタサンブラック").put_num(73, 3, 520).put(76, "+").put(77, "004");
    b.put_num(80, 2, 2).put(82, "イクイノックス").put_num(118, 3, 498).put(121, "-").put(122, "002");
    b.bytes().to_vec()
}

async fn replay_file(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("replay.txt");
    let mut content = entry_record();
    content.extend_from_slice(b"\r\n\n");
    content.extend(weight_record());
    content.push(b'\n');
    tokio::fs::write(&path, content).await.unwrap();
    path
}

#[tokio::test]
async fn test_replay_file_decodes_multibyte_fields() {
    let dir = TempDir::new().unwrap();
    let path = replay_file(&dir).await;

    let mut replay = ReplaySource::from_file(Source::Jra, &path).await.unwrap();
    let requests = vec![SourceRequest::new("0B15", "202406150503")];
    let raw = collect_batch(&mut replay, &requests, BatchLimits::default()).await;
    assert_eq!(raw.len(), 2);
    assert_eq!(raw[0].kind, "SE");
    assert_eq!(raw[1].kind, "WH");

    let decoder = RecordDecoder::default();
    let DecodedRecord::Info(entry) = decoder.decode(&raw[0]).unwrap() else {
        panic!("expected info record");
    };
    assert_eq!(entry.race_id, RACE);
    assert_eq!(
        entry.fields["horse_name"],
        FieldValue::Text("ディープインパクト".into())
    );
    // Fields after the multi-byte name still line up
    assert_eq!(entry.fields["sex_code"], FieldValue::Text("1".into()));
    assert_eq!(entry.fields["age"], FieldValue::Int(4));
    assert_eq!(entry.fields["umaban"], FieldValue::Int(5));

    let DecodedRecord::Info(weights) = decoder.decode(&raw[1]).unwrap() else {
        panic!("expected info record");
    };
    assert_eq!(weights.horse_weights.len(), 2);
    assert_eq!(weights.horse_weights[0].horse_name.as_deref(), Some("キタサンブラック"));
    assert_eq!(weights.horse_weights[0].weight, Some(520));
    assert_eq!(weights.horse_weights[1].weight_sign.as_deref(), Some("-"));
    assert_eq!(weights.horse_weights[1].weight_diff.as_deref(), Some("002"));
}

#[tokio::test]
async fn test_replay_batch_served_to_first_key_only() {
    let dir = TempDir::new().unwrap();
    let path = replay_file(&dir).await;
    let mut replay = ReplaySource::from_file(Source::Nar, &path).await.unwrap();
    assert_eq!(replay.source(), Source::Nar);

    let date = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
    let requests = RealtimeKeys::for_date(date, 3, 12).requests(&["0B14".to_string()]);
    assert_eq!(requests.len(), 36);

    let raw = collect_batch(&mut replay, &requests, BatchLimits::default()).await;
    assert_eq!(raw.len(), 2);
    assert!(raw.iter().all(|r| r.source == Source::Nar));

    let again = collect_batch(&mut replay, &requests, BatchLimits::default()).await;
    assert!(again.is_empty());
}

#[tokio::test]
async fn test_lines_round_trip_through_shift_jis() {
    let mut replay = ReplaySource::from_lines(Source::Jra, ["WE東京", "", "WE阪神"]);
    let raw = collect_batch(
        &mut replay,
        &[SourceRequest::new("0B14", "k")],
        BatchLimits::default(),
    )
    .await;
    assert_eq!(raw.len(), 2);
    let (text, _, _) = encoding_rs::SHIFT_JIS.decode(&raw[1].payload);
    assert_eq!(text, "WE阪神");
}
