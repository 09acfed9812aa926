mod support;

use bytes::{BufMut, Bytes, BytesMut};
use columnts::codec::encode_value;
use columnts::{
    ColumnTs, Error, FieldFilter, InsertBatch, InsertEntry, MergeComponent, Procedure,
    SHAPE_MAPPING, ScriptCall, ScriptHost, SeriesKey, SeriesStatus, StatsType,
};
use common::{Record, Storage, StorageRead};
use rstest::rstest;

use support::{DAY, Lcg, START, open_db, populate};

#[tokio::test]
async fn should_report_front_and_back_after_commit_only() {
    // given
    let (_, db) = open_db();
    let session = db.session();
    let series = ColumnTs::with_session("s", session.clone());
    session.begin();
    series.add(START + 3 * DAY, "pv", 3.0).await.unwrap();
    series.add(START, "pv", 1.0).await.unwrap();

    // when
    let before = (series.front().await.unwrap(), series.back().await.unwrap());
    session.commit().await.unwrap();
    let after = (series.front().await.unwrap(), series.back().await.unwrap());

    // then
    assert_eq!(before, (None, None));
    assert_eq!(after, (Some(START), Some(START + 3 * DAY)));
}

#[tokio::test]
async fn should_get_and_set_single_values() {
    // given
    let (_, db) = open_db();
    let series = db.series("s");

    // when
    series.set(START, "open", 1.5).await.unwrap();
    series.set(START, "close", f64::NAN).await.unwrap();
    series.set(START, "open", 2.5).await.unwrap();

    // then
    let row = series.item(START).await.unwrap();
    assert_eq!(row["open"], 2.5);
    assert!(row["close"].is_nan());
    assert_eq!(series.size().await.unwrap(), 1);
    assert!(matches!(
        series.item(START + DAY).await,
        Err(Error::TimestampNotFound(t)) if t == START + DAY
    ));
}

#[tokio::test]
async fn should_fail_remotely_when_key_holds_another_kind_of_value() {
    // given
    let (storage, db) = open_db();
    storage
        .put(vec![Record::new(
            SeriesKey::new("s").time_index(),
            Bytes::from_static(b"bla"),
        )])
        .await
        .unwrap();
    let series = db.series("s");

    // when
    let write = series.add(START, "pv", 1.0).await;
    let read = series.size().await;

    // then
    assert!(matches!(write, Err(Error::RemoteExecution(_))));
    assert!(matches!(read, Err(Error::RemoteExecution(_))));
    assert_eq!(series.status(), SeriesStatus::Pending);
}

#[tokio::test]
async fn should_reject_non_mapping_entry_without_mutating() {
    // given
    let (storage, db) = open_db();
    let series = db.series("s");
    series.add(START, "pv", 1.0).await.unwrap();
    let mut buf = BytesMut::new();
    buf.put_u32(2);
    buf.put_i64(START + DAY);
    buf.put_u8(SHAPE_MAPPING);
    buf.put_u16(1);
    buf.put_u16(2);
    buf.put_slice(b"pv");
    buf.put_slice(&encode_value(2.0));
    buf.put_i64(START + 2 * DAY);
    buf.put_u8(0x07);
    buf.put_u16(0);
    let before = storage.scan(SeriesKey::all_time_indexes()).await.unwrap();

    // when
    let result = db
        .engine()
        .execute(ScriptCall::new(Procedure::InsertUpdate, "s", vec![buf.freeze()]))
        .await;

    // then
    assert!(matches!(result, Err(Error::InvalidType(_))));
    assert_eq!(storage.scan(SeriesKey::all_time_indexes()).await.unwrap(), before);
    assert_eq!(series.size().await.unwrap(), 1);
}

#[tokio::test]
async fn should_insert_idempotently_in_timestamp_order() {
    // given
    let (_, db) = open_db();
    let series = db.series("s");
    let mut rng = Lcg::new(3);
    let points: Vec<(i64, f64)> = [5, 1, 4, 2, 3]
        .iter()
        .map(|day| (START + day * DAY, rng.next_value()))
        .collect();

    // when
    for _ in 0..2 {
        for (timestamp, value) in &points {
            series.add(*timestamp, "pv", *value).await.unwrap();
        }
    }

    // then
    let range = series.irange(0, -1, &FieldFilter::all()).await.unwrap();
    assert_eq!(range.len(), 5);
    assert!(range.timestamps.windows(2).all(|w| w[0] < w[1]));
    for (timestamp, value) in &points {
        let rank = range.timestamps.iter().position(|t| t == timestamp).unwrap();
        assert_eq!(range.fields["pv"][rank], *value);
    }
}

#[tokio::test]
async fn should_pad_new_fields_with_nil() {
    // given
    let (_, db) = open_db();
    let series = db.series("s");
    series.add(START, "a", 1.0).await.unwrap();
    series.add(START + DAY, "a", 2.0).await.unwrap();

    // when
    series.add(START + DAY / 2, "b", 9.0).await.unwrap();

    // then
    let range = series.irange(0, -1, &FieldFilter::all()).await.unwrap();
    assert_eq!(range.timestamps, vec![START, START + DAY / 2, START + DAY]);
    assert!(range.fields["a"][1].is_nan());
    assert_eq!(range.fields["b"][1], 9.0);
    assert!(range.fields["b"][0].is_nan() && range.fields["b"][2].is_nan());
    let info = series.info().await.unwrap();
    assert!(info.fields.values().all(|len| *len == 27));
}

#[rstest]
#[case(0, -1, 10)]
#[case(2, 4, 3)]
#[case(-3, -1, 3)]
#[case(8, 100, 2)]
#[tokio::test]
async fn should_window_ranks(#[case] start: i64, #[case] end: i64, #[case] expected: usize) {
    // given
    let (_, db) = open_db();
    let mut rng = Lcg::new(5);
    let series = populate(&db.session(), "s", &["pv"], 10, &mut rng).await;

    // when
    let range = series.irange(start, end, &FieldFilter::all()).await.unwrap();

    // then
    assert_eq!(range.len(), expected);
}

#[tokio::test]
async fn should_range_timestamps_inclusively() {
    // given
    let (_, db) = open_db();
    let mut rng = Lcg::new(5);
    let series = populate(&db.session(), "s", &["pv"], 10, &mut rng).await;

    // when
    let range = series
        .range(START + DAY, START + 3 * DAY, &FieldFilter::all())
        .await
        .unwrap();

    // then
    assert_eq!(range.timestamps, vec![START + DAY, START + 2 * DAY, START + 3 * DAY]);
}

#[tokio::test]
async fn should_compute_stats_skipping_nil_values() {
    // given
    let (_, db) = open_db();
    let series = db.series("s");
    let values = [2.0, f64::NAN, 4.0, 8.0, f64::NAN];
    for (day, value) in values.iter().enumerate() {
        series
            .add_fields(START + day as i64 * DAY, [("x", *value), ("y", 1.0)])
            .await
            .unwrap();
    }

    // when
    let stats = series
        .istats(0, -1, &FieldFilter::all())
        .await
        .unwrap()
        .expect("non-empty window");

    // then
    assert_eq!((stats.start, stats.stop, stats.len), (START, START + 4 * DAY, 5));
    let x = stats.stats["x"];
    assert_eq!(x.n, 3);
    assert_eq!((x.min, x.max), (2.0, 8.0));
    assert!((x.sum - 14.0 / 3.0).abs() < 1e-12);
    assert!((x.sum2 - 84.0 / 3.0).abs() < 1e-12);
    assert_eq!(x.dsum, 3.0);
    assert_eq!(x.dsum2, 10.0);
    assert_eq!(stats.stats["y"].n, 5);

    let by_date = series
        .stats(START + DAY, START + 3 * DAY, &FieldFilter::only(["x"]))
        .await
        .unwrap()
        .expect("non-empty window");
    assert_eq!(by_date.len, 3);
    assert_eq!(by_date.stats.len(), 1);
    assert_eq!(by_date.stats["x"].n, 2);
    assert!(series.stats(0, START - 1, &FieldFilter::all()).await.unwrap().is_none());
}

#[tokio::test]
async fn should_count_ranks_with_every_selected_field() {
    // given
    let (_, db) = open_db();
    let series = db.series("s");
    series.add_fields(START, [("a", 1.0), ("b", 1.0)]).await.unwrap();
    series.add_fields(START + DAY, [("a", 1.0)]).await.unwrap();
    series.add_fields(START + 2 * DAY, [("a", 1.0), ("b", 2.0)]).await.unwrap();

    // when
    let multi = series
        .imulti_stats(0, -1, &FieldFilter::all())
        .await
        .unwrap()
        .expect("non-empty window");
    let only_a = series
        .multi_stats(START, START + 2 * DAY, &FieldFilter::only(["a"]))
        .await
        .unwrap()
        .expect("non-empty window");

    // then
    assert_eq!(multi.stats_type, StatsType::Multi);
    assert_eq!(multi.n, 2);
    assert_eq!(multi.fields, vec!["a".to_string(), "b".to_string()]);
    assert_eq!((multi.start, multi.stop), (START, START + 2 * DAY));
    assert_eq!(only_a.n, 3);
}

#[tokio::test]
async fn should_merge_with_multipliers() {
    // given
    let (_, db) = open_db();
    let session = db.session();
    let a = ColumnTs::with_session("a", session.clone());
    let b = ColumnTs::with_session("b", session.clone());
    let fx = ColumnTs::with_session("fx", session.clone());
    session.begin();
    for day in 0..3 {
        let t = START + day * DAY;
        a.add(t, "close", 10.0 + day as f64).await.unwrap();
        b.add(t, "close", 1.0).await.unwrap();
    }
    fx.add(START, "rate", 2.0).await.unwrap();
    fx.add(START + DAY, "rate", f64::NAN).await.unwrap();
    session.commit().await.unwrap();
    let mut merged = ColumnTs::new("merged");

    // when
    merged
        .merge(&[
            MergeComponent::new(1.0, &a).with_multiplier(&fx),
            MergeComponent::new(-1.0, &b),
        ])
        .await
        .unwrap();

    // then
    let close = merged.irange(0, -1, &FieldFilter::all()).await.unwrap().fields["close"].clone();
    assert_eq!(close[0], 19.0);
    assert!(close[1].is_nan());
    assert!(close[2].is_nan());
}

#[tokio::test]
async fn should_restrict_merge_to_allowed_fields() {
    // given
    let (_, db) = open_db();
    let session = db.session();
    let mut rng = Lcg::new(9);
    let a = populate(&session, "a", &["x", "y"], 4, &mut rng).await;
    let b = populate(&session, "b", &["x", "z"], 4, &mut rng).await;
    let components = [MergeComponent::new(1.0, &a), MergeComponent::new(2.0, &b)];
    let mut merged = ColumnTs::new("merged");

    // when
    merged
        .merge_fields(&components, FieldFilter::only(["x", "z", "nope"]))
        .await
        .unwrap();
    let unstored = ColumnTs::merged_series(&components, FieldFilter::all())
        .await
        .unwrap();

    // then
    assert_eq!(merged.fields().await.unwrap(), vec!["x", "z"]);
    assert_eq!(unstored.fields.keys().collect::<Vec<_>>(), vec!["x", "y", "z"]);
    let stored = merged.irange(0, -1, &FieldFilter::all()).await.unwrap();
    assert_eq!(stored.fields["x"], unstored.fields["x"]);
    assert!(stored.fields["z"].iter().all(|v| v.is_nan()));
    assert!(db.series_ids().await.unwrap().contains(&"merged".to_string()));
}

#[tokio::test]
async fn should_merge_into_one_of_its_components() {
    // given
    let (_, db) = open_db();
    let mut a = db.series("a");
    let b = db.series("b");
    a.add(START, "x", 1.0).await.unwrap();
    b.add(START, "x", 10.0).await.unwrap();
    let components = [MergeComponent::new(2.0, &a), MergeComponent::new(1.0, &b)];

    // when
    a.merge(&components).await.unwrap();

    // then
    assert_eq!(a.item(START).await.unwrap()["x"], 12.0);
}

#[tokio::test]
async fn should_reject_merge_with_fewer_than_two_components() {
    // given
    let (_, db) = open_db();
    let a = db.series("a");
    let mut merged = db.series("m");

    // when
    let result = merged.merge(&[MergeComponent::new(1.0, &a)]).await;
    let unstored = ColumnTs::merged_series(&[], FieldFilter::all()).await;

    // then
    assert!(matches!(result, Err(Error::InvalidValue(_))));
    assert!(matches!(unstored, Err(Error::InvalidValue(_))));
}

#[tokio::test]
async fn should_apply_point_writes_after_pending_merge() {
    // given
    let (_, db) = open_db();
    let session = db.session();
    let mut rng = Lcg::new(1);
    let a = populate(&session, "a", &["x"], 2, &mut rng).await;
    let b = populate(&session, "b", &["x"], 2, &mut rng).await;
    let mut merged = ColumnTs::with_session("m", session.clone());
    session.begin();

    // when
    merged
        .merge(&[MergeComponent::new(1.0, &a), MergeComponent::new(1.0, &b)])
        .await
        .unwrap();
    merged.add(START, "x", -1.0).await.unwrap();
    session.commit().await.unwrap();

    // then
    let x = merged.irange(0, -1, &FieldFilter::all()).await.unwrap().fields["x"].clone();
    assert_eq!(x[0], -1.0);
    assert!(!x[1].is_nan());
}

#[tokio::test]
async fn should_discard_writes_on_rollback() {
    // given
    let (_, db) = open_db();
    let session = db.session();
    let series = ColumnTs::with_session("s", session.clone());
    session.begin();
    series.add(START, "pv", 1.0).await.unwrap();

    // when
    session.rollback();

    // then
    assert_eq!(series.status(), SeriesStatus::Committed);
    assert_eq!(series.size().await.unwrap(), 0);
}

#[tokio::test]
async fn should_run_wire_encoded_batches() {
    // given
    let (_, db) = open_db();
    let batch = InsertBatch {
        entries: vec![InsertEntry {
            timestamp: START,
            fields: [("pv".to_string(), encode_value(4.0))].into_iter().collect(),
        }],
    };
    let call = ScriptCall::new(Procedure::InsertUpdate, "s", vec![batch.serialize().unwrap()]);

    // when
    db.engine().execute(call).await.unwrap();

    // then
    assert_eq!(db.series("s").item(START).await.unwrap()["pv"], 4.0);
}
