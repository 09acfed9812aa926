//! End-to-end scenarios over an in-memory database.

mod support;

use std::collections::BTreeMap;

use bytes::Bytes;
use columnts::codec::{RECORD_SIZE, decode_value};
use columnts::{ColumnTs, FieldFilter, MergeComponent, SeriesKey};
use common::StorageRead;

use support::{DAY, Lcg, START, open_db, populate};

#[tokio::test]
async fn should_collect_fields_of_added_and_updated_dates() {
    // given
    let (_, db) = open_db();
    let session = db.session();
    let goog = ColumnTs::with_session("goog", session.clone());
    session.begin();

    // when
    goog.add_fields(
        START,
        [("open", 586.0), ("high", 588.66), ("low", 583.16), ("close", 585.52)],
    )
    .await
    .unwrap();
    let rows = [
        (START + DAY, [("open", 586.0), ("high", 590.0), ("low", 581.0), ("close", 588.0)]),
        (START + 2 * DAY, [("open", 588.0), ("high", 591.5), ("low", 584.0), ("close", 590.1)]),
    ];
    goog.update(rows.map(|(timestamp, values)| {
        let values: BTreeMap<String, f64> =
            values.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
        (timestamp, values)
    }))
    .await
    .unwrap();
    session.commit().await.unwrap();

    // then
    assert_eq!(goog.size().await.unwrap(), 3);
    assert_eq!(goog.fields().await.unwrap(), vec!["close", "high", "low", "open"]);
    assert_eq!(goog.numfields().await.unwrap(), 4);
}

#[tokio::test]
async fn should_pack_two_records_per_field_in_timestamp_order() {
    // given
    let (storage, db) = open_db();
    let session = db.session();
    let series = ColumnTs::with_session("ts", session.clone());
    let d = START + 10 * DAY;
    session.begin();

    // when
    series.add(d, "pv", 56.0).await.unwrap();
    series.add(d - 2 * DAY, "pv", 53.8).await.unwrap();
    assert_eq!(series.size().await.unwrap(), 0);
    session.commit().await.unwrap();

    // then
    assert_eq!(series.size().await.unwrap(), 2);
    let info = series.info().await.unwrap();
    assert_eq!(info.fields["pv"], 18);
    let raw: Bytes = storage
        .get(SeriesKey::new("ts").field("pv"))
        .await
        .unwrap()
        .expect("field key")
        .value;
    let values: Vec<f64> = raw
        .chunks(RECORD_SIZE)
        .map(|record| decode_value(record).unwrap())
        .collect();
    assert_eq!(values, vec![53.8, 56.0]);
}

#[tokio::test]
async fn should_merge_three_weighted_series() {
    // given
    let (_, db) = open_db();
    let session = db.session();
    let mut rng = Lcg::new(7);
    let ts1 = populate(&session, "ts1", &["a", "b", "c"], 20, &mut rng).await;
    let ts2 = populate(&session, "ts2", &["a", "b", "c"], 15, &mut rng).await;
    let ts3 = populate(&session, "ts3", &["a", "b", "c"], 25, &mut rng).await;
    let mut merged = ColumnTs::new("merged");

    // when
    merged
        .merge(&[
            MergeComponent::new(0.5, &ts1),
            MergeComponent::new(1.3, &ts2),
            MergeComponent::new(-2.65, &ts3),
        ])
        .await
        .unwrap();

    // then
    let all = FieldFilter::all();
    let result = merged.irange(0, -1, &all).await.unwrap();
    let r1 = ts1.irange(0, -1, &all).await.unwrap();
    let r2 = ts2.irange(0, -1, &all).await.unwrap();
    let r3 = ts3.irange(0, -1, &all).await.unwrap();
    assert_eq!(result.timestamps, r3.timestamps);
    assert_eq!(merged.numfields().await.unwrap(), 3);
    for (i, timestamp) in result.timestamps.iter().enumerate() {
        for field in ["a", "b", "c"] {
            let value = result.fields[field][i];
            if i < r2.len() {
                let expected = 0.5 * r1.fields[field][i] + 1.3 * r2.fields[field][i]
                    - 2.65 * r3.fields[field][i];
                assert!(
                    (value - expected).abs() < 1e-9,
                    "{} at {}: {} != {}",
                    field,
                    timestamp,
                    value,
                    expected
                );
            } else {
                assert!(value.is_nan(), "{} at {} should be nil", field, timestamp);
            }
        }
    }
}

#[tokio::test]
async fn should_drop_unknown_fields_from_range() {
    // given
    let (_, db) = open_db();
    let session = db.session();
    let mut rng = Lcg::new(11);
    let series = populate(&session, "goog", &["open", "high", "low", "close"], 10, &mut rng).await;

    // when
    let range = series
        .irange(0, -1, &FieldFilter::only(["low", "high", "badone"]))
        .await
        .unwrap();

    // then
    assert_eq!(range.fields.keys().collect::<Vec<_>>(), vec!["high", "low"]);
    assert_eq!(range.len(), 10);
    assert!(range.fields.values().all(|values| values.len() == 10));
}
