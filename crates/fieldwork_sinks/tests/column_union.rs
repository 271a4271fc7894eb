//! Property tests for CSV column union.
//!
//! The header of a conversion run is the union of all tag keys in
//! first-seen order; every key appears exactly once and every row can be
//! written against it.

use fieldwork_sinks::{column_union, CsvSink};
use proptest::prelude::*;
use std::collections::HashSet;
use tempfile::tempdir;

fn dedup_row(keys: Vec<String>) -> Vec<(String, String)> {
    let mut seen = HashSet::new();
    keys.into_iter()
        .filter(|k| seen.insert(k.clone()))
        .map(|k| {
            let v = format!("v_{}", k);
            (k, v)
        })
        .collect()
}

#[test]
fn test_union_keeps_row_order_then_key_order() {
    let rows = vec![
        dedup_row(vec!["start".into(), "lat".into(), "lon".into()]),
        dedup_row(vec!["lon".into(), "building".into()]),
        dedup_row(vec!["amenity".into(), "start".into()]),
    ];
    let columns = column_union(rows.iter().map(|r| r.as_slice()));
    assert_eq!(columns, vec!["start", "lat", "lon", "building", "amenity"]);
}

proptest! {
    #[test]
    fn union_contains_every_key_once(
        rows in prop::collection::vec(prop::collection::vec("[a-e]{1,2}", 0..6), 0..8)
    ) {
        let rows: Vec<Vec<(String, String)>> = rows.into_iter().map(dedup_row).collect();
        let columns = column_union(rows.iter().map(|r| r.as_slice()));

        let unique: HashSet<&String> = columns.iter().collect();
        prop_assert_eq!(unique.len(), columns.len());

        for row in &rows {
            for (key, _) in row {
                prop_assert!(columns.contains(key));
            }
        }
    }

    #[test]
    fn union_first_key_comes_first(
        rows in prop::collection::vec(prop::collection::vec("[a-e]{1,2}", 1..6), 1..8)
    ) {
        let rows: Vec<Vec<(String, String)>> = rows.into_iter().map(dedup_row).collect();
        let columns = column_union(rows.iter().map(|r| r.as_slice()));
        prop_assert_eq!(&columns[0], &rows[0][0].0);
    }
}

#[test]
fn test_union_rows_round_trip_through_csv() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("union.csv");
    let rows = vec![
        dedup_row(vec!["a".into(), "b".into()]),
        dedup_row(vec!["c".into()]),
    ];
    let columns = column_union(rows.iter().map(|r| r.as_slice()));

    let mut sink = CsvSink::new(path.clone()).unwrap();
    sink.init(&columns).unwrap();
    for row in &rows {
        sink.write_row(row).unwrap();
    }
    sink.prepare().unwrap();
    sink.commit().unwrap();

    let mut reader = csv::Reader::from_path(&path).unwrap();
    let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
    assert_eq!(headers, vec!["a", "b", "c"]);
    let records: Vec<Vec<String>> = reader
        .records()
        .map(|r| r.unwrap().iter().map(String::from).collect())
        .collect();
    assert_eq!(records[0], vec!["v_a", "v_b", ""]);
    assert_eq!(records[1], vec!["", "", "v_c"]);
}
